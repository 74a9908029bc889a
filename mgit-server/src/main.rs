//! mgit Server - HTTP remote for push, pull and clone
//!
//! Serves one repository root over the object/ref protocol implemented in
//! `mgit-remote`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mgit_core::Repository;
use mgit_remote::{RemoteServer, ServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// mgit Server Configuration
#[derive(Parser, Debug)]
#[command(name = "mgit-server")]
#[command(author = "mgit Contributors")]
#[command(version = "0.1.0")]
#[command(about = "HTTP remote server for mgit repositories", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the server
    Start {
        /// Listen address (e.g., 0.0.0.0:8080)
        #[arg(short, long, default_value = "0.0.0.0:8080")]
        addr: String,

        /// Repository root directory (created if missing)
        #[arg(short, long, default_value = "./data/repo")]
        repo_root: PathBuf,

        /// Maximum request body size in bytes
        #[arg(long, default_value_t = 100 * 1024 * 1024)]
        max_body_size: usize,

        /// Enable debug logging
        #[arg(long)]
        debug: bool,
    },

    /// Initialize a new repository
    Init {
        /// Repository path
        path: PathBuf,
    },
}

fn init_tracing(debug: bool) {
    let env_filter = if debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            addr,
            repo_root,
            max_body_size,
            debug,
        } => {
            init_tracing(debug);

            info!("Starting mgit server on {}", addr);
            info!("Repository root: {}", repo_root.display());

            let config = ServerConfig {
                addr,
                repo_root: repo_root.clone(),
                max_body_size,
                debug,
            };
            let addr: SocketAddr = config
                .addr
                .parse()
                .with_context(|| format!("Invalid listen address {:?}", config.addr))?;
            let server = RemoteServer::open(config)
                .with_context(|| format!("Failed to open repository at {}", repo_root.display()))?;

            let listener = TcpListener::bind(addr).await?;
            info!("Server listening on {}", listener.local_addr()?);

            Arc::new(server).serve(listener).await?;
        }

        Commands::Init { path } => {
            init_tracing(false);
            Repository::init(&path)
                .with_context(|| format!("Failed to initialize repository at {}", path.display()))?;
            println!("Initialized empty mgit repository in {}", path.display());
        }
    }

    Ok(())
}
