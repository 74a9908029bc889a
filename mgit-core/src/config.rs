//! Sync configuration stored at `.mgit/sync-config.json`

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::fsutil;

const CONFIG_FILE: &str = "sync-config.json";

/// Network settings for remote transports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds to wait for a TCP connection to a remote.
    pub connect_timeout_secs: u64,
    /// Seconds to wait for a whole request/response exchange.
    pub request_timeout_secs: u64,
    /// Largest object (bytes) a transport will upload or accept.
    pub max_object_size: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            request_timeout_secs: 30,
            max_object_size: 100 * 1024 * 1024, // 100 MB
        }
    }
}

impl SyncConfig {
    fn path(repo_dir: &Path) -> PathBuf {
        repo_dir.join(CONFIG_FILE)
    }

    /// Load from a repository's hidden directory, falling back to defaults.
    pub fn load(repo_dir: &Path) -> Result<Self> {
        let path = Self::path(repo_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)?;
        serde_json::from_str(&data)
            .map_err(|e| Error::Config(format!("Failed to parse {:?}: {}", path, e)))
    }

    /// Save to a repository's hidden directory.
    pub fn save(&self, repo_dir: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to encode sync config: {}", e)))?;
        fsutil::write_atomic(&Self::path(repo_dir), data.as_bytes())?;
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
