//! HTTP remote server.
//!
//! Endpoints:
//!   GET  /refs          → `HEAD <branch>` and `ref <branch> <sha>` lines
//!   GET  /objects       → one object id per line
//!   HEAD /objects/{id}  → 200 present, 404 absent
//!   GET  /objects/{id}  → raw bytes
//!   POST /objects/{id}  → store raw bytes; 400 if they do not hash to id
//!   POST /update-ref    → compare-and-swap a branch head; 409 on conflict

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use mgit_core::{ObjectId, RefUpdate, Repository};

use crate::protocol::{self, RefUpdateRequest, RemoteRefs};
use crate::receive::{self, ReceiveError};

/// Remote server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address (e.g., 0.0.0.0:8080)
    pub addr: String,
    /// Repository root path
    pub repo_root: PathBuf,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
    /// Enable debug logging
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
            repo_root: PathBuf::from("./data/repo"),
            max_body_size: 100 * 1024 * 1024, // 100 MB
            debug: false,
        }
    }
}

/// Serves one repository to push/pull/clone clients
#[derive(Debug)]
pub struct RemoteServer {
    repo: Repository,
    config: ServerConfig,
}

impl RemoteServer {
    /// Open (initializing if needed) the repository named by `config`
    pub fn open(config: ServerConfig) -> mgit_core::Result<Self> {
        let repo = Repository::init(&config.repo_root)?;
        Ok(Self { repo, config })
    }

    pub fn with_repository(repo: Repository, config: ServerConfig) -> Self {
        Self { repo, config }
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Accept connections until the listener fails
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> std::io::Result<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            tracing::debug!("Connection from {}", peer);
            let server = self.clone();
            let io = TokioIo::new(stream);

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move { Ok::<_, Infallible>(server.handle(req).await) }
                });
                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    tracing::error!("Error serving connection: {:?}", e);
                }
            });
        }
    }

    /// Read the body (up to the configured limit) and dispatch
    pub async fn handle(self: Arc<Self>, req: Request<Incoming>) -> Response<Full<Bytes>> {
        let method = req.method().as_str().to_string();
        let path = req.uri().path().to_string();

        let body = match Limited::new(req.into_body(), self.config.max_body_size)
            .collect()
            .await
        {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                tracing::warn!("{} {}: body over {} bytes", method, path, self.config.max_body_size);
                return text(StatusCode::PAYLOAD_TOO_LARGE, "request body too large\n");
            }
            Err(e) => {
                return text(StatusCode::BAD_REQUEST, format!("failed to read body: {}\n", e));
            }
        };

        let response = self.dispatch_blocking(method.clone(), path.clone(), body).await;
        tracing::info!("{} {} -> {}", method, path, response.status());
        response
    }

    /// Run [`RemoteServer::dispatch`] on the blocking pool; storage access
    /// is synchronous file I/O.
    pub async fn dispatch_blocking(
        self: Arc<Self>,
        method: String,
        path: String,
        body: Bytes,
    ) -> Response<Full<Bytes>> {
        match tokio::task::spawn_blocking(move || self.dispatch(&method, &path, &body)).await {
            Ok(response) => response,
            Err(e) => internal_error(e),
        }
    }

    /// Route one request. Blocks on local storage access.
    pub fn dispatch(&self, method: &str, path: &str, body: &[u8]) -> Response<Full<Bytes>> {
        match (method, path) {
            ("GET", "/refs") => self.handle_refs(),
            ("GET", "/objects") => self.handle_object_list(),
            ("POST", "/update-ref") => self.handle_update_ref(body),
            (_, "/refs" | "/objects" | "/update-ref") => method_not_allowed(method, path),
            _ => match path.strip_prefix("/objects/") {
                Some(id) => self.handle_object(method, id, body),
                None => text(StatusCode::NOT_FOUND, format!("no such endpoint: {}\n", path)),
            },
        }
    }

    // ─────────────────────────────────────────────────────
    // GET /refs, GET /objects
    // ─────────────────────────────────────────────────────

    fn handle_refs(&self) -> Response<Full<Bytes>> {
        match RemoteRefs::load(&self.repo) {
            Ok(refs) => text(StatusCode::OK, refs.render()),
            Err(e) => internal_error(e),
        }
    }

    fn handle_object_list(&self) -> Response<Full<Bytes>> {
        match self.repo.objects().list() {
            Ok(ids) => text(StatusCode::OK, protocol::render_object_list(&ids)),
            Err(e) => internal_error(e),
        }
    }

    // ─────────────────────────────────────────────────────
    // HEAD/GET/POST /objects/{id}
    // ─────────────────────────────────────────────────────

    fn handle_object(&self, method: &str, id: &str, body: &[u8]) -> Response<Full<Bytes>> {
        let Ok(id) = id.parse::<ObjectId>() else {
            return text(StatusCode::BAD_REQUEST, format!("invalid object id: {:?}\n", id));
        };
        match method {
            "HEAD" => {
                let status = if self.repo.objects().contains(&id) {
                    StatusCode::OK
                } else {
                    StatusCode::NOT_FOUND
                };
                text(status, Bytes::new())
            }
            "GET" => match self.repo.objects().read(&id) {
                Ok(data) => raw(data),
                Err(e) if e.is_not_found() => {
                    text(StatusCode::NOT_FOUND, format!("no such object: {}\n", id))
                }
                Err(e) => internal_error(e),
            },
            "POST" => match receive::receive_object(&self.repo, &id, body) {
                Ok(()) => text(StatusCode::OK, Bytes::new()),
                Err(e) => receive_error(e),
            },
            _ => method_not_allowed(method, "/objects/{id}"),
        }
    }

    // ─────────────────────────────────────────────────────
    // POST /update-ref
    // ─────────────────────────────────────────────────────

    fn handle_update_ref(&self, body: &[u8]) -> Response<Full<Bytes>> {
        let update = match std::str::from_utf8(body)
            .map_err(|e| e.to_string())
            .and_then(|text| RefUpdateRequest::parse(text).map_err(|e| e.to_string()))
        {
            Ok(update) => update,
            Err(e) => return text(StatusCode::BAD_REQUEST, format!("{}\n", e)),
        };

        match receive::receive_ref_update(&self.repo, &update) {
            Ok(RefUpdate::Updated) => text(StatusCode::OK, Bytes::new()),
            Ok(RefUpdate::Conflict { current }) => {
                text(StatusCode::CONFLICT, protocol::render_conflict(&current))
            }
            Err(e) => receive_error(e),
        }
    }
}

fn text(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(body.into()));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    resp
}

fn raw(data: Bytes) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(data));
    resp.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    resp
}

fn method_not_allowed(method: &str, path: &str) -> Response<Full<Bytes>> {
    text(
        StatusCode::METHOD_NOT_ALLOWED,
        format!("{} not allowed on {}\n", method, path),
    )
}

fn internal_error(e: impl std::fmt::Display) -> Response<Full<Bytes>> {
    tracing::error!("Request failed: {}", e);
    text(StatusCode::INTERNAL_SERVER_ERROR, format!("{}\n", e))
}

fn receive_error(e: ReceiveError) -> Response<Full<Bytes>> {
    match e {
        ReceiveError::Store(e) => internal_error(e),
        other => text(StatusCode::BAD_REQUEST, format!("{}\n", other)),
    }
}
