//! HTTP client transport for a remote served by [`crate::RemoteServer`]

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use std::collections::HashSet;

use mgit_core::{ObjectId, RefUpdate, SyncConfig};

use crate::error::{Result, SyncError};
use crate::protocol::{self, RefUpdateRequest, RemoteRefs};
use crate::transport::RemoteTransport;

/// HTTP transport targeting a base URL such as `http://server:8080`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    http: reqwest::Client,
}

impl HttpTransport {
    /// Build a client with the connect and request timeouts from `config`
    pub fn new(base_url: &str, config: &SyncConfig) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| SyncError::Transport {
                endpoint: base_url.clone(),
                message: e.to_string(),
            })?;
        Ok(Self { base_url, http })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &str) -> Result<reqwest::Response> {
        tracing::debug!("Remote request: {}", url);
        request.send().await.map_err(|e| classify(e, url))
    }

    async fn text(&self, url: &str) -> Result<String> {
        let resp = self.send(self.http.get(url), url).await?;
        let resp = ensure_success(resp, url).await?;
        resp.text().await.map_err(|e| classify(e, url))
    }
}

/// Map a reqwest failure to a retryable or fatal transport error
fn classify(err: reqwest::Error, url: &str) -> SyncError {
    let endpoint = url.to_string();
    if err.is_timeout() {
        SyncError::Timeout { endpoint }
    } else if err.is_connect() {
        SyncError::Connect {
            endpoint,
            message: err.to_string(),
        }
    } else {
        SyncError::Transport {
            endpoint,
            message: err.to_string(),
        }
    }
}

async fn ensure_success(resp: reqwest::Response, url: &str) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    Err(unexpected(resp, url).await)
}

async fn unexpected(resp: reqwest::Response, url: &str) -> SyncError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    SyncError::UnexpectedStatus {
        endpoint: url.to_string(),
        status,
        body,
    }
}

#[async_trait]
impl RemoteTransport for HttpTransport {
    fn endpoint(&self) -> String {
        self.base_url.clone()
    }

    /// GET /refs
    async fn list_refs(&self) -> Result<RemoteRefs> {
        let text = self.text(&self.url("/refs")).await?;
        RemoteRefs::parse(&text)
    }

    /// GET /objects
    async fn list_objects(&self) -> Result<HashSet<ObjectId>> {
        let text = self.text(&self.url("/objects")).await?;
        protocol::parse_object_list(&text)
    }

    /// HEAD /objects/{id}
    async fn has_object(&self, id: &ObjectId) -> Result<bool> {
        let url = self.url(&format!("/objects/{}", id));
        let resp = self.send(self.http.head(&url), &url).await?;
        match resp.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(unexpected(resp, &url).await),
        }
    }

    /// GET /objects/{id}
    async fn get_object(&self, id: &ObjectId) -> Result<Bytes> {
        let url = self.url(&format!("/objects/{}", id));
        let resp = self.send(self.http.get(&url), &url).await?;
        match resp.status() {
            StatusCode::OK => resp.bytes().await.map_err(|e| classify(e, &url)),
            StatusCode::NOT_FOUND => Err(SyncError::RemoteObjectNotFound(*id)),
            _ => Err(unexpected(resp, &url).await),
        }
    }

    /// POST /objects/{id}
    async fn put_object(&self, id: &ObjectId, data: Bytes) -> Result<()> {
        let url = self.url(&format!("/objects/{}", id));
        let resp = self.send(self.http.post(&url).body(data), &url).await?;
        match resp.status() {
            StatusCode::OK => Ok(()),
            StatusCode::BAD_REQUEST | StatusCode::PAYLOAD_TOO_LARGE => {
                Err(SyncError::ObjectRejected {
                    id: *id,
                    reason: resp.text().await.unwrap_or_default(),
                })
            }
            _ => Err(unexpected(resp, &url).await),
        }
    }

    /// POST /update-ref
    async fn update_ref(&self, update: &RefUpdateRequest) -> Result<RefUpdate> {
        let url = self.url("/update-ref");
        let resp = self
            .send(self.http.post(&url).body(update.render()), &url)
            .await?;
        match resp.status() {
            StatusCode::OK => Ok(RefUpdate::Updated),
            StatusCode::CONFLICT => {
                let body = resp.text().await.map_err(|e| classify(e, &url))?;
                let current = protocol::parse_conflict(&body)?;
                Ok(RefUpdate::Conflict { current })
            }
            StatusCode::BAD_REQUEST => Err(SyncError::RefUpdateRejected {
                branch: update.branch.clone(),
                reason: resp.text().await.unwrap_or_default(),
            }),
            _ => Err(unexpected(resp, &url).await),
        }
    }
}
