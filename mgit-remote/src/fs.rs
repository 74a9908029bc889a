//! Remote repository on a local or mounted filesystem

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;
use std::path::Path;

use mgit_core::{ObjectId, RefUpdate, Repository};

use crate::error::{Result, SyncError};
use crate::protocol::{RefUpdateRequest, RemoteRefs};
use crate::receive::{self, ReceiveError};
use crate::transport::RemoteTransport;

/// Filesystem transport: the remote is another repository root
#[derive(Debug)]
pub struct FsTransport {
    remote: Repository,
}

impl FsTransport {
    /// Use the repository at `root`, initializing it first if needed
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let remote = Repository::init(root)?;
        Ok(Self { remote })
    }

    /// Use an existing repository at `root`
    pub fn attach(root: impl AsRef<Path>) -> Result<Self> {
        let remote = Repository::open(root)?;
        Ok(Self { remote })
    }

    pub fn repository(&self) -> &Repository {
        &self.remote
    }
}

#[async_trait]
impl RemoteTransport for FsTransport {
    fn endpoint(&self) -> String {
        self.remote.root().display().to_string()
    }

    async fn list_refs(&self) -> Result<RemoteRefs> {
        RemoteRefs::load(&self.remote)
    }

    async fn list_objects(&self) -> Result<HashSet<ObjectId>> {
        Ok(self.remote.objects().list()?.into_iter().collect())
    }

    async fn has_object(&self, id: &ObjectId) -> Result<bool> {
        Ok(self.remote.objects().contains(id))
    }

    async fn get_object(&self, id: &ObjectId) -> Result<Bytes> {
        match self.remote.objects().read(id) {
            Ok(data) => Ok(data),
            Err(e) if e.is_not_found() => Err(SyncError::RemoteObjectNotFound(*id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn put_object(&self, id: &ObjectId, data: Bytes) -> Result<()> {
        receive::receive_object(&self.remote, id, &data).map_err(|e| match e {
            ReceiveError::Store(e) => SyncError::Store(e),
            other => SyncError::ObjectRejected {
                id: *id,
                reason: other.to_string(),
            },
        })
    }

    async fn update_ref(&self, update: &RefUpdateRequest) -> Result<RefUpdate> {
        receive::receive_ref_update(&self.remote, update).map_err(|e| match e {
            ReceiveError::Store(e) => SyncError::Store(e),
            other => SyncError::RefUpdateRejected {
                branch: update.branch.clone(),
                reason: other.to_string(),
            },
        })
    }
}
