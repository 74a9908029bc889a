//! The I/O primitives a remote must offer

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;

use mgit_core::{ObjectId, RefUpdate};

use crate::error::Result;
use crate::protocol::{RefUpdateRequest, RemoteRefs};

/// A remote repository reachable over some transport.
///
/// Push, pull and clone are written once against this trait; transports
/// only move bytes and refs.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Human-readable location, used in logs
    fn endpoint(&self) -> String;

    /// HEAD target and all branch heads
    async fn list_refs(&self) -> Result<RemoteRefs>;

    /// Every object id the remote stores
    async fn list_objects(&self) -> Result<HashSet<ObjectId>>;

    async fn has_object(&self, id: &ObjectId) -> Result<bool>;

    /// Raw object bytes; [`SyncError::RemoteObjectNotFound`] when absent
    ///
    /// [`SyncError::RemoteObjectNotFound`]: crate::SyncError::RemoteObjectNotFound
    async fn get_object(&self, id: &ObjectId) -> Result<Bytes>;

    /// Upload raw bytes; the remote verifies they hash to `id`
    async fn put_object(&self, id: &ObjectId, data: Bytes) -> Result<()>;

    /// Compare-and-swap a branch head
    async fn update_ref(&self, update: &RefUpdateRequest) -> Result<RefUpdate>;
}
