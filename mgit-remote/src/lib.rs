//! mgit remote synchronization
//!
//! Moves commits between repositories:
//! - `RemoteTransport` capability with filesystem and HTTP implementations
//! - Push / pull / clone with fast-forward checks and compare-and-swap ref updates
//! - HTTP remote server exposing the object and ref endpoints

pub mod error;
pub mod fs;
pub mod http;
pub mod protocol;
pub mod receive;
pub mod server;
pub mod sync;
pub mod transport;

pub use error::{Result, SyncError};
pub use fs::FsTransport;
pub use http::HttpTransport;
pub use protocol::{RefUpdateRequest, RemoteRefs};
pub use server::{RemoteServer, ServerConfig};
pub use sync::{
    CloneOutcome, PullOutcome, PushOutcome, SyncProtocol, clone_filesystem, clone_repository,
};
pub use transport::RemoteTransport;
