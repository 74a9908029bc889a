//! Errors raised while talking to a remote

use mgit_core::ObjectId;

/// Result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Failures of a push, pull or clone.
///
/// Expected outcomes (already up to date, not a fast-forward, ...) are
/// reported through the outcome enums instead.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] mgit_core::Error),

    #[error("Remote does not have object {0}")]
    RemoteObjectNotFound(ObjectId),

    #[error("Object {expected} arrived with hash {actual}")]
    IntegrityMismatch { expected: ObjectId, actual: ObjectId },

    #[error("Remote rejected object {id}: {reason}")]
    ObjectRejected { id: ObjectId, reason: String },

    #[error("Remote rejected ref update of {branch}: {reason}")]
    RefUpdateRejected { branch: String, reason: String },

    #[error("Object {id} is {size} bytes, over the {limit} byte limit")]
    ObjectTooLarge { id: ObjectId, size: u64, limit: u64 },

    #[error("Timed out talking to {endpoint}")]
    Timeout { endpoint: String },

    #[error("Failed to connect to {endpoint}: {message}")]
    Connect { endpoint: String, message: String },

    #[error("Transport error for {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    #[error("{endpoint} answered {status}: {body}")]
    UnexpectedStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl SyncError {
    /// Timeouts and refused connections may succeed on a later attempt.
    /// Nothing here retries automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Timeout { .. } | SyncError::Connect { .. })
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        SyncError::Protocol(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let timeout = SyncError::Timeout {
            endpoint: "http://x/refs".into(),
        };
        let connect = SyncError::Connect {
            endpoint: "http://x/refs".into(),
            message: "refused".into(),
        };
        let status = SyncError::UnexpectedStatus {
            endpoint: "http://x/refs".into(),
            status: 500,
            body: String::new(),
        };
        assert!(timeout.is_retryable());
        assert!(connect.is_retryable());
        assert!(!status.is_retryable());
        assert!(!SyncError::protocol("bad").is_retryable());
    }

    #[test]
    fn test_store_error_converts() {
        let err: SyncError = mgit_core::Error::HeadMissing.into();
        assert!(matches!(err, SyncError::Store(mgit_core::Error::HeadMissing)));
    }
}
