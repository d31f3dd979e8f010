use crate::codec::Collection;
use crate::remote::ChangeOp;

/// Error returned by a `RemoteStore` implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("request rejected by store: {message}")]
    Rejected { message: String },
    #[error("store unreachable: {message}")]
    Unavailable { message: String },
    #[error("change feed for {collection} closed")]
    ChannelClosed { collection: Collection },
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A create/update/delete did not reach the store. Local state was rolled back.
    #[error("{operation} on {collection} failed: {message}")]
    WriteFailed {
        collection: Collection,
        operation: ChangeOp,
        message: String,
    },
    #[error("change feed for {collection} disconnected")]
    ChannelDisconnected { collection: Collection },
    #[error("{collection} record {id} not found")]
    NotFound { collection: Collection, id: String },
    #[error("board {id} is permanent and cannot be deleted")]
    ProtectedBoard { id: String },
    #[error("{actor} is not permitted to {action}")]
    NotPermitted { actor: String, action: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl CoreError {
    pub(crate) fn write_failed(collection: Collection, operation: ChangeOp, err: impl ToString) -> Self {
        Self::WriteFailed {
            collection,
            operation,
            message: err.to_string(),
        }
    }

    /// Recoverable conditions the caller may simply retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::WriteFailed { .. } | Self::ChannelDisconnected { .. })
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_failed_is_retryable() {
        let err = CoreError::write_failed(Collection::Tasks, ChangeOp::Insert, "timeout");
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "insert on tasks failed: timeout");
    }

    #[test]
    fn test_protected_board_is_not_retryable() {
        let err = CoreError::ProtectedBoard { id: "mech".to_string() };
        assert!(!err.is_retryable());
    }
}
