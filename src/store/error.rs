//! Message store error types

use crate::store::types::MessageKey;
use thiserror::Error;

/// Errors that can occur in a message store
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The SQLite backend rejected a statement
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Point lookup found no message with this key
    #[error("Message not found: {0}")]
    NotFound(MessageKey),

    /// A stored row could not be decoded
    #[error("Corrupt row: {0}")]
    Corruption(String),

    /// The backend is not reachable (used by remote or test stores)
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::NotFound(MessageKey::new(2, 9));
        assert_eq!(err.to_string(), "Message not found: 2.9");

        let err = StoreError::Unavailable("connection reset".to_string());
        assert_eq!(err.to_string(), "Store unavailable: connection reset");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let store_err: StoreError = io_err.into();
        assert!(matches!(store_err, StoreError::Io(_)));
    }
}
