//! Error types for TideDB core.

use crate::document::DocumentId;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in TideDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// I/O error from the underlying storage.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A single-document write supplied a stale previous revision.
    ///
    /// The stored document was modified by another writer since the
    /// caller read it. The store never overwrites in this case.
    #[error("write conflict on document {id}")]
    WriteConflict {
        /// The document the write targeted.
        id: DocumentId,
    },

    /// Payload encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CoreError::WriteConflict {
            id: DocumentId::new("doc-1"),
        };
        assert_eq!(err.to_string(), "write conflict on document doc-1");

        let err = CoreError::Codec("truncated input".into());
        assert!(err.to_string().contains("truncated input"));
    }

    #[test]
    fn io_conversion() {
        let io_err = io::Error::new(io::ErrorKind::Other, "disk gone");
        let err: CoreError = io_err.into();
        assert!(matches!(err, CoreError::Io(_)));
    }
}
