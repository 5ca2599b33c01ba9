//! Error types for the replication layer.

use thiserror::Error;
use tidedb_core::{CoreError, DocumentId};

/// Result type for replication operations.
pub type ReplicationResult<T> = Result<T, ReplicationError>;

/// Errors that can occur in replication bookkeeping and scanning.
#[derive(Debug, Error)]
pub enum ReplicationError {
    /// A checkpoint write raced a concurrent writer.
    ///
    /// The record changed between read and write. This layer does not
    /// retry; the caller must re-read and re-apply.
    #[error("checkpoint write conflict on {key}")]
    CheckpointConflict {
        /// Derived key of the checkpoint record.
        key: String,
    },

    /// The change feed listed a document the body lookup cannot
    /// produce.
    ///
    /// This indicates broken feed/body consistency in the storage
    /// engine, not a transient condition; the scan aborts and must not
    /// be retried.
    #[error("change feed listed {id} but no body could be fetched")]
    FeedDesync {
        /// The document id the feed reported.
        id: DocumentId,
    },

    /// Storage engine error.
    #[error("storage error: {0}")]
    Core(#[from] CoreError),

    /// Checkpoint payload encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(String),
}

impl ReplicationError {
    /// Returns true if this is a checkpoint write conflict.
    ///
    /// Callers that want retry-on-conflict branch on this and
    /// re-read before re-applying.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ReplicationError::CheckpointConflict { .. })
    }
}
