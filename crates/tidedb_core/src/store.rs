//! Single-document store with optimistic concurrency.

use crate::document::{Document, DocumentId};
use crate::error::{CoreError, CoreResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::trace;

/// Separator between the internal context tag and the key.
///
/// User document ids are free-form but internal ids always start with
/// a context tag followed by this separator, so the two namespaces
/// cannot collide as long as callers never mint user ids through
/// [`internal_document_id`].
const INTERNAL_ID_SEPARATOR: char = '|';

/// Derives the primary key of an internal bookkeeping document.
///
/// Internal documents (replication checkpoints and similar) are stored
/// in the same document store as user data but under a reserved
/// `context` namespace.
pub fn internal_document_id(context: &str, key: &str) -> DocumentId {
    DocumentId::new(format!("{context}{INTERNAL_ID_SEPARATOR}{key}"))
}

/// A single-document write request.
///
/// `previous` carries the caller's snapshot of the stored document.
/// For an insert it must be `None`; for an update it must match what
/// is currently stored, revision for revision.
#[derive(Debug, Clone)]
pub struct SingleWrite {
    /// The caller's snapshot of the currently stored document, if any.
    pub previous: Option<Document>,
    /// The document to store.
    pub document: Document,
}

impl SingleWrite {
    /// Creates an insert request (no previous document expected).
    pub fn insert(document: Document) -> Self {
        Self {
            previous: None,
            document,
        }
    }

    /// Creates an update request conditioned on `previous`.
    pub fn update(previous: Document, document: Document) -> Self {
        Self {
            previous: Some(previous),
            document,
        }
    }
}

/// A store of single documents addressed by primary key.
///
/// Writes are optimistically concurrent: each write carries the
/// caller's snapshot of the stored revision, and the store rejects the
/// write with [`CoreError::WriteConflict`] when that snapshot is
/// stale. Retry policy belongs to the caller.
pub trait DocumentStore: Send + Sync {
    /// Reads a document by primary key. Absent documents are `None`,
    /// not an error.
    fn get_single_document(&self, id: &DocumentId) -> CoreResult<Option<Document>>;

    /// Writes a single document, conditioned on `write.previous`.
    ///
    /// Returns the committed document on success.
    fn write_single(&self, write: SingleWrite) -> CoreResult<Document>;
}

/// An in-memory document store.
///
/// Suitable for unit tests, integration tests, and ephemeral
/// databases that don't need persistence. Thread-safe.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<DocumentId, Document>>,
}

impl MemoryDocumentStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored documents.
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// Returns true if the store holds no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn get_single_document(&self, id: &DocumentId) -> CoreResult<Option<Document>> {
        Ok(self.documents.read().get(id).cloned())
    }

    fn write_single(&self, write: SingleWrite) -> CoreResult<Document> {
        let mut documents = self.documents.write();
        let id = write.document.id.clone();

        let stored_rev = documents.get(&id).map(|doc| doc.rev);
        let expected_rev = write.previous.as_ref().map(|doc| doc.rev);
        if stored_rev != expected_rev {
            return Err(CoreError::WriteConflict { id });
        }

        trace!(id = %id, rev = %write.document.rev, "write_single committed");
        documents.insert(id, write.document.clone());
        Ok(write.document)
    }
}
