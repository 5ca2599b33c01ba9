//! Change feed interfaces.
//!
//! The change feed is the engine's ordered log of document mutations,
//! queryable by sequence range. Consumers (the replication layer,
//! reactive queries) page through it with a resume sequence and fetch
//! current bodies separately in batched lookups.

use crate::document::{Document, DocumentId};
use crate::error::CoreResult;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// A changed-document listing from the feed: id and feed position.
///
/// The body is not part of the listing; it is fetched separately so a
/// page of mostly-irrelevant changes stays cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedDocumentRef {
    /// Primary key of the changed document.
    pub id: DocumentId,
    /// Position of the change in the feed.
    pub sequence: u64,
}

/// One page of the change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFeedPage {
    /// Changed documents in ascending sequence order.
    pub changed_documents: Vec<ChangedDocumentRef>,
    /// The feed's resume watermark for this page.
    ///
    /// This is where the next page starts, independent of how many of
    /// the page's entries a consumer ends up keeping. For an empty
    /// page it equals the requested since-sequence.
    pub last_sequence: u64,
}

impl ChangeFeedPage {
    /// Returns true if the page lists no changed documents.
    pub fn is_empty(&self) -> bool {
        self.changed_documents.is_empty()
    }
}

/// Paged access to the engine's change feed plus batched body lookup.
pub trait ChangeFeedSource: Send + Sync {
    /// Returns changed documents with sequences strictly after
    /// `since_sequence`, ascending, at most `limit` entries.
    fn changed_documents_after(
        &self,
        since_sequence: u64,
        limit: usize,
    ) -> CoreResult<ChangeFeedPage>;

    /// Fetches current bodies for `ids` in one batched lookup.
    ///
    /// Logically-deleted documents are included when `include_deleted`
    /// is set; ids with no stored body are absent from the result.
    fn find_documents_by_id(
        &self,
        ids: &[DocumentId],
        include_deleted: bool,
    ) -> CoreResult<HashMap<DocumentId, Document>>;
}

/// An in-memory change feed.
///
/// Keeps an ordered event log plus the current body of every document.
/// Suitable for tests and ephemeral databases; thread-safe.
#[derive(Debug)]
pub struct MemoryChangeFeed {
    log: RwLock<Vec<ChangedDocumentRef>>,
    bodies: RwLock<HashMap<DocumentId, Document>>,
    next_sequence: AtomicU64,
}

impl Default for MemoryChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryChangeFeed {
    /// Creates a new empty feed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            log: RwLock::new(Vec::new()),
            bodies: RwLock::new(HashMap::new()),
            next_sequence: AtomicU64::new(1),
        }
    }

    /// Records a committed write and returns its feed sequence.
    ///
    /// The same document may be committed repeatedly; every commit
    /// appends a feed entry, while only the latest body is retained.
    pub fn commit(&self, document: Document) -> u64 {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        self.log.write().push(ChangedDocumentRef {
            id: document.id.clone(),
            sequence,
        });
        self.bodies.write().insert(document.id.clone(), document);
        sequence
    }

    /// Returns the sequence of the most recent commit (0 if none).
    pub fn latest_sequence(&self) -> u64 {
        self.log.read().last().map(|entry| entry.sequence).unwrap_or(0)
    }

    /// Drops a stored body while keeping its feed entries.
    ///
    /// Useful for simulating feed/body desync in tests.
    pub fn evict_body(&self, id: &DocumentId) {
        self.bodies.write().remove(id);
    }
}

impl ChangeFeedSource for MemoryChangeFeed {
    fn changed_documents_after(
        &self,
        since_sequence: u64,
        limit: usize,
    ) -> CoreResult<ChangeFeedPage> {
        let log = self.log.read();
        let changed_documents: Vec<ChangedDocumentRef> = log
            .iter()
            .filter(|entry| entry.sequence > since_sequence)
            .take(limit)
            .cloned()
            .collect();
        let last_sequence = changed_documents
            .last()
            .map(|entry| entry.sequence)
            .unwrap_or(since_sequence);

        Ok(ChangeFeedPage {
            changed_documents,
            last_sequence,
        })
    }

    fn find_documents_by_id(
        &self,
        ids: &[DocumentId],
        include_deleted: bool,
    ) -> CoreResult<HashMap<DocumentId, Document>> {
        let bodies = self.bodies.read();
        Ok(ids
            .iter()
            .filter_map(|id| bodies.get(id))
            .filter(|doc| include_deleted || !doc.deleted)
            .map(|doc| (doc.id.clone(), doc.clone()))
            .collect())
    }
}
