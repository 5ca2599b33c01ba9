//! Push-side change scanning.
//!
//! Produces, for one replication link, the bounded batch of
//! locally-changed documents that still need to be pushed. The scan
//! pages through the change feed starting just after the last
//! acknowledged push sequence, filters out pull-originated revisions,
//! and deduplicates by document id.
//!
//! Right after a pull the feed is dominated by the pull's own writes,
//! so a single page can turn out entirely unpushable. The scan keeps
//! paginating until it fills its quota or reaches the feed's end,
//! instead of handing the caller a misleading empty batch.
//!
//! Nothing here persists progress: the returned watermark is only
//! committed by the caller, after the remote peer has confirmed the
//! push.

use crate::checkpoint::CheckpointStore;
use crate::error::{ReplicationError, ReplicationResult};
use crate::link::ReplicationLinkHash;
use crate::origin::RevisionOriginTracker;
use std::collections::HashMap;
use tidedb_core::{ChangeFeedPage, ChangeFeedSource, Document, DocumentId, DocumentStore};
use tracing::{debug, trace};

/// Default number of pushable documents per batch.
pub const DEFAULT_PUSH_BATCH_SIZE: usize = 10;

/// One accepted entry of a push batch.
#[derive(Debug, Clone, PartialEq)]
pub struct PushChange {
    /// Current body of the document, fetched during the scan.
    pub document: Document,
    /// Feed sequence at which the document was first seen this scan.
    pub sequence: u64,
}

/// Result of one push scan.
#[derive(Debug, Clone, Default)]
pub struct PushBatch {
    /// Accepted entries by document id.
    pub changes: HashMap<DocumentId, PushChange>,
    /// Accepted ids in acceptance order.
    pub accepted_ids: Vec<DocumentId>,
    /// How far the feed was scanned.
    ///
    /// May be further than the last accepted entry's sequence; commit
    /// this (not the entries' sequences) after a successful push so
    /// progress stays monotonic even when everything was filtered out.
    pub last_sequence: u64,
    /// True if the scan stopped because the caller requested it.
    ///
    /// The batch still carries everything accumulated from completed
    /// pages.
    pub interrupted: bool,
}

impl PushBatch {
    /// Number of accepted entries.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Returns true if no entries were accepted.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Returns the accepted entry for a document id, if any.
    pub fn get(&self, id: &DocumentId) -> Option<&PushChange> {
        self.changes.get(id)
    }

    /// Returns true if the batch accepted this document id.
    pub fn contains(&self, id: &DocumentId) -> bool {
        self.changes.contains_key(id)
    }
}

/// Loop-control state of one scan invocation.
struct ScanState {
    /// Keep requesting pages to fill the quota.
    retry: bool,
    /// The caller asked to stop; abort cooperatively.
    interrupted: bool,
}

/// A cursor over the change feed for one scan.
///
/// The resume point only ever advances, and each page is requested
/// exactly once; nothing is persisted.
struct FeedCursor<'a, F: ChangeFeedSource + ?Sized> {
    feed: &'a F,
    resume_from: u64,
    batch_size: usize,
}

impl<'a, F: ChangeFeedSource + ?Sized> FeedCursor<'a, F> {
    fn new(feed: &'a F, resume_from: u64, batch_size: usize) -> Self {
        Self {
            feed,
            resume_from,
            batch_size,
        }
    }

    /// Requests the page strictly after the current resume point.
    fn next_page(&self) -> ReplicationResult<ChangeFeedPage> {
        Ok(self
            .feed
            .changed_documents_after(self.resume_from, self.batch_size)?)
    }

    /// Advances the resume point to a page's watermark.
    fn advance_to(&mut self, sequence: u64) {
        self.resume_from = sequence;
    }
}

/// Collects the batch of changed documents not yet pushed over `link`.
///
/// Reads the push checkpoint once and scans the feed from there; only
/// a local working copy of the resume point advances. `is_stopped` is
/// polled twice per page (before the page fetch and before the body
/// fetch); when it reports true the scan returns normally with
/// [`PushBatch::interrupted`] set. `batch_size` is clamped to at
/// least 1.
///
/// Dedup rule when one id appears at several sequences: the first
/// sequence seen wins for bookkeeping, while the body is the current
/// one (body lookups always return the latest body).
pub fn changes_since_last_push<S, F, R>(
    checkpoints: &CheckpointStore<S>,
    feed: &F,
    origin: &R,
    link: &ReplicationLinkHash,
    is_stopped: &dyn Fn() -> bool,
    batch_size: usize,
) -> ReplicationResult<PushBatch>
where
    S: DocumentStore,
    F: ChangeFeedSource + ?Sized,
    R: RevisionOriginTracker + ?Sized,
{
    let batch_size = batch_size.max(1);
    let last_push_sequence = checkpoints.last_push_sequence(link)?;
    debug!(link = %link, since = last_push_sequence, batch_size, "scanning changes for push");

    let mut cursor = FeedCursor::new(feed, last_push_sequence, batch_size);
    let mut batch = PushBatch {
        last_sequence: last_push_sequence,
        ..PushBatch::default()
    };
    let mut state = ScanState {
        retry: true,
        interrupted: false,
    };

    while state.retry && !state.interrupted {
        if is_stopped() {
            state.interrupted = true;
            break;
        }

        let page = cursor.next_page()?;
        // The watermark counts even if nothing in the page is
        // pushable; the caller needs it to advance monotonically.
        batch.last_sequence = page.last_sequence;

        if page.is_empty() {
            // Feed exhausted: terminal success.
            state.retry = false;
            continue;
        }

        // Second cancellation checkpoint, before the expensive part.
        if is_stopped() {
            state.interrupted = true;
            continue;
        }

        let ids: Vec<DocumentId> = page
            .changed_documents
            .iter()
            .map(|entry| entry.id.clone())
            .collect();
        // Deletions must be pushable too.
        let bodies = feed.find_documents_by_id(&ids, true)?;

        for entry in &page.changed_documents {
            // First seen in sequence order wins.
            if batch.contains(&entry.id) {
                continue;
            }

            let Some(document) = bodies.get(&entry.id) else {
                // The feed listed an id the engine cannot produce a
                // body for. Not transient; abort, no partial commit.
                return Err(ReplicationError::FeedDesync {
                    id: entry.id.clone(),
                });
            };

            if origin.was_last_write_from_pull(link, document) {
                // Came in via pull; pushing it back would echo.
                continue;
            }

            batch.accepted_ids.push(entry.id.clone());
            batch.changes.insert(
                entry.id.clone(),
                PushChange {
                    document: document.clone(),
                    sequence: entry.sequence,
                },
            );
        }

        if batch.len() < batch_size && page.changed_documents.len() == batch_size {
            // Quota not met and the feed is not exhausted: keep going.
            cursor.advance_to(page.last_sequence);
            state.retry = true;
        } else {
            state.retry = false;
        }
        trace!(
            accepted = batch.len(),
            last_sequence = batch.last_sequence,
            retry = state.retry,
            "scanned change feed page"
        );
    }

    batch.interrupted = state.interrupted;
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::origin::FnOriginTracker;
    use std::sync::Arc;
    use tidedb_core::{MemoryChangeFeed, MemoryDocumentStore};

    fn setup() -> (
        CheckpointStore<MemoryDocumentStore>,
        MemoryChangeFeed,
        ReplicationLinkHash,
    ) {
        (
            CheckpointStore::new(Arc::new(MemoryDocumentStore::new())),
            MemoryChangeFeed::new(),
            ReplicationLinkHash::new("link-1"),
        )
    }

    fn never_pulled() -> FnOriginTracker<impl Fn(&ReplicationLinkHash, &Document) -> bool> {
        FnOriginTracker::new(|_, _| false)
    }

    fn not_stopped() -> Box<dyn Fn() -> bool> {
        Box::new(|| false)
    }

    #[test]
    fn empty_feed_returns_empty_batch() {
        let (checkpoints, feed, link) = setup();
        let batch = changes_since_last_push(
            &checkpoints,
            &feed,
            &never_pulled(),
            &link,
            &*not_stopped(),
            10,
        )
        .unwrap();

        assert!(batch.is_empty());
        assert!(!batch.interrupted);
        assert_eq!(batch.last_sequence, 0);
    }

    #[test]
    fn accepts_all_local_changes() {
        let (checkpoints, feed, link) = setup();
        for i in 0..3u8 {
            feed.commit(Document::new(format!("d{i}"), vec![i]));
        }

        let batch = changes_since_last_push(
            &checkpoints,
            &feed,
            &never_pulled(),
            &link,
            &*not_stopped(),
            10,
        )
        .unwrap();

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.last_sequence, 3);
        assert_eq!(
            batch.accepted_ids,
            vec![
                DocumentId::new("d0"),
                DocumentId::new("d1"),
                DocumentId::new("d2")
            ]
        );
    }

    #[test]
    fn pull_originated_revisions_are_filtered() {
        let (checkpoints, feed, link) = setup();
        feed.commit(Document::new("local", vec![1]));
        feed.commit(Document::new("pulled-1", vec![2]));
        feed.commit(Document::new("pulled-2", vec![3]));

        let tracker =
            FnOriginTracker::new(|_, doc: &Document| doc.id.as_str().starts_with("pulled"));
        let batch =
            changes_since_last_push(&checkpoints, &feed, &tracker, &link, &*not_stopped(), 3)
                .unwrap();

        // N=3, K=2 pull-originated: exactly N-K accepted, watermark
        // at the feed's tail.
        assert_eq!(batch.len(), 1);
        assert!(batch.contains(&DocumentId::new("local")));
        assert_eq!(batch.last_sequence, 3);
    }

    #[test]
    fn dedup_keeps_first_sequence() {
        let (checkpoints, feed, link) = setup();
        let doc = Document::new("a", vec![1]);
        feed.commit(doc.clone()); // seq 1
        feed.commit(doc.with_data(vec![2])); // seq 2

        let batch = changes_since_last_push(
            &checkpoints,
            &feed,
            &never_pulled(),
            &link,
            &*not_stopped(),
            10,
        )
        .unwrap();

        assert_eq!(batch.len(), 1);
        let entry = batch.get(&DocumentId::new("a")).unwrap();
        assert_eq!(entry.sequence, 1);
    }

    #[test]
    fn dedup_carries_latest_body() {
        let (checkpoints, feed, link) = setup();
        let doc = Document::new("a", vec![1]);
        feed.commit(doc.clone());
        feed.commit(doc.with_data(vec![2]));

        let batch = changes_since_last_push(
            &checkpoints,
            &feed,
            &never_pulled(),
            &link,
            &*not_stopped(),
            10,
        )
        .unwrap();

        let entry = batch.get(&DocumentId::new("a")).unwrap();
        assert_eq!(entry.document.data, vec![2]);
    }

    #[test]
    fn missing_body_is_a_fatal_desync() {
        let (checkpoints, feed, link) = setup();
        feed.commit(Document::new("gone", vec![1]));
        feed.evict_body(&DocumentId::new("gone"));

        let err = changes_since_last_push(
            &checkpoints,
            &feed,
            &never_pulled(),
            &link,
            &*not_stopped(),
            10,
        )
        .unwrap_err();

        assert!(matches!(err, ReplicationError::FeedDesync { .. }));
    }

    #[test]
    fn deleted_documents_are_pushable() {
        let (checkpoints, feed, link) = setup();
        let doc = Document::new("a", vec![1]);
        feed.commit(doc.clone());
        feed.commit(doc.as_deleted());

        let batch = changes_since_last_push(
            &checkpoints,
            &feed,
            &never_pulled(),
            &link,
            &*not_stopped(),
            10,
        )
        .unwrap();

        assert_eq!(batch.len(), 1);
        assert!(batch.get(&DocumentId::new("a")).unwrap().document.deleted);
    }

    #[test]
    fn batch_size_is_clamped_to_one() {
        let (checkpoints, feed, link) = setup();
        feed.commit(Document::new("a", vec![1]));

        let batch = changes_since_last_push(
            &checkpoints,
            &feed,
            &never_pulled(),
            &link,
            &*not_stopped(),
            0,
        )
        .unwrap();

        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn scan_starts_after_checkpoint() {
        let (checkpoints, feed, link) = setup();
        feed.commit(Document::new("old", vec![1]));
        feed.commit(Document::new("new", vec![2]));
        checkpoints.set_last_push_sequence(&link, 1).unwrap();

        let batch = changes_since_last_push(
            &checkpoints,
            &feed,
            &never_pulled(),
            &link,
            &*not_stopped(),
            10,
        )
        .unwrap();

        assert_eq!(batch.len(), 1);
        assert!(batch.contains(&DocumentId::new("new")));
    }

    #[test]
    fn stopped_before_first_page_is_interrupted() {
        let (checkpoints, feed, link) = setup();
        feed.commit(Document::new("a", vec![1]));

        let batch =
            changes_since_last_push(&checkpoints, &feed, &never_pulled(), &link, &|| true, 10)
                .unwrap();

        assert!(batch.interrupted);
        assert!(batch.is_empty());
        assert_eq!(batch.last_sequence, 0);
    }
}
