//! Revision origin tracking.
//!
//! After a pull is applied locally, the written documents show up in
//! the change feed like any local edit. Pushing them back out would
//! echo them to the peer that sent them (and pull them in again, and
//! push them again). The origin tracker answers, for a document's
//! current revision, whether that revision was written by the
//! pull-apply path for a given link.

use crate::link::ReplicationLinkHash;
use sha2::{Digest, Sha256};
use tidedb_core::{Document, RevisionStamp, SUFFIX_LEN};

/// Reports whether a document's current revision came from a pull.
///
/// Must be consistent: as long as the document's current revision is
/// the one a pull wrote, every query about that revision answers
/// `true`; the next local mutation flips it back.
pub trait RevisionOriginTracker: Send + Sync {
    /// Returns true if `document`'s current revision was written while
    /// applying a pull over `link`.
    fn was_last_write_from_pull(&self, link: &ReplicationLinkHash, document: &Document) -> bool;
}

/// Origin tracking via a per-link marker embedded in revision stamps.
///
/// The pull-apply path stamps revisions it writes with a tag derived
/// from the link hash ([`LinkRevisionMarker::pulled_revision`]); the
/// tracker side just checks for that tag. No extra storage is needed
/// and the marker disappears naturally on the next local write, which
/// derives a fresh stamp.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkRevisionMarker;

impl LinkRevisionMarker {
    /// Creates the marker.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Derives the marker tag for a link.
    fn tag(link: &ReplicationLinkHash) -> [u8; SUFFIX_LEN] {
        let mut hasher = Sha256::new();
        hasher.update(b"pull-origin:");
        hasher.update(link.as_str().as_bytes());
        let digest = hasher.finalize();
        let mut tag = [0u8; SUFFIX_LEN];
        tag.copy_from_slice(&digest[..SUFFIX_LEN]);
        tag
    }

    /// Marks a revision stamp as written by the pull-apply path.
    ///
    /// The pull-apply path calls this on the stamp it is about to
    /// store for a pulled document.
    #[must_use]
    pub fn pulled_revision(link: &ReplicationLinkHash, rev: RevisionStamp) -> RevisionStamp {
        rev.with_suffix(Self::tag(link))
    }
}

impl RevisionOriginTracker for LinkRevisionMarker {
    fn was_last_write_from_pull(&self, link: &ReplicationLinkHash, document: &Document) -> bool {
        document.rev.has_suffix(Self::tag(link))
    }
}

/// A closure-backed origin tracker.
///
/// Useful in tests and in orchestrators that track origin out of band.
pub struct FnOriginTracker<F>(F);

impl<F> FnOriginTracker<F>
where
    F: Fn(&ReplicationLinkHash, &Document) -> bool + Send + Sync,
{
    /// Wraps a predicate as an origin tracker.
    pub fn new(predicate: F) -> Self {
        Self(predicate)
    }
}

impl<F> RevisionOriginTracker for FnOriginTracker<F>
where
    F: Fn(&ReplicationLinkHash, &Document) -> bool + Send + Sync,
{
    fn was_last_write_from_pull(&self, link: &ReplicationLinkHash, document: &Document) -> bool {
        (self.0)(link, document)
    }
}
