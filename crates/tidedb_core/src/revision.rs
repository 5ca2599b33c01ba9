//! Revision stamps: content+lineage derived version tags.
//!
//! A revision stamp commits to a document's id, its payload, and the
//! stamp it supersedes. Stamps are what the optimistic single-document
//! write path compares, so deriving a stamp from a stale predecessor
//! makes the write fail instead of clobbering a concurrent update.

use crate::document::DocumentId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Number of trailing hash bytes reserved for origin tags.
///
/// See [`RevisionStamp::with_suffix`]. Content uniqueness rests on the
/// remaining 28 bytes.
pub const SUFFIX_LEN: usize = 4;

/// A content+lineage derived revision stamp.
///
/// `height` counts writes since creation; `hash` is a SHA-256 digest
/// over the id, the payload, and the previous stamp's hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RevisionStamp {
    /// Number of writes in this document's lineage, starting at 1.
    pub height: u64,
    /// Digest committing to id, payload, and lineage.
    pub hash: [u8; 32],
}

impl RevisionStamp {
    /// Derives the stamp for a write.
    ///
    /// With no `previous` this produces the initial stamp (height 1).
    /// With a `previous` the result supersedes it (height + 1) and its
    /// hash commits to the previous hash, so replaying the same write
    /// against a different predecessor yields a different stamp.
    pub fn derive(id: &DocumentId, data: &[u8], previous: Option<&RevisionStamp>) -> Self {
        let height = previous.map(|p| p.height + 1).unwrap_or(1);

        let mut hasher = Sha256::new();
        hasher.update(height.to_le_bytes());
        hasher.update(id.as_str().as_bytes());
        hasher.update((data.len() as u64).to_le_bytes());
        hasher.update(data);
        if let Some(previous) = previous {
            hasher.update(previous.hash);
        }

        Self {
            height,
            hash: hasher.finalize().into(),
        }
    }

    /// Returns a copy of this stamp with the trailing bytes replaced
    /// by `tag`.
    ///
    /// Used by write paths that need to mark a revision's origin (for
    /// example, revisions written while applying a pulled batch) in a
    /// way later readers can detect without extra storage.
    #[must_use]
    pub fn with_suffix(mut self, tag: [u8; SUFFIX_LEN]) -> Self {
        let start = self.hash.len() - SUFFIX_LEN;
        self.hash[start..].copy_from_slice(&tag);
        self
    }

    /// Returns true if this stamp's trailing bytes equal `tag`.
    pub fn has_suffix(&self, tag: [u8; SUFFIX_LEN]) -> bool {
        let start = self.hash.len() - SUFFIX_LEN;
        self.hash[start..] == tag
    }
}

impl fmt::Display for RevisionStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-", self.height)?;
        for byte in &self.hash {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}
