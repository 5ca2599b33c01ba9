//! Document model for TideDB.

use crate::revision::RevisionStamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// Primary key of a document.
///
/// Document ids are opaque strings. Internal bookkeeping documents use
/// ids produced by [`crate::internal_document_id`], which live in a
/// reserved namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Creates a document id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A stored document: payload bytes plus versioning metadata.
///
/// `data` holds the CBOR-encoded payload. Logical deletion keeps the
/// document addressable (`deleted = true`) so deletions remain
/// replicable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Primary key.
    pub id: DocumentId,
    /// CBOR payload bytes.
    pub data: Vec<u8>,
    /// Content+lineage derived revision stamp.
    pub rev: RevisionStamp,
    /// Whether the document is logically deleted.
    pub deleted: bool,
    /// Wall-clock time of the last write, in milliseconds.
    pub last_write_time: u64,
}

impl Document {
    /// Creates a new document with a freshly derived initial revision.
    pub fn new(id: impl Into<DocumentId>, data: Vec<u8>) -> Self {
        let id = id.into();
        let rev = RevisionStamp::derive(&id, &data, None);
        Self {
            id,
            data,
            rev,
            deleted: false,
            last_write_time: now_millis(),
        }
    }

    /// Returns a successor of this document with new payload bytes.
    ///
    /// The revision stamp is derived from this document's stamp, so the
    /// result is suitable as the `document` half of an optimistic
    /// update against `self` as `previous`.
    pub fn with_data(&self, data: Vec<u8>) -> Self {
        let rev = RevisionStamp::derive(&self.id, &data, Some(&self.rev));
        Self {
            id: self.id.clone(),
            data,
            rev,
            deleted: self.deleted,
            last_write_time: now_millis(),
        }
    }

    /// Returns a logically deleted successor of this document.
    pub fn as_deleted(&self) -> Self {
        let mut doc = self.with_data(self.data.clone());
        doc.deleted = true;
        doc
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
