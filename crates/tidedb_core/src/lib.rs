//! # TideDB Core
//!
//! Document model, revision stamps, and storage interfaces for TideDB.
//!
//! This crate provides:
//! - `Document` and `DocumentId` for the document model
//! - `RevisionStamp` for content+lineage derived version tags
//! - `DocumentStore` for single-document reads and optimistically
//!   concurrent single-document writes
//! - `ChangeFeedSource` for paged access to the engine's ordered
//!   change log
//! - In-memory implementations of both interfaces
//!
//! ## Key Invariants
//!
//! - A write supplying a stale previous revision is rejected, never
//!   silently overwritten
//! - Revision stamps are deterministic functions of id, payload, and
//!   the previous stamp
//! - Internal bookkeeping documents live in a reserved namespace that
//!   cannot collide with user document ids

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod document;
mod error;
mod feed;
mod revision;
mod store;

pub use document::{now_millis, Document, DocumentId};
pub use error::{CoreError, CoreResult};
pub use feed::{ChangeFeedPage, ChangeFeedSource, ChangedDocumentRef, MemoryChangeFeed};
pub use revision::{RevisionStamp, SUFFIX_LEN};
pub use store::{internal_document_id, DocumentStore, MemoryDocumentStore, SingleWrite};
