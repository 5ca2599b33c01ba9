//! # TideDB Replication
//!
//! Checkpoint bookkeeping and push-side change scanning for
//! bidirectional replication.
//!
//! This crate provides:
//! - `CheckpointStore` for durable per-link, per-direction progress
//!   markers (a sequence number for push, a document snapshot for pull)
//! - `changes_since_last_push` for producing bounded batches of
//!   locally-changed documents that still need to be pushed
//! - `RevisionOriginTracker` for keeping pull-applied revisions from
//!   echoing back out through push
//!
//! ## Architecture
//!
//! The orchestrator that moves batches over the wire is out of scope.
//! It calls [`changes_since_last_push`], pushes the returned batch,
//! and only on success commits the new push sequence through
//! [`CheckpointStore`]. Pull progress is committed the same way after
//! a pulled batch has been applied.
//!
//! ## Key Invariants
//!
//! - Checkpoint writes are optimistically concurrent; a raced write
//!   surfaces as a conflict, never a silent overwrite
//! - A scan never advances persisted state; only the caller commits
//!   progress (at-least-once push semantics across a crash)
//! - Pull-originated revisions are filtered out of push batches
//! - Cancellation is cooperative and is a normal result, not an error

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod checkpoint;
mod error;
mod link;
mod origin;
mod scan;

pub use checkpoint::{CheckpointDirection, CheckpointStore, REPLICATION_CONTEXT};
pub use error::{ReplicationError, ReplicationResult};
pub use link::ReplicationLinkHash;
pub use origin::{FnOriginTracker, LinkRevisionMarker, RevisionOriginTracker};
pub use scan::{changes_since_last_push, PushBatch, PushChange, DEFAULT_PUSH_BATCH_SIZE};
