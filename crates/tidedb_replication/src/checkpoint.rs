//! Durable replication checkpoints.
//!
//! One checkpoint record exists per (link, direction) pair, stored as
//! an internal document in the same store as user data but under the
//! reserved replication context. Push progress is a sequence number
//! into the change feed; pull progress is a snapshot of the last
//! pulled document.
//!
//! Writes go through the store's optimistic single-document write
//! path: read the current record, derive the successor revision from
//! it, write conditioned on it still being current. A raced write
//! surfaces as [`ReplicationError::CheckpointConflict`] and is never
//! retried here.

use crate::error::{ReplicationError, ReplicationResult};
use crate::link::ReplicationLinkHash;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tidedb_core::{
    internal_document_id, CoreError, Document, DocumentId, DocumentStore, SingleWrite,
};
use tracing::debug;

/// Reserved context tag for replication bookkeeping documents.
///
/// All checkpoint records live under this namespace, so user document
/// ids can never collide with checkpoint keys.
pub const REPLICATION_CONTEXT: &str = "replication-primitives";

/// Direction of replication progress a checkpoint tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckpointDirection {
    /// Local changes sent to the remote peer.
    Push,
    /// Remote changes applied locally.
    Pull,
}

impl CheckpointDirection {
    /// Returns the key tag for this direction.
    fn key_tag(self) -> &'static str {
        match self {
            CheckpointDirection::Push => "replication-checkpoint-push",
            CheckpointDirection::Pull => "replication-checkpoint-pull",
        }
    }

    /// Derives the checkpoint record key for a link.
    pub fn record_key(self, link: &ReplicationLinkHash) -> String {
        format!("{}-{}", self.key_tag(), link)
    }

    /// Derives the internal document id of the checkpoint record.
    pub fn record_id(self, link: &ReplicationLinkHash) -> DocumentId {
        internal_document_id(REPLICATION_CONTEXT, &self.record_key(link))
    }
}

/// Payload of a push checkpoint record.
#[derive(Debug, Serialize, Deserialize)]
struct PushCheckpointData {
    last_push_sequence: u64,
}

/// Payload of a pull checkpoint record.
#[derive(Debug, Serialize, Deserialize)]
struct PullCheckpointData {
    last_pulled_document: Option<Document>,
}

/// Persists replication progress per (link, direction) pair.
///
/// Thin direction-specific accessors hide the value-shape difference
/// (sequence number vs. document snapshot) and the key derivation from
/// the orchestrator.
pub struct CheckpointStore<S: DocumentStore> {
    store: Arc<S>,
}

impl<S: DocumentStore> CheckpointStore<S> {
    /// Creates a checkpoint store on top of a document store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Returns the last acknowledged push sequence for a link.
    ///
    /// Defaults to 0 when the link has never pushed.
    pub fn last_push_sequence(&self, link: &ReplicationLinkHash) -> ReplicationResult<u64> {
        let record = self.read_record(CheckpointDirection::Push.record_id(link))?;
        match record {
            None => Ok(0),
            Some(record) => {
                let data: PushCheckpointData = decode(&record.data)?;
                Ok(data.last_push_sequence)
            }
        }
    }

    /// Persists the push sequence after a confirmed successful push.
    pub fn set_last_push_sequence(
        &self,
        link: &ReplicationLinkHash,
        sequence: u64,
    ) -> ReplicationResult<()> {
        debug!(link = %link, sequence, "persisting push checkpoint");
        self.write_record(
            CheckpointDirection::Push,
            link,
            encode(&PushCheckpointData {
                last_push_sequence: sequence,
            })?,
        )
    }

    /// Returns the snapshot of the last pulled document for a link.
    ///
    /// Defaults to `None` when the link has never pulled.
    pub fn last_pulled_document(
        &self,
        link: &ReplicationLinkHash,
    ) -> ReplicationResult<Option<Document>> {
        let record = self.read_record(CheckpointDirection::Pull.record_id(link))?;
        match record {
            None => Ok(None),
            Some(record) => {
                let data: PullCheckpointData = decode(&record.data)?;
                Ok(data.last_pulled_document)
            }
        }
    }

    /// Persists the last pulled document after a pull batch was
    /// applied.
    pub fn set_last_pulled_document(
        &self,
        link: &ReplicationLinkHash,
        document: Document,
    ) -> ReplicationResult<()> {
        debug!(link = %link, pulled = %document.id, "persisting pull checkpoint");
        self.write_record(
            CheckpointDirection::Pull,
            link,
            encode(&PullCheckpointData {
                last_pulled_document: Some(document),
            })?,
        )
    }

    fn read_record(&self, id: DocumentId) -> ReplicationResult<Option<Document>> {
        Ok(self.store.get_single_document(&id)?)
    }

    /// Shared write path for both directions.
    ///
    /// Absent record: insert fresh with an initial derived revision.
    /// Present record: clone, replace payload and write time, derive
    /// the successor revision, write conditioned on the previous
    /// record still being stored.
    fn write_record(
        &self,
        direction: CheckpointDirection,
        link: &ReplicationLinkHash,
        data: Vec<u8>,
    ) -> ReplicationResult<()> {
        let id = direction.record_id(link);
        let write = match self.store.get_single_document(&id)? {
            None => SingleWrite::insert(Document::new(id.clone(), data)),
            Some(previous) => {
                // with_data derives the successor revision and
                // refreshes the write time
                let record = previous.with_data(data);
                SingleWrite::update(previous, record)
            }
        };

        match self.store.write_single(write) {
            Ok(_) => Ok(()),
            Err(CoreError::WriteConflict { .. }) => Err(ReplicationError::CheckpointConflict {
                key: direction.record_key(link),
            }),
            Err(err) => Err(err.into()),
        }
    }
}

fn encode<T: Serialize>(value: &T) -> ReplicationResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes)
        .map_err(|err| ReplicationError::Codec(err.to_string()))?;
    Ok(bytes)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> ReplicationResult<T> {
    ciborium::de::from_reader(bytes).map_err(|err| ReplicationError::Codec(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidedb_core::MemoryDocumentStore;

    fn checkpoints() -> CheckpointStore<MemoryDocumentStore> {
        CheckpointStore::new(Arc::new(MemoryDocumentStore::new()))
    }

    fn link() -> ReplicationLinkHash {
        ReplicationLinkHash::new("abc123")
    }

    #[test]
    fn push_defaults_to_zero() {
        let store = checkpoints();
        assert_eq!(store.last_push_sequence(&link()).unwrap(), 0);
        // Idempotent across repeated reads
        assert_eq!(store.last_push_sequence(&link()).unwrap(), 0);
    }

    #[test]
    fn pull_defaults_to_none() {
        let store = checkpoints();
        assert!(store.last_pulled_document(&link()).unwrap().is_none());
        assert!(store.last_pulled_document(&link()).unwrap().is_none());
    }

    #[test]
    fn push_round_trip() {
        let store = checkpoints();
        store.set_last_push_sequence(&link(), 42).unwrap();
        assert_eq!(store.last_push_sequence(&link()).unwrap(), 42);
    }

    #[test]
    fn pull_round_trip() {
        let store = checkpoints();
        let snapshot = Document::new("remote-doc", vec![1, 2, 3]);
        store
            .set_last_pulled_document(&link(), snapshot.clone())
            .unwrap();

        let read = store.last_pulled_document(&link()).unwrap().unwrap();
        assert_eq!(read, snapshot);
    }

    #[test]
    fn sequential_sets_each_succeed() {
        let store = checkpoints();
        store.set_last_push_sequence(&link(), 1).unwrap();
        store.set_last_push_sequence(&link(), 2).unwrap();
        store.set_last_push_sequence(&link(), 3).unwrap();
        assert_eq!(store.last_push_sequence(&link()).unwrap(), 3);
    }

    #[test]
    fn directions_never_collide() {
        let store = checkpoints();
        store.set_last_push_sequence(&link(), 9).unwrap();
        store
            .set_last_pulled_document(&link(), Document::new("r", vec![]))
            .unwrap();

        assert_eq!(store.last_push_sequence(&link()).unwrap(), 9);
        assert!(store.last_pulled_document(&link()).unwrap().is_some());

        let push_id = CheckpointDirection::Push.record_id(&link());
        let pull_id = CheckpointDirection::Pull.record_id(&link());
        assert_ne!(push_id, pull_id);
    }

    #[test]
    fn records_live_in_internal_namespace() {
        let id = CheckpointDirection::Push.record_id(&link());
        assert!(id
            .as_str()
            .starts_with("replication-primitives|replication-checkpoint-push-"));
    }

    #[test]
    fn links_are_isolated() {
        let store = checkpoints();
        let other = ReplicationLinkHash::new("other");
        store.set_last_push_sequence(&link(), 5).unwrap();

        assert_eq!(store.last_push_sequence(&other).unwrap(), 0);
    }

    #[test]
    fn record_revision_advances_per_write() {
        let store = checkpoints();
        store.set_last_push_sequence(&link(), 1).unwrap();
        store.set_last_push_sequence(&link(), 2).unwrap();

        let id = CheckpointDirection::Push.record_id(&link());
        let record = store.store.get_single_document(&id).unwrap().unwrap();
        assert_eq!(record.rev.height, 2);
    }
}
