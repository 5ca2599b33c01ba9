//! Replication link identity.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Stable identifier of one replication link.
///
/// A link is one configured bidirectional sync relationship between a
/// local collection and a remote peer. Its hash stays the same across
/// restarts so checkpoints keep addressing the same records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplicationLinkHash(String);

impl ReplicationLinkHash {
    /// Wraps an already-derived link hash.
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Derives the stable hash of a link's configuration.
    ///
    /// Any canonical rendering of the configuration works as input;
    /// the same input always yields the same hash.
    pub fn of_config(config: &str) -> Self {
        let digest = Sha256::digest(config.as_bytes());
        let mut hex = String::with_capacity(32);
        for byte in &digest[..16] {
            hex.push_str(&format!("{byte:02x}"));
        }
        Self(hex)
    }

    /// Returns the hash as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReplicationLinkHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
