//! Wire messages exchanged between replicas over the broadcast channel.
//!
//! The exchange is deliberately simple:
//!
//! 1. After every local change, the editing replica posts a full `Snapshot`.
//! 2. When a replica opens, it posts a `SyncRequest` with its version vector.
//! 3. Any replica holding operations the requester lacks answers with `Updates`.
//!
//! Receivers merge `Snapshot` and `Updates` payloads into their store. Merging
//! is idempotent, so duplicate or overlapping answers are harmless.

use crate::replica_id::ReplicaId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Messages exchanged between replicas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMessage {
    /// Full snapshot of the sender's collection
    Snapshot {
        /// Replica that produced the snapshot
        origin: ReplicaId,
        /// Loro snapshot bytes
        data: Vec<u8>,
    },

    /// Ask peers for anything newer than `version`
    SyncRequest {
        /// Replica asking
        origin: ReplicaId,
        /// Encoded version vector of the requester
        version: Vec<u8>,
    },

    /// Answer to a `SyncRequest`
    Updates {
        /// Replica answering
        origin: ReplicaId,
        /// Loro update bytes since the requester's version
        data: Vec<u8>,
    },
}

impl SyncMessage {
    /// Replica that sent the message.
    pub fn origin(&self) -> ReplicaId {
        match self {
            SyncMessage::Snapshot { origin, .. }
            | SyncMessage::SyncRequest { origin, .. }
            | SyncMessage::Updates { origin, .. } => *origin,
        }
    }

    /// Variant name, for logs and events.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncMessage::Snapshot { .. } => "Snapshot",
            SyncMessage::SyncRequest { .. } => "SyncRequest",
            SyncMessage::Updates { .. } => "Updates",
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| SyncError::Serialization(e.to_string()))
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| SyncError::Deserialization(e.to_string()))
    }
}
