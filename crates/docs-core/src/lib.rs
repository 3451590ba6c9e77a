//! docs-core: CRDT document store shared by every browser tab.
//!
//! This crate provides:
//! - A Loro-backed collection of rich-text document records
//! - Wholesale snapshot persistence through a key-value store abstraction
//! - Snapshot exchange between replicas over a same-origin broadcast channel
//! - Local change log, review baselines, and comments

pub mod changelog;
pub mod channel;
pub mod comments;
pub mod document;
pub mod events;
pub mod replica;
pub mod replica_id;
pub mod storage;
pub mod summary;
pub mod sync;

pub use changelog::{ChangeEntry, ChangeKind, ChangeLog};
pub use channel::{BroadcastChannel, LocalChannel, LocalHub};
pub use comments::{Comment, Comments};
pub use document::{DocumentRecord, DocumentStore};
pub use events::{EventBus, SharedEventBus, StoreEvent, Subscription};
pub use replica::{MergeOutcome, Replica, ReplicaConfig};
pub use replica_id::{AuthorId, ReplicaId, ReplicaIdError, UserId};
pub use storage::{InMemoryStore, KeyValueStore};
pub use sync::SyncMessage;
