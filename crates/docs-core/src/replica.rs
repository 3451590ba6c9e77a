//! Replica: one tab's view of the document collection.
//!
//! A replica ties together:
//! - the Loro-backed `DocumentStore`
//! - local storage (`KeyValueStore`) for wholesale snapshot persistence
//! - a same-origin `BroadcastChannel` to exchange snapshots with other tabs
//!
//! Every local mutation is persisted before it is broadcast.

use crate::changelog::{ChangeEntry, ChangeLog};
use crate::channel::{BroadcastChannel, ChannelError};
use crate::comments::{Comment, Comments};
use crate::document::{DocumentError, DocumentRecord, DocumentStore};
use crate::events::{EventBus, SharedEventBus, StoreEvent, now_millis};
use crate::replica_id::{AuthorId, ReplicaId, UserId};
use crate::storage::{COMMENTS_KEY, KeyValueStore, SNAPSHOT_KEY, StorageError, USER_ID_KEY};
use crate::summary;
use crate::sync::{SyncError, SyncMessage};

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ReplicaError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Comments error: {0}")]
    Comments(String),
}

pub type Result<T> = std::result::Result<T, ReplicaError>;

/// Replica configuration. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReplicaConfig {
    /// Storage key for the collection snapshot
    pub snapshot_key: String,
    /// Storage key for the comment list
    pub comments_key: String,
    /// Storage key for the device user ID
    pub user_id_key: String,
    /// Post a `SyncRequest` when opening so other tabs send what we miss
    pub announce_on_open: bool,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            snapshot_key: SNAPSHOT_KEY.to_string(),
            comments_key: COMMENTS_KEY.to_string(),
            user_id_key: USER_ID_KEY.to_string(),
            announce_on_open: true,
        }
    }
}

/// What handling an incoming message did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Message came from this replica (or could not be decoded while pumping)
    Ignored,
    /// Nothing new: the data was already part of our state
    Unchanged,
    /// Remote state was merged and persisted
    Merged,
    /// A `SyncRequest` was answered with updates
    Answered,
}

#[derive(Default)]
struct LocalState {
    changelog: ChangeLog,
    comments: Comments,
}

pub struct Replica<S: KeyValueStore, C: BroadcastChannel> {
    store: DocumentStore,
    storage: S,
    channel: C,
    config: ReplicaConfig,
    author: AuthorId,
    /// Device-local state. Never held across an await point.
    local: Mutex<LocalState>,
    events: SharedEventBus,
}

impl<S: KeyValueStore, C: BroadcastChannel> Replica<S, C> {
    /// Open a replica with a freshly generated replica ID.
    pub async fn open(storage: S, channel: C, config: ReplicaConfig) -> Result<Self> {
        Self::open_as(storage, channel, config, ReplicaId::generate()).await
    }

    /// Open a replica with a given replica ID.
    ///
    /// Loads the persisted snapshot and comments. An unreadable snapshot is
    /// logged and replaced by an empty collection (the next write overwrites it).
    pub async fn open_as(
        storage: S,
        channel: C,
        config: ReplicaConfig,
        replica: ReplicaId,
    ) -> Result<Self> {
        let user = UserId::load_or_create(&storage, &config.user_id_key).await?;
        let author = AuthorId::new(user, replica);

        let store = match storage.get(&config.snapshot_key).await? {
            Some(bytes) => match DocumentStore::from_snapshot(replica, &bytes) {
                Ok(store) => store,
                Err(e) => {
                    warn!("Discarding unreadable snapshot: {}", e);
                    DocumentStore::new(replica)
                }
            },
            None => DocumentStore::new(replica),
        };

        let comments = match storage.get(&config.comments_key).await? {
            Some(bytes) => Comments::from_json(&bytes).unwrap_or_else(|e| {
                warn!("Discarding unreadable comments: {}", e);
                Comments::new()
            }),
            None => Comments::new(),
        };

        let mut changelog = ChangeLog::new();
        for doc in store.documents() {
            changelog.ensure_baseline(&doc.id, &doc.text);
        }

        info!(
            "Opened replica {} on channel {} with {} document(s)",
            replica,
            channel.name(),
            store.len()
        );

        let replica = Self {
            store,
            storage,
            channel,
            config,
            author,
            local: Mutex::new(LocalState {
                changelog,
                comments,
            }),
            events: SharedEventBus::new(EventBus::new()),
        };

        if replica.config.announce_on_open {
            replica.announce().await?;
        }

        Ok(replica)
    }

    fn local(&self) -> MutexGuard<'_, LocalState> {
        self.local.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ========== Accessors ==========

    pub fn replica_id(&self) -> ReplicaId {
        self.store.replica()
    }

    pub fn author(&self) -> &AuthorId {
        &self.author
    }

    pub fn config(&self) -> &ReplicaConfig {
        &self.config
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn events(&self) -> &SharedEventBus {
        &self.events
    }

    pub fn documents(&self) -> Vec<DocumentRecord> {
        self.store.documents()
    }

    pub fn document(&self, id: &str) -> Option<DocumentRecord> {
        self.store.get(id)
    }

    /// Card title for a document, `None` if the document does not exist.
    pub fn title(&self, id: &str) -> Option<String> {
        self.store.get(id).map(|doc| summary::title(&doc.text, None))
    }

    pub fn change_log(&self) -> Vec<ChangeEntry> {
        self.local().changelog.entries().to_vec()
    }

    /// Changes to `id` since they were last accepted or rejected.
    pub fn pending_changes(&self, id: &str) -> Vec<ChangeEntry> {
        self.local()
            .changelog
            .pending(id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn comments_for(&self, id: &str) -> Vec<Comment> {
        self.local().comments.for_document(id)
    }

    // ========== Local mutations ==========

    /// Create a document with an initial body. Returns its ID.
    pub async fn add_document(&self, text: &str) -> Result<String> {
        let id = self.store.add_document(text, &self.author)?;
        {
            let mut local = self.local();
            local
                .changelog
                .record_added(&id, &self.author.to_string(), now_millis());
            local.changelog.ensure_baseline(&id, text);
        }

        self.commit_local().await?;
        self.events.emit(StoreEvent::DocumentAdded {
            id: id.clone(),
            timestamp: now_millis(),
        });
        Ok(id)
    }

    /// Replace a document's body. Returns `false` if it was already identical.
    pub async fn update_document(&self, id: &str, text: &str) -> Result<bool> {
        let before = self
            .store
            .get(id)
            .ok_or_else(|| DocumentError::NotFound(id.to_string()))?;

        if !self.store.update_text(id, text)? {
            return Ok(false);
        }
        {
            let mut local = self.local();
            local.changelog.ensure_baseline(id, &before.text);
            local
                .changelog
                .record_updated(id, text, &self.author.to_string(), now_millis());
        }

        self.commit_local().await?;
        self.events.emit(StoreEvent::DocumentUpdated {
            id: id.to_string(),
            timestamp: now_millis(),
        });
        Ok(true)
    }

    /// Set a document's completion flag. Returns `false` if unchanged.
    pub async fn set_done(&self, id: &str, done: bool) -> Result<bool> {
        if !self.store.set_done(id, done)? {
            return Ok(false);
        }

        self.commit_local().await?;
        self.events.emit(StoreEvent::DocumentUpdated {
            id: id.to_string(),
            timestamp: now_millis(),
        });
        Ok(true)
    }

    /// Delete a document and its comments. Returns `false` if it did not exist.
    pub async fn delete_document(&self, id: &str) -> Result<bool> {
        if !self.store.delete_document(id)? {
            return Ok(false);
        }
        let dropped_comments = {
            let mut local = self.local();
            local
                .changelog
                .record_deleted(id, &self.author.to_string(), now_millis());
            local.comments.remove_for(id)
        };

        self.commit_local().await?;
        if dropped_comments > 0 {
            self.save_comments().await?;
        }
        self.events.emit(StoreEvent::DocumentDeleted {
            id: id.to_string(),
            timestamp: now_millis(),
        });
        Ok(true)
    }

    // ========== Review ==========

    /// Accept the current text of `id` as its review baseline.
    pub fn accept_changes(&self, id: &str) -> Result<()> {
        let doc = self
            .store
            .get(id)
            .ok_or_else(|| DocumentError::NotFound(id.to_string()))?;
        self.local().changelog.accept(id, &doc.text);
        Ok(())
    }

    /// Restore `id` to its review baseline and discard its comments.
    ///
    /// Returns `true` if the text changed. The restored text is persisted and
    /// broadcast like any other edit.
    pub async fn reject_changes(&self, id: &str) -> Result<bool> {
        let doc = self
            .store
            .get(id)
            .ok_or_else(|| DocumentError::NotFound(id.to_string()))?;
        let baseline = self
            .local()
            .changelog
            .baseline(id)
            .map(str::to_string)
            .unwrap_or(doc.text);

        let changed = self.store.update_text(id, &baseline)?;
        let dropped_comments = {
            let mut local = self.local();
            local.changelog.accept(id, &baseline);
            local.comments.remove_for(id)
        };

        if changed {
            self.commit_local().await?;
            self.events.emit(StoreEvent::DocumentUpdated {
                id: id.to_string(),
                timestamp: now_millis(),
            });
        }
        if dropped_comments > 0 {
            self.save_comments().await?;
        }
        debug!("Rejected changes to {} (text changed: {})", id, changed);
        Ok(changed)
    }

    // ========== Comments ==========

    /// Attach a comment to a selection in `id`.
    pub async fn add_comment(&self, id: &str, selection: &str, body: &str) -> Result<()> {
        if !self.store.contains(id) {
            return Err(DocumentError::NotFound(id.to_string()).into());
        }
        self.local().comments.add(id, selection, body);
        self.save_comments().await
    }

    async fn save_comments(&self) -> Result<()> {
        let json = self
            .local()
            .comments
            .to_json()
            .map_err(|e| ReplicaError::Comments(e.to_string()))?;
        self.storage.set(&self.config.comments_key, &json).await?;
        Ok(())
    }

    // ========== Persistence & sync ==========

    /// Write the full snapshot to storage.
    pub async fn persist(&self) -> Result<()> {
        let snapshot = self.store.export_snapshot()?;
        self.storage
            .set(&self.config.snapshot_key, &snapshot)
            .await?;
        debug!("Persisted snapshot ({} bytes)", snapshot.len());
        Ok(())
    }

    /// Persist, then post the snapshot to the other tabs.
    async fn commit_local(&self) -> Result<()> {
        let snapshot = self.store.export_snapshot()?;
        self.storage
            .set(&self.config.snapshot_key, &snapshot)
            .await?;
        self.post(&SyncMessage::Snapshot {
            origin: self.replica_id(),
            data: snapshot,
        })
        .await
    }

    /// Ask other tabs for anything we are missing.
    pub async fn announce(&self) -> Result<()> {
        self.post(&SyncMessage::SyncRequest {
            origin: self.replica_id(),
            version: self.store.version(),
        })
        .await
    }

    async fn post(&self, msg: &SyncMessage) -> Result<()> {
        let bytes = msg.encode()?;
        self.channel.post(&bytes).await?;
        self.events.emit(StoreEvent::MessageSent {
            message_type: msg.kind().to_string(),
            size: bytes.len(),
            timestamp: now_millis(),
        });
        Ok(())
    }

    /// Handle one message received on the channel.
    ///
    /// `MessageReceived` is only emitted for messages that were merged or
    /// answered; redundant and own messages leave no trace.
    pub async fn handle_message(&self, data: &[u8]) -> Result<MergeOutcome> {
        let msg = SyncMessage::decode(data)?;
        let kind = msg.kind();

        let outcome = if msg.origin() == self.replica_id() {
            MergeOutcome::Ignored
        } else {
            match msg {
                SyncMessage::Snapshot { origin, data } | SyncMessage::Updates { origin, data } => {
                    self.merge_remote(origin, &data).await?
                }
                SyncMessage::SyncRequest { origin, version } => {
                    self.answer_request(origin, &version).await?
                }
            }
        };

        if matches!(outcome, MergeOutcome::Merged | MergeOutcome::Answered) {
            self.events.emit(StoreEvent::MessageReceived {
                message_type: kind.to_string(),
                size: data.len(),
                timestamp: now_millis(),
            });
        }
        Ok(outcome)
    }

    async fn merge_remote(&self, origin: ReplicaId, data: &[u8]) -> Result<MergeOutcome> {
        if !self.store.merge(data)? {
            debug!("Data from {} already merged", origin);
            return Ok(MergeOutcome::Unchanged);
        }

        self.persist().await?;
        self.track_baselines();
        self.local()
            .changelog
            .record_merged(&origin.to_string(), now_millis());
        self.events.emit(StoreEvent::RemoteMerged {
            origin: origin.to_string(),
            timestamp: now_millis(),
        });
        debug!("Merged changes from {}", origin);
        Ok(MergeOutcome::Merged)
    }

    /// Give documents that arrived from elsewhere a review baseline.
    fn track_baselines(&self) {
        let docs = self.store.documents();
        let mut local = self.local();
        for doc in docs {
            local.changelog.ensure_baseline(&doc.id, &doc.text);
        }
    }

    /// Send the requester what it lacks, and ask back if it has what we lack.
    async fn answer_request(&self, origin: ReplicaId, version: &[u8]) -> Result<MergeOutcome> {
        let ours = self.store.version();
        let mut outcome = MergeOutcome::Unchanged;

        if !DocumentStore::version_includes(version, &ours) {
            let data = self.store.export_updates(version)?;
            self.post(&SyncMessage::Updates {
                origin: self.replica_id(),
                data,
            })
            .await?;
            outcome = MergeOutcome::Answered;
        }

        if !self.store.has_seen(version) {
            debug!("{} has changes we have not seen, requesting", origin);
            self.announce().await?;
        }

        Ok(outcome)
    }

    /// Merge a snapshot or update blob obtained out of band (e.g. an exported file).
    ///
    /// Persists and broadcasts the merged state when it advanced. Returns whether it did.
    pub async fn import(&self, data: &[u8]) -> Result<bool> {
        if !self.store.merge(data)? {
            return Ok(false);
        }
        self.track_baselines();

        self.commit_local().await?;
        self.local()
            .changelog
            .record_merged("import", now_millis());
        info!("Imported {} bytes of remote state", data.len());
        Ok(true)
    }

    /// Wait for the next channel message and handle it.
    ///
    /// Undecodable messages are logged and reported as `Ignored`.
    pub async fn pump(&self) -> Result<MergeOutcome> {
        let data = self.channel.recv().await?;
        self.handle_message_lenient(&data).await
    }

    /// Handle every message already queued on the channel.
    ///
    /// Returns the number of messages that changed local state.
    pub async fn drain(&self) -> Result<usize> {
        let mut merged = 0;
        while let Some(data) = self.channel.try_recv()? {
            if self.handle_message_lenient(&data).await? == MergeOutcome::Merged {
                merged += 1;
            }
        }
        Ok(merged)
    }

    /// Like `handle_message`, but drops undecodable messages and unmergeable
    /// payloads with a warning, reporting them as `Ignored`.
    pub async fn handle_message_lenient(&self, data: &[u8]) -> Result<MergeOutcome> {
        match self.handle_message(data).await {
            Err(ReplicaError::Sync(e)) => {
                warn!("Dropping undecodable message: {}", e);
                Ok(MergeOutcome::Ignored)
            }
            Err(ReplicaError::Document(DocumentError::Loro(e))) => {
                warn!("Dropping unmergeable payload: {}", e);
                Ok(MergeOutcome::Ignored)
            }
            other => other,
        }
    }
}
