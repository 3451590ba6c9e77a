//! DocumentStore: Loro document holding the replicated collection of documents.
//!
//! The collection is a single Loro document with one root list:
//! - `documents`: LoroList of LoroMap records
//!
//! Each record map holds:
//! - `id`: UUID v4 string
//! - `text`: LoroText with the rich-text (HTML) body
//! - `done`: completion flag
//! - `userId`: author of the creating replica
//!
//! The body is a text container rather than a plain string so that concurrent
//! edits from two tabs merge instead of one overwriting the other.

use crate::replica_id::{AuthorId, ReplicaId};
use loro::{
    Container, ExportMode, LoroDoc, LoroList, LoroMap, LoroText, LoroValue, UpdateOptions,
    ValueOrContainer, VersionVector,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

const DOCUMENTS: &str = "documents";
const FIELD_ID: &str = "id";
const FIELD_TEXT: &str = "text";
const FIELD_DONE: &str = "done";
const FIELD_USER: &str = "userId";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Malformed document record at index {0}")]
    Malformed(usize),

    #[error("Loro error: {0}")]
    Loro(String),
}

pub type Result<T> = std::result::Result<T, DocumentError>;

/// Plain view of one record in the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: String,
    pub text: String,
    pub done: bool,
    pub user_id: String,
}

/// The replicated document collection of one replica.
pub struct DocumentStore {
    doc: LoroDoc,
    replica: ReplicaId,
}

impl DocumentStore {
    /// Create an empty collection owned by `replica`.
    pub fn new(replica: ReplicaId) -> Self {
        let doc = LoroDoc::new();
        // Set peer ID before any operations for consistent version vectors
        doc.set_peer_id(replica.as_u64()).ok();
        let _documents = doc.get_list(DOCUMENTS);
        Self { doc, replica }
    }

    /// Load a collection from a persisted snapshot.
    ///
    /// The peer ID is set before import so new operations carry our replica ID
    /// while imported history keeps its original authors.
    pub fn from_snapshot(replica: ReplicaId, bytes: &[u8]) -> Result<Self> {
        let store = Self::new(replica);
        store
            .doc
            .import(bytes)
            .map_err(|e| DocumentError::Loro(e.to_string()))?;
        Ok(store)
    }

    pub fn replica(&self) -> ReplicaId {
        self.replica
    }

    fn list(&self) -> LoroList {
        self.doc.get_list(DOCUMENTS)
    }

    /// Append a new document and return its generated ID.
    pub fn add_document(&self, text: &str, author: &AuthorId) -> Result<String> {
        let id = Uuid::new_v4().to_string();

        let record = self
            .list()
            .push_container(LoroMap::new())
            .map_err(|e| DocumentError::Loro(e.to_string()))?;
        record
            .insert(FIELD_ID, id.as_str())
            .map_err(|e| DocumentError::Loro(e.to_string()))?;
        record
            .insert(FIELD_DONE, false)
            .map_err(|e| DocumentError::Loro(e.to_string()))?;
        record
            .insert(FIELD_USER, author.to_string())
            .map_err(|e| DocumentError::Loro(e.to_string()))?;
        let body = record
            .insert_container(FIELD_TEXT, LoroText::new())
            .map_err(|e| DocumentError::Loro(e.to_string()))?;
        if !text.is_empty() {
            body.insert(0, text)
                .map_err(|e| DocumentError::Loro(e.to_string()))?;
        }

        self.doc.commit();
        tracing::debug!("Added document {}", id);
        Ok(id)
    }

    /// Replace a document's body by applying a character diff.
    ///
    /// Returns `false` if the text was already identical.
    pub fn update_text(&self, id: &str, text: &str) -> Result<bool> {
        let index = self.index_of(id)?;
        let body = self.body_at(index)?;

        if body.to_string() == text {
            return Ok(false);
        }

        body.update(text, UpdateOptions::default())
            .map_err(|e| DocumentError::Loro(format!("{:?}", e)))?;
        self.doc.commit();
        Ok(true)
    }

    /// Set the completion flag. Returns `false` if it already had that value.
    pub fn set_done(&self, id: &str, done: bool) -> Result<bool> {
        let index = self.index_of(id)?;
        let record = self.record_at(index)?;

        let current = matches!(
            record.get(FIELD_DONE),
            Some(ValueOrContainer::Value(LoroValue::Bool(true)))
        );
        if current == done {
            return Ok(false);
        }

        record
            .insert(FIELD_DONE, done)
            .map_err(|e| DocumentError::Loro(e.to_string()))?;
        self.doc.commit();
        Ok(true)
    }

    /// Remove a document. Returns `false` if no document has that ID.
    ///
    /// The position is resolved at deletion time since concurrent inserts
    /// from other replicas may have shifted it.
    pub fn delete_document(&self, id: &str) -> Result<bool> {
        let Some(index) = self.position(id) else {
            return Ok(false);
        };

        self.list()
            .delete(index, 1)
            .map_err(|e| DocumentError::Loro(e.to_string()))?;
        self.doc.commit();
        tracing::debug!("Deleted document {}", id);
        Ok(true)
    }

    /// Get a single document by ID.
    pub fn get(&self, id: &str) -> Option<DocumentRecord> {
        self.documents().into_iter().find(|doc| doc.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    /// All documents in collection order.
    ///
    /// Records missing an ID (e.g. half-applied remote state) are skipped.
    pub fn documents(&self) -> Vec<DocumentRecord> {
        match self.list().get_deep_value() {
            LoroValue::List(items) => items.iter().filter_map(record_from_value).collect(),
            _ => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.documents().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current version vector, encoded.
    pub fn version(&self) -> Vec<u8> {
        self.doc.state_vv().encode()
    }

    /// Export full snapshot
    pub fn export_snapshot(&self) -> Result<Vec<u8>> {
        self.doc
            .export(ExportMode::Snapshot)
            .map_err(|e| DocumentError::Loro(e.to_string()))
    }

    /// Export the updates a replica at `since` (encoded version vector) is missing.
    pub fn export_updates(&self, since: &[u8]) -> Result<Vec<u8>> {
        let from =
            VersionVector::decode(since).map_err(|e| DocumentError::Loro(e.to_string()))?;
        self.doc
            .export(ExportMode::updates(&from))
            .map_err(|e| DocumentError::Loro(e.to_string()))
    }

    /// Whether our state contains everything described by `version`.
    pub fn has_seen(&self, version: &[u8]) -> bool {
        Self::version_includes(&self.version(), version)
    }

    /// Merge a snapshot or update blob from another replica.
    ///
    /// Returns `true` if the local state advanced. Importing data we already
    /// have is a no-op and returns `false`.
    pub fn merge(&self, bytes: &[u8]) -> Result<bool> {
        let before = self.doc.state_vv();
        self.doc
            .import(bytes)
            .map_err(|e| DocumentError::Loro(e.to_string()))?;
        let after = self.doc.state_vv();
        Ok(!before.includes_vv(&after))
    }

    /// Check if `current` contains all operations from `other`.
    ///
    /// Both are encoded version vectors. Undecodable input yields `false`.
    pub fn version_includes(current: &[u8], other: &[u8]) -> bool {
        let Ok(current) = VersionVector::decode(current) else {
            return false;
        };
        let Ok(other) = VersionVector::decode(other) else {
            return false;
        };
        current.includes_vv(&other)
    }

    fn position(&self, id: &str) -> Option<usize> {
        match self.list().get_deep_value() {
            LoroValue::List(items) => items.iter().position(|item| match item {
                LoroValue::Map(map) => {
                    matches!(map.get(FIELD_ID), Some(LoroValue::String(s)) if s.to_string() == id)
                }
                _ => false,
            }),
            _ => None,
        }
    }

    fn index_of(&self, id: &str) -> Result<usize> {
        self.position(id)
            .ok_or_else(|| DocumentError::NotFound(id.to_string()))
    }

    fn record_at(&self, index: usize) -> Result<LoroMap> {
        match self.list().get(index) {
            Some(ValueOrContainer::Container(Container::Map(map))) => Ok(map),
            _ => Err(DocumentError::Malformed(index)),
        }
    }

    fn body_at(&self, index: usize) -> Result<LoroText> {
        let record = self.record_at(index)?;
        match record.get(FIELD_TEXT) {
            Some(ValueOrContainer::Container(Container::Text(text))) => Ok(text),
            // Records written without a body container get one on first edit
            None => record
                .insert_container(FIELD_TEXT, LoroText::new())
                .map_err(|e| DocumentError::Loro(e.to_string())),
            _ => Err(DocumentError::Malformed(index)),
        }
    }
}

/// Convert one deep list entry into a record
fn record_from_value(value: &LoroValue) -> Option<DocumentRecord> {
    let LoroValue::Map(map) = value else {
        return None;
    };

    let string_field = |key: &str| match map.get(key) {
        Some(LoroValue::String(s)) => Some(s.to_string()),
        _ => None,
    };

    Some(DocumentRecord {
        id: string_field(FIELD_ID)?,
        text: string_field(FIELD_TEXT).unwrap_or_default(),
        done: matches!(map.get(FIELD_DONE), Some(LoroValue::Bool(true))),
        user_id: string_field(FIELD_USER).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replica_id::UserId;

    fn author(replica: u64) -> AuthorId {
        AuthorId::new(UserId::from("user_1"), ReplicaId::from(replica))
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = DocumentStore::new(ReplicaId::from(1u64));
        assert!(store.is_empty());
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn test_add_and_read_back() {
        let store = DocumentStore::new(ReplicaId::from(1u64));
        let id = store.add_document("<p>Hello</p>", &author(1)).unwrap();

        let doc = store.get(&id).unwrap();
        assert_eq!(doc.text, "<p>Hello</p>");
        assert!(!doc.done);
        assert_eq!(doc.user_id, "user_1_0000000000000001");
        assert!(Uuid::parse_str(&doc.id).is_ok());
    }

    #[test]
    fn test_update_text() {
        let store = DocumentStore::new(ReplicaId::from(1u64));
        let id = store.add_document("<p>Hello World</p>", &author(1)).unwrap();

        assert!(store.update_text(&id, "<p>Hello Universe</p>").unwrap());
        assert!(!store.update_text(&id, "<p>Hello Universe</p>").unwrap());
        assert_eq!(store.get(&id).unwrap().text, "<p>Hello Universe</p>");
    }

    #[test]
    fn test_update_unknown_document() {
        let store = DocumentStore::new(ReplicaId::from(1u64));
        assert!(matches!(
            store.update_text("nope", "x"),
            Err(DocumentError::NotFound(_))
        ));
        assert!(matches!(
            store.set_done("nope", true),
            Err(DocumentError::NotFound(_))
        ));
    }

    #[test]
    fn test_set_done() {
        let store = DocumentStore::new(ReplicaId::from(1u64));
        let id = store.add_document("", &author(1)).unwrap();

        assert!(store.set_done(&id, true).unwrap());
        assert!(!store.set_done(&id, true).unwrap());
        assert!(store.get(&id).unwrap().done);
    }

    #[test]
    fn test_delete_document() {
        let store = DocumentStore::new(ReplicaId::from(1u64));
        let a = store.add_document("a", &author(1)).unwrap();
        let b = store.add_document("b", &author(1)).unwrap();

        assert!(store.delete_document(&a).unwrap());
        assert!(!store.delete_document(&a).unwrap());

        let ids: Vec<_> = store.documents().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![b]);
    }

    #[test]
    fn test_snapshot_roundtrip_keeps_records() {
        let store = DocumentStore::new(ReplicaId::from(1u64));
        let id = store.add_document("<p>Persisted</p>", &author(1)).unwrap();
        store.set_done(&id, true).unwrap();

        let snapshot = store.export_snapshot().unwrap();
        let loaded = DocumentStore::from_snapshot(ReplicaId::from(2u64), &snapshot).unwrap();

        assert_eq!(loaded.documents(), store.documents());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let a = DocumentStore::new(ReplicaId::from(1u64));
        let b = DocumentStore::new(ReplicaId::from(2u64));
        a.add_document("from a", &author(1)).unwrap();

        let snapshot = a.export_snapshot().unwrap();
        assert!(b.merge(&snapshot).unwrap());
        assert!(!b.merge(&snapshot).unwrap());
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn test_concurrent_edits_converge() {
        let a = DocumentStore::new(ReplicaId::from(1u64));
        let b = DocumentStore::new(ReplicaId::from(2u64));

        let id = a.add_document("Hello", &author(1)).unwrap();
        b.merge(&a.export_snapshot().unwrap()).unwrap();

        // Concurrent edits on both sides
        a.update_text(&id, "Hello there").unwrap();
        b.update_text(&id, "Oh Hello").unwrap();
        b.add_document("second", &author(2)).unwrap();

        let snap_a = a.export_snapshot().unwrap();
        let snap_b = b.export_snapshot().unwrap();
        a.merge(&snap_b).unwrap();
        b.merge(&snap_a).unwrap();

        assert_eq!(a.documents(), b.documents());
        assert_eq!(a.len(), 2);
        let text = a.get(&id).unwrap().text;
        assert!(text.contains("there"));
        assert!(text.starts_with("Oh "));
    }

    #[test]
    fn test_export_updates_since_version() {
        let a = DocumentStore::new(ReplicaId::from(1u64));
        let b = DocumentStore::new(ReplicaId::from(2u64));
        a.add_document("one", &author(1)).unwrap();
        b.merge(&a.export_snapshot().unwrap()).unwrap();

        a.add_document("two", &author(1)).unwrap();
        assert!(!b.has_seen(&a.version()));

        let updates = a.export_updates(&b.version()).unwrap();
        assert!(b.merge(&updates).unwrap());
        assert!(b.has_seen(&a.version()));
        assert_eq!(b.documents(), a.documents());
    }

    #[test]
    fn test_version_includes_rejects_garbage() {
        let store = DocumentStore::new(ReplicaId::from(1u64));
        assert!(!DocumentStore::version_includes(&store.version(), b"\xff\xff"));
    }

    #[test]
    fn test_merge_rejects_garbage() {
        let store = DocumentStore::new(ReplicaId::from(1u64));
        assert!(store.merge(b"not a loro blob").is_err());
    }
}
