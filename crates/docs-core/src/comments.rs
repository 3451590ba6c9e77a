//! Comments attached to selections inside a document.
//!
//! Comments are local to the device: they are persisted as JSON next to the
//! snapshot but are not part of the replicated collection.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub doc_id: String,
    /// Text that was selected when the comment was made
    pub selection: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Comments {
    items: Vec<Comment>,
}

impl Comments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn add(&mut self, doc_id: &str, selection: &str, body: &str) {
        self.items.push(Comment {
            doc_id: doc_id.to_string(),
            selection: selection.to_string(),
            body: body.to_string(),
        });
    }

    /// Comments on `doc_id`, oldest first.
    pub fn for_document(&self, doc_id: &str) -> Vec<Comment> {
        self.items
            .iter()
            .filter(|c| c.doc_id == doc_id)
            .cloned()
            .collect()
    }

    /// Drop every comment on `doc_id`. Returns how many were removed.
    pub fn remove_for(&mut self, doc_id: &str) -> usize {
        let before = self.items.len();
        self.items.retain(|c| c.doc_id != doc_id);
        before - self.items.len()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
