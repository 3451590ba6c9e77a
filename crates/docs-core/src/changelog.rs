//! Local change log and review baselines.
//!
//! The log records what happened on this replica in human-readable form.
//! Each document also has a review baseline: the text as of the last time its
//! changes were accepted. Rejecting changes restores that text.

use crate::summary;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    Added,
    Updated,
    Deleted,
    Merged,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEntry {
    pub kind: ChangeKind,
    /// Affected document, `None` for merges of remote state
    pub doc_id: Option<String>,
    /// Author for local changes, origin replica for merges
    pub author: String,
    /// Plain-text body for updates, empty otherwise
    pub summary: String,
    pub timestamp: f64,
}

impl Display for ChangeEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let id = self.doc_id.as_deref().unwrap_or_default();
        match self.kind {
            ChangeKind::Added => write!(f, "New document added: {} (by {})", id, self.author),
            ChangeKind::Updated => write!(f, " {} (by {}) ", self.summary, self.author),
            ChangeKind::Deleted => write!(f, "Document {} deleted (by {})", id, self.author),
            ChangeKind::Merged => write!(f, "Merged changes from {}", self.author),
        }
    }
}

#[derive(Debug, Default)]
pub struct ChangeLog {
    entries: Vec<ChangeEntry>,
    /// Per document: entries before this index have been reviewed
    reviewed_upto: HashMap<String, usize>,
    baselines: HashMap<String, String>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_added(&mut self, id: &str, author: &str, timestamp: f64) {
        self.push(ChangeKind::Added, Some(id), author, String::new(), timestamp);
    }

    pub fn record_updated(&mut self, id: &str, text: &str, author: &str, timestamp: f64) {
        let plain = summary::strip_tags(text);
        self.push(ChangeKind::Updated, Some(id), author, plain, timestamp);
    }

    pub fn record_deleted(&mut self, id: &str, author: &str, timestamp: f64) {
        self.push(ChangeKind::Deleted, Some(id), author, String::new(), timestamp);
        self.baselines.remove(id);
        self.reviewed_upto.remove(id);
    }

    pub fn record_merged(&mut self, origin: &str, timestamp: f64) {
        self.push(ChangeKind::Merged, None, origin, String::new(), timestamp);
    }

    fn push(
        &mut self,
        kind: ChangeKind,
        doc_id: Option<&str>,
        author: &str,
        summary: String,
        timestamp: f64,
    ) {
        self.entries.push(ChangeEntry {
            kind,
            doc_id: doc_id.map(str::to_string),
            author: author.to_string(),
            summary,
            timestamp,
        });
    }

    pub fn entries(&self) -> &[ChangeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries for `id` recorded since its changes were last accepted.
    pub fn pending(&self, id: &str) -> Vec<&ChangeEntry> {
        let from = self.reviewed_upto.get(id).copied().unwrap_or(0);
        self.entries
            .iter()
            .skip(from)
            .filter(|e| e.doc_id.as_deref() == Some(id))
            .collect()
    }

    /// Set the baseline for `id` unless it already has one.
    pub fn ensure_baseline(&mut self, id: &str, text: &str) {
        self.baselines
            .entry(id.to_string())
            .or_insert_with(|| text.to_string());
    }

    pub fn baseline(&self, id: &str) -> Option<&str> {
        self.baselines.get(id).map(String::as_str)
    }

    /// Accept `text` as the new baseline and mark pending entries reviewed.
    pub fn accept(&mut self, id: &str, text: &str) {
        self.baselines.insert(id.to_string(), text.to_string());
        self.reviewed_upto.insert(id.to_string(), self.entries.len());
    }
}
