//! Subcommands of the `docs` binary.
//!
//! Each invocation opens the store as the directory's own replica, runs one
//! command and returns the lines to print. The replica id is kept in the store
//! so repeated runs do not add a new peer to the version vector.

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use docs_core::{KeyValueStore, LocalHub, Replica, ReplicaConfig, ReplicaId};
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::dir_store::DirStore;

/// Channel name used for the in-process hub.
pub const CHANNEL_NAME: &str = "docs";

/// Store key holding the replica id this directory edits as.
pub const REPLICA_ID_KEY: &str = "cliReplicaId";

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List all documents
    List,

    /// Show one document with its comments
    Show { id: String },

    /// Create a document
    Add { text: String },

    /// Replace a document's text
    Edit { id: String, text: String },

    /// Mark a document done
    Done {
        id: String,
        /// Mark it not done instead
        #[arg(long)]
        undo: bool,
    },

    /// Delete a document
    Delete { id: String },

    /// Write the collection snapshot to a file
    Export { file: PathBuf },

    /// Merge a snapshot or update file into the store
    Merge { file: PathBuf },

    /// Comment on a selection inside a document
    Comment {
        id: String,
        selection: String,
        body: String,
    },
}

async fn load_or_create_replica_id(storage: &DirStore) -> Result<ReplicaId> {
    let stored = storage
        .get(REPLICA_ID_KEY)
        .await
        .context("Failed to read replica id")?;
    if let Some(bytes) = stored {
        match String::from_utf8_lossy(&bytes).trim().parse::<ReplicaId>() {
            Ok(id) => return Ok(id),
            Err(e) => warn!("Stored replica id is unreadable, replacing it: {}", e),
        }
    }

    let id = ReplicaId::generate();
    storage
        .set(REPLICA_ID_KEY, id.to_string().as_bytes())
        .await
        .context("Failed to store replica id")?;
    Ok(id)
}

/// Open the store under `store_dir` and run `command` against it.
pub async fn execute(store_dir: PathBuf, command: Command) -> Result<Vec<String>> {
    let storage = DirStore::new(store_dir);
    let hub = LocalHub::new();
    let config = ReplicaConfig {
        // Nobody else is listening on a one-shot run
        announce_on_open: false,
        ..ReplicaConfig::default()
    };

    let replica_id = load_or_create_replica_id(&storage).await?;
    let replica = Replica::open_as(storage, hub.open(CHANNEL_NAME), config, replica_id)
        .await
        .context("Failed to open store")?;
    debug!("Running {:?} as {}", command, replica.author());

    let lines = match command {
        Command::List => replica
            .documents()
            .iter()
            .map(|doc| {
                let mark = if doc.done { "x" } else { " " };
                let title = docs_core::summary::title(&doc.text, None);
                format!("[{}] {}  {}", mark, doc.id, title)
            })
            .collect(),

        Command::Show { id } => {
            let Some(doc) = replica.document(&id) else {
                bail!("No document with id {}", id);
            };
            let mut lines = vec![
                format!("id:     {}", doc.id),
                format!("title:  {}", docs_core::summary::title(&doc.text, None)),
                format!("done:   {}", doc.done),
                format!("author: {}", doc.user_id),
                String::new(),
                doc.text,
            ];
            for comment in replica.comments_for(&id) {
                lines.push(format!("> \"{}\": {}", comment.selection, comment.body));
            }
            lines
        }

        Command::Add { text } => vec![replica.add_document(&text).await?],

        Command::Edit { id, text } => {
            if replica.update_document(&id, &text).await? {
                vec![format!("Updated {}", id)]
            } else {
                vec![format!("{} already has that text", id)]
            }
        }

        Command::Done { id, undo } => {
            if replica.document(&id).is_none() {
                bail!("No document with id {}", id);
            }
            replica.set_done(&id, !undo).await?;
            let state = if undo { "not done" } else { "done" };
            vec![format!("{} marked {}", id, state)]
        }

        Command::Delete { id } => {
            if !replica.delete_document(&id).await? {
                bail!("No document with id {}", id);
            }
            vec![format!("Deleted {}", id)]
        }

        Command::Export { file } => {
            let snapshot = replica.store().export_snapshot()?;
            tokio::fs::write(&file, &snapshot)
                .await
                .with_context(|| format!("Failed to write {}", file.display()))?;
            vec![format!(
                "Exported {} document(s) to {}",
                replica.documents().len(),
                file.display()
            )]
        }

        Command::Merge { file } => {
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            if replica.import(&data).await? {
                vec![format!(
                    "Merged {}: {} document(s)",
                    file.display(),
                    replica.documents().len()
                )]
            } else {
                vec![format!("Nothing new in {}", file.display())]
            }
        }

        Command::Comment {
            id,
            selection,
            body,
        } => {
            replica.add_comment(&id, &selection, &body).await?;
            vec![serde_json::to_string(&replica.comments_for(&id))?]
        }
    };

    Ok(lines)
}
