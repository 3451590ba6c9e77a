//! End-to-end tests for the `docs` commands against a store directory.

use docs_cli::{Command, execute};
use std::path::Path;
use tempfile::TempDir;

async fn run(store: &Path, command: Command) -> Vec<String> {
    execute(store.to_path_buf(), command)
        .await
        .expect("Command failed")
}

#[tokio::test]
async fn test_add_list_and_show() {
    let dir = TempDir::new().unwrap();
    let store = dir.path();

    let id = run(store, Command::Add { text: "<p>Quarterly report</p>".into() })
        .await
        .remove(0);

    let listed = run(store, Command::List).await;
    assert_eq!(listed, vec![format!("[ ] {}  Quarterly ...", id)]);

    run(store, Command::Done { id: id.clone(), undo: false }).await;
    let listed = run(store, Command::List).await;
    assert!(listed[0].starts_with("[x] "));

    let shown = run(store, Command::Show { id: id.clone() }).await;
    assert_eq!(shown[0], format!("id:     {}", id));
    assert!(shown.contains(&"<p>Quarterly report</p>".to_string()));
}

#[tokio::test]
async fn test_user_id_persists_in_store() {
    let dir = TempDir::new().unwrap();
    let store = dir.path();

    run(store, Command::Add { text: "a".into() }).await;
    let first = std::fs::read_to_string(store.join("userId")).unwrap();
    run(store, Command::Add { text: "b".into() }).await;
    let second = std::fs::read_to_string(store.join("userId")).unwrap();

    assert!(first.starts_with("user_"));
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_runs_reuse_the_stored_replica_id() {
    let dir = TempDir::new().unwrap();
    let store = dir.path();

    let a = run(store, Command::Add { text: "a".into() }).await.remove(0);
    let first = std::fs::read_to_string(store.join("cliReplicaId")).unwrap();
    let b = run(store, Command::Add { text: "b".into() }).await.remove(0);
    let second = std::fs::read_to_string(store.join("cliReplicaId")).unwrap();

    assert_eq!(first.len(), 16);
    assert_eq!(first, second);

    // Both documents were authored by the same replica
    let suffix = format!("_{}", first);
    for id in [a, b] {
        let shown = run(store, Command::Show { id }).await;
        let author = shown.iter().find(|l| l.starts_with("author: ")).unwrap();
        assert!(author.ends_with(&suffix), "{} not by {}", author, first);
    }
}

#[tokio::test]
async fn test_unreadable_replica_id_is_replaced() {
    let dir = TempDir::new().unwrap();
    let store = dir.path();
    std::fs::write(store.join("cliReplicaId"), "not hex").unwrap();

    run(store, Command::List).await;
    let replaced = std::fs::read_to_string(store.join("cliReplicaId")).unwrap();
    assert!(replaced.parse::<docs_core::ReplicaId>().is_ok());
}

#[tokio::test]
async fn test_edit_delete_and_unknown_ids() {
    let dir = TempDir::new().unwrap();
    let store = dir.path();

    let id = run(store, Command::Add { text: "<p>draft</p>".into() })
        .await
        .remove(0);
    run(store, Command::Edit { id: id.clone(), text: "<p>final</p>".into() }).await;
    let shown = run(store, Command::Show { id: id.clone() }).await;
    assert!(shown.contains(&"<p>final</p>".to_string()));

    run(store, Command::Delete { id: id.clone() }).await;
    assert!(run(store, Command::List).await.is_empty());

    assert!(execute(store.to_path_buf(), Command::Show { id: id.clone() }).await.is_err());
    assert!(execute(store.to_path_buf(), Command::Delete { id }).await.is_err());
}

#[tokio::test]
async fn test_comment_is_stored_as_json() {
    let dir = TempDir::new().unwrap();
    let store = dir.path();

    let id = run(store, Command::Add { text: "<p>Hello world</p>".into() })
        .await
        .remove(0);
    run(
        store,
        Command::Comment {
            id: id.clone(),
            selection: "world".into(),
            body: "which one?".into(),
        },
    )
    .await;

    let raw = std::fs::read_to_string(store.join("commentedValue")).unwrap();
    assert_eq!(
        raw,
        format!(r#"[{{"docId":"{}","selection":"world","body":"which one?"}}]"#, id)
    );
    let shown = run(store, Command::Show { id }).await;
    assert_eq!(shown.last().unwrap(), "> \"world\": which one?");
}

#[tokio::test]
async fn test_export_and_merge_between_stores() {
    let dir = TempDir::new().unwrap();
    let store_a = dir.path().join("a");
    let store_b = dir.path().join("b");
    let export = dir.path().join("a.loro");

    let from_a = run(&store_a, Command::Add { text: "from a".into() }).await.remove(0);
    let from_b = run(&store_b, Command::Add { text: "from b".into() }).await.remove(0);

    run(&store_a, Command::Export { file: export.clone() }).await;
    let merged = run(&store_b, Command::Merge { file: export.clone() }).await;
    assert!(merged[0].contains("2 document(s)"));

    let again = run(&store_b, Command::Merge { file: export }).await;
    assert!(again[0].starts_with("Nothing new"));

    let listed = run(&store_b, Command::List).await.join("\n");
    assert!(listed.contains(&from_a));
    assert!(listed.contains(&from_b));
}
