//! End-to-end status persistence against a vault directory on disk.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use note_status_store::{
    LocalVault, MutateOptions, StatusMutation, StatusOperation, StatusStore, StatusStoreManager,
};
use pretty_assertions::assert_eq;
use serde_json::{Value as JsonValue, json};
use tempfile::TempDir;

const KEY: &str = "obsidian-note-status";
const PLUGIN_DIR: &str = ".obsidian/plugins/obsidian-note-status";
const ARRAY: MutateOptions = MutateOptions {
    store_as_array: true,
};

fn vault_with(files: &[(&str, &str)]) -> (TempDir, Arc<LocalVault>) {
    let dir = TempDir::new().expect("temp dir");
    for (path, content) in files {
        let absolute = dir.path().join(path);
        if let Some(parent) = absolute.parent() {
            std::fs::create_dir_all(parent).expect("create dir");
        }
        std::fs::write(absolute, content).expect("write fixture");
    }
    let vault = Arc::new(LocalVault::open(dir.path()).expect("open vault"));
    (dir, vault)
}

fn index_json(root: &Path) -> JsonValue {
    let text = std::fs::read_to_string(root.join(PLUGIN_DIR).join("non-markdown-statuses.json"))
        .expect("index file");
    serde_json::from_str(&text).expect("index json")
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn non_markdown_scenario_add_then_clear() {
    let (dir, vault) = vault_with(&[("scans/x.pdf", "%PDF")]);
    let manager = StatusStoreManager::initialize(vault.clone(), PLUGIN_DIR).await;
    let file = vault.file("scans/x.pdf");
    let store = manager.store_for_file(&file).expect("store");

    let changed = store
        .mutate_statuses(
            &file,
            KEY,
            Box::new(|_| StatusMutation::changed(["active"])),
            ARRAY,
        )
        .await
        .expect("mutate");
    assert!(changed);
    assert_eq!(
        index_json(dir.path()),
        json!({"version": 1, "files": {"scans/x.pdf": {KEY: ["active"]}}})
    );

    let changed = store
        .mutate_statuses(
            &file,
            KEY,
            Box::new(|_| StatusMutation::changed(Vec::<String>::new())),
            ARRAY,
        )
        .await
        .expect("mutate");
    assert!(changed);
    assert_eq!(index_json(dir.path()), json!({"version": 1, "files": {}}));

    manager.shutdown().await;
}

#[tokio::test]
async fn markdown_statuses_land_in_frontmatter() {
    let (dir, vault) = vault_with(&[("plan.md", "---\ntitle: Plan\n---\nBody\n")]);
    let manager = StatusStoreManager::initialize(vault.clone(), PLUGIN_DIR).await;
    let file = vault.file("plan.md");
    let store = manager.store_for_file(&file).expect("store");

    store
        .mutate_statuses(
            &file,
            KEY,
            StatusOperation::Set(vec!["active".into(), "review".into()]).into_mutator(true),
            ARRAY,
        )
        .await
        .expect("set");
    assert_eq!(store.get_statuses(&file, KEY), vec!["active", "review"]);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("plan.md")).expect("read"),
        "---\ntitle: Plan\nobsidian-note-status:\n- active\n- review\n---\nBody\n"
    );

    store
        .mutate_statuses(
            &file,
            KEY,
            StatusOperation::Set(vec!["a".into(), "b".into()]).into_mutator(true),
            MutateOptions::default(),
        )
        .await
        .expect("collapse");
    assert_eq!(store.get_statuses(&file, KEY), vec!["a"]);

    // Markdown statuses never touch the side-car index.
    assert!(!dir.path().join(PLUGIN_DIR).exists());
    manager.shutdown().await;
}

#[tokio::test]
async fn no_op_mutation_keeps_files_byte_identical() {
    let original = "---\nobsidian-note-status:   [ 'x' ]\n---\n";
    let (dir, vault) = vault_with(&[("n.md", original), ("i.png", "")]);
    let manager = StatusStoreManager::initialize(vault.clone(), PLUGIN_DIR).await;

    for path in ["n.md", "i.png"] {
        let file = vault.file(path);
        let changed = manager
            .store_for_file(&file)
            .expect("store")
            .mutate_statuses(&file, KEY, Box::new(|_| StatusMutation::Unchanged), ARRAY)
            .await
            .expect("mutate");
        assert!(!changed);
    }

    assert_eq!(
        std::fs::read_to_string(dir.path().join("n.md")).expect("read"),
        original
    );
    assert!(!dir.path().join(PLUGIN_DIR).exists());
    manager.shutdown().await;
}

#[tokio::test]
async fn rename_notification_moves_index_entry() {
    let (dir, vault) = vault_with(&[("a.pdf", "%PDF")]);
    let manager = StatusStoreManager::initialize(vault.clone(), PLUGIN_DIR).await;
    let old = vault.file("a.pdf");
    manager
        .store_for_file(&old)
        .expect("store")
        .mutate_statuses(
            &old,
            "status",
            StatusOperation::Add("x".into()).into_mutator(true),
            ARRAY,
        )
        .await
        .expect("add");

    let moved = vault.rename("a.pdf", "archive/b.pdf").await.expect("rename");
    let store = manager.non_markdown_store().clone();
    wait_for(|| store.get_statuses(&moved, "status") == vec!["x".to_string()]).await;

    assert!(store.get_statuses(&old, "status").is_empty());
    manager.shutdown().await;
    assert_eq!(
        index_json(dir.path()),
        json!({"version": 1, "files": {"archive/b.pdf": {"status": ["x"]}}})
    );
}

#[tokio::test]
async fn shutdown_drains_pending_delete() {
    let (dir, vault) = vault_with(&[("a.pdf", "%PDF"), ("b.pdf", "%PDF")]);
    let manager = StatusStoreManager::initialize(vault.clone(), PLUGIN_DIR).await;
    for path in ["a.pdf", "b.pdf"] {
        let file = vault.file(path);
        manager
            .non_markdown_store()
            .mutate_statuses(
                &file,
                KEY,
                StatusOperation::Add("done".into()).into_mutator(true),
                ARRAY,
            )
            .await
            .expect("add");
    }

    vault.delete("a.pdf").await.expect("delete");
    manager.shutdown().await;

    assert_eq!(
        index_json(dir.path()),
        json!({"version": 1, "files": {"b.pdf": {KEY: ["done"]}}})
    );
}

#[tokio::test]
async fn malformed_index_is_replaced_on_first_write() {
    let (dir, vault) = vault_with(&[
        (".obsidian/plugins/obsidian-note-status/non-markdown-statuses.json", "{{{"),
        ("a.png", ""),
    ]);
    let manager = StatusStoreManager::initialize(vault.clone(), PLUGIN_DIR).await;
    let file = vault.file("a.png");
    assert!(manager.statuses(&file, KEY).expect("statuses").is_empty());

    manager
        .store_for_file(&file)
        .expect("store")
        .mutate_statuses(
            &file,
            KEY,
            StatusOperation::Toggle("done".into()).into_mutator(true),
            ARRAY,
        )
        .await
        .expect("toggle");

    assert_eq!(
        index_json(dir.path()),
        json!({"version": 1, "files": {"a.png": {KEY: ["done"]}}})
    );
    manager.shutdown().await;
}

#[tokio::test]
async fn index_survives_restart() {
    let (_dir, vault) = vault_with(&[("a.pdf", "%PDF")]);
    let file = vault.file("a.pdf");

    let manager = StatusStoreManager::initialize(vault.clone(), PLUGIN_DIR).await;
    manager
        .store_for_file(&file)
        .expect("store")
        .mutate_statuses(
            &file,
            KEY,
            StatusOperation::Set(vec!["b".into(), "a".into()]).into_mutator(true),
            MutateOptions::default(),
        )
        .await
        .expect("set");
    manager.shutdown().await;

    let manager = StatusStoreManager::initialize(vault.clone(), PLUGIN_DIR).await;
    assert_eq!(manager.statuses(&file, KEY).expect("statuses"), vec!["b", "a"]);
    manager.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_mutations_on_distinct_files_all_persist() {
    let names: Vec<String> = (0..64).map(|i| format!("f{i}.pdf")).collect();
    let fixtures: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), "%PDF")).collect();
    let (dir, vault) = vault_with(&fixtures);
    let manager = StatusStoreManager::initialize(vault.clone(), PLUGIN_DIR).await;
    let store = manager.non_markdown_store().clone();

    let tasks: Vec<_> = names
        .iter()
        .map(|name| {
            let store = store.clone();
            let file = vault.file(name);
            tokio::spawn(async move {
                store
                    .mutate_statuses(
                        &file,
                        KEY,
                        StatusOperation::Add("active".into()).into_mutator(true),
                        ARRAY,
                    )
                    .await
            })
        })
        .collect();
    for task in tasks {
        assert!(task.await.expect("join").expect("mutation"));
    }
    manager.shutdown().await;

    let index = index_json(dir.path());
    let files = index["files"].as_object().expect("files");
    assert_eq!(files.len(), names.len());
    for name in &names {
        assert_eq!(files[name], json!({KEY: ["active"]}));
    }
    let leftovers: Vec<_> = std::fs::read_dir(dir.path().join(PLUGIN_DIR))
        .expect("plugin dir")
        .map(|entry| entry.expect("entry").file_name())
        .collect();
    assert_eq!(leftovers.len(), 1, "{leftovers:?}");
}

#[tokio::test]
async fn rename_burst_moves_every_entry() {
    const COUNT: usize = 400;
    let names: Vec<String> = (0..COUNT).map(|i| format!("scan{i}.pdf")).collect();
    let entries: serde_json::Map<String, JsonValue> = names
        .iter()
        .map(|name| (name.clone(), json!({KEY: ["review"]})))
        .collect();
    let index = json!({"version": 1, "files": entries}).to_string();
    let index_path = format!("{PLUGIN_DIR}/non-markdown-statuses.json");
    let mut fixtures: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), "%PDF")).collect();
    fixtures.push((index_path.as_str(), index.as_str()));
    let (dir, vault) = vault_with(&fixtures);
    let manager = StatusStoreManager::initialize(vault.clone(), PLUGIN_DIR).await;
    let store = manager.non_markdown_store().clone();

    for name in &names {
        vault
            .rename(name, &format!("moved/{name}"))
            .await
            .expect("rename");
    }
    manager.shutdown().await;

    let snapshot = store.snapshot();
    assert_eq!(snapshot.files.len(), COUNT);
    assert!(snapshot.files.keys().all(|path| path.starts_with("moved/")));
    let on_disk = index_json(dir.path());
    assert_eq!(on_disk["files"].as_object().expect("files").len(), COUNT);
    assert_eq!(on_disk["files"]["moved/scan0.pdf"], json!({KEY: ["review"]}));
}
