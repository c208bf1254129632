//! Status store for files without an in-file metadata block.
//!
//! Statuses of PDFs, images, and every other non-Markdown file are shadowed in
//! a JSON index inside the plugin directory:
//!
//! ```text
//! <plugin_dir>/non-markdown-statuses.json
//! { "version": 1, "files": { "<path>": { "<key>": ["<status>", ...] } } }
//! ```
//!
//! The index is a derived cache. A missing or malformed file loads as an empty
//! index, and rename/delete reconciliation failures are logged, not returned.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::host::{VaultAdapter, VaultEvent, VaultEventSource, VaultFile};
use crate::mutation::{MutateOptions, Mutator};
use crate::store::{FileCategory, StatusStore};

/// Index filename inside the plugin directory.
pub const INDEX_FILENAME: &str = "non-markdown-statuses.json";

/// Version written to every persisted index.
pub const INDEX_VERSION: u32 = 1;

/// Persisted path -> key -> statuses map.
///
/// Only non-empty lists are stored; a path disappears with its last key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusIndex {
    pub version: u32,
    pub files: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl Default for StatusIndex {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION,
            files: BTreeMap::new(),
        }
    }
}

impl StatusIndex {
    /// Lenient parse. Returns `None` only for text that is not JSON at all;
    /// unexpected shapes are dropped entry by entry.
    pub fn parse(text: &str) -> Option<Self> {
        let root: serde_json::Value = serde_json::from_str(text).ok()?;
        let mut index = StatusIndex::default();

        let Some(files) = root.get("files").and_then(serde_json::Value::as_object) else {
            return Some(index);
        };
        for (path, keys) in files {
            let Some(keys) = keys.as_object() else {
                continue;
            };
            for (key, statuses) in keys {
                let statuses: Vec<String> = statuses
                    .as_array()
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|s| s.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default();
                index.set(path, key, statuses);
            }
        }
        Some(index)
    }

    pub fn get(&self, path: &str, key: &str) -> Vec<String> {
        self.files
            .get(path)
            .and_then(|keys| keys.get(key))
            .cloned()
            .unwrap_or_default()
    }

    /// Store `statuses`, pruning the key (and then the path) when empty.
    pub fn set(&mut self, path: &str, key: &str, statuses: Vec<String>) {
        if statuses.is_empty() {
            if let Some(keys) = self.files.get_mut(path) {
                keys.remove(key);
                if keys.is_empty() {
                    self.files.remove(path);
                }
            }
            return;
        }
        self.files
            .entry(path.to_string())
            .or_default()
            .insert(key.to_string(), statuses);
    }

    /// Move all entries from `old_path` to `new_path`. False when there was
    /// nothing to move.
    pub fn rename(&mut self, old_path: &str, new_path: &str) -> bool {
        match self.files.remove(old_path) {
            Some(keys) => {
                self.files.insert(new_path.to_string(), keys);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, path: &str) -> bool {
        self.files.remove(path).is_some()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Status store backed by the side-car index.
pub struct NonMarkdownStatusStore {
    adapter: Arc<dyn VaultAdapter>,
    plugin_dir: String,
    index_path: String,
    index: Mutex<StatusIndex>,
    /// Held from snapshot to write so flushes land in order.
    flush_lock: tokio::sync::Mutex<()>,
}

impl NonMarkdownStatusStore {
    /// Create a store with an empty in-memory index. Call [`Self::load`] or
    /// [`Self::initialize`] before use.
    pub fn new(adapter: Arc<dyn VaultAdapter>, plugin_dir: impl Into<String>) -> Self {
        let plugin_dir = plugin_dir.into().trim_end_matches('/').to_string();
        let index_path = if plugin_dir.is_empty() {
            INDEX_FILENAME.to_string()
        } else {
            format!("{plugin_dir}/{INDEX_FILENAME}")
        };
        Self {
            adapter,
            plugin_dir,
            index_path,
            index: Mutex::new(StatusIndex::default()),
            flush_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Load the index and start following rename/delete notifications.
    pub async fn initialize(self: &Arc<Self>, events: &dyn VaultEventSource) -> EventSubscription {
        self.load().await;
        EventSubscription::spawn(Arc::clone(self), events.subscribe())
    }

    /// Replace the in-memory index with the persisted one. Never fails: an
    /// unreadable or malformed file yields an empty index.
    pub async fn load(&self) {
        let loaded = match self.adapter.read(&self.index_path).await {
            Ok(text) => StatusIndex::parse(&text).unwrap_or_else(|| {
                tracing::debug!(path = %self.index_path, "status index is not valid JSON, starting empty");
                StatusIndex::default()
            }),
            Err(err) => {
                tracing::debug!(path = %self.index_path, "status index unavailable, starting empty: {err}");
                StatusIndex::default()
            }
        };
        tracing::debug!(files = loaded.files.len(), "status index loaded");
        *self.lock_index() = loaded;
    }

    /// Vault-relative path of the backing file.
    pub fn index_path(&self) -> &str {
        &self.index_path
    }

    /// Copy of the in-memory index.
    pub fn snapshot(&self) -> StatusIndex {
        self.lock_index().clone()
    }

    /// Move the entry of a renamed file. Returns whether anything moved.
    pub async fn handle_rename(&self, file: &VaultFile, old_path: &str) -> Result<bool> {
        if !self.lock_index().rename(old_path, file.path()) {
            return Ok(false);
        }
        self.flush().await?;
        tracing::debug!(from = old_path, to = file.path(), "moved indexed statuses");
        Ok(true)
    }

    /// Drop the entry of a deleted file. Returns whether anything was removed.
    pub async fn handle_delete(&self, file: &VaultFile) -> Result<bool> {
        if !self.lock_index().remove(file.path()) {
            return Ok(false);
        }
        self.flush().await?;
        tracing::debug!(path = file.path(), "dropped indexed statuses");
        Ok(true)
    }

    /// Reconcile one host notification, logging persistence failures.
    pub async fn handle_event(&self, event: &VaultEvent) {
        let outcome = match event {
            VaultEvent::Renamed { file, old_path } => self.handle_rename(file, old_path).await,
            VaultEvent::Deleted { file } => self.handle_delete(file).await,
        };
        if let Err(err) = outcome {
            tracing::warn!("failed to persist status index after {event:?}: {err}");
        }
    }

    /// Write the current index. Flushes are serialized and each one
    /// snapshots the index after taking the lock, so the last flush to
    /// finish always carries the newest state.
    async fn flush(&self) -> Result<()> {
        let _guard = self.flush_lock.lock().await;
        let json = self.lock_index().to_json()?;
        if !self.plugin_dir.is_empty() && !self.adapter.exists(&self.plugin_dir).await? {
            self.adapter.mkdir(&self.plugin_dir).await?;
        }
        self.adapter.write(&self.index_path, &json).await
    }

    fn lock_index(&self) -> MutexGuard<'_, StatusIndex> {
        // The index holds plain data; a panic elsewhere cannot leave it torn.
        self.index.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl StatusStore for NonMarkdownStatusStore {
    fn name(&self) -> &'static str {
        "non-markdown"
    }

    fn can_handle(&self, file: &VaultFile) -> bool {
        FileCategory::of(file) == FileCategory::Other
    }

    fn get_statuses(&self, file: &VaultFile, key: &str) -> Vec<String> {
        self.lock_index().get(file.path(), key)
    }

    async fn mutate_statuses(
        &self,
        file: &VaultFile,
        key: &str,
        mutator: Mutator<'_>,
        _options: MutateOptions,
    ) -> Result<bool> {
        let current = self.get_statuses(file, key);
        let Some(next) = mutator(current.clone()).into_next(&current) else {
            return Ok(false);
        };

        // In-memory first, then flush. A failed flush leaves the new state in
        // memory; the next successful write persists it.
        self.lock_index().set(file.path(), key, next);
        self.flush().await?;
        Ok(true)
    }
}

/// Live rename/delete subscription of a [`NonMarkdownStatusStore`].
///
/// Dropping the handle aborts the listener; [`EventSubscription::close`]
/// first drains notifications that are already queued.
pub struct EventSubscription {
    handle: Option<JoinHandle<()>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl EventSubscription {
    fn spawn(
        store: Arc<NonMarkdownStatusStore>,
        mut rx: mpsc::UnboundedReceiver<VaultEvent>,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    received = rx.recv() => match received {
                        Some(event) => store.handle_event(&event).await,
                        None => break,
                    },
                    _ = &mut shutdown_rx => {
                        while let Ok(event) = rx.try_recv() {
                            store.handle_event(&event).await;
                        }
                        break;
                    }
                }
            }
            tracing::debug!("vault event subscription ended");
        });

        Self {
            handle: Some(handle),
            shutdown: Some(shutdown_tx),
        }
    }

    /// Whether the listener task is still running.
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Handle queued notifications, then stop listening.
    pub async fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take()
            && let Err(err) = handle.await
            && !err.is_cancelled()
        {
            tracing::warn!("vault event listener failed: {err}");
        }
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
