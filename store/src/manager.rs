//! Store registry and lifecycle.

use std::sync::Arc;

use crate::error::{Result, StoreError};
use crate::frontmatter_store::FrontmatterStatusStore;
use crate::host::{PluginHost, VaultFile};
use crate::non_markdown_store::{EventSubscription, NonMarkdownStatusStore};
use crate::store::StatusStore;

/// Owns every registered status store and picks one per file.
///
/// Construct once at startup with [`StatusStoreManager::initialize`] and pass
/// it by reference; [`StatusStoreManager::shutdown`] ends the rename/delete
/// subscription.
pub struct StatusStoreManager {
    stores: Vec<Arc<dyn StatusStore>>,
    markdown: Arc<FrontmatterStatusStore>,
    non_markdown: Arc<NonMarkdownStatusStore>,
    subscription: Option<EventSubscription>,
}

impl StatusStoreManager {
    /// Register the Markdown store, then load the side-car index, subscribe
    /// it to vault events, and register it.
    pub async fn initialize<H>(host: Arc<H>, plugin_dir: impl Into<String>) -> Self
    where
        H: PluginHost + 'static,
    {
        let markdown = Arc::new(FrontmatterStatusStore::new(host.clone()));
        let mut stores: Vec<Arc<dyn StatusStore>> = Vec::new();
        stores.push(markdown.clone());

        let non_markdown = Arc::new(NonMarkdownStatusStore::new(host.clone(), plugin_dir));
        let subscription = non_markdown.initialize(host.as_ref()).await;
        stores.push(non_markdown.clone());

        tracing::info!(stores = stores.len(), "status stores initialized");
        Self {
            stores,
            markdown,
            non_markdown,
            subscription: Some(subscription),
        }
    }

    /// First registered store whose `can_handle` accepts `file`.
    pub fn store_for_file(&self, file: &VaultFile) -> Result<Arc<dyn StatusStore>> {
        self.stores
            .iter()
            .find(|store| store.can_handle(file))
            .cloned()
            .ok_or_else(|| StoreError::NoStoreForFile {
                path: file.path().to_string(),
            })
    }

    /// Append a store. Lookup is first-match in registration order, so a
    /// store overlapping an earlier one only sees files the earlier rejects.
    pub fn register_store(&mut self, store: Arc<dyn StatusStore>) {
        tracing::debug!(store = store.name(), "registering status store");
        self.stores.push(store);
    }

    pub fn stores(&self) -> &[Arc<dyn StatusStore>] {
        &self.stores
    }

    pub fn markdown_store(&self) -> &Arc<FrontmatterStatusStore> {
        &self.markdown
    }

    pub fn non_markdown_store(&self) -> &Arc<NonMarkdownStatusStore> {
        &self.non_markdown
    }

    /// Statuses of `file` under `key`, through whichever store handles it.
    pub fn statuses(&self, file: &VaultFile, key: &str) -> Result<Vec<String>> {
        Ok(self.store_for_file(file)?.get_statuses(file, key))
    }

    /// Finish pending index reconciliation and stop following vault events.
    pub async fn shutdown(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.close().await;
        }
    }
}
