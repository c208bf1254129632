//! Status label persistence for vault notes.
//!
//! Notes carry one or more status labels under a metadata key. Markdown notes
//! keep them in their YAML frontmatter; every other file type is shadowed in a
//! plugin-private JSON index. Both substrates sit behind the [`StatusStore`]
//! contract and are dispatched by [`StatusStoreManager`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use note_status_store::{LocalVault, MutateOptions, StatusOperation, StatusStoreManager};
//!
//! # async fn example() -> note_status_store::Result<()> {
//! let vault = Arc::new(LocalVault::open("/path/to/vault")?);
//! let manager = StatusStoreManager::initialize(Arc::clone(&vault), ".note-status").await;
//!
//! let file = vault.file("projects/plan.md");
//! let store = manager.store_for_file(&file)?;
//! let changed = store
//!     .mutate_statuses(
//!         &file,
//!         "obsidian-note-status",
//!         StatusOperation::Add("active".into()).into_mutator(true),
//!         MutateOptions { store_as_array: true },
//!     )
//!     .await?;
//! # let _ = changed;
//! manager.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod frontmatter_store;
pub mod host;
pub mod local;
pub mod manager;
pub mod mutation;
pub mod non_markdown_store;
pub mod operation;
pub mod store;

pub use config::NoteStatusConfig;
pub use error::{Result, StoreError};
pub use frontmatter_store::FrontmatterStatusStore;
pub use host::{
    Frontmatter, FrontmatterHost, PluginHost, VaultAdapter, VaultEvent, VaultEventSource,
    VaultFile,
};
pub use local::LocalVault;
pub use manager::StatusStoreManager;
pub use mutation::{MutateOptions, Mutator, StatusMutation};
pub use non_markdown_store::{EventSubscription, NonMarkdownStatusStore, StatusIndex};
pub use operation::StatusOperation;
pub use store::{FileCategory, StatusStore};

/// Extension of files whose statuses live in frontmatter.
pub const MARKDOWN_EXTENSION: &str = "md";

/// Metadata key used when none is configured.
pub const DEFAULT_TAG_PREFIX: &str = "obsidian-note-status";
