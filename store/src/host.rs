//! Services consumed from the host application.
//!
//! The stores never touch the filesystem or the metadata cache directly; they
//! go through these traits. [`crate::LocalVault`] implements all of them over a
//! vault directory on disk.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

/// Parsed frontmatter block of a Markdown file.
pub type Frontmatter = serde_yaml::Mapping;

/// Identity of a file inside the vault.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VaultFile {
    path: String,
    extension: String,
}

impl VaultFile {
    /// Build a file handle from a vault-relative path (`/`-separated).
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or_default();
        let extension = match name.rfind('.') {
            Some(idx) if idx > 0 => name[idx + 1..].to_string(),
            _ => String::new(),
        };
        Self { path, extension }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Extension without the leading dot; empty when the name has none.
    pub fn extension(&self) -> &str {
        &self.extension
    }
}

/// File lifecycle notification published by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultEvent {
    /// `file` now lives at its new path; `old_path` is where it used to be.
    Renamed { file: VaultFile, old_path: String },
    Deleted { file: VaultFile },
}

/// Read cached frontmatter and rewrite it transactionally.
#[async_trait]
pub trait FrontmatterHost: Send + Sync {
    /// Cached parsed frontmatter, `None` when the file has no readable block.
    fn frontmatter(&self, file: &VaultFile) -> Option<Frontmatter>;

    /// Run `edit` against the live frontmatter and commit whatever it leaves
    /// behind as one unit. Edits that leave the mapping untouched write nothing.
    async fn process_frontmatter(
        &self,
        file: &VaultFile,
        edit: &mut (dyn for<'f> FnMut(&'f mut Frontmatter) + Send),
    ) -> Result<()>;
}

/// Vault-relative text file access.
#[async_trait]
pub trait VaultAdapter: Send + Sync {
    /// Fails when the file does not exist.
    async fn read(&self, path: &str) -> Result<String>;

    /// Creates or replaces the file.
    async fn write(&self, path: &str, data: &str) -> Result<()>;

    async fn exists(&self, path: &str) -> Result<bool>;

    async fn mkdir(&self, path: &str) -> Result<()>;
}

/// Source of rename/delete notifications.
pub trait VaultEventSource: Send + Sync {
    /// A new receiver that sees every event published after this call.
    /// Events are never dropped for a slow receiver.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<VaultEvent>;
}

/// Everything the store manager needs from its host.
pub trait PluginHost: FrontmatterHost + VaultAdapter + VaultEventSource {}

impl<T> PluginHost for T where T: FrontmatterHost + VaultAdapter + VaultEventSource + ?Sized {}
