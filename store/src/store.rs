//! The uniform read/mutate contract every status store implements.

use async_trait::async_trait;

use crate::MARKDOWN_EXTENSION;
use crate::error::Result;
use crate::host::VaultFile;
use crate::mutation::{MutateOptions, Mutator};

/// Closed set of file kinds the shipped stores partition the vault into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileCategory {
    /// Statuses live in the file's frontmatter.
    Markdown,
    /// Statuses live in the side-car index.
    Other,
}

impl FileCategory {
    pub fn of(file: &VaultFile) -> Self {
        match file.extension() {
            MARKDOWN_EXTENSION => FileCategory::Markdown,
            _ => FileCategory::Other,
        }
    }
}

/// Persistence strategy mapping a (file, metadata key) pair to an ordered
/// list of status labels.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Side-effect free capability check.
    fn can_handle(&self, file: &VaultFile) -> bool;

    /// Current statuses, empty when none are recorded.
    fn get_statuses(&self, file: &VaultFile, key: &str) -> Vec<String>;

    /// Run `mutator` on a copy of the current statuses and persist the result
    /// if it differs. Returns whether anything was written.
    async fn mutate_statuses(
        &self,
        file: &VaultFile,
        key: &str,
        mutator: Mutator<'_>,
        options: MutateOptions,
    ) -> Result<bool>;
}
