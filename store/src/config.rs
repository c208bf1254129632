//! Configuration loading
//!
//! Loads `.note-status.toml` from the vault root (or the file named by
//! `NOTE_STATUS_CONFIG`). Every field has a default, so a missing file is
//! not an error.

use crate::DEFAULT_TAG_PREFIX;
use crate::error::{Result, StoreError};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Status settings for one vault.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct NoteStatusConfig {
    /// Frontmatter key / index key statuses are recorded under
    #[serde(default = "default_tag_prefix")]
    pub tag_prefix: String,

    /// Allow more than one status per note
    #[serde(default = "default_use_multiple_statuses")]
    pub use_multiple_statuses: bool,

    /// Keep list shape in frontmatter even for a single status
    #[serde(default = "default_store_statuses_as_array")]
    pub store_statuses_as_array: bool,

    /// Vault-relative directory holding the side-car status index
    #[serde(default = "default_plugin_dir")]
    pub plugin_dir: String,

    /// Label reported for notes without any status
    #[serde(default = "default_status")]
    pub default_status: String,
}

fn default_tag_prefix() -> String {
    DEFAULT_TAG_PREFIX.to_string()
}

fn default_use_multiple_statuses() -> bool {
    true
}

fn default_store_statuses_as_array() -> bool {
    true
}

fn default_plugin_dir() -> String {
    ".obsidian/plugins/obsidian-note-status".to_string()
}

fn default_status() -> String {
    "unknown".to_string()
}

impl Default for NoteStatusConfig {
    fn default() -> Self {
        Self {
            tag_prefix: default_tag_prefix(),
            use_multiple_statuses: default_use_multiple_statuses(),
            store_statuses_as_array: default_store_statuses_as_array(),
            plugin_dir: default_plugin_dir(),
            default_status: default_status(),
        }
    }
}

impl NoteStatusConfig {
    /// Environment variable naming an explicit config file
    pub const ENV_CONFIG_PATH: &'static str = "NOTE_STATUS_CONFIG";

    /// Config filename looked up in the vault root
    pub const DEFAULT_CONFIG_FILENAME: &'static str = ".note-status.toml";

    /// Load the configuration for the vault at `vault_root`.
    pub fn load(vault_root: &Path) -> Result<Self> {
        let path = Self::resolve_config_path(vault_root);

        if !path.exists() {
            tracing::debug!(path = %path.display(), "note status config not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from_path(&path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            StoreError::config_with_source(
                format!("failed to read config at {}", path.display()),
                e,
            )
        })?;

        Self::parse(&contents)
    }

    /// Parse configuration from TOML string
    pub fn parse(contents: &str) -> Result<Self> {
        let cfg: NoteStatusConfig = toml::from_str(contents)
            .map_err(|e| StoreError::config_with_source("failed to parse config", e))?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Whether frontmatter writes keep list shape.
    pub fn store_as_array(&self) -> bool {
        self.use_multiple_statuses || self.store_statuses_as_array
    }

    fn resolve_config_path(vault_root: &Path) -> PathBuf {
        if let Ok(path) = std::env::var(Self::ENV_CONFIG_PATH) {
            return PathBuf::from(path);
        }
        vault_root.join(Self::DEFAULT_CONFIG_FILENAME)
    }

    fn validate(&self) -> Result<()> {
        if self.tag_prefix.trim().is_empty() {
            return Err(StoreError::config("tag_prefix must not be empty"));
        }
        if Path::new(&self.plugin_dir).is_absolute() || self.plugin_dir.split('/').any(|c| c == "..")
        {
            return Err(StoreError::config(format!(
                "plugin_dir must stay inside the vault: {}",
                self.plugin_dir
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = NoteStatusConfig::parse("").unwrap();
        assert_eq!(cfg, NoteStatusConfig::default());
        assert_eq!(cfg.tag_prefix, "obsidian-note-status");
        assert!(cfg.store_as_array());
    }

    #[test]
    fn single_status_mode_respects_array_setting() {
        let cfg = NoteStatusConfig::parse(
            "use_multiple_statuses = false\nstore_statuses_as_array = false\ntag_prefix = \"state\"\n",
        )
        .unwrap();
        assert!(!cfg.store_as_array());
        assert_eq!(cfg.tag_prefix, "state");

        let cfg = NoteStatusConfig::parse("use_multiple_statuses = false\n").unwrap();
        assert!(cfg.store_as_array());
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(NoteStatusConfig::parse("tag_prefix = \"  \"").is_err());
        assert!(NoteStatusConfig::parse("plugin_dir = \"../outside\"").is_err());
        assert!(NoteStatusConfig::parse("plugin_dir = \"/abs\"").is_err());
        assert!(NoteStatusConfig::parse("use_multiple_statuses = \"yes\"").is_err());
    }

    #[test]
    fn load_from_path_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "default_status = \"none\"\n").unwrap();

        let cfg = NoteStatusConfig::load_from_path(&path).unwrap();
        assert_eq!(cfg.default_status, "none");

        let err = NoteStatusConfig::load_from_path(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, StoreError::Config { .. }));
    }
}
