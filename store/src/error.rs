//! Error types for status persistence.

use std::path::PathBuf;
use thiserror::Error;

/// Status store result type alias
pub type Result<T> = std::result::Result<T, StoreError>;

/// Status store error taxonomy.
///
/// Reads never produce these for "no data": an empty list is the universal
/// "no status" answer. Only write paths, lookups of unhandled files, and
/// configuration loading fail.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No registered store accepts the file. Signals a missing registration.
    #[error("no status store registered for {path}")]
    NoStoreForFile { path: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize status index: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to serialize frontmatter: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid frontmatter in {path}: {reason}")]
    Frontmatter { path: String, reason: String },

    #[error("config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        StoreError::Config {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        StoreError::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// True when the underlying failure is a missing file or directory.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}
