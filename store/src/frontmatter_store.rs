//! Status store over Markdown frontmatter.

use std::sync::Arc;

use async_trait::async_trait;
use serde_yaml::Value;

use crate::error::Result;
use crate::host::{Frontmatter, FrontmatterHost, VaultFile};
use crate::mutation::{MutateOptions, Mutator};
use crate::store::{FileCategory, StatusStore};

/// Keeps statuses under a frontmatter key of each Markdown note.
pub struct FrontmatterStatusStore {
    host: Arc<dyn FrontmatterHost>,
}

impl FrontmatterStatusStore {
    pub fn new(host: Arc<dyn FrontmatterHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl StatusStore for FrontmatterStatusStore {
    fn name(&self) -> &'static str {
        "frontmatter"
    }

    fn can_handle(&self, file: &VaultFile) -> bool {
        FileCategory::of(file) == FileCategory::Markdown
    }

    fn get_statuses(&self, file: &VaultFile, key: &str) -> Vec<String> {
        self.host
            .frontmatter(file)
            .map(|frontmatter| statuses_from_value(frontmatter.get(key)))
            .unwrap_or_default()
    }

    async fn mutate_statuses(
        &self,
        file: &VaultFile,
        key: &str,
        mutator: Mutator<'_>,
        options: MutateOptions,
    ) -> Result<bool> {
        let mut mutator = Some(mutator);
        let mut changed = false;

        self.host
            .process_frontmatter(file, &mut |frontmatter: &mut Frontmatter| {
                let Some(mutator) = mutator.take() else {
                    return;
                };
                // Live value, not the cached copy: external edits since the
                // last cache refresh must not be lost.
                let current = statuses_from_value(frontmatter.get(key));
                if let Some(next) = mutator(current.clone()).into_next(&current) {
                    write_statuses(frontmatter, key, next, options.store_as_array);
                    changed = true;
                }
            })
            .await?;

        if changed {
            tracing::debug!(path = file.path(), key, "frontmatter statuses updated");
        }
        Ok(changed)
    }
}

/// Normalize a raw frontmatter value into a status list.
pub(crate) fn statuses_from_value(value: Option<&Value>) -> Vec<String> {
    match value {
        None => Vec::new(),
        Some(value) if is_falsy(value) => Vec::new(),
        Some(Value::Sequence(items)) => items.iter().filter_map(stringify).collect(),
        Some(value) => stringify(value).into_iter().collect(),
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f == 0.0 || f.is_nan()),
        Value::String(s) => s.is_empty(),
        Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_) => false,
    }
}

fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Tagged(tagged) => stringify(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => serde_yaml::to_string(value)
            .ok()
            .map(|s| s.trim_end().to_string()),
    }
}

fn write_statuses(frontmatter: &mut Frontmatter, key: &str, next: Vec<String>, as_array: bool) {
    let value = match (next.is_empty(), as_array) {
        (true, true) => Value::Sequence(Vec::new()),
        (true, false) => {
            frontmatter.remove(key);
            return;
        }
        (false, true) => Value::Sequence(next.into_iter().map(Value::String).collect()),
        // Single-status mode keeps only the primary status.
        (false, false) => next.into_iter().next().map(Value::String).unwrap_or_default(),
    };
    frontmatter.insert(Value::String(key.to_string()), value);
}
