//! `note-status` command line.
//!
//! ## Commands
//!
//! - `note-status get <PATH>` - print the statuses of a file
//! - `note-status set <PATH> [STATUS]...` - replace the statuses of a file
//! - `note-status add|remove|toggle <PATH> <STATUS>` - edit one status
//! - `note-status clear <PATH>` - drop every status
//! - `note-status mv <FROM> <TO>` - move a file, carrying side-car statuses along
//! - `note-status rm <PATH>` - delete a file and its side-car statuses
//! - `note-status list [--status <STATUS>]` - group vault files by status

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use note_status_store::{
    LocalVault, MutateOptions, NoteStatusConfig, StatusOperation, StatusStoreManager, VaultFile,
};
use serde::Serialize;

/// Read and edit note status labels in a vault.
#[derive(Debug, Parser)]
#[command(name = "note-status", version)]
pub struct Cli {
    /// Vault root directory.
    #[arg(long = "vault", short = 'C', global = true, default_value = ".")]
    pub vault: PathBuf,

    /// Metadata key holding the statuses (defaults to the configured tag prefix).
    #[arg(long = "key", short = 'k', global = true)]
    pub key: Option<String>,

    /// Output as JSON.
    #[arg(long = "json", short = 'j', global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the statuses of a file.
    Get {
        /// Vault-relative path.
        path: String,
    },
    /// Replace the statuses of a file.
    ///
    /// In single-status mode only the first status is kept.
    Set {
        /// Vault-relative path.
        path: String,
        /// New statuses, in order. None clears the file.
        statuses: Vec<String>,
    },
    /// Add a status (replaces the current one in single-status mode).
    Add { path: String, status: String },
    /// Remove a status.
    Remove { path: String, status: String },
    /// Add the status if absent, remove it if present.
    Toggle { path: String, status: String },
    /// Remove every status.
    Clear { path: String },
    /// Move a file inside the vault.
    Mv { from: String, to: String },
    /// Delete a file from the vault.
    Rm { path: String },
    /// List vault files grouped by status.
    List {
        /// Only show files carrying this status.
        #[arg(long = "status", short = 's')]
        status: Option<String>,
    },
}

#[derive(Debug, Serialize)]
struct StatusReport<'a> {
    path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    changed: Option<bool>,
    statuses: &'a [String],
}

/// Everything a command needs, set up once per invocation.
struct Session {
    config: NoteStatusConfig,
    vault: Arc<LocalVault>,
    manager: StatusStoreManager,
    key: String,
    json: bool,
}

/// Run one invocation against the vault named on the command line.
pub async fn run(cli: Cli) -> Result<()> {
    let config = NoteStatusConfig::load(&cli.vault)
        .with_context(|| format!("loading configuration for {}", cli.vault.display()))?;
    let vault = Arc::new(LocalVault::open(&cli.vault)?);
    let manager =
        StatusStoreManager::initialize(Arc::clone(&vault), config.plugin_dir.clone()).await;
    let key = cli.key.unwrap_or_else(|| config.tag_prefix.clone());
    tracing::debug!(vault = %vault.root().display(), %key, "session opened");

    let session = Session {
        config,
        vault,
        manager,
        key,
        json: cli.json,
    };
    let outcome = session.execute(cli.command).await;
    // Rename and delete reconciliation runs on the subscription; let it drain.
    session.manager.shutdown().await;
    outcome
}

impl Session {
    async fn execute(&self, command: Command) -> Result<()> {
        match command {
            Command::Get { path } => self.get(&path),
            Command::Set { path, statuses } => {
                self.apply(&path, StatusOperation::Set(statuses)).await
            }
            Command::Add { path, status } => self.apply(&path, StatusOperation::Add(status)).await,
            Command::Remove { path, status } => {
                self.apply(&path, StatusOperation::Remove(status)).await
            }
            Command::Toggle { path, status } => {
                self.apply(&path, StatusOperation::Toggle(status)).await
            }
            Command::Clear { path } => self.apply(&path, StatusOperation::Clear).await,
            Command::Mv { from, to } => self.move_file(&from, &to).await,
            Command::Rm { path } => self.remove_file(&path).await,
            Command::List { status } => self.list(status.as_deref()),
        }
    }

    fn get(&self, path: &str) -> Result<()> {
        let file = self.existing_file(path)?;
        let statuses = self.manager.statuses(&file, &self.key)?;
        if self.json {
            return print_json(&StatusReport {
                path: file.path(),
                changed: None,
                statuses: &statuses,
            });
        }
        if statuses.is_empty() {
            println!("{}", self.config.default_status);
        }
        for status in &statuses {
            println!("{status}");
        }
        Ok(())
    }

    async fn apply(&self, path: &str, operation: StatusOperation) -> Result<()> {
        let file = self.existing_file(path)?;
        let store = self.manager.store_for_file(&file)?;
        tracing::debug!(path = file.path(), store = store.name(), ?operation, "applying");

        let changed = store
            .mutate_statuses(
                &file,
                &self.key,
                operation.into_mutator(self.config.use_multiple_statuses),
                MutateOptions {
                    store_as_array: self.config.store_as_array(),
                },
            )
            .await
            .with_context(|| format!("updating statuses of {}", file.path()))?;

        if self.json {
            let statuses = store.get_statuses(&file, &self.key);
            return print_json(&StatusReport {
                path: file.path(),
                changed: Some(changed),
                statuses: &statuses,
            });
        }
        println!("{}", if changed { "updated" } else { "unchanged" });
        Ok(())
    }

    async fn move_file(&self, from: &str, to: &str) -> Result<()> {
        let source = self.existing_file(from)?;
        let target = self.vault.file(to);
        if self.vault.resolve(target.path()).exists() {
            bail!("destination already exists: {}", target.path());
        }
        let moved = self.vault.rename(source.path(), target.path()).await?;
        if self.json {
            return print_json(&serde_json::json!({
                "from": source.path(),
                "to": moved.path(),
            }));
        }
        println!("moved {} -> {}", source.path(), moved.path());
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> Result<()> {
        let file = self.existing_file(path)?;
        self.vault.delete(file.path()).await?;
        if self.json {
            return print_json(&serde_json::json!({ "deleted": file.path() }));
        }
        println!("deleted {}", file.path());
        Ok(())
    }

    fn list(&self, only: Option<&str>) -> Result<()> {
        let groups = self.group_by_status(only)?;
        if self.json {
            return print_json(&groups);
        }
        for (status, paths) in &groups {
            println!("{status} ({})", paths.len());
            for path in paths {
                println!("  {path}");
            }
        }
        Ok(())
    }

    /// Files keyed by status. Files without statuses fall under the default
    /// status; a file with several statuses appears in each group.
    fn group_by_status(&self, only: Option<&str>) -> Result<BTreeMap<String, Vec<String>>> {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for file in self.vault.list_files()? {
            let mut statuses = self.manager.statuses(&file, &self.key)?;
            if statuses.is_empty() {
                statuses.push(self.config.default_status.clone());
            }
            for status in statuses {
                if only.is_some_and(|wanted| wanted != status) {
                    continue;
                }
                groups
                    .entry(status)
                    .or_default()
                    .push(file.path().to_string());
            }
        }
        Ok(groups)
    }

    fn existing_file(&self, path: &str) -> Result<VaultFile> {
        let file = self.vault.file(path);
        if !self.vault.resolve(file.path()).is_file() {
            bail!("no such file in vault: {}", file.path());
        }
        Ok(file)
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_options_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "note-status",
            "add",
            "plan.md",
            "active",
            "--json",
            "--key",
            "state",
            "-C",
            "/tmp/vault",
        ])
        .unwrap();

        assert!(cli.json);
        assert_eq!(cli.key.as_deref(), Some("state"));
        assert_eq!(cli.vault, PathBuf::from("/tmp/vault"));
        match cli.command {
            Command::Add { path, status } => {
                assert_eq!(path, "plan.md");
                assert_eq!(status, "active");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn set_accepts_no_statuses() {
        let cli = Cli::try_parse_from(["note-status", "set", "plan.md"]).unwrap();
        match cli.command {
            Command::Set { statuses, .. } => assert!(statuses.is_empty()),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
