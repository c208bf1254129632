//! Filesystem-backed host over a vault directory.
//!
//! Implements every host trait the stores need so they can run outside the
//! note-taking application: frontmatter is parsed with `serde_yaml`, rewrites
//! are serialized and land via temp-file + rename, and file moves/deletes are
//! published as [`VaultEvent`]s to every subscriber.

use std::collections::HashMap;
use std::fs::Metadata;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

use async_trait::async_trait;
use serde_yaml::Value;
use tokio::sync::mpsc;
use walkdir::WalkDir;

use crate::error::{Result, StoreError};
use crate::host::{
    Frontmatter, FrontmatterHost, VaultAdapter, VaultEvent, VaultEventSource, VaultFile,
};

const DELIMITER: &str = "---";

/// Identifies one version of a file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

impl FileStamp {
    fn of(metadata: &Metadata) -> Self {
        Self {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        }
    }
}

/// Parsed frontmatter, valid while the file still carries `stamp`.
#[derive(Debug, Clone)]
struct CachedFrontmatter {
    stamp: FileStamp,
    frontmatter: Frontmatter,
}

/// A vault rooted at a local directory.
pub struct LocalVault {
    root: PathBuf,
    cache: Mutex<HashMap<String, CachedFrontmatter>>,
    rewrite_lock: tokio::sync::Mutex<()>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<VaultEvent>>>,
}

impl LocalVault {
    /// Open an existing vault directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(StoreError::io(
                &root,
                std::io::Error::new(std::io::ErrorKind::NotFound, "vault directory not found"),
            ));
        }
        Ok(Self {
            root,
            cache: Mutex::new(HashMap::new()),
            rewrite_lock: tokio::sync::Mutex::new(()),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a vault-relative path.
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    /// File handle for a vault-relative path.
    pub fn file(&self, path: &str) -> VaultFile {
        VaultFile::new(normalize(path))
    }

    /// Every file in the vault, sorted by path. Dot-directories such as the
    /// plugin directory are skipped.
    pub fn list_files(&self) -> Result<Vec<VaultFile>> {
        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
            });
        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(self.root.as_path()).to_path_buf();
                StoreError::io(path, std::io::Error::from(e))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                let relative: Vec<_> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                files.push(VaultFile::new(relative.join("/")));
            }
        }
        files.sort_by(|a, b| a.path().cmp(b.path()));
        Ok(files)
    }

    /// Move a file and announce the rename.
    pub async fn rename(&self, from: &str, to: &str) -> Result<VaultFile> {
        let (from, to) = (normalize(from), normalize(to));
        let target = self.resolve(&to);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }
        tokio::fs::rename(self.resolve(&from), &target)
            .await
            .map_err(|e| StoreError::io(self.resolve(&from), e))?;

        {
            let mut cache = self.lock_cache();
            if let Some(frontmatter) = cache.remove(&from) {
                cache.insert(to.clone(), frontmatter);
            }
        }

        let file = VaultFile::new(to);
        self.publish(VaultEvent::Renamed {
            file: file.clone(),
            old_path: from,
        });
        Ok(file)
    }

    /// Delete a file and announce it.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let path = normalize(path);
        let absolute = self.resolve(&path);
        tokio::fs::remove_file(&absolute)
            .await
            .map_err(|e| StoreError::io(absolute, e))?;
        self.lock_cache().remove(&path);
        self.publish(VaultEvent::Deleted {
            file: VaultFile::new(path),
        });
        Ok(())
    }

    fn publish(&self, event: VaultEvent) {
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        if subscribers.is_empty() {
            tracing::trace!(?event, "vault event dropped, no subscribers");
        }
    }

    fn lock_cache(&self) -> MutexGuard<'_, HashMap<String, CachedFrontmatter>> {
        lock(&self.cache)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[async_trait]
impl FrontmatterHost for LocalVault {
    /// Served from the cache while the file's size and modification time are
    /// unchanged; edits made outside this vault handle are picked up on the
    /// next call.
    fn frontmatter(&self, file: &VaultFile) -> Option<Frontmatter> {
        let absolute = self.resolve(file.path());
        let stamp = FileStamp::of(&std::fs::metadata(&absolute).ok()?);
        if let Some(cached) = self.lock_cache().get(file.path())
            && cached.stamp == stamp
        {
            return Some(cached.frontmatter.clone());
        }

        let content = std::fs::read_to_string(&absolute).ok()?;
        let (yaml, _) = split_frontmatter(&content)?;
        match parse_frontmatter(yaml) {
            Ok(frontmatter) => {
                self.lock_cache().insert(
                    file.path().to_string(),
                    CachedFrontmatter {
                        stamp,
                        frontmatter: frontmatter.clone(),
                    },
                );
                Some(frontmatter)
            }
            Err(err) => {
                tracing::debug!(path = file.path(), "unreadable frontmatter: {err}");
                None
            }
        }
    }

    async fn process_frontmatter(
        &self,
        file: &VaultFile,
        edit: &mut (dyn for<'f> FnMut(&'f mut Frontmatter) + Send),
    ) -> Result<()> {
        let _guard = self.rewrite_lock.lock().await;
        let absolute = self.resolve(file.path());
        let content = tokio::fs::read_to_string(&absolute)
            .await
            .map_err(|e| StoreError::io(&absolute, e))?;

        let (yaml, body) = split_frontmatter(&content).unwrap_or(("", &content));
        let mut frontmatter =
            parse_frontmatter(yaml).map_err(|reason| StoreError::Frontmatter {
                path: file.path().to_string(),
                reason,
            })?;
        let before = frontmatter.clone();

        edit(&mut frontmatter);

        if frontmatter != before {
            let rendered = render(&frontmatter, body)?;
            atomic_write(&absolute, &rendered).await?;
        }
        match tokio::fs::metadata(&absolute).await {
            Ok(metadata) => {
                self.lock_cache().insert(
                    file.path().to_string(),
                    CachedFrontmatter {
                        stamp: FileStamp::of(&metadata),
                        frontmatter,
                    },
                );
            }
            Err(_) => {
                self.lock_cache().remove(file.path());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl VaultAdapter for LocalVault {
    async fn read(&self, path: &str) -> Result<String> {
        let absolute = self.resolve(path);
        tokio::fs::read_to_string(&absolute)
            .await
            .map_err(|e| StoreError::io(absolute, e))
    }

    async fn write(&self, path: &str, data: &str) -> Result<()> {
        atomic_write(&self.resolve(path), data).await
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let absolute = self.resolve(path);
        tokio::fs::try_exists(&absolute)
            .await
            .map_err(|e| StoreError::io(absolute, e))
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        let absolute = self.resolve(path);
        tokio::fs::create_dir_all(&absolute)
            .await
            .map_err(|e| StoreError::io(absolute, e))
    }
}

impl VaultEventSource for LocalVault {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<VaultEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.subscribers).push(tx);
        rx
    }
}

fn normalize(path: &str) -> String {
    path.trim_start_matches("./").replace('\\', "/")
}

/// Split `content` into (frontmatter YAML, body).
///
/// The block must open on the first line with `---` and close with a line
/// that is exactly `---`. Returns `None` when there is no complete block.
pub fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let rest = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))?;
    let yaml_start = content.len() - rest.len();

    let mut offset = yaml_start;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == DELIMITER {
            return Some((&content[yaml_start..offset], &content[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

/// Parse a frontmatter block; empty or null YAML is an empty mapping.
pub fn parse_frontmatter(yaml: &str) -> std::result::Result<Frontmatter, String> {
    if yaml.trim().is_empty() {
        return Ok(Frontmatter::new());
    }
    match serde_yaml::from_str::<Value>(yaml).map_err(|e| e.to_string())? {
        Value::Mapping(mapping) => Ok(mapping),
        Value::Null => Ok(Frontmatter::new()),
        other => Err(format!("expected a mapping, found {other:?}")),
    }
}

/// Render a note from its frontmatter and body. An empty mapping drops the
/// block entirely.
pub fn render(frontmatter: &Frontmatter, body: &str) -> Result<String> {
    if frontmatter.is_empty() {
        return Ok(body.to_string());
    }
    let yaml = serde_yaml::to_string(frontmatter)?;
    Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n{body}"))
}

/// Write via a uniquely named sibling temp file, fsync, then rename, so
/// readers never see a torn file and concurrent writers never share a temp
/// file.
async fn atomic_write(path: &Path, data: &str) -> Result<()> {
    let target = path.to_path_buf();
    let data = data.to_owned();
    tokio::task::spawn_blocking(move || write_replacing(&target, &data))
        .await
        .map_err(|e| StoreError::io(path, std::io::Error::from(e)))?
}

fn write_replacing(path: &Path, data: &str) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::Builder::new()
        .prefix(".")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| StoreError::io(parent, e))?;
    temp.write_all(data.as_bytes())
        .map_err(|e| StoreError::io(temp.path(), e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| StoreError::io(temp.path(), e))?;
    temp.persist(path)
        .map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}
