//! Filesystem adapter: one file per key under a root directory.
//!
//! A write goes to a uniquely named temporary file in the destination
//! directory and is renamed into place on a blocking task. The task runs to
//! completion even if the caller stops waiting, so a key holds either its old
//! bytes or the complete new ones, and the temporary file is always cleaned
//! up. Temporary files left by a crash are removed by [`FsAdapter::open`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use super::{validate_key, ObjectInfo, PersistenceAdapter, StorageError, StorageResult};

const TEMP_MARKER: &str = ".tmp-";

#[derive(Debug, Clone)]
pub struct FsAdapter {
    root: PathBuf,
}

impl FsAdapter {
    /// Use `root` as the store directory, creating it if needed and
    /// removing leftover temporary files.
    ///
    /// Only one adapter should write under a root at a time.
    pub async fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        let adapter = Self { root };

        let mut swept = 0;
        for (path, _) in adapter.files().await? {
            if is_temp(&path) {
                match fs::remove_file(&path).await {
                    Ok(()) => swept += 1,
                    Err(err) if err.kind() == ErrorKind::NotFound => {}
                    Err(err) => return Err(err.into()),
                }
            }
        }
        if swept > 0 {
            debug!(root = %adapter.root.display(), swept, "removed leftover temp files");
        }
        Ok(adapter)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |path, segment| path.join(segment)))
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let segments: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
        Some(segments?.join("/"))
    }

    /// Every regular file under the root with its size, temporary files included.
    async fn files(&self) -> StorageResult<Vec<(PathBuf, u64)>> {
        let mut found = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                let size = match entry.metadata().await {
                    Ok(metadata) => metadata.len(),
                    // Renamed or removed by a concurrent write.
                    Err(err) if err.kind() == ErrorKind::NotFound => continue,
                    Err(err) => return Err(err.into()),
                };
                found.push((path, size));
            }
        }
        Ok(found)
    }
}

fn is_temp(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.contains(TEMP_MARKER))
}

/// Write `bytes` to a temporary sibling of `path`, then rename it over `path`.
fn write_atomic(key: &str, path: &Path, bytes: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StorageError::InvalidKey {
            key: key.to_string(),
            reason: "no file name".to_string(),
        })?;
    let temp = path.with_file_name(format!("{}{}{}", file_name, TEMP_MARKER, Uuid::new_v4()));

    let written = std::fs::write(&temp, bytes).and_then(|()| std::fs::rename(&temp, path));
    if written.is_err() {
        let _ = std::fs::remove_file(&temp);
    }
    Ok(written?)
}

#[async_trait]
impl PersistenceAdapter for FsAdapter {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> StorageResult<()> {
        let path = self.path_for(key)?;
        let key = key.to_string();
        tokio::task::spawn_blocking(move || write_atomic(&key, &path, &bytes))
            .await
            .map_err(|e| StorageError::Backend(format!("write task failed: {}", e)))?
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StorageError::NotFound {
                key: key.to_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        let mut found: Vec<ObjectInfo> = self
            .files()
            .await?
            .into_iter()
            .filter(|(path, _)| !is_temp(path))
            .filter_map(|(path, size_bytes)| {
                let key = self.key_for(&path)?;
                key.starts_with(prefix).then_some(ObjectInfo { key, size_bytes })
            })
            .collect();
        found.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(found)
    }
}
