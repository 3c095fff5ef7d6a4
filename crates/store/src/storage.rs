//! Object storage abstraction: containers of keyed blobs.
//!
//! Discovery enumerates a source container, the processor copies objects
//! into a target container and deletes the source copy. The local backend
//! maps containers to subdirectories under a root path so the whole system
//! runs against a plain filesystem.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::{Result, StoreError};

/// One object found while listing a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
  /// Key relative to the container root, `/`-separated.
  pub key: String,
  pub size: u64,
  pub last_modified: DateTime<Utc>,
}

/// Hex-encoded SHA-256 of an object's bytes, used as a stable content id.
pub fn content_hash(bytes: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(bytes);
  hex::encode(hasher.finalize())
}

/// Blob storage addressed by (container, key).
#[async_trait]
pub trait ObjectStorage: Send + Sync {
  /// List objects under `prefix` in a container. Missing containers list
  /// as empty rather than erroring, since a scope may simply have no
  /// files yet.
  async fn list(&self, container: &str, prefix: &str) -> Result<Vec<ObjectEntry>>;

  async fn read(&self, container: &str, key: &str) -> Result<Vec<u8>>;

  async fn put(&self, container: &str, key: &str, bytes: &[u8]) -> Result<()>;

  /// Server-side copy between containers. Overwrites the destination.
  async fn copy(&self, src_container: &str, src_key: &str, dst_container: &str, dst_key: &str) -> Result<()>;

  /// Delete an object. Deleting a missing key is a no-op.
  async fn delete(&self, container: &str, key: &str) -> Result<()>;

  async fn exists(&self, container: &str, key: &str) -> Result<bool>;
}

fn poisoned<T>(_: PoisonError<T>) -> StoreError {
  StoreError::LockPoisoned
}

// ============================================================================
// Local filesystem backend
// ============================================================================

/// Filesystem-backed storage: `<root>/<container>/<key>`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
  root: PathBuf,
}

impl LocalStorage {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  fn object_path(&self, container: &str, key: &str) -> PathBuf {
    let mut path = self.root.join(container);
    for part in key.split('/').filter(|p| !p.is_empty()) {
      path.push(part);
    }
    path
  }

  fn relative_key(container_root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(container_root).ok()?;
    let parts: Vec<&str> = rel.iter().filter_map(|p| p.to_str()).collect();
    if parts.is_empty() { None } else { Some(parts.join("/")) }
  }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
  async fn list(&self, container: &str, prefix: &str) -> Result<Vec<ObjectEntry>> {
    let container_root = self.root.join(container);
    if !container_root.is_dir() {
      return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(&container_root).follow_links(false) {
      let entry = entry.map_err(|e| StoreError::Io(e.into()))?;
      if !entry.file_type().is_file() {
        continue;
      }
      let Some(key) = Self::relative_key(&container_root, entry.path()) else {
        continue;
      };
      if !key.starts_with(prefix) {
        continue;
      }
      let meta = entry.metadata().map_err(|e| StoreError::Io(e.into()))?;
      let last_modified = meta.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now());
      entries.push(ObjectEntry {
        key,
        size: meta.len(),
        last_modified,
      });
    }
    entries.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(entries)
  }

  async fn read(&self, container: &str, key: &str) -> Result<Vec<u8>> {
    let path = self.object_path(container, key);
    Ok(tokio::fs::read(path).await?)
  }

  async fn put(&self, container: &str, key: &str, bytes: &[u8]) -> Result<()> {
    let path = self.object_path(container, key);
    if let Some(parent) = path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    Ok(())
  }

  async fn copy(&self, src_container: &str, src_key: &str, dst_container: &str, dst_key: &str) -> Result<()> {
    let src = self.object_path(src_container, src_key);
    let dst = self.object_path(dst_container, dst_key);
    if let Some(parent) = dst.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::copy(src, dst).await?;
    Ok(())
  }

  async fn delete(&self, container: &str, key: &str) -> Result<()> {
    let path = self.object_path(container, key);
    match tokio::fs::remove_file(path).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e.into()),
    }
  }

  async fn exists(&self, container: &str, key: &str) -> Result<bool> {
    Ok(self.object_path(container, key).is_file())
  }
}

// ============================================================================
// In-memory backend
// ============================================================================

#[derive(Debug, Clone)]
struct StoredObject {
  bytes: Vec<u8>,
  last_modified: DateTime<Utc>,
}

/// In-memory storage for tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
  objects: RwLock<HashMap<(String, String), StoredObject>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
  async fn list(&self, container: &str, prefix: &str) -> Result<Vec<ObjectEntry>> {
    let objects = self.objects.read().map_err(poisoned)?;
    let mut entries: Vec<ObjectEntry> = objects
      .iter()
      .filter(|((c, k), _)| c == container && k.starts_with(prefix))
      .map(|((_, k), obj)| ObjectEntry {
        key: k.clone(),
        size: obj.bytes.len() as u64,
        last_modified: obj.last_modified,
      })
      .collect();
    entries.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(entries)
  }

  async fn read(&self, container: &str, key: &str) -> Result<Vec<u8>> {
    let objects = self.objects.read().map_err(poisoned)?;
    objects
      .get(&(container.to_string(), key.to_string()))
      .map(|obj| obj.bytes.clone())
      .ok_or_else(|| StoreError::NotFound {
        entity: "object",
        id: format!("{container}/{key}"),
      })
  }

  async fn put(&self, container: &str, key: &str, bytes: &[u8]) -> Result<()> {
    let mut objects = self.objects.write().map_err(poisoned)?;
    objects.insert(
      (container.to_string(), key.to_string()),
      StoredObject {
        bytes: bytes.to_vec(),
        last_modified: Utc::now(),
      },
    );
    Ok(())
  }

  async fn copy(&self, src_container: &str, src_key: &str, dst_container: &str, dst_key: &str) -> Result<()> {
    let mut objects = self.objects.write().map_err(poisoned)?;
    let src = objects
      .get(&(src_container.to_string(), src_key.to_string()))
      .cloned()
      .ok_or_else(|| StoreError::NotFound {
        entity: "object",
        id: format!("{src_container}/{src_key}"),
      })?;
    objects.insert((dst_container.to_string(), dst_key.to_string()), src);
    Ok(())
  }

  async fn delete(&self, container: &str, key: &str) -> Result<()> {
    let mut objects = self.objects.write().map_err(poisoned)?;
    objects.remove(&(container.to_string(), key.to_string()));
    Ok(())
  }

  async fn exists(&self, container: &str, key: &str) -> Result<bool> {
    let objects = self.objects.read().map_err(poisoned)?;
    Ok(objects.contains_key(&(container.to_string(), key.to_string())))
  }
}
