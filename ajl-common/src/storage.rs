//! Evidence object store
//!
//! Objects live under a single root directory, addressed by the relative
//! `storage_path` recorded on their evidence row.

use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct ObjectStore {
    root: PathBuf,
}

impl ObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a storage path, refusing anything that escapes the root
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let clean = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(Error::Storage(format!("Invalid object path '{}'", key)));
        }
        Ok(self.root.join(relative))
    }

    /// Write an object; an existing object at `key` is an error
    pub async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if tokio::fs::try_exists(&path).await? {
            return Err(Error::Storage(format!("Object already exists: {}", key)));
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| Error::Storage(format!("Failed to write {}: {}", key, e)))?;
        debug!(key, len = bytes.len(), "Stored evidence object");
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("Evidence object {}", key)))
            }
            Err(e) => Err(Error::Storage(format!("Failed to read {}: {}", key, e))),
        }
    }

    /// Remove an object; a missing object is not an error
    pub async fn delete(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!("Failed to delete {}: {}", key, e))),
        }
    }

    /// Best-effort removal of several objects, logging failures
    pub async fn delete_all<'a>(&self, keys: impl IntoIterator<Item = &'a str>) {
        for key in keys {
            if let Err(e) = self.delete(key).await {
                warn!("Could not remove evidence object {}: {}", key, e);
            }
        }
    }
}

/// MIME type for a stored object, from its extension
pub fn content_type_for(key: &str) -> &'static str {
    let ext = key.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = TempDir::new().unwrap();
        let store = ObjectStore::new(dir.path());
        let key = "group_group_1/journey_UAL-W6-1-0042/UAL-W6-1-0042_e1.png";

        store.put(key, b"png-bytes").await.unwrap();
        assert_eq!(store.get(key).await.unwrap(), b"png-bytes");
        assert!(store.put(key, b"again").await.is_err());

        store.delete(key).await.unwrap();
        assert!(matches!(store.get(key).await, Err(Error::NotFound(_))));
        store.delete(key).await.unwrap();
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let dir = TempDir::new().unwrap();
        let store = ObjectStore::new(dir.path());
        assert!(store.put("../escape.png", b"x").await.is_err());
        assert!(store.get("/etc/passwd").await.is_err());
        assert!(store.put("", b"x").await.is_err());
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type_for("a/b.JPG"), "image/jpeg");
        assert_eq!(content_type_for("a/b.webp"), "image/webp");
        assert_eq!(content_type_for("a/b"), "application/octet-stream");
    }
}
