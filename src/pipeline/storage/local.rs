use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{check_object_path, StorageAdapter, StorageError};

/// Filesystem storage rooted at a directory.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Create the root directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        check_object_path(path)?;
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl StorageAdapter for LocalStorage {
    async fn upload(&self, bytes: &[u8], path: &str) -> Result<String, StorageError> {
        let full_path = self.resolve(path)?;
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full_path, bytes).await?;

        tracing::debug!(path, size = bytes.len(), "Stored object on local disk");
        Ok(full_path.to_string_lossy().into_owned())
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let full_path = self.resolve(path)?;
        match tokio::fs::read(&full_path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(path.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let full_path = self.resolve(path)?;
        match tokio::fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_download_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("pdfs")).unwrap();

        let locator = storage
            .upload(b"%PDF-1.4 body", "policies/p1/doc.pdf")
            .await
            .unwrap();
        assert!(locator.ends_with("doc.pdf"));
        assert!(dir.path().join("pdfs/policies/p1/doc.pdf").exists());

        let bytes = storage.download("policies/p1/doc.pdf").await.unwrap();
        assert_eq!(bytes, b"%PDF-1.4 body");

        storage.delete("policies/p1/doc.pdf").await.unwrap();
        assert!(matches!(
            storage.download("policies/p1/doc.pdf").await,
            Err(StorageError::NotFound(_))
        ));
        // idempotent
        storage.delete("policies/p1/doc.pdf").await.unwrap();
    }

    #[tokio::test]
    async fn traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();
        assert!(matches!(
            storage.upload(b"x", "../escape.pdf").await,
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(
            storage.download("/etc/hosts").await,
            Err(StorageError::InvalidPath(_))
        ));
    }
}
