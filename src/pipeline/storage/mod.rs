pub mod local;
pub mod memory;
pub mod uploader;

pub use local::*;
pub use memory::*;
pub use uploader::*;

use async_trait::async_trait;
use thiserror::Error;

use crate::pipeline::extraction::ExtractionError;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error("Upload rejected: {0}")]
    Rejected(#[from] ExtractionError),
}

/// Where policy PDFs live. The caller always supplies the object path;
/// adapters never decide placement.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Store `bytes` at `path`, overwriting. Returns a locator (URL or
    /// filesystem path) for the stored object.
    async fn upload(&self, bytes: &[u8], path: &str) -> Result<String, StorageError>;

    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Deleting a missing object is not an error.
    async fn delete(&self, path: &str) -> Result<(), StorageError>;
}

/// Reject absolute paths and any `..`, `.` or empty segment.
pub(crate) fn check_object_path(path: &str) -> Result<(), StorageError> {
    let invalid = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path.contains('\0')
        || path.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");

    if invalid {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_paths() {
        assert!(check_object_path("policies/cigna/20240101_000000_abcd1234_knee.pdf").is_ok());
        for bad in ["", "/etc/passwd", "../x.pdf", "a/../../b", "a//b", "a\\b", "./a"] {
            assert!(
                matches!(check_object_path(bad), Err(StorageError::InvalidPath(_))),
                "accepted {bad:?}"
            );
        }
    }
}
