use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{check_object_path, StorageAdapter, StorageError};

/// Process-local storage for tests and dry runs.
#[derive(Default)]
pub struct InMemoryStorage {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(path)
    }
}

#[async_trait]
impl StorageAdapter for InMemoryStorage {
    async fn upload(&self, bytes: &[u8], path: &str) -> Result<String, StorageError> {
        check_object_path(path)?;
        self.objects
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.to_string(), bytes.to_vec());
        Ok(format!("memory://{path}"))
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.objects
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(path);
        Ok(())
    }
}
