use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{check_object_path, StorageAdapter, StorageError};
use crate::pipeline::extraction::{sanitize_filename, validate_pdf};

/// Result of storing one policy PDF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// Adapter-relative path, what a `PolicyJob` carries.
    pub storage_path: String,
    /// Locator returned by the adapter.
    pub storage_url: String,
    pub file_size_bytes: u64,
    pub original_filename: String,
    /// Lowercase hex SHA-256 of the content.
    pub file_hash: String,
    pub uploaded_by: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// Validates intake PDFs and stores them under
/// `policies/{payer_id}/{YYYYmmdd_HHMMSS}_{hash8}_{filename}`.
pub struct PolicyUploader {
    storage: Arc<dyn StorageAdapter>,
    max_bytes: u64,
}

impl PolicyUploader {
    pub fn new(storage: Arc<dyn StorageAdapter>, max_bytes: u64) -> Self {
        Self { storage, max_bytes }
    }

    pub async fn upload_pdf(
        &self,
        bytes: &[u8],
        filename: &str,
        payer_id: &str,
        uploaded_by: Option<&str>,
    ) -> Result<UploadReceipt, StorageError> {
        validate_pdf(bytes, self.max_bytes)?;
        check_object_path(payer_id)?;
        if payer_id.contains('/') {
            return Err(StorageError::InvalidPath(payer_id.to_string()));
        }

        let file_hash = content_hash(bytes);
        let uploaded_at = Utc::now();
        let storage_path = storage_path(payer_id, &uploaded_at, &file_hash, filename);

        let storage_url = self.storage.upload(bytes, &storage_path).await?;

        tracing::info!(
            payer_id,
            storage_path = %storage_path,
            size = bytes.len(),
            "Policy PDF uploaded"
        );

        Ok(UploadReceipt {
            storage_path,
            storage_url,
            file_size_bytes: bytes.len() as u64,
            original_filename: filename.to_string(),
            file_hash,
            uploaded_by: uploaded_by.map(str::to_string),
            uploaded_at,
        })
    }
}

pub fn content_hash(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn storage_path(payer_id: &str, at: &DateTime<Utc>, file_hash: &str, filename: &str) -> String {
    format!(
        "policies/{payer_id}/{}_{}_{}",
        at.format("%Y%m%d_%H%M%S"),
        &file_hash[..8],
        sanitize_filename(filename)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::ExtractionError;
    use crate::pipeline::storage::InMemoryStorage;
    use chrono::TimeZone;

    const PDF: &[u8] = b"%PDF-1.7\n1 0 obj << /Type /Catalog >> endobj\n%%EOF";

    #[test]
    fn path_layout() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let path = storage_path("payer-42", &at, "deadbeefcafebabe", "../../knee.pdf");
        assert_eq!(path, "policies/payer-42/20240309_140507_deadbeef_knee.pdf");
    }

    #[test]
    fn hash_is_hex_sha256() {
        assert_eq!(
            content_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn stores_valid_pdf() {
        let storage = Arc::new(InMemoryStorage::new());
        let uploader = PolicyUploader::new(storage.clone(), 1024);
        let receipt = uploader
            .upload_pdf(PDF, "knee.pdf", "cigna", Some("analyst"))
            .await
            .unwrap();

        assert!(receipt.storage_path.starts_with("policies/cigna/"));
        assert!(receipt
            .storage_path
            .ends_with(&format!("_{}_knee.pdf", &receipt.file_hash[..8])));
        assert_eq!(receipt.file_size_bytes, PDF.len() as u64);
        assert_eq!(receipt.uploaded_by.as_deref(), Some("analyst"));
        assert_eq!(storage.download(&receipt.storage_path).await.unwrap(), PDF);
    }

    #[tokio::test]
    async fn rejects_invalid_intake_without_storing() {
        let storage = Arc::new(InMemoryStorage::new());
        let uploader = PolicyUploader::new(storage.clone(), 1024);

        let err = uploader.upload_pdf(b"hello", "x.pdf", "cigna", None).await.unwrap_err();
        assert!(matches!(err, StorageError::Rejected(ExtractionError::NotPdf)));

        let big = [PDF, &[b' '; 2048][..]].concat();
        let err = uploader.upload_pdf(&big, "x.pdf", "cigna", None).await.unwrap_err();
        assert!(matches!(err, StorageError::Rejected(ExtractionError::TooLarge { .. })));

        let err = uploader.upload_pdf(PDF, "x.pdf", "../other", None).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath(_)));

        assert!(storage.is_empty());
    }
}
