use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{ObjectStore, Result, public_url, validate_key};

/// Local filesystem storage - writes objects into a directory served under `public_base_url`.
/// Useful for development and testing
pub struct LocalObjectStore {
    base_path: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    pub fn new(base_path: PathBuf, public_base_url: String) -> Self {
        Self { base_path, public_base_url }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String> {
        validate_key(key)?;
        let full_path = self.base_path.join(key);

        fs::create_dir_all(&self.base_path).await?;
        let mut file = fs::File::create(&full_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;

        debug!(key, size = bytes.len(), path = %full_path.display(), "Stored object on local disk");
        Ok(public_url(&self.public_base_url, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;

    #[tokio::test]
    async fn writes_file_and_returns_public_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path().to_path_buf(), "http://localhost:3001/receipts/".into());

        let url = store.put("ATG00000001_receipt.png", vec![1, 2, 3], "image/png").await.unwrap();

        assert_eq!(url, "http://localhost:3001/receipts/ATG00000001_receipt.png");
        let written = tokio::fs::read(dir.path().join("ATG00000001_receipt.png")).await.unwrap();
        assert_eq!(written, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn rejects_keys_that_escape_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path().join("receipts"), "http://x".into());

        let err = store.put("../evil.jpg", vec![0], "image/jpeg").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }
}
