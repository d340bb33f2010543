//! Object storage for uploaded receipt images.
//!
//! An [`ObjectStore`] writes an object under a flat key and returns the public URL it can be
//! fetched from. Two backends exist: [`LocalObjectStore`] writes into a directory that the server
//! serves itself, and [`S3ObjectStore`] uploads to an S3-compatible bucket.

mod local;
mod s3;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::StorageConfig;

pub use local::LocalObjectStore;
pub use s3::S3ObjectStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid object key: {0:?}")]
    InvalidKey(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Upload of {key} failed: {message}")]
    Upload { key: String, message: String },
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Trait for object storage backends
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key` and return the object's public URL
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;
}

/// Keys are single path segments: no separators, no parent references.
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.contains('/') || key.contains('\\') || key.contains("..") {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

pub(crate) fn public_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key)
}

/// Build the configured object store
pub async fn from_config(config: &StorageConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match config {
        StorageConfig::Local { path, public_base_url } => {
            tokio::fs::create_dir_all(path).await?;
            Arc::new(LocalObjectStore::new(path.clone(), public_base_url.clone()))
        }
        StorageConfig::S3 {
            bucket,
            prefix,
            region,
            endpoint,
            force_path_style,
            public_base_url,
        } => Arc::new(
            S3ObjectStore::from_env(
                bucket.clone(),
                prefix.clone(),
                region.clone(),
                endpoint.clone(),
                *force_path_style,
                public_base_url.clone(),
            )
            .await,
        ),
    };
    Ok(store)
}
