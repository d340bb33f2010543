use async_trait::async_trait;
use aws_sdk_s3::{Client, error::DisplayErrorContext, primitives::ByteStream};
use tracing::{debug, instrument};

use super::{ObjectStore, Result, StorageError, public_url, validate_key};

/// Uploads objects to an S3-compatible bucket.
///
/// Credentials come from the standard AWS provider chain (environment, profile, instance role).
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    /// Prepended to every object key inside the bucket (e.g. `receipts/`)
    prefix: String,
    public_base_url: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: String, prefix: Option<String>, public_base_url: String) -> Self {
        Self {
            client,
            bucket,
            prefix: normalize_prefix(prefix.as_deref()),
            public_base_url,
        }
    }

    fn object_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Load AWS configuration from the environment, overriding region and endpoint when given.
    pub async fn from_env(
        bucket: String,
        prefix: Option<String>,
        region: Option<String>,
        endpoint: Option<String>,
        force_path_style: bool,
        public_base_url: String,
    ) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region));
        }
        if let Some(endpoint) = endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(force_path_style)
            .build();

        Self::new(Client::from_conf(s3_config), bucket, prefix, public_base_url)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self, bytes), fields(bucket = %self.bucket, size = bytes.len()), err)]
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        validate_key(key)?;
        let object_key = self.object_key(key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        debug!(object_key = %object_key, "Uploaded object to S3");
        Ok(public_url(&self.public_base_url, key))
    }
}

/// Empty or missing prefixes become `""`; anything else ends in exactly one `/`.
fn normalize_prefix(prefix: Option<&str>) -> String {
    match prefix.map(|p| p.trim_matches('/')) {
        Some(p) if !p.is_empty() => format!("{p}/"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_are_normalized_to_a_trailing_slash() {
        assert_eq!(normalize_prefix(None), "");
        assert_eq!(normalize_prefix(Some("")), "");
        assert_eq!(normalize_prefix(Some("/")), "");
        assert_eq!(normalize_prefix(Some("receipts")), "receipts/");
        assert_eq!(normalize_prefix(Some("/survey/receipts/")), "survey/receipts/");
    }
}
