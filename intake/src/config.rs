//! Configuration management for the intake service.
//!
//! Configuration is loaded from multiple sources, in increasing order of precedence:
//!
//! 1. **YAML config file** (default: `config.yaml`, override with `-f` or `INTAKE_CONFIG`)
//! 2. **`INTAKE_`-prefixed environment variables**, using `__` to reach nested fields
//! 3. **`DATABASE_URL`**, which replaces `database.url`
//!
//! ## Examples
//!
//! ```bash
//! # Move the server to port 8080
//! INTAKE_PORT=8080
//!
//! # Switch to the indexed duplicate policy
//! INTAKE_DUPLICATES__POLICY=indexed
//!
//! # Upload receipts to S3
//! INTAKE_STORAGE__BACKEND=s3
//! INTAKE_STORAGE__BUCKET=survey-receipts
//! INTAKE_STORAGE__PUBLIC_BASE_URL=https://survey-receipts.s3.amazonaws.com
//! ```
//!
//! Every field has a default, so an empty or missing config file yields a working local setup.

use std::path::PathBuf;

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::Error;
use crate::matching::DEFAULT_ADDRESS_SIMILARITY_THRESHOLD;
use crate::retry::RetryConfig;

/// Upper bound for `retry.max_retries`.
const MAX_RETRIES_LIMIT: u32 = 10;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "INTAKE_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Set from the `DATABASE_URL` environment variable; takes precedence over `database.url`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    pub database: DatabaseConfig,
    /// Where receipt images are stored
    pub storage: StorageConfig,
    pub cors: CorsConfig,
    pub postcodes: PostcodesConfig,
    pub duplicates: DuplicatesConfig,
    pub attachments: AttachmentsConfig,
    /// Retry policy for survey ID allocation and inserts
    pub retry: RetryConfig,
    /// Export traces over OTLP (endpoint read from the standard `OTEL_EXPORTER_OTLP_*` variables)
    pub enable_otel_export: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            database_url: None,
            database: DatabaseConfig::default(),
            storage: StorageConfig::default(),
            cors: CorsConfig::default(),
            postcodes: PostcodesConfig::default(),
            duplicates: DuplicatesConfig::default(),
            attachments: AttachmentsConfig::default(),
            retry: RetryConfig::default(),
            enable_otel_export: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string
    pub url: String,
    pub pool: PoolSettings,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost:5432/intake".to_string(),
            pool: PoolSettings::default(),
        }
    }
}

/// Connection pool settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections to maintain
    pub min_connections: u32,
    /// Maximum time to wait for a connection (seconds)
    pub acquire_timeout_secs: u64,
    /// Time before idle connections are closed (seconds, 0 = never)
    pub idle_timeout_secs: u64,
    /// Maximum lifetime of a connection (seconds, 0 = never)
    pub max_lifetime_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,  // 10 minutes
            max_lifetime_secs: 1800, // 30 minutes
        }
    }
}

/// Object storage backend for receipt images.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Write into a local directory that the server also serves under `/receipts`
    Local {
        path: PathBuf,
        /// URL prefix that stored filenames are appended to
        public_base_url: String,
    },
    /// Upload to an S3-compatible bucket
    S3 {
        bucket: String,
        /// Key prefix inside the bucket
        #[serde(default)]
        prefix: Option<String>,
        #[serde(default)]
        region: Option<String>,
        /// Custom endpoint for S3-compatible services (MinIO, R2, ...)
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        force_path_style: bool,
        public_base_url: String,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Local {
            path: PathBuf::from("receipts"),
            public_base_url: "http://localhost:3001/receipts".to_string(),
        }
    }
}

impl StorageConfig {
    /// Directory to serve stored objects from, for the local backend
    pub fn local_path(&self) -> Option<&PathBuf> {
        match self {
            StorageConfig::Local { path, .. } => Some(path),
            StorageConfig::S3 { .. } => None,
        }
    }

    fn public_base_url(&self) -> &str {
        match self {
            StorageConfig::Local { public_base_url, .. } | StorageConfig::S3 { public_base_url, .. } => public_base_url,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Request headers browsers may send
    pub allowed_headers: Vec<String>,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![CorsOrigin::Wildcard],
            allowed_headers: ["authorization", "x-client-info", "apikey", "content-type"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_age: Some(3600),
        }
    }
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard", serialize_with = "serialize_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://survey.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn serialize_wildcard<S>(serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str("*")
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PostcodesConfig {
    /// Rows fetched per page when reading the postcode table
    pub batch_size: u32,
}

impl Default for PostcodesConfig {
    fn default() -> Self {
        Self { batch_size: 1000 }
    }
}

/// How candidate registrations are compared against stored ones.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Scan every stored response with phone, email, name and fuzzy address rules
    #[default]
    Heuristic,
    /// Single indexed lookup on normalized phone or email
    Indexed,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DuplicatesConfig {
    pub policy: DuplicatePolicy,
    /// Minimum canonical-address similarity, in `(0, 1]`, for two addresses to be the same
    pub address_similarity_threshold: f64,
    /// Rows fetched per page during the heuristic scan
    pub scan_batch_size: u32,
}

impl Default for DuplicatesConfig {
    fn default() -> Self {
        Self {
            policy: DuplicatePolicy::default(),
            address_similarity_threshold: DEFAULT_ADDRESS_SIMILARITY_THRESHOLD,
            scan_batch_size: 1000,
        }
    }
}

/// What to do when a receipt attachment cannot be decoded or stored.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentFailurePolicy {
    /// Keep the uploads that worked, report the rest in `failedAttachments`
    #[default]
    Partial,
    /// Fail the whole submission before inserting
    Reject,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AttachmentsConfig {
    pub failure_policy: AttachmentFailurePolicy,
    /// Maximum accepted request body, base64 attachments included
    pub max_body_bytes: usize,
}

impl Default for AttachmentsConfig {
    fn default() -> Self {
        Self {
            failure_policy: AttachmentFailurePolicy::default(),
            max_body_bytes: 20 * 1024 * 1024,
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        // if database_url is set, use it in place of the configured one
        if let Some(url) = config.database_url.take() {
            config.database.url = url;
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |message: String| Error::Internal {
            operation: format!("Config validation: {message}"),
        };

        if self.postcodes.batch_size == 0 {
            return Err(invalid("postcodes.batch_size must be greater than 0".to_string()));
        }
        if self.duplicates.scan_batch_size == 0 {
            return Err(invalid("duplicates.scan_batch_size must be greater than 0".to_string()));
        }

        let threshold = self.duplicates.address_similarity_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(invalid(format!(
                "duplicates.address_similarity_threshold ({threshold}) must be in (0, 1]"
            )));
        }

        if self.cors.allowed_origins.is_empty() {
            return Err(invalid(
                "cors.allowed_origins is empty; use [\"*\"] to allow any origin".to_string(),
            ));
        }

        if self.retry.max_retries > MAX_RETRIES_LIMIT {
            return Err(invalid(format!(
                "retry.max_retries ({}) cannot exceed {MAX_RETRIES_LIMIT}",
                self.retry.max_retries
            )));
        }

        if let StorageConfig::S3 { bucket, .. } = &self.storage {
            if bucket.trim().is_empty() {
                return Err(invalid("storage.bucket is required for the s3 backend".to_string()));
            }
        }

        if self.storage.public_base_url().trim().is_empty() {
            return Err(invalid("storage.public_base_url cannot be empty".to_string()));
        }

        if self.database.url.trim().is_empty() {
            return Err(invalid(
                "database.url is empty. Set DATABASE_URL or add database.url to the config file.".to_string(),
            ));
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values; INTAKE_CONFIG names the file
            .merge(Env::prefixed("INTAKE_").ignore(&["CONFIG"]).split("__"))
            // Common DATABASE_URL pattern
            .merge(Env::raw().only(&["DATABASE_URL"]))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
