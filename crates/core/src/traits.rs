//! Collaborator traits for the object store and the CDN control API
//!
//! The sync engine and site manager only ever talk to these traits, which
//! keeps them independent of any cloud SDK and lets tests substitute fakes.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::invalidation::InvalidationBatch;

/// Progress callback: (bytes transferred so far, total bytes)
pub type Progress<'a> = &'a (dyn Fn(u64, u64) + Send + Sync);

/// Metadata for one remote object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Object key
    pub key: String,

    /// Size in bytes
    pub size_bytes: i64,

    /// ETag as returned by the service (may still carry quotes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    /// Last modified timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<jiff::Timestamp>,
}

impl ObjectInfo {
    pub fn new(key: impl Into<String>, size_bytes: i64) -> Self {
        Self {
            key: key.into(),
            size_bytes,
            etag: None,
            last_modified: None,
        }
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }
}

/// Bucket website configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteConfig {
    /// Document served for directory requests, e.g. `index.html`
    pub index_suffix: String,

    /// Key served on errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_key: Option<String>,
}

impl WebsiteConfig {
    pub fn new(index_suffix: impl Into<String>, error_key: Option<String>) -> Self {
        Self {
            index_suffix: index_suffix.into(),
            error_key: error_key.filter(|k| !k.is_empty()),
        }
    }
}

/// Headers and metadata applied to an uploaded object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: Option<String>,
    pub public_read: bool,
    pub metadata: HashMap<String, String>,
}

/// Trait for the object-store operations s3site needs
///
/// This trait is implemented by the S3 adapter and by in-memory fakes in tests.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Names of all buckets visible to the credentials
    async fn list_buckets(&self) -> Result<Vec<String>>;

    /// Check if a bucket exists
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// Create a bucket that accepts public-read objects
    ///
    /// Fails with `BucketAlreadyExists` when another account owns the name.
    async fn create_bucket(&self, bucket: &str) -> Result<()>;

    /// Delete an empty bucket
    async fn delete_bucket(&self, bucket: &str) -> Result<()>;

    /// Every object in the bucket, across all pages
    async fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectInfo>>;

    /// Website configuration, `None` if the bucket is not a website
    async fn get_website(&self, bucket: &str) -> Result<Option<WebsiteConfig>>;

    /// Apply a website configuration
    async fn put_website(&self, bucket: &str, config: &WebsiteConfig) -> Result<()>;

    /// Public website endpoint host for the bucket
    async fn website_endpoint(&self, bucket: &str) -> Result<String>;

    /// User metadata of an object, `None` if the object does not exist
    async fn get_metadata(&self, bucket: &str, key: &str)
    -> Result<Option<HashMap<String, String>>>;

    /// Upload a small in-memory object
    async fn put_bytes(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        options: &PutOptions,
    ) -> Result<()>;

    /// Upload a local file, reporting progress
    async fn put_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        options: &PutOptions,
        progress: Progress<'_>,
    ) -> Result<()>;

    /// Download an object to a local file, returning the bytes written
    async fn download_file(
        &self,
        bucket: &str,
        key: &str,
        dest: &Path,
        progress: Progress<'_>,
    ) -> Result<u64>;

    /// Delete the given keys
    async fn delete_objects(&self, bucket: &str, keys: Vec<String>) -> Result<()>;
}

/// Status string reported while a distribution change propagates
pub const STATUS_IN_PROGRESS: &str = "InProgress";

/// What to create when provisioning a distribution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionSpec {
    /// Origin host (the bucket's website endpoint)
    pub origin: String,
    pub enabled: bool,
    pub cnames: Vec<String>,
    pub comment: String,
    pub default_root_object: String,
    /// Account ids allowed to sign private URLs (empty for public sites)
    pub trusted_signers: Vec<String>,
}

/// Summary of a distribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionInfo {
    pub id: String,
    pub domain_name: String,
    pub status: String,
    pub enabled: bool,
    pub cnames: Vec<String>,
}

impl DistributionInfo {
    pub fn is_in_progress(&self) -> bool {
        self.status == STATUS_IN_PROGRESS
    }
}

/// Mutable part of a distribution's configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionConfig {
    pub enabled: bool,
    pub cnames: Vec<String>,
    /// Document served for `/`, `None` when unset
    pub default_root_object: Option<String>,
}

/// Trait for the CDN control API
#[cfg_attr(any(test, feature = "test-export-mocks"), mockall::automock)]
#[async_trait]
pub trait CdnControl: Send + Sync {
    /// Create a distribution
    async fn create_distribution(&self, spec: &DistributionSpec) -> Result<DistributionInfo>;

    /// List all distributions
    async fn list_distributions(&self) -> Result<Vec<DistributionInfo>>;

    /// Fetch a distribution, failing with `DistributionDoesNotExist`
    async fn get_distribution(&self, id: &str) -> Result<DistributionInfo>;

    /// Fetch a distribution's configuration
    async fn get_distribution_config(&self, id: &str) -> Result<DistributionConfig>;

    /// Replace the CNAME list
    async fn update_cnames(&self, id: &str, cnames: Vec<String>) -> Result<()>;

    /// Request the distribution be disabled
    async fn disable_distribution(&self, id: &str) -> Result<()>;

    /// Delete a disabled distribution
    async fn delete_distribution(&self, id: &str) -> Result<()>;

    /// Submit one invalidation request, returning its id
    async fn create_invalidation(&self, id: &str, batch: &InvalidationBatch) -> Result<String>;
}
