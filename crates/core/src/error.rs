//! Error types for s3site-core
//!
//! Every remote-service and filesystem failure propagates unchanged to the
//! top level as one of these variants.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for s3site-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for s3site-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file requested explicitly but missing
    #[error("Config file {0} does not exist")]
    ConfigNotFound(PathBuf),

    /// Remote service failure (credentials, throttling, unexpected responses)
    #[error("AWS error: {0}")]
    Aws(String),

    /// The named bucket exists but is not configured as a website, or is missing
    #[error("Site '{0}' does not exist")]
    SiteDoesNotExist(String),

    /// The bucket name is taken in the global namespace
    #[error("Bucket '{0}' already exists and is owned by another account")]
    BucketAlreadyExists(String),

    /// The bucket does not exist
    #[error("Bucket '{0}' does not exist")]
    BucketDoesNotExist(String),

    /// The CDN distribution does not exist
    #[error("Distribution '{0}' does not exist")]
    DistributionDoesNotExist(String),

    /// Sync root is not a directory
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// A specific file could not be read or written
    #[error("{}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Remote key that cannot be mapped onto the local filesystem
    #[error("Refusing to write object with unsafe key: {0}")]
    InvalidKey(String),

    /// An invalidation batch over the CDN per-request ceiling
    #[error("Invalidation batch of {size} paths exceeds the limit of {limit}")]
    InvalidationBatchTooLarge { size: usize, limit: usize },

    /// A distribution stayed in progress past the configured wait
    #[error("Distribution '{id}' still in progress after {}s", waited.as_secs())]
    DistributionTimeout { id: String, waited: Duration },

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Wrap an IO error with the path it occurred on
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::File {
            path: path.into(),
            source,
        }
    }

    /// Whether the error means the addressed remote resource is absent
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::SiteDoesNotExist(_)
                | Error::BucketDoesNotExist(_)
                | Error::DistributionDoesNotExist(_)
        )
    }
}
