//! s3site-core: sync engine and site management for s3site
//!
//! This crate provides:
//! - Configuration management
//! - Local tree walking and content hashing
//! - Diffing against a remote index and scheduling uploads
//! - CDN invalidation batching
//! - The site lifecycle (create, list, sync, clone, delete)
//!
//! It talks to storage and the CDN only through the [`ObjectStore`] and
//! [`CdnControl`] traits, so it is independent of any cloud SDK.

pub mod config;
pub mod diff;
pub mod error;
pub mod index;
pub mod invalidation;
pub mod path;
pub mod site;
pub mod traits;
pub mod upload;
pub mod walker;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{Config, ConfigManager};
pub use diff::{DiffEngine, DiffResult, UploadReason, UploadSet};
pub use error::{Error, Result};
pub use index::RemoteIndex;
pub use invalidation::{InvalidationBatch, InvalidationBatcher, MAX_INVALIDATION_PATHS};
pub use site::{
    CloneReport, CreateOptions, DeletePolicy, META_KEY, Site, SiteManager, SiteSummary,
    SyncOptions, SyncReport,
};
pub use traits::{
    CdnControl, DistributionConfig, DistributionInfo, DistributionSpec, ObjectInfo, ObjectStore,
    Progress, PutOptions, WebsiteConfig,
};
pub use upload::{SilentObserver, TransferObserver, UploadScheduler};
pub use walker::{FileWalker, LocalFileRecord};
