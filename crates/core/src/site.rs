//! Site lifecycle: create, inspect, list, sync, clone and delete
//!
//! A site is a bucket with a website configuration. The CDN distribution
//! fronting it, if any, is recorded as metadata on a zero-byte marker
//! object ([`META_KEY`]) stored in the bucket itself.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::config::DeleteSettings;
use crate::diff::{DiffEngine, UploadReason, UploadSet};
use crate::error::{Error, Result};
use crate::index::RemoteIndex;
use crate::invalidation::{InvalidationBatch, InvalidationBatcher, InvalidationFilter};
use crate::path::local_path_for_key;
use crate::traits::{
    CdnControl, DistributionInfo, DistributionSpec, ObjectStore, PutOptions, WebsiteConfig,
};
use crate::upload::{TransferObserver, UploadScheduler};
use crate::walker::FileWalker;

/// Key of the per-site marker object
pub const META_KEY: &str = "__s3site.cfg";

/// Marker metadata entry holding the distribution id
pub const DISTRIBUTION_ID_META: &str = "cloudfront-distribution-id";

/// Maximum keys per bulk delete request
pub const MAX_DELETE_KEYS: usize = 1000;

/// One managed static website
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Site {
    /// Bucket name
    pub name: String,
    pub website: WebsiteConfig,
    /// Website endpoint host
    pub endpoint: String,
    /// Linked distribution; immutable once set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution_id: Option<String>,
}

/// Row of the `list` output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteSummary {
    pub name: String,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution_domain: Option<String>,
}

/// Options for [`SiteManager::create_site`]
#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub index_document: String,
    pub error_document: Option<String>,
    /// Create a distribution if the site has none
    pub cloudfront: bool,
    /// CNAMEs for the distribution; merged into an existing one
    pub cnames: Vec<String>,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            index_document: "index.html".to_string(),
            error_document: None,
            cloudfront: false,
            cnames: Vec::new(),
        }
    }
}

/// Hook that may replace the upload set before anything is transferred
pub type UploadFilter<'a> = &'a (dyn Fn(UploadSet) -> UploadSet + Send + Sync);

/// Options for [`SiteManager::sync`]
#[derive(Default, Clone, Copy)]
pub struct SyncOptions<'a> {
    pub pretend: bool,
    pub upload_filter: Option<UploadFilter<'a>>,
    pub invalidation_filter: Option<InvalidationFilter<'a>>,
}

/// What a sync pass did
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub site: String,
    pub pretend: bool,
    pub scanned: usize,
    pub skipped: usize,
    pub uploaded: Vec<String>,
    /// Whether each uploaded key was new or changed
    pub reasons: BTreeMap<String, UploadReason>,
    pub bytes: u64,
    /// Paths per planned invalidation batch
    pub batches: Vec<Vec<String>>,
    /// Ids of submitted invalidation requests
    pub invalidations: Vec<String>,
}

/// What a clone did
#[derive(Debug, Clone, Serialize)]
pub struct CloneReport {
    pub site: String,
    pub destination: PathBuf,
    pub files: usize,
    pub bytes: u64,
}

/// Bounds on waiting for a distribution to finish disabling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletePolicy {
    pub poll_interval: Duration,
    pub max_wait: Duration,
}

impl Default for DeletePolicy {
    fn default() -> Self {
        Self::from(&DeleteSettings::default())
    }
}

impl From<&DeleteSettings> for DeletePolicy {
    fn from(settings: &DeleteSettings) -> Self {
        Self {
            poll_interval: Duration::from_secs(settings.poll_interval_secs),
            max_wait: Duration::from_secs(settings.max_wait_secs),
        }
    }
}

/// Teardown progress of one distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionState {
    Enabled,
    /// Disable requested, change still propagating
    Disabling,
    Disabled,
    Deleted,
}

/// Orchestrates sites over an object store and a CDN
pub struct SiteManager<'a> {
    store: &'a dyn ObjectStore,
    cdn: &'a dyn CdnControl,
    delete_policy: DeletePolicy,
}

impl<'a> SiteManager<'a> {
    pub fn new(store: &'a dyn ObjectStore, cdn: &'a dyn CdnControl) -> Self {
        Self {
            store,
            cdn,
            delete_policy: DeletePolicy::default(),
        }
    }

    pub fn with_delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.delete_policy = policy;
        self
    }

    /// Whether the bucket exists; a missing bucket is not an error here
    pub async fn get_bucket_or_none(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .store
            .bucket_exists(name)
            .await?
            .then(|| name.to_string()))
    }

    /// Reuse the bucket if it exists, otherwise create it
    ///
    /// Returns whether the bucket was created.
    pub async fn get_or_create_bucket(&self, name: &str) -> Result<bool> {
        if self.get_bucket_or_none(name).await?.is_some() {
            return Ok(false);
        }
        tracing::info!(bucket = name, "creating bucket");
        self.store.create_bucket(name).await?;
        Ok(true)
    }

    /// Look up a site by bucket name
    pub async fn get_site(&self, name: &str) -> Result<Site> {
        if self.get_bucket_or_none(name).await?.is_none() {
            return Err(Error::SiteDoesNotExist(name.to_string()));
        }
        let website = self
            .store
            .get_website(name)
            .await?
            .ok_or_else(|| Error::SiteDoesNotExist(name.to_string()))?;
        let endpoint = self.store.website_endpoint(name).await?;
        let distribution_id = self.linked_distribution(name).await?;
        Ok(Site {
            name: name.to_string(),
            website,
            endpoint,
            distribution_id,
        })
    }

    /// Like [`get_site`](Self::get_site) but a missing site is `None`
    pub async fn get_site_or_none(&self, name: &str) -> Result<Option<Site>> {
        match self.get_site(name).await {
            Ok(site) => Ok(Some(site)),
            Err(Error::SiteDoesNotExist(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Resolve the site's distribution handle, if one is linked
    pub async fn distribution(&self, site: &Site) -> Result<Option<DistributionInfo>> {
        match &site.distribution_id {
            Some(id) => self.cdn.get_distribution(id).await.map(Some),
            None => Ok(None),
        }
    }

    async fn linked_distribution(&self, bucket: &str) -> Result<Option<String>> {
        Ok(self
            .store
            .get_metadata(bucket, META_KEY)
            .await?
            .and_then(|meta| meta.get(DISTRIBUTION_ID_META).cloned())
            .filter(|id| !id.is_empty()))
    }

    async fn write_marker(&self, bucket: &str, distribution_id: Option<&str>) -> Result<()> {
        let mut metadata = HashMap::new();
        if let Some(id) = distribution_id {
            metadata.insert(DISTRIBUTION_ID_META.to_string(), id.to_string());
        }
        let options = PutOptions {
            metadata,
            ..Default::default()
        };
        self.store
            .put_bytes(bucket, META_KEY, Vec::new(), &options)
            .await
    }

    /// Create a site, or bring an existing one up to date
    ///
    /// Each step is skipped when already done, so re-running is safe. An
    /// existing distribution is never replaced; new CNAMEs are merged into it.
    pub async fn create_site(&self, name: &str, options: &CreateOptions) -> Result<Site> {
        self.get_or_create_bucket(name).await?;

        let website = match self.store.get_website(name).await? {
            Some(existing) => existing,
            None => {
                let website = WebsiteConfig::new(
                    options.index_document.clone(),
                    options.error_document.clone(),
                );
                tracing::info!(bucket = name, index = %website.index_suffix, "configuring website");
                self.store.put_website(name, &website).await?;
                website
            }
        };

        let marker = self.store.get_metadata(name, META_KEY).await?;
        let mut distribution_id = marker
            .as_ref()
            .and_then(|meta| meta.get(DISTRIBUTION_ID_META).cloned())
            .filter(|id| !id.is_empty());
        if marker.is_none() {
            self.write_marker(name, None).await?;
        }

        let endpoint = self.store.website_endpoint(name).await?;

        if let Some(id) = &distribution_id {
            if !options.cnames.is_empty() {
                self.merge_cnames(id, &options.cnames).await?;
            }
        } else if options.cloudfront {
            let spec = DistributionSpec {
                origin: endpoint.clone(),
                enabled: true,
                cnames: options.cnames.clone(),
                comment: format!("s3site: {name}"),
                default_root_object: website.index_suffix.clone(),
                trusted_signers: Vec::new(),
            };
            let created = self.cdn.create_distribution(&spec).await?;
            tracing::info!(
                bucket = name,
                distribution = %created.id,
                domain = %created.domain_name,
                "created distribution"
            );
            self.write_marker(name, Some(&created.id)).await?;
            distribution_id = Some(created.id);
        }

        Ok(Site {
            name: name.to_string(),
            website,
            endpoint,
            distribution_id,
        })
    }

    async fn merge_cnames(&self, id: &str, cnames: &[String]) -> Result<()> {
        let config = self.cdn.get_distribution_config(id).await?;
        let mut merged = config.cnames.clone();
        for cname in cnames {
            if !merged.contains(cname) {
                merged.push(cname.clone());
            }
        }
        if merged.len() == config.cnames.len() {
            tracing::debug!(distribution = id, "CNAMEs already present");
            return Ok(());
        }
        tracing::info!(distribution = id, cnames = ?merged, "updating CNAMEs");
        self.cdn.update_cnames(id, merged).await
    }

    /// Every bucket configured as a website
    ///
    /// Buckets whose website configuration cannot be read are skipped.
    pub async fn list_sites(&self) -> Result<Vec<SiteSummary>> {
        let domains: HashMap<String, String> = self
            .cdn
            .list_distributions()
            .await?
            .into_iter()
            .map(|d| (d.id, d.domain_name))
            .collect();

        let mut sites = Vec::new();
        for bucket in self.store.list_buckets().await? {
            match self.store.get_website(&bucket).await {
                Ok(Some(_)) => {}
                Ok(None) => continue,
                Err(e) => {
                    tracing::debug!(%bucket, error = %e, "skipping bucket");
                    continue;
                }
            }
            let endpoint = self.store.website_endpoint(&bucket).await?;
            let distribution_id = self.linked_distribution(&bucket).await?;
            let distribution_domain = distribution_id
                .as_ref()
                .and_then(|id| domains.get(id).cloned());
            sites.push(SiteSummary {
                name: bucket,
                endpoint,
                distribution_id,
                distribution_domain,
            });
        }
        Ok(sites)
    }

    /// Upload new and changed files under `root`, then invalidate them
    pub async fn sync(
        &self,
        name: &str,
        root: &Path,
        options: SyncOptions<'_>,
        observer: &dyn TransferObserver,
    ) -> Result<SyncReport> {
        let walker = FileWalker::new(root)?;
        let site = self.get_site(name).await?;
        let remote = RemoteIndex::fetch(self.store, &site.name).await?;
        let mut diff = tokio::task::spawn_blocking(move || DiffEngine.diff(walker.records(), &remote))
            .await
            .map_err(|e| Error::General(format!("hashing task failed: {e}")))??;
        tracing::info!(
            site = name,
            scanned = diff.scanned,
            changed = diff.uploads.len(),
            "diff complete"
        );

        let uploads = match options.upload_filter {
            Some(filter) => filter(std::mem::take(&mut diff.uploads)),
            None => std::mem::take(&mut diff.uploads),
        };

        let uploaded = UploadScheduler::new(self.store, &site.name)
            .pretend(options.pretend)
            .run(&uploads, observer)
            .await?;

        let mut report = SyncReport {
            site: site.name.clone(),
            pretend: options.pretend,
            scanned: diff.scanned,
            skipped: diff.skipped,
            bytes: uploaded.bytes,
            ..Default::default()
        };

        if let Some(id) = &site.distribution_id {
            if !uploaded.keys.is_empty() {
                let batcher = InvalidationBatcher::new(self.cdn);
                let batches = batcher
                    .plan(id, uploaded.keys.clone(), options.invalidation_filter)
                    .await?;
                if options.pretend {
                    for batch in &batches {
                        tracing::info!(distribution = %id, paths = batch.len(), "would invalidate");
                    }
                } else {
                    report.invalidations = batcher.submit(id, &batches).await?;
                }
                report.batches = batches
                    .iter()
                    .map(|b: &InvalidationBatch| b.paths().to_vec())
                    .collect();
            }
        }

        report.reasons = uploaded
            .keys
            .iter()
            .filter_map(|key| diff.reason(key).map(|reason| (key.clone(), reason)))
            .collect();
        report.uploaded = uploaded.keys;
        Ok(report)
    }

    /// Download every object of a site into `<output_dir>/<name>/`
    pub async fn clone_site(
        &self,
        name: &str,
        output_dir: &Path,
        observer: &dyn TransferObserver,
    ) -> Result<CloneReport> {
        let site = self.get_site(name).await?;
        let destination = output_dir.join(&site.name);

        // Validate every key before writing anything
        let mut plan: BTreeMap<String, (PathBuf, u64)> = BTreeMap::new();
        for object in self.store.list_objects(&site.name).await? {
            if object.key == META_KEY || object.key.ends_with('/') {
                continue;
            }
            let local = local_path_for_key(&destination, &object.key)?;
            plan.insert(object.key, (local, object.size_bytes.max(0) as u64));
        }

        let mut report = CloneReport {
            site: site.name.clone(),
            destination: destination.clone(),
            files: 0,
            bytes: 0,
        };
        for (key, (local, size)) in &plan {
            if let Some(parent) = local.parent() {
                std::fs::create_dir_all(parent).map_err(|e| Error::file(parent, e))?;
            }
            observer.started(local, key, *size);
            let progress = |transferred: u64, total: u64| {
                observer.progress(key, transferred, total.max(1));
            };
            let written = self
                .store
                .download_file(&site.name, key, local, &progress)
                .await?;
            observer.finished(key, written);
            tracing::debug!(%key, path = %local.display(), bytes = written, "downloaded");
            report.files += 1;
            report.bytes += written;
        }
        Ok(report)
    }

    /// Delete a site: its distribution, every object, then the bucket
    pub async fn delete_site(&self, name: &str) -> Result<()> {
        let site = self.get_site(name).await?;

        if let Some(id) = &site.distribution_id {
            self.teardown_distribution(id).await?;
        }

        let keys: Vec<String> = self
            .store
            .list_objects(&site.name)
            .await?
            .into_iter()
            .map(|o| o.key)
            .collect();
        tracing::info!(bucket = name, objects = keys.len(), "deleting objects");
        for chunk in keys.chunks(MAX_DELETE_KEYS) {
            self.store.delete_objects(&site.name, chunk.to_vec()).await?;
        }

        tracing::info!(bucket = name, "deleting bucket");
        self.store.delete_bucket(&site.name).await
    }

    /// Drive a distribution from its current state to deleted
    ///
    /// A distribution that no longer exists counts as deleted.
    pub async fn teardown_distribution(&self, id: &str) -> Result<()> {
        let mut state = match self.cdn.get_distribution_config(id).await {
            Ok(config) if config.enabled => DistributionState::Enabled,
            Ok(_) => DistributionState::Disabling,
            Err(Error::DistributionDoesNotExist(_)) => {
                tracing::warn!(distribution = id, "distribution already gone");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let started = tokio::time::Instant::now();
        while state != DistributionState::Deleted {
            state = match state {
                DistributionState::Enabled => {
                    tracing::info!(distribution = id, "disabling distribution");
                    self.cdn.disable_distribution(id).await?;
                    DistributionState::Disabling
                }
                DistributionState::Disabling => {
                    let info = self.cdn.get_distribution(id).await?;
                    if info.is_in_progress() {
                        let waited = started.elapsed();
                        if waited >= self.delete_policy.max_wait {
                            return Err(Error::DistributionTimeout {
                                id: id.to_string(),
                                waited,
                            });
                        }
                        tracing::info!(
                            distribution = id,
                            waited_secs = waited.as_secs(),
                            "waiting for distribution to finish disabling"
                        );
                        tokio::time::sleep(self.delete_policy.poll_interval).await;
                        DistributionState::Disabling
                    } else {
                        DistributionState::Disabled
                    }
                }
                DistributionState::Disabled => {
                    tracing::info!(distribution = id, "deleting distribution");
                    self.cdn.delete_distribution(id).await?;
                    DistributionState::Deleted
                }
                DistributionState::Deleted => DistributionState::Deleted,
            };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CallLog, MemoryCdn, MemoryStore};
    use crate::upload::SilentObserver;
    use tempfile::TempDir;

    fn fast_policy() -> DeletePolicy {
        DeletePolicy {
            poll_interval: Duration::ZERO,
            max_wait: Duration::from_secs(60),
        }
    }

    fn tree(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        dir
    }

    async fn website_bucket(store: &MemoryStore, name: &str) {
        let cdn = MemoryCdn::default();
        SiteManager::new(store, &cdn)
            .create_site(name, &CreateOptions::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_site_provisions_everything() {
        let store = MemoryStore::default();
        let cdn = MemoryCdn::default();
        let manager = SiteManager::new(&store, &cdn);

        let site = manager
            .create_site(
                "example.com",
                &CreateOptions {
                    cloudfront: true,
                    cnames: vec!["www.example.com".into()],
                    error_document: Some("404.html".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(site.website.index_suffix, "index.html");
        assert_eq!(site.website.error_key.as_deref(), Some("404.html"));
        let id = site.distribution_id.clone().unwrap();
        let dist = cdn.distribution(&id).unwrap();
        assert_eq!(dist.cnames, vec!["www.example.com"]);
        assert_eq!(dist.origin, "example.com.s3-website-us-east-1.amazonaws.com");
        assert_eq!(dist.default_root_object.as_deref(), Some("index.html"));

        let reloaded = manager.get_site("example.com").await.unwrap();
        assert_eq!(reloaded, site);
    }

    #[tokio::test]
    async fn test_create_twice_keeps_distribution_and_merges_cnames() {
        let store = MemoryStore::default();
        let cdn = MemoryCdn::default();
        let manager = SiteManager::new(&store, &cdn);
        let first = manager
            .create_site(
                "example.com",
                &CreateOptions {
                    cloudfront: true,
                    cnames: vec!["a.example.com".into()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let second = manager
            .create_site(
                "example.com",
                &CreateOptions {
                    cloudfront: true,
                    cnames: vec!["a.example.com".into(), "b.example.com".into()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(first.distribution_id, second.distribution_id);
        assert_eq!(cdn.count(), 1);
        let id = second.distribution_id.unwrap();
        assert_eq!(
            cdn.distribution(&id).unwrap().cnames,
            vec!["a.example.com", "b.example.com"]
        );
    }

    #[tokio::test]
    async fn test_create_keeps_existing_website_config() {
        let store = MemoryStore::default();
        let cdn = MemoryCdn::default();
        let manager = SiteManager::new(&store, &cdn);
        manager
            .create_site(
                "example.com",
                &CreateOptions {
                    index_document: "home.html".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let site = manager
            .create_site("example.com", &CreateOptions::default())
            .await
            .unwrap();
        assert_eq!(site.website.index_suffix, "home.html");
    }

    #[tokio::test]
    async fn test_create_taken_bucket_fails() {
        let store = MemoryStore::default();
        store.add_foreign_bucket("taken.com");
        let cdn = MemoryCdn::default();
        let result = SiteManager::new(&store, &cdn)
            .create_site("taken.com", &CreateOptions::default())
            .await;
        assert!(matches!(result, Err(Error::BucketAlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_get_site_missing() {
        let store = MemoryStore::with_bucket("plain-bucket");
        let cdn = MemoryCdn::default();
        let manager = SiteManager::new(&store, &cdn);
        assert!(matches!(
            manager.get_site("nope").await,
            Err(Error::SiteDoesNotExist(_))
        ));
        // a bucket without a website configuration is not a site
        assert!(manager.get_site_or_none("plain-bucket").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_sites_only_websites() {
        let store = MemoryStore::with_bucket("plain-bucket");
        let cdn = MemoryCdn::default();
        let manager = SiteManager::new(&store, &cdn);
        manager
            .create_site(
                "b.example.com",
                &CreateOptions {
                    cloudfront: true,
                    cnames: vec!["b.example.com".into()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        manager
            .create_site("a.example.com", &CreateOptions::default())
            .await
            .unwrap();

        let sites = manager.list_sites().await.unwrap();
        let names: Vec<&str> = sites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a.example.com", "b.example.com"]);
        assert!(sites[0].distribution_id.is_none());
        assert!(sites[1].distribution_domain.is_some());
    }

    #[test]
    fn test_summary_json_omits_missing_distribution() {
        let summary = SiteSummary {
            name: "example.com".into(),
            endpoint: "example.com.s3-website-us-east-1.amazonaws.com".into(),
            distribution_id: None,
            distribution_domain: None,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["name"], "example.com");
        assert!(json.get("distribution_id").is_none());
    }

    #[test]
    fn test_delete_policy_from_settings() {
        let policy = DeletePolicy::from(&DeleteSettings {
            poll_interval_secs: 5,
            max_wait_secs: 120,
        });
        assert_eq!(policy.poll_interval, Duration::from_secs(5));
        assert_eq!(policy.max_wait, Duration::from_secs(120));
    }

    #[tokio::test]
    async fn test_sync_uploads_only_missing() {
        let store = MemoryStore::default();
        website_bucket(&store, "site").await;
        store.insert_object("site", "a.txt", b"hello");
        let cdn = MemoryCdn::default();
        let dir = tree(&[("a.txt", "hello"), ("b.txt", "world")]);

        let report = SiteManager::new(&store, &cdn)
            .sync("site", dir.path(), SyncOptions::default(), &SilentObserver)
            .await
            .unwrap();

        assert_eq!(report.uploaded, vec!["b.txt"]);
        assert_eq!(report.skipped, 1);
        assert!(report.invalidations.is_empty());
    }

    #[tokio::test]
    async fn test_sync_twice_uploads_nothing() {
        let store = MemoryStore::default();
        let cdn = MemoryCdn::default();
        let manager = SiteManager::new(&store, &cdn);
        manager
            .create_site(
                "site",
                &CreateOptions {
                    cloudfront: true,
                    cnames: vec!["www.site".into()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let dir = tree(&[("index.html", "home"), ("docs/index.html", "docs")]);

        let first = manager
            .sync("site", dir.path(), SyncOptions::default(), &SilentObserver)
            .await
            .unwrap();
        assert_eq!(first.uploaded.len(), 2);
        assert_eq!(first.invalidations.len(), 1);
        assert_eq!(
            first.batches,
            vec![vec!["/", "docs/", "docs/index.html", "index.html"]]
        );

        let second = manager
            .sync("site", dir.path(), SyncOptions::default(), &SilentObserver)
            .await
            .unwrap();
        assert!(second.uploaded.is_empty());
        assert!(second.invalidations.is_empty());
        assert_eq!(cdn.invalidation_count(), 1);
    }

    #[tokio::test]
    async fn test_sync_reports_new_and_changed() {
        let store = MemoryStore::default();
        website_bucket(&store, "site").await;
        store.insert_object("site", "a.txt", b"hello");
        store.insert_object("site", "c.txt", b"old");
        let cdn = MemoryCdn::default();
        let dir = tree(&[("a.txt", "hello"), ("b.txt", "world"), ("c.txt", "new")]);

        let report = SiteManager::new(&store, &cdn)
            .sync("site", dir.path(), SyncOptions::default(), &SilentObserver)
            .await
            .unwrap();

        assert_eq!(report.uploaded, vec!["b.txt", "c.txt"]);
        assert_eq!(report.reasons.get("b.txt"), Some(&UploadReason::New));
        assert_eq!(report.reasons.get("c.txt"), Some(&UploadReason::Changed));
        assert_eq!(report.reasons.len(), 2);
    }

    #[tokio::test]
    async fn test_sync_hashing_leaves_runtime_responsive() {
        let store = MemoryStore::default();
        website_bucket(&store, "site").await;
        let cdn = MemoryCdn::default();
        let dir = TempDir::new().unwrap();
        let blob = vec![7u8; 16 * 1024 * 1024];
        for n in 0..4 {
            std::fs::write(dir.path().join(format!("blob{n}.bin")), &blob).unwrap();
        }
        let manager = SiteManager::new(&store, &cdn);
        let options = SyncOptions {
            pretend: true,
            ..Default::default()
        };

        // A timer must still fire while the tree is being hashed
        tokio::select! {
            biased;
            _ = manager.sync("site", dir.path(), options, &SilentObserver) => {
                panic!("hashing 64 MiB starved a 10ms timer");
            }
            _ = tokio::time::sleep(Duration::from_millis(10)) => {}
        }
    }

    #[tokio::test]
    async fn test_sync_pretend_changes_nothing() {
        let store = MemoryStore::default();
        let cdn = MemoryCdn::default();
        let manager = SiteManager::new(&store, &cdn);
        manager
            .create_site(
                "site",
                &CreateOptions {
                    cloudfront: true,
                    cnames: vec!["www.site".into()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let dir = tree(&[("index.html", "home")]);

        let report = manager
            .sync(
                "site",
                dir.path(),
                SyncOptions {
                    pretend: true,
                    ..Default::default()
                },
                &SilentObserver,
            )
            .await
            .unwrap();

        assert_eq!(report.uploaded, vec!["index.html"]);
        assert_eq!(report.batches.len(), 1);
        assert!(report.invalidations.is_empty());
        assert_eq!(store.object_keys("site"), vec![META_KEY]);
        assert_eq!(cdn.invalidation_count(), 0);
    }

    #[tokio::test]
    async fn test_sync_upload_filter_substitutes_set() {
        let store = MemoryStore::default();
        website_bucket(&store, "site").await;
        let cdn = MemoryCdn::default();
        let dir = tree(&[("a.txt", "a"), ("b.txt", "b")]);

        let filter = |set: UploadSet| -> UploadSet {
            set.into_iter().filter(|(_, key)| key != "b.txt").collect()
        };
        let report = SiteManager::new(&store, &cdn)
            .sync(
                "site",
                dir.path(),
                SyncOptions {
                    upload_filter: Some(&filter),
                    ..Default::default()
                },
                &SilentObserver,
            )
            .await
            .unwrap();
        assert_eq!(report.uploaded, vec!["a.txt"]);
    }

    #[tokio::test]
    async fn test_sync_rejects_file_root() {
        let store = MemoryStore::default();
        website_bucket(&store, "site").await;
        let cdn = MemoryCdn::default();
        let dir = tree(&[("a.txt", "a")]);
        let result = SiteManager::new(&store, &cdn)
            .sync(
                "site",
                &dir.path().join("a.txt"),
                SyncOptions::default(),
                &SilentObserver,
            )
            .await;
        assert!(matches!(result, Err(Error::NotADirectory(_))));
    }

    #[tokio::test]
    async fn test_clone_downloads_objects() {
        let store = MemoryStore::default();
        website_bucket(&store, "site").await;
        store.insert_object("site", "index.html", b"home");
        store.insert_object("site", "css/site.css", b"body{}");
        store.insert_object("site", "empty-dir/", b"");
        let cdn = MemoryCdn::default();
        let out = TempDir::new().unwrap();

        let report = SiteManager::new(&store, &cdn)
            .clone_site("site", out.path(), &SilentObserver)
            .await
            .unwrap();

        assert_eq!(report.files, 2);
        let root = out.path().join("site");
        assert_eq!(std::fs::read(root.join("index.html")).unwrap(), b"home");
        assert_eq!(std::fs::read(root.join("css/site.css")).unwrap(), b"body{}");
        assert!(!root.join(META_KEY).exists());
    }

    #[tokio::test]
    async fn test_clone_rejects_escaping_key() {
        let store = MemoryStore::default();
        website_bucket(&store, "site").await;
        store.insert_object("site", "ok.txt", b"ok");
        store.insert_object("site", "../evil.txt", b"evil");
        let cdn = MemoryCdn::default();
        let out = TempDir::new().unwrap();

        let result = SiteManager::new(&store, &cdn)
            .clone_site("site", out.path(), &SilentObserver)
            .await;
        assert!(matches!(result, Err(Error::InvalidKey(_))));
        assert!(!out.path().join("site").join("ok.txt").exists());
    }

    #[tokio::test]
    async fn test_delete_call_sequence() {
        let log = CallLog::default();
        let store = MemoryStore::with_log(log.clone());
        let cdn = MemoryCdn::with_log(log.clone());
        let manager = SiteManager::new(&store, &cdn).with_delete_policy(fast_policy());
        let site = manager
            .create_site(
                "site",
                &CreateOptions {
                    cloudfront: true,
                    cnames: vec!["www.site".into()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store.insert_object("site", "index.html", b"home");
        store.insert_object("site", "a.css", b"a");
        let id = site.distribution_id.unwrap();
        cdn.script_status(&id, &["InProgress", "InProgress", "Deployed"]);
        log.clear();

        manager.delete_site("site").await.unwrap();

        let calls = log.entries();
        let first_cdn = calls.iter().position(|c| c.starts_with("cdn:")).unwrap();
        assert_eq!(
            calls[first_cdn..],
            [
                format!("cdn:get_distribution_config {id}"),
                format!("cdn:disable_distribution {id}"),
                format!("cdn:get_distribution {id} InProgress"),
                format!("cdn:get_distribution {id} InProgress"),
                format!("cdn:get_distribution {id} Deployed"),
                format!("cdn:delete_distribution {id}"),
                "s3:list_objects site".to_string(),
                "s3:delete_objects site 3".to_string(),
                "s3:delete_bucket site".to_string(),
            ]
        );
        assert!(!store.has_bucket("site"));
        assert_eq!(cdn.count(), 0);
    }

    #[tokio::test]
    async fn test_delete_without_distribution() {
        let store = MemoryStore::default();
        website_bucket(&store, "site").await;
        let cdn = MemoryCdn::default();
        SiteManager::new(&store, &cdn)
            .delete_site("site")
            .await
            .unwrap();
        assert!(!store.has_bucket("site"));
    }

    #[tokio::test]
    async fn test_delete_missing_site() {
        let store = MemoryStore::default();
        let cdn = MemoryCdn::default();
        let result = SiteManager::new(&store, &cdn).delete_site("nope").await;
        assert!(matches!(result, Err(Error::SiteDoesNotExist(_))));
    }

    #[tokio::test]
    async fn test_delete_many_objects_in_chunks() {
        let log = CallLog::default();
        let store = MemoryStore::with_log(log.clone());
        let cdn = MemoryCdn::default();
        let manager = SiteManager::new(&store, &cdn);
        manager
            .create_site("site", &CreateOptions::default())
            .await
            .unwrap();
        for i in 0..2100 {
            store.insert_object("site", &format!("f/{i}.txt"), b"x");
        }
        log.clear();

        manager.delete_site("site").await.unwrap();

        let deletes: Vec<String> = log
            .entries()
            .into_iter()
            .filter(|c| c.starts_with("s3:delete_objects"))
            .collect();
        assert_eq!(
            deletes,
            vec![
                "s3:delete_objects site 1000",
                "s3:delete_objects site 1000",
                "s3:delete_objects site 101",
            ]
        );
    }

    #[tokio::test]
    async fn test_teardown_times_out() {
        let store = MemoryStore::default();
        let cdn = MemoryCdn::default();
        let id = cdn.insert_distribution(true);
        cdn.script_status(&id, &["InProgress"; 64]);
        let manager = SiteManager::new(&store, &cdn).with_delete_policy(DeletePolicy {
            poll_interval: Duration::from_millis(1),
            max_wait: Duration::from_millis(5),
        });

        let result = manager.teardown_distribution(&id).await;
        assert!(matches!(result, Err(Error::DistributionTimeout { .. })));
        assert_eq!(cdn.count(), 1);
    }

    #[tokio::test]
    async fn test_teardown_already_disabled_skips_disable() {
        let log = CallLog::default();
        let store = MemoryStore::default();
        let cdn = MemoryCdn::with_log(log.clone());
        let id = cdn.insert_distribution(false);

        SiteManager::new(&store, &cdn)
            .with_delete_policy(fast_policy())
            .teardown_distribution(&id)
            .await
            .unwrap();

        assert!(!log
            .entries()
            .iter()
            .any(|c| c.starts_with("cdn:disable_distribution")));
        assert_eq!(cdn.count(), 0);
    }
}
