//! In-memory object store and CDN used by unit tests

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::invalidation::InvalidationBatch;
use crate::traits::{
    CdnControl, DistributionConfig, DistributionInfo, DistributionSpec, ObjectInfo, ObjectStore,
    Progress, PutOptions, WebsiteConfig,
};

/// Ordered log of calls, shareable between fakes
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn record(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

struct StoredObject {
    data: Vec<u8>,
    options: PutOptions,
}

#[derive(Default)]
struct Bucket {
    objects: BTreeMap<String, StoredObject>,
    website: Option<WebsiteConfig>,
}

#[derive(Default)]
struct StoreState {
    buckets: BTreeMap<String, Bucket>,
    foreign: HashSet<String>,
    fail_put: HashSet<String>,
}

/// Object store holding everything in memory
///
/// ETags are the quoted MD5 of the content, like single-part S3 uploads.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    log: CallLog,
}

impl MemoryStore {
    pub fn with_log(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn with_bucket(name: &str) -> Self {
        let store = Self::default();
        store
            .state
            .lock()
            .unwrap()
            .buckets
            .insert(name.to_string(), Bucket::default());
        store
    }

    /// A bucket name owned by someone else
    pub fn add_foreign_bucket(&self, name: &str) {
        self.state.lock().unwrap().foreign.insert(name.to_string());
    }

    /// Make uploads of `key` fail
    pub fn fail_put(&self, key: &str) {
        self.state.lock().unwrap().fail_put.insert(key.to_string());
    }

    pub fn insert_object(&self, bucket: &str, key: &str, data: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .objects
            .insert(
                key.to_string(),
                StoredObject {
                    data: data.to_vec(),
                    options: PutOptions::default(),
                },
            );
    }

    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.state.lock().unwrap().buckets.contains_key(bucket)
    }

    /// Keys in `bucket`, sorted
    pub fn object_keys(&self, bucket: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .buckets
            .get(bucket)
            .map(|b| b.objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn put_options(&self, bucket: &str, key: &str) -> Option<PutOptions> {
        self.state
            .lock()
            .unwrap()
            .buckets
            .get(bucket)?
            .objects
            .get(key)
            .map(|o| o.options.clone())
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.entries()
    }

    fn with_bucket_mut<T>(&self, bucket: &str, f: impl FnOnce(&mut Bucket) -> T) -> Result<T> {
        let mut state = self.state.lock().unwrap();
        let entry = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| Error::BucketDoesNotExist(bucket.to_string()))?;
        Ok(f(entry))
    }

    fn store(&self, bucket: &str, key: &str, data: Vec<u8>, options: &PutOptions) -> Result<()> {
        if self.state.lock().unwrap().fail_put.contains(key) {
            return Err(Error::Aws(format!("injected failure for {key}")));
        }
        self.with_bucket_mut(bucket, |b| {
            b.objects.insert(
                key.to_string(),
                StoredObject {
                    data,
                    options: options.clone(),
                },
            );
        })
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_buckets(&self) -> Result<Vec<String>> {
        self.log.record("s3:list_buckets");
        Ok(self.state.lock().unwrap().buckets.keys().cloned().collect())
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        self.log.record(format!("s3:bucket_exists {bucket}"));
        Ok(self.has_bucket(bucket))
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        self.log.record(format!("s3:create_bucket {bucket}"));
        let mut state = self.state.lock().unwrap();
        if state.foreign.contains(bucket) || state.buckets.contains_key(bucket) {
            return Err(Error::BucketAlreadyExists(bucket.to_string()));
        }
        state.buckets.insert(bucket.to_string(), Bucket::default());
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.log.record(format!("s3:delete_bucket {bucket}"));
        let mut state = self.state.lock().unwrap();
        match state.buckets.get(bucket) {
            None => Err(Error::BucketDoesNotExist(bucket.to_string())),
            Some(b) if !b.objects.is_empty() => {
                Err(Error::Aws(format!("BucketNotEmpty: {bucket}")))
            }
            Some(_) => {
                state.buckets.remove(bucket);
                Ok(())
            }
        }
    }

    async fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectInfo>> {
        self.log.record(format!("s3:list_objects {bucket}"));
        self.with_bucket_mut(bucket, |b| {
            b.objects
                .iter()
                .map(|(key, o)| {
                    ObjectInfo::new(key.clone(), o.data.len() as i64)
                        .with_etag(format!("\"{:x}\"", md5::compute(&o.data)))
                })
                .collect()
        })
    }

    async fn get_website(&self, bucket: &str) -> Result<Option<WebsiteConfig>> {
        self.log.record(format!("s3:get_website {bucket}"));
        self.with_bucket_mut(bucket, |b| b.website.clone())
    }

    async fn put_website(&self, bucket: &str, config: &WebsiteConfig) -> Result<()> {
        self.log.record(format!("s3:put_website {bucket}"));
        self.with_bucket_mut(bucket, |b| b.website = Some(config.clone()))
    }

    async fn website_endpoint(&self, bucket: &str) -> Result<String> {
        Ok(format!("{bucket}.s3-website-us-east-1.amazonaws.com"))
    }

    async fn get_metadata(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<HashMap<String, String>>> {
        self.log.record(format!("s3:get_metadata {bucket}/{key}"));
        self.with_bucket_mut(bucket, |b| {
            b.objects.get(key).map(|o| o.options.metadata.clone())
        })
    }

    async fn put_bytes(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        options: &PutOptions,
    ) -> Result<()> {
        self.log.record(format!("s3:put_bytes {bucket}/{key}"));
        self.store(bucket, key, data, options)
    }

    async fn put_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        options: &PutOptions,
        progress: Progress<'_>,
    ) -> Result<()> {
        self.log.record(format!("s3:put_file {bucket}/{key}"));
        let data = std::fs::read(path).map_err(|e| Error::file(path, e))?;
        let len = data.len() as u64;
        progress(0, len);
        self.store(bucket, key, data, options)?;
        progress(len, len);
        Ok(())
    }

    async fn download_file(
        &self,
        bucket: &str,
        key: &str,
        dest: &Path,
        progress: Progress<'_>,
    ) -> Result<u64> {
        self.log.record(format!("s3:download_file {bucket}/{key}"));
        let data = self
            .with_bucket_mut(bucket, |b| b.objects.get(key).map(|o| o.data.clone()))?
            .ok_or_else(|| Error::General(format!("no such key: {key}")))?;
        std::fs::write(dest, &data).map_err(|e| Error::file(dest, e))?;
        let len = data.len() as u64;
        progress(len, len);
        Ok(len)
    }

    async fn delete_objects(&self, bucket: &str, keys: Vec<String>) -> Result<()> {
        self.log
            .record(format!("s3:delete_objects {bucket} {}", keys.len()));
        self.with_bucket_mut(bucket, |b| {
            for key in &keys {
                b.objects.remove(key);
            }
        })
    }
}

/// A distribution held by [`MemoryCdn`]
#[derive(Debug, Clone)]
pub struct FakeDistribution {
    pub origin: String,
    pub enabled: bool,
    pub cnames: Vec<String>,
    pub default_root_object: Option<String>,
    /// Statuses returned by successive `get_distribution` calls
    statuses: VecDeque<String>,
}

#[derive(Default)]
struct CdnState {
    distributions: BTreeMap<String, FakeDistribution>,
    next_id: usize,
    invalidations: Vec<(String, Vec<String>)>,
}

/// CDN fake with scriptable propagation status
///
/// Once a status script runs out, the distribution reports `Deployed`.
#[derive(Default)]
pub struct MemoryCdn {
    state: Mutex<CdnState>,
    log: CallLog,
}

impl MemoryCdn {
    pub fn with_log(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    /// Add a distribution directly, returning its id
    pub fn insert_distribution(&self, enabled: bool) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("E{:04}", state.next_id);
        state.distributions.insert(
            id.clone(),
            FakeDistribution {
                origin: "origin.example".to_string(),
                enabled,
                cnames: Vec::new(),
                default_root_object: Some("index.html".to_string()),
                statuses: VecDeque::new(),
            },
        );
        id
    }

    pub fn script_status(&self, id: &str, statuses: &[&str]) {
        if let Some(d) = self.state.lock().unwrap().distributions.get_mut(id) {
            d.statuses = statuses.iter().map(|s| s.to_string()).collect();
        }
    }

    pub fn distribution(&self, id: &str) -> Option<FakeDistribution> {
        self.state.lock().unwrap().distributions.get(id).cloned()
    }

    pub fn count(&self) -> usize {
        self.state.lock().unwrap().distributions.len()
    }

    pub fn invalidation_count(&self) -> usize {
        self.state.lock().unwrap().invalidations.len()
    }

    fn info(id: &str, d: &FakeDistribution, status: String) -> DistributionInfo {
        DistributionInfo {
            id: id.to_string(),
            domain_name: format!("{}.cloudfront.net", id.to_lowercase()),
            status,
            enabled: d.enabled,
            cnames: d.cnames.clone(),
        }
    }

    fn with_distribution<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut FakeDistribution) -> T,
    ) -> Result<T> {
        let mut state = self.state.lock().unwrap();
        let d = state
            .distributions
            .get_mut(id)
            .ok_or_else(|| Error::DistributionDoesNotExist(id.to_string()))?;
        Ok(f(d))
    }
}

#[async_trait]
impl CdnControl for MemoryCdn {
    async fn create_distribution(&self, spec: &DistributionSpec) -> Result<DistributionInfo> {
        self.log.record("cdn:create_distribution");
        let id = self.insert_distribution(spec.enabled);
        self.with_distribution(&id, |d| {
            d.origin = spec.origin.clone();
            d.cnames = spec.cnames.clone();
            d.default_root_object =
                Some(spec.default_root_object.clone()).filter(|r| !r.is_empty());
            Self::info(&id, d, "InProgress".to_string())
        })
    }

    async fn list_distributions(&self) -> Result<Vec<DistributionInfo>> {
        self.log.record("cdn:list_distributions");
        Ok(self
            .state
            .lock()
            .unwrap()
            .distributions
            .iter()
            .map(|(id, d)| Self::info(id, d, "Deployed".to_string()))
            .collect())
    }

    async fn get_distribution(&self, id: &str) -> Result<DistributionInfo> {
        let info = self.with_distribution(id, |d| {
            let status = d
                .statuses
                .pop_front()
                .unwrap_or_else(|| "Deployed".to_string());
            Self::info(id, d, status)
        });
        match &info {
            Ok(info) => self
                .log
                .record(format!("cdn:get_distribution {id} {}", info.status)),
            Err(_) => self.log.record(format!("cdn:get_distribution {id}")),
        }
        info
    }

    async fn get_distribution_config(&self, id: &str) -> Result<DistributionConfig> {
        self.log.record(format!("cdn:get_distribution_config {id}"));
        self.with_distribution(id, |d| DistributionConfig {
            enabled: d.enabled,
            cnames: d.cnames.clone(),
            default_root_object: d.default_root_object.clone(),
        })
    }

    async fn update_cnames(&self, id: &str, cnames: Vec<String>) -> Result<()> {
        self.log.record(format!("cdn:update_cnames {id}"));
        self.with_distribution(id, |d| d.cnames = cnames)
    }

    async fn disable_distribution(&self, id: &str) -> Result<()> {
        self.log.record(format!("cdn:disable_distribution {id}"));
        self.with_distribution(id, |d| d.enabled = false)
    }

    async fn delete_distribution(&self, id: &str) -> Result<()> {
        self.log.record(format!("cdn:delete_distribution {id}"));
        let mut state = self.state.lock().unwrap();
        match state.distributions.get(id) {
            None => Err(Error::DistributionDoesNotExist(id.to_string())),
            Some(d) if d.enabled => Err(Error::Aws(format!(
                "DistributionNotDisabled: {id}"
            ))),
            Some(_) => {
                state.distributions.remove(id);
                Ok(())
            }
        }
    }

    async fn create_invalidation(&self, id: &str, batch: &InvalidationBatch) -> Result<String> {
        self.log
            .record(format!("cdn:create_invalidation {id} {}", batch.len()));
        let mut state = self.state.lock().unwrap();
        if !state.distributions.contains_key(id) {
            return Err(Error::DistributionDoesNotExist(id.to_string()));
        }
        state
            .invalidations
            .push((id.to_string(), batch.paths().to_vec()));
        Ok(format!("I{:04}", state.invalidations.len()))
    }
}
