//! Snapshot of a bucket's objects keyed by object key

use std::collections::HashMap;

use crate::error::Result;
use crate::traits::{ObjectInfo, ObjectStore};

/// One remote object
#[derive(Debug, Clone)]
pub struct RemoteObjectRecord {
    pub key: String,
    /// ETag with surrounding quotes removed
    pub digest: String,
    pub info: ObjectInfo,
}

impl From<ObjectInfo> for RemoteObjectRecord {
    fn from(info: ObjectInfo) -> Self {
        let digest = info
            .etag
            .as_deref()
            .map(strip_quotes)
            .unwrap_or_default()
            .to_string();
        Self {
            key: info.key.clone(),
            digest,
            info,
        }
    }
}

/// Remove the quote characters the service wraps ETags in
pub fn strip_quotes(etag: &str) -> &str {
    etag.trim_matches('"')
}

/// Remote listing for one bucket
#[derive(Debug, Clone, Default)]
pub struct RemoteIndex {
    objects: HashMap<String, RemoteObjectRecord>,
}

impl RemoteIndex {
    /// List every object in `bucket`
    pub async fn fetch(store: &dyn ObjectStore, bucket: &str) -> Result<Self> {
        let index = Self::from_objects(store.list_objects(bucket).await?);
        if index.is_empty() {
            tracing::debug!(bucket, "bucket is empty");
        } else {
            tracing::debug!(bucket, count = index.len(), "fetched remote index");
        }
        Ok(index)
    }

    pub fn from_objects(objects: impl IntoIterator<Item = ObjectInfo>) -> Self {
        let objects = objects
            .into_iter()
            .map(RemoteObjectRecord::from)
            .map(|record| (record.key.clone(), record))
            .collect();
        Self { objects }
    }

    pub fn get(&self, key: &str) -> Option<&RemoteObjectRecord> {
        self.objects.get(key)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
