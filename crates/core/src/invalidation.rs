//! CDN invalidation planning and submission
//!
//! Uploaded keys are turned into sorted batches no larger than the CDN's
//! per-request limit. A key whose base name is the distribution's default
//! root object also invalidates its directory form (`docs/index.html` adds
//! `docs/`), and the two always travel in the same batch.

use crate::error::{Error, Result};
use crate::path::{base_name, directory_path};
use crate::traits::CdnControl;

/// Maximum number of paths in one invalidation request
pub const MAX_INVALIDATION_PATHS: usize = 1000;

/// A sorted, deduplicated set of paths within the request limit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationBatch {
    paths: Vec<String>,
}

impl InvalidationBatch {
    /// Build a batch, rejecting more than [`MAX_INVALIDATION_PATHS`] paths
    pub fn new(paths: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut paths: Vec<String> = paths.into_iter().collect();
        paths.sort();
        paths.dedup();
        if paths.len() > MAX_INVALIDATION_PATHS {
            return Err(Error::InvalidationBatchTooLarge {
                size: paths.len(),
                limit: MAX_INVALIDATION_PATHS,
            });
        }
        Ok(Self { paths })
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Split candidate keys into ordered batches
///
/// `root_object` is the distribution's default root object; `None` or an
/// empty name disables directory mirroring.
pub fn plan_batches(
    candidates: Vec<String>,
    root_object: Option<&str>,
) -> Result<Vec<InvalidationBatch>> {
    let root_object = root_object.filter(|r| !r.is_empty());

    let mut candidates = candidates;
    candidates.sort();
    candidates.dedup();

    let mut batches = Vec::new();
    let mut current: Vec<String> = Vec::new();
    for key in candidates {
        let mut group = vec![key];
        if root_object.is_some_and(|root| base_name(&group[0]) == root) {
            group.push(directory_path(&group[0]));
        }
        if current.len() + group.len() > MAX_INVALIDATION_PATHS {
            batches.push(InvalidationBatch::new(std::mem::take(&mut current))?);
        }
        current.extend(group);
    }
    if !current.is_empty() {
        batches.push(InvalidationBatch::new(current)?);
    }
    Ok(batches)
}

/// Hook that may replace the candidate key list before planning
pub type InvalidationFilter<'a> = &'a (dyn Fn(Vec<String>) -> Vec<String> + Send + Sync);

/// Plans and submits invalidations for one distribution
pub struct InvalidationBatcher<'a> {
    cdn: &'a dyn CdnControl,
}

impl<'a> InvalidationBatcher<'a> {
    pub fn new(cdn: &'a dyn CdnControl) -> Self {
        Self { cdn }
    }

    /// Build the batches for `keys` using the distribution's root object
    pub async fn plan(
        &self,
        distribution_id: &str,
        keys: Vec<String>,
        filter: Option<InvalidationFilter<'_>>,
    ) -> Result<Vec<InvalidationBatch>> {
        let candidates = match filter {
            Some(filter) => filter(keys),
            None => keys,
        };
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let config = self.cdn.get_distribution_config(distribution_id).await?;
        plan_batches(candidates, config.default_root_object.as_deref())
    }

    /// Submit batches in order, returning the invalidation ids
    pub async fn submit(
        &self,
        distribution_id: &str,
        batches: &[InvalidationBatch],
    ) -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(batches.len());
        for (n, batch) in batches.iter().enumerate() {
            let id = self.cdn.create_invalidation(distribution_id, batch).await?;
            tracing::info!(
                distribution = distribution_id,
                invalidation = %id,
                batch = n + 1,
                of = batches.len(),
                paths = batch.len(),
                "submitted invalidation"
            );
            ids.push(id);
        }
        Ok(ids)
    }

    /// Plan and submit in one step
    pub async fn invalidate(
        &self,
        distribution_id: &str,
        keys: Vec<String>,
        filter: Option<InvalidationFilter<'_>>,
    ) -> Result<Vec<String>> {
        let batches = self.plan(distribution_id, keys, filter).await?;
        self.submit(distribution_id, &batches).await
    }
}
