//! CloudFront distribution control
//!
//! Implements the CdnControl trait from s3site-core on aws-sdk-cloudfront.
//! Updates and deletes are conditional on the ETag read just before them.

use async_trait::async_trait;
use aws_sdk_cloudfront::types::{
    Aliases, CustomOriginConfig, DefaultCacheBehavior, DistributionConfig as SdkDistributionConfig,
    InvalidationBatch as SdkInvalidationBatch, Origin, OriginProtocolPolicy, Origins, Paths,
    TrustedSigners, ViewerProtocolPolicy,
};

use s3site_core::{
    CdnControl, DistributionConfig, DistributionInfo, DistributionSpec, Error, InvalidationBatch,
    Result,
};

use crate::error::{build_error, distribution_error, render};

/// Managed "CachingOptimized" cache policy
const CACHING_OPTIMIZED_POLICY: &str = "658327ea-f89d-4fab-a63d-7e88639e58f6";

/// Origin id used for the website endpoint
fn origin_id(origin: &str) -> String {
    format!("s3site-{origin}")
}

/// RFC 1738 unsafe characters, plus `*`, which CloudFront reads as a wildcard
const UNSAFE_PATH_CHARS: &str = " \"#%<>[\\]^`{|}*";

fn needs_escape(c: char) -> bool {
    !c.is_ascii() || c.is_ascii_control() || UNSAFE_PATH_CHARS.contains(c)
}

/// Absolute invalidation path for an object key
///
/// Only characters CloudFront requires encoded are escaped; `/` and every
/// other character are kept as-is so the path matches the cached object.
pub fn invalidation_path(key: &str) -> String {
    let mut path = String::with_capacity(key.len() + 1);
    if !key.starts_with('/') {
        path.push('/');
    }
    let mut buf = [0u8; 4];
    for c in key.chars() {
        if needs_escape(c) {
            path.push_str(&urlencoding::encode(c.encode_utf8(&mut buf)));
        } else {
            path.push(c);
        }
    }
    path
}

/// Unique caller reference for create requests
fn caller_reference(prefix: &str) -> String {
    let now = jiff::Timestamp::now();
    format!("s3site-{prefix}-{}", now.as_nanosecond())
}

fn aliases(cnames: &[String]) -> Result<Aliases> {
    Aliases::builder()
        .quantity(cnames.len() as i32)
        .set_items((!cnames.is_empty()).then(|| cnames.to_vec()))
        .build()
        .map_err(build_error)
}

/// Read an SDK flag that may be modeled as optional
fn flag(value: impl Into<Option<bool>>) -> bool {
    value.into().unwrap_or(false)
}

fn alias_items(aliases: Option<&Aliases>) -> Vec<String> {
    aliases.map(|a| a.items().to_vec()).unwrap_or_default()
}

/// CloudFront client wrapper
#[derive(Clone)]
pub struct CloudFrontCdn {
    inner: aws_sdk_cloudfront::Client,
}

impl CloudFrontCdn {
    pub fn new(inner: aws_sdk_cloudfront::Client) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &aws_sdk_cloudfront::Client {
        &self.inner
    }

    /// Current configuration with the ETag needed to change it
    async fn config_with_etag(&self, id: &str) -> Result<(SdkDistributionConfig, String)> {
        let response = self
            .inner
            .get_distribution_config()
            .id(id)
            .send()
            .await
            .map_err(|e| distribution_error(id, e))?;

        let config = response
            .distribution_config()
            .cloned()
            .ok_or_else(|| Error::Aws(format!("distribution {id} returned no configuration")))?;
        let etag = response
            .e_tag()
            .ok_or_else(|| Error::Aws(format!("distribution {id} returned no ETag")))?
            .to_string();
        Ok((config, etag))
    }

    async fn update(&self, id: &str, etag: &str, config: SdkDistributionConfig) -> Result<()> {
        self.inner
            .update_distribution()
            .id(id)
            .if_match(etag)
            .distribution_config(config)
            .send()
            .await
            .map_err(|e| distribution_error(id, e))?;
        Ok(())
    }

    fn build_config(spec: &DistributionSpec) -> Result<SdkDistributionConfig> {
        let origin_id = origin_id(&spec.origin);

        let custom_origin = CustomOriginConfig::builder()
            .http_port(80)
            .https_port(443)
            .origin_protocol_policy(OriginProtocolPolicy::HttpOnly)
            .build()
            .map_err(build_error)?;
        let origin = Origin::builder()
            .id(&origin_id)
            .domain_name(&spec.origin)
            .custom_origin_config(custom_origin)
            .build()
            .map_err(build_error)?;
        let origins = Origins::builder()
            .quantity(1)
            .items(origin)
            .build()
            .map_err(build_error)?;

        let trusted_signers = TrustedSigners::builder()
            .enabled(!spec.trusted_signers.is_empty())
            .quantity(spec.trusted_signers.len() as i32)
            .set_items((!spec.trusted_signers.is_empty()).then(|| spec.trusted_signers.clone()))
            .build()
            .map_err(build_error)?;
        let cache_behavior = DefaultCacheBehavior::builder()
            .target_origin_id(&origin_id)
            .viewer_protocol_policy(ViewerProtocolPolicy::AllowAll)
            .cache_policy_id(CACHING_OPTIMIZED_POLICY)
            .trusted_signers(trusted_signers)
            .build()
            .map_err(build_error)?;

        SdkDistributionConfig::builder()
            .caller_reference(caller_reference("distribution"))
            .comment(&spec.comment)
            .enabled(spec.enabled)
            .aliases(aliases(&spec.cnames)?)
            .default_root_object(&spec.default_root_object)
            .origins(origins)
            .default_cache_behavior(cache_behavior)
            .build()
            .map_err(build_error)
    }
}

#[async_trait]
impl CdnControl for CloudFrontCdn {
    async fn create_distribution(&self, spec: &DistributionSpec) -> Result<DistributionInfo> {
        let config = Self::build_config(spec)?;
        let response = self
            .inner
            .create_distribution()
            .distribution_config(config)
            .send()
            .await
            .map_err(|e| Error::Aws(render(e)))?;

        let distribution = response
            .distribution()
            .ok_or_else(|| Error::Aws("create returned no distribution".to_string()))?;
        Ok(DistributionInfo {
            id: distribution.id().to_string(),
            domain_name: distribution.domain_name().to_string(),
            status: distribution.status().to_string(),
            enabled: spec.enabled,
            cnames: spec.cnames.clone(),
        })
    }

    async fn list_distributions(&self) -> Result<Vec<DistributionInfo>> {
        let mut items = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let response = self
                .inner
                .list_distributions()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| Error::Aws(render(e)))?;

            let Some(list) = response.distribution_list() else {
                break;
            };
            for summary in list.items() {
                items.push(DistributionInfo {
                    id: summary.id().to_string(),
                    domain_name: summary.domain_name().to_string(),
                    status: summary.status().to_string(),
                    enabled: flag(summary.enabled()),
                    cnames: alias_items(summary.aliases()),
                });
            }

            match list.next_marker() {
                Some(next) if flag(list.is_truncated()) => marker = Some(next.to_string()),
                _ => break,
            }
        }

        Ok(items)
    }

    async fn get_distribution(&self, id: &str) -> Result<DistributionInfo> {
        let response = self
            .inner
            .get_distribution()
            .id(id)
            .send()
            .await
            .map_err(|e| distribution_error(id, e))?;

        let distribution = response
            .distribution()
            .ok_or_else(|| Error::DistributionDoesNotExist(id.to_string()))?;
        let config = distribution.distribution_config();
        Ok(DistributionInfo {
            id: distribution.id().to_string(),
            domain_name: distribution.domain_name().to_string(),
            status: distribution.status().to_string(),
            enabled: config.is_some_and(|c| flag(c.enabled())),
            cnames: alias_items(config.and_then(|c| c.aliases())),
        })
    }

    async fn get_distribution_config(&self, id: &str) -> Result<DistributionConfig> {
        let (config, _) = self.config_with_etag(id).await?;
        Ok(DistributionConfig {
            enabled: flag(config.enabled()),
            cnames: alias_items(config.aliases()),
            default_root_object: config
                .default_root_object()
                .filter(|r| !r.is_empty())
                .map(str::to_string),
        })
    }

    async fn update_cnames(&self, id: &str, cnames: Vec<String>) -> Result<()> {
        let (mut config, etag) = self.config_with_etag(id).await?;
        config.aliases = Some(aliases(&cnames)?);
        self.update(id, &etag, config).await
    }

    async fn disable_distribution(&self, id: &str) -> Result<()> {
        let (mut config, etag) = self.config_with_etag(id).await?;
        config.enabled = false.into();
        self.update(id, &etag, config).await
    }

    async fn delete_distribution(&self, id: &str) -> Result<()> {
        let (_, etag) = self.config_with_etag(id).await?;
        self.inner
            .delete_distribution()
            .id(id)
            .if_match(etag)
            .send()
            .await
            .map_err(|e| distribution_error(id, e))?;
        Ok(())
    }

    async fn create_invalidation(&self, id: &str, batch: &InvalidationBatch) -> Result<String> {
        let items: Vec<String> = batch.paths().iter().map(|p| invalidation_path(p)).collect();
        let paths = Paths::builder()
            .quantity(items.len() as i32)
            .set_items(Some(items))
            .build()
            .map_err(build_error)?;
        let invalidation = SdkInvalidationBatch::builder()
            .paths(paths)
            .caller_reference(caller_reference("invalidation"))
            .build()
            .map_err(build_error)?;

        let response = self
            .inner
            .create_invalidation()
            .distribution_id(id)
            .invalidation_batch(invalidation)
            .send()
            .await
            .map_err(|e| distribution_error(id, e))?;

        response
            .invalidation()
            .map(|i| i.id().to_string())
            .ok_or_else(|| Error::Aws("create invalidation returned no id".to_string()))
    }
}
