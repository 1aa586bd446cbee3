//! S3 object store
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore trait from s3site-core.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, Delete, ErrorDocument, IndexDocument,
    ObjectCannedAcl, ObjectIdentifier, ObjectOwnership, WebsiteConfiguration,
};
use tokio::io::AsyncWriteExt;

use s3site_core::path::KEY_SEPARATOR;
use s3site_core::site::MAX_DELETE_KEYS;
use s3site_core::{Error, ObjectInfo, ObjectStore, Progress, PutOptions, Result, WebsiteConfig};

use crate::error::{bucket_error, build_error, has_code, is_not_found, render};

/// Region where buckets are created without a location constraint
const DEFAULT_REGION: &str = "us-east-1";

/// Regions whose website endpoint uses `s3-website-<region>`; newer
/// regions only serve `s3-website.<region>`
const DASH_WEBSITE_REGIONS: &[&str] = &[
    "us-east-1",
    "us-west-1",
    "us-west-2",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-northeast-1",
    "eu-west-1",
    "sa-east-1",
    "us-gov-west-1",
];

/// Website endpoint host for a bucket in `region`
pub fn website_endpoint(bucket: &str, region: &str) -> String {
    let separator = if DASH_WEBSITE_REGIONS.contains(&region) {
        '-'
    } else {
        '.'
    };
    let domain = if region.starts_with("cn-") {
        "amazonaws.com.cn"
    } else {
        "amazonaws.com"
    };
    format!("{bucket}.s3-website{separator}{region}.{domain}")
}

/// S3 client wrapper
#[derive(Clone)]
pub struct S3Store {
    inner: aws_sdk_s3::Client,
    region: String,
}

impl S3Store {
    pub fn new(inner: aws_sdk_s3::Client, region: impl Into<String>) -> Self {
        Self {
            inner,
            region: region.into(),
        }
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

fn timestamp(value: &aws_smithy_types::DateTime) -> Option<jiff::Timestamp> {
    jiff::Timestamp::from_second(value.secs()).ok()
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_buckets(&self) -> Result<Vec<String>> {
        let response = self
            .inner
            .list_buckets()
            .send()
            .await
            .map_err(|e| Error::Aws(render(e)))?;

        Ok(response
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(str::to_string))
            .collect())
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.inner.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let message = render(e);
                if is_not_found(&message) {
                    Ok(false)
                } else {
                    Err(Error::Aws(message))
                }
            }
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let location = (self.region != DEFAULT_REGION).then(|| {
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                .build()
        });

        self.inner
            .create_bucket()
            .bucket(bucket)
            .object_ownership(ObjectOwnership::ObjectWriter)
            .set_create_bucket_configuration(location)
            .send()
            .await
            .map_err(|e| bucket_error(bucket, e))?;

        // New buckets block public ACLs; website objects need them
        self.inner
            .delete_public_access_block()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| bucket_error(bucket, e))?;

        tracing::debug!(bucket, region = %self.region, "bucket created");
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.inner
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| bucket_error(bucket, e))?;

        Ok(())
    }

    async fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectInfo>> {
        let mut items = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let response = self
                .inner
                .list_objects_v2()
                .bucket(bucket)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(|e| bucket_error(bucket, e))?;

            for object in response.contents() {
                let key = object.key().unwrap_or_default().to_string();
                let mut info = ObjectInfo::new(key, object.size().unwrap_or(0));
                info.etag = object.e_tag().map(str::to_string);
                info.last_modified = object.last_modified().and_then(timestamp);
                items.push(info);
            }

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation_token = Some(token.to_string());
                }
                _ => break,
            }
        }

        tracing::debug!(bucket, count = items.len(), "listed objects");
        Ok(items)
    }

    async fn get_website(&self, bucket: &str) -> Result<Option<WebsiteConfig>> {
        match self.inner.get_bucket_website().bucket(bucket).send().await {
            Ok(response) => {
                let index_suffix = response
                    .index_document()
                    .map(|d| d.suffix().to_string())
                    .unwrap_or_default();
                let error_key = response.error_document().map(|d| d.key().to_string());
                Ok(Some(WebsiteConfig::new(index_suffix, error_key)))
            }
            Err(e) => {
                let message = render(e);
                if has_code(&message, &["NoSuchWebsiteConfiguration"]) {
                    Ok(None)
                } else if has_code(&message, &["NoSuchBucket"]) {
                    Err(Error::BucketDoesNotExist(bucket.to_string()))
                } else {
                    Err(Error::Aws(message))
                }
            }
        }
    }

    async fn put_website(&self, bucket: &str, config: &WebsiteConfig) -> Result<()> {
        let index = IndexDocument::builder()
            .suffix(&config.index_suffix)
            .build()
            .map_err(build_error)?;
        let error = config
            .error_key
            .as_ref()
            .map(|key| ErrorDocument::builder().key(key).build())
            .transpose()
            .map_err(build_error)?;

        let website = WebsiteConfiguration::builder()
            .index_document(index)
            .set_error_document(error)
            .build();

        self.inner
            .put_bucket_website()
            .bucket(bucket)
            .website_configuration(website)
            .send()
            .await
            .map_err(|e| bucket_error(bucket, e))?;

        Ok(())
    }

    async fn website_endpoint(&self, bucket: &str) -> Result<String> {
        Ok(website_endpoint(bucket, &self.region))
    }

    async fn get_metadata(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<HashMap<String, String>>> {
        match self.inner.head_object().bucket(bucket).key(key).send().await {
            Ok(response) => Ok(Some(response.metadata().cloned().unwrap_or_default())),
            Err(e) => {
                let message = render(e);
                if is_not_found(&message) {
                    Ok(None)
                } else {
                    Err(Error::Aws(message))
                }
            }
        }
    }

    async fn put_bytes(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        options: &PutOptions,
    ) -> Result<()> {
        put_request(&self.inner, bucket, key, options)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| bucket_error(bucket, e))?;

        Ok(())
    }

    async fn put_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        options: &PutOptions,
        progress: Progress<'_>,
    ) -> Result<()> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| Error::General(format!("{}: {}", path.display(), render(e))))?;
        let total = body.size_hint().0;
        progress(0, total);

        put_request(&self.inner, bucket, key, options)
            .body(body)
            .send()
            .await
            .map_err(|e| bucket_error(bucket, e))?;

        progress(total, total);
        Ok(())
    }

    async fn download_file(
        &self,
        bucket: &str,
        key: &str,
        dest: &Path,
        progress: Progress<'_>,
    ) -> Result<u64> {
        let response = self
            .inner
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| bucket_error(bucket, e))?;

        let total = response.content_length().unwrap_or(0).max(0) as u64;
        let mut body = response.body;
        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| Error::file(dest, e))?;

        let mut written = 0u64;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| Error::Aws(render(e)))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::file(dest, e))?;
            written += chunk.len() as u64;
            progress(written, total);
        }
        file.flush().await.map_err(|e| Error::file(dest, e))?;

        Ok(written)
    }

    async fn delete_objects(&self, bucket: &str, keys: Vec<String>) -> Result<()> {
        for chunk in keys.chunks(MAX_DELETE_KEYS) {
            let objects = chunk
                .iter()
                .map(|k| ObjectIdentifier::builder().key(k).build())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(build_error)?;

            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .map_err(build_error)?;

            let response = self
                .inner
                .delete_objects()
                .bucket(bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| bucket_error(bucket, e))?;

            if !response.errors().is_empty() {
                let failed: Vec<&str> = response.errors().iter().filter_map(|e| e.key()).collect();
                return Err(Error::Aws(format!(
                    "failed to delete {} object(s) from {bucket}: {}",
                    failed.len(),
                    failed.join(", ")
                )));
            }
        }
        Ok(())
    }
}

fn put_request(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    options: &PutOptions,
) -> aws_sdk_s3::operation::put_object::builders::PutObjectFluentBuilder {
    let key = key.trim_start_matches(KEY_SEPARATOR);
    let mut request = client.put_object().bucket(bucket).key(key);
    if options.public_read {
        request = request.acl(ObjectCannedAcl::PublicRead);
    }
    if let Some(content_type) = &options.content_type {
        request = request.content_type(content_type);
    }
    if !options.metadata.is_empty() {
        request = request.set_metadata(Some(options.metadata.clone()));
    }
    request
}
