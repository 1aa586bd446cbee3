//! Shared SDK configuration and client construction

use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};

use s3site_core::config::AwsSettings;
use s3site_core::{Error, Result};

use crate::cloudfront::CloudFrontCdn;
use crate::s3::S3Store;

/// Lazily loaded AWS configuration shared by the S3 and CloudFront clients
pub struct AwsContext {
    settings: AwsSettings,
    sdk: Option<SdkConfig>,
}

impl AwsContext {
    pub fn new(settings: AwsSettings) -> Self {
        Self {
            settings,
            sdk: None,
        }
    }

    /// Create a context and load the SDK configuration
    pub async fn connect(settings: AwsSettings) -> Result<Self> {
        let mut context = Self::new(settings);
        context.reload().await?;
        Ok(context)
    }

    /// Rebuild the SDK configuration, picking up changed credentials
    pub async fn reload(&mut self) -> Result<()> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.settings.region.clone()))
            .retry_config(RetryConfig::standard().with_max_attempts(self.settings.max_attempts))
            .timeout_config(
                TimeoutConfig::builder()
                    .connect_timeout(self.settings.connect_timeout())
                    .read_timeout(self.settings.read_timeout())
                    .build(),
            );

        if let Some((access_key, secret_key)) = self.settings.static_credentials() {
            let credentials = aws_credential_types::Credentials::new(
                access_key,
                secret_key,
                None, // session token
                None, // expiry
                "s3site-static-credentials",
            );
            loader = loader.credentials_provider(credentials);
        }

        let sdk = loader.load().await;
        tracing::debug!(region = %self.settings.region, "AWS configuration loaded");
        self.sdk = Some(sdk);
        Ok(())
    }

    fn sdk(&self) -> Result<&SdkConfig> {
        self.sdk
            .as_ref()
            .ok_or_else(|| Error::General("AWS context used before connect".to_string()))
    }

    pub fn region(&self) -> &str {
        &self.settings.region
    }

    /// S3 store; an alternate endpoint switches to path-style addressing
    pub fn s3(&self) -> Result<S3Store> {
        let mut builder = aws_sdk_s3::config::Builder::from(self.sdk()?);
        if let Some(endpoint) = &self.settings.s3_endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        let client = aws_sdk_s3::Client::from_conf(builder.build());
        Ok(S3Store::new(client, self.settings.region.clone()))
    }

    pub fn cloudfront(&self) -> Result<CloudFrontCdn> {
        Ok(CloudFrontCdn::new(aws_sdk_cloudfront::Client::new(self.sdk()?)))
    }
}
