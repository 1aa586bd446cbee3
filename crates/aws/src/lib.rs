//! s3site-aws: AWS adapters for s3site
//!
//! This crate implements the ObjectStore and CdnControl traits from
//! s3site-core on aws-sdk-s3 and aws-sdk-cloudfront. It is the only crate
//! that directly depends on the AWS SDK.

pub mod cloudfront;
pub mod context;
mod error;
pub mod s3;

pub use cloudfront::CloudFrontCdn;
pub use context::AwsContext;
pub use s3::S3Store;
