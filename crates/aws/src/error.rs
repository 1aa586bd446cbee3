//! Mapping SDK errors onto s3site-core errors
//!
//! SDK errors are rendered with their full source chain and classified by the
//! service error code found in the message.

use aws_smithy_types::error::display::DisplayErrorContext;
use s3site_core::Error;

/// Render an SDK error including every nested cause
pub(crate) fn render<E: std::error::Error>(err: E) -> String {
    DisplayErrorContext(err).to_string()
}

/// Whether the rendered error carries any of the given service codes
pub(crate) fn has_code(message: &str, codes: &[&str]) -> bool {
    codes.iter().any(|code| message.contains(code))
}

/// Missing bucket or object
pub(crate) fn is_not_found(message: &str) -> bool {
    has_code(message, &["NotFound", "NoSuchBucket", "NoSuchKey", "404"])
}

/// Map an SDK failure on `bucket` to a core error
pub(crate) fn bucket_error<E: std::error::Error>(bucket: &str, err: E) -> Error {
    let message = render(err);
    if has_code(&message, &["NoSuchBucket"]) {
        Error::BucketDoesNotExist(bucket.to_string())
    } else if has_code(&message, &["BucketAlreadyExists", "BucketAlreadyOwnedByYou"]) {
        Error::BucketAlreadyExists(bucket.to_string())
    } else {
        Error::Aws(message)
    }
}

/// Map an SDK failure on distribution `id` to a core error
pub(crate) fn distribution_error<E: std::error::Error>(id: &str, err: E) -> Error {
    let message = render(err);
    if has_code(&message, &["NoSuchDistribution"]) {
        Error::DistributionDoesNotExist(id.to_string())
    } else {
        Error::Aws(message)
    }
}

/// Map a request builder failure
pub(crate) fn build_error<E: std::error::Error>(err: E) -> Error {
    Error::Aws(format!("invalid request: {}", render(err)))
}
