//! create command - Create a static website
//!
//! Creates the bucket, website configuration, site marker and optionally a
//! CloudFront distribution. Re-running on an existing site is safe.

use std::path::PathBuf;

use clap::Args;
use s3site_core::CreateOptions;
use serde::Serialize;

use super::open_session;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Create a static website
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Site name, also used as the bucket name (e.g. www.example.com)
    pub site_name: String,

    /// Index document served for directory requests
    #[arg(long, value_name = "DOCUMENT")]
    pub index: Option<String>,

    /// Error document served for missing pages
    #[arg(long, value_name = "DOCUMENT")]
    pub error: Option<String>,

    /// Also create a CloudFront distribution
    #[arg(long, requires = "cnames")]
    pub cloudfront: bool,

    /// CNAME for the distribution (repeatable)
    #[arg(long = "cname", value_name = "CNAME")]
    pub cnames: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CreateOutput {
    status: &'static str,
    site: String,
    endpoint: String,
    index_document: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_document: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    distribution_id: Option<String>,
}

impl CreateArgs {
    /// Command-line values win over the `[site]` defaults
    fn options(&self, defaults: &s3site_core::config::SiteDefaults) -> CreateOptions {
        CreateOptions {
            index_document: self
                .index
                .clone()
                .unwrap_or_else(|| defaults.index_document.clone()),
            error_document: self
                .error
                .clone()
                .or_else(|| Some(defaults.error_document.clone()))
                .filter(|d| !d.is_empty()),
            cloudfront: self.cloudfront,
            cnames: self.cnames.clone(),
        }
    }
}

/// Execute the create command
pub async fn execute(
    args: CreateArgs,
    config_path: Option<PathBuf>,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config.clone());
    let session = match open_session(config_path, &formatter).await {
        Ok(s) => s,
        Err(code) => return code,
    };
    let formatter = Formatter::new(output_config.with_defaults(&session.config.defaults));

    let options = args.options(&session.config.site);
    let site = match session.sites().create_site(&args.site_name, &options).await {
        Ok(site) => site,
        Err(e) => {
            formatter.error(&format!("Failed to create site '{}': {e}", args.site_name));
            return ExitCode::GeneralError;
        }
    };

    if formatter.is_json() {
        formatter.json(&CreateOutput {
            status: "success",
            site: site.name.clone(),
            endpoint: site.endpoint.clone(),
            index_document: site.website.index_suffix.clone(),
            error_document: site.website.error_key.clone(),
            distribution_id: site.distribution_id.clone(),
        });
    } else {
        formatter.success(&format!("Site '{}' is ready.", site.name));
        formatter.println(&format!("  endpoint:     http://{}", site.endpoint));
        if let Some(id) = &site.distribution_id {
            formatter.println(&format!("  distribution: {id}"));
        }
    }
    ExitCode::Success
}
