//! list command - List static websites
//!
//! Shows every bucket configured as a website with its endpoint and the
//! CloudFront distribution linked to it, if any.

use std::path::PathBuf;

use clap::Args;
use comfy_table::{ContentArrangement, Table, presets};
use s3site_core::SiteSummary;

use super::open_session;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// List static websites
#[derive(Args, Debug)]
pub struct ListArgs {}

fn render_table(sites: &[SiteSummary]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["SITE", "ENDPOINT", "DISTRIBUTION", "CDN DOMAIN"]);
    for site in sites {
        table.add_row(vec![
            site.name.clone(),
            site.endpoint.clone(),
            site.distribution_id.clone().unwrap_or_else(|| "-".into()),
            site.distribution_domain.clone().unwrap_or_else(|| "-".into()),
        ]);
    }
    table
}

/// Execute the list command
pub async fn execute(
    _args: ListArgs,
    config_path: Option<PathBuf>,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config.clone());
    let session = match open_session(config_path, &formatter).await {
        Ok(s) => s,
        Err(code) => return code,
    };
    let formatter = Formatter::new(output_config.with_defaults(&session.config.defaults));

    let sites = match session.sites().list_sites().await {
        Ok(sites) => sites,
        Err(e) => {
            formatter.error(&format!("Failed to list sites: {e}"));
            return ExitCode::GeneralError;
        }
    };

    if formatter.is_json() {
        formatter.json(&sites);
    } else if sites.is_empty() {
        formatter.println("No static websites found.");
    } else {
        formatter.println(&render_table(&sites).to_string());
    }
    ExitCode::Success
}
