//! delete command - Delete a site
//!
//! Disables and deletes the site's distribution (waiting for the disable to
//! propagate), then deletes every object and finally the bucket.

use std::path::PathBuf;

use clap::Args;
use console::Term;
use serde::Serialize;

use super::open_session;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Delete a site
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Site to delete
    pub site_name: String,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Debug, Serialize)]
struct DeleteOutput {
    status: &'static str,
    site: String,
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn confirm(site_name: &str) -> std::io::Result<bool> {
    let term = Term::stderr();
    if !term.is_term() {
        return Ok(false);
    }
    term.write_str(&format!(
        "Delete site '{site_name}', its distribution and all of its files? [y/N] "
    ))?;
    Ok(is_yes(&term.read_line()?))
}

/// Execute the delete command
pub async fn execute(
    args: DeleteArgs,
    config_path: Option<PathBuf>,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config.clone());
    let session = match open_session(config_path, &formatter).await {
        Ok(s) => s,
        Err(code) => return code,
    };
    let formatter = Formatter::new(output_config.with_defaults(&session.config.defaults));
    let sites = session.sites();

    // Fail on a missing site before prompting
    if let Err(e) = sites.get_site(&args.site_name).await {
        formatter.error(&e.to_string());
        return ExitCode::GeneralError;
    }

    if !args.yes {
        match confirm(&args.site_name) {
            Ok(true) => {}
            Ok(false) => {
                formatter.error("Not confirmed; pass --yes to delete without a prompt.");
                return ExitCode::GeneralError;
            }
            Err(e) => {
                formatter.error(&format!("Failed to read confirmation: {e}"));
                return ExitCode::GeneralError;
            }
        }
    }

    match sites.delete_site(&args.site_name).await {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&DeleteOutput {
                    status: "success",
                    site: args.site_name.clone(),
                });
            } else {
                formatter.success(&format!("Site '{}' deleted.", args.site_name));
            }
            ExitCode::Success
        }
        Err(e) => {
            formatter.error(&format!("Failed to delete '{}': {e}", args.site_name));
            ExitCode::GeneralError
        }
    }
}
