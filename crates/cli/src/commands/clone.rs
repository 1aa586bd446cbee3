//! clone command - Download a site
//!
//! Downloads every file of a site into `<output_dir>/<site_name>/`.

use std::path::PathBuf;

use clap::Args;

use super::open_session;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, TransferProgress};

/// Download a site's files
#[derive(Args, Debug)]
pub struct CloneArgs {
    /// Site to download
    pub site_name: String,

    /// Directory to create the site directory in
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,
}

/// Execute the clone command
pub async fn execute(
    args: CloneArgs,
    config_path: Option<PathBuf>,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config.clone());
    let session = match open_session(config_path, &formatter).await {
        Ok(s) => s,
        Err(code) => return code,
    };
    let formatter = Formatter::new(output_config.with_defaults(&session.config.defaults));
    let observer = TransferProgress::new(formatter.clone(), "downloaded");

    match session
        .sites()
        .clone_site(&args.site_name, &args.output_dir, &observer)
        .await
    {
        Ok(report) => {
            if formatter.is_json() {
                formatter.json(&report);
            } else {
                let size = humansize::format_size(report.bytes, humansize::BINARY);
                formatter.success(&format!(
                    "Cloned {} file(s) ({size}) into {}.",
                    report.files,
                    report.destination.display()
                ));
            }
            ExitCode::Success
        }
        Err(e) => {
            formatter.error(&format!("Failed to clone '{}': {e}", args.site_name));
            ExitCode::GeneralError
        }
    }
}
