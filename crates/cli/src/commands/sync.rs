//! sync command - Upload a local directory to a site
//!
//! Uploads files that are new or changed since the last sync, then
//! invalidates them on the site's distribution. Remote files are never
//! deleted.

use std::path::PathBuf;

use clap::Args;
use glob::Pattern;
use s3site_core::site::UploadFilter;
use s3site_core::{SyncOptions, SyncReport, UploadReason, UploadSet};

use super::open_session;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, TransferProgress};

/// Sync a local directory to a site
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Site to sync to
    pub site_name: String,

    /// Local directory holding the site's files
    pub root_directory: PathBuf,

    /// Show what would be uploaded and invalidated without doing it
    #[arg(long)]
    pub pretend: bool,

    /// Skip files whose key matches GLOB (repeatable)
    #[arg(long = "exclude", value_name = "GLOB")]
    pub excludes: Vec<String>,
}

/// Compile `--exclude` globs
fn compile_excludes(excludes: &[String]) -> Result<Vec<Pattern>, String> {
    excludes
        .iter()
        .map(|glob| {
            Pattern::new(glob).map_err(|e| format!("Invalid exclude pattern '{glob}': {e}"))
        })
        .collect()
}

/// Drop every upload whose key matches one of `patterns`
fn exclude(uploads: UploadSet, patterns: &[Pattern]) -> UploadSet {
    uploads
        .into_iter()
        .filter(|(_, key)| {
            let excluded = patterns.iter().any(|p| p.matches(key));
            if excluded {
                tracing::debug!(%key, "excluded");
            }
            !excluded
        })
        .collect()
}

/// Number of new and changed files among the uploads
fn reason_counts(report: &SyncReport) -> (usize, usize) {
    let new = report
        .reasons
        .values()
        .filter(|reason| **reason == UploadReason::New)
        .count();
    (new, report.reasons.len() - new)
}

/// Execute the sync command
pub async fn execute(
    args: SyncArgs,
    config_path: Option<PathBuf>,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config.clone());

    let patterns = match compile_excludes(&args.excludes) {
        Ok(p) => p,
        Err(message) => {
            formatter.error(&message);
            return ExitCode::UsageError;
        }
    };

    let session = match open_session(config_path, &formatter).await {
        Ok(s) => s,
        Err(code) => return code,
    };
    let formatter = Formatter::new(output_config.with_defaults(&session.config.defaults));

    let filter = |uploads: UploadSet| exclude(uploads, &patterns);
    let upload_filter: Option<UploadFilter<'_>> = if patterns.is_empty() {
        None
    } else {
        Some(&filter)
    };
    let options = SyncOptions {
        pretend: args.pretend,
        upload_filter,
        invalidation_filter: None,
    };
    let observer = TransferProgress::new(formatter.clone(), "uploaded");

    let report = match session
        .sites()
        .sync(&args.site_name, &args.root_directory, options, &observer)
        .await
    {
        Ok(report) => report,
        Err(e) => {
            formatter.error(&format!("Failed to sync '{}': {e}", args.site_name));
            return ExitCode::GeneralError;
        }
    };

    if formatter.is_json() {
        formatter.json(&report);
        return ExitCode::Success;
    }

    if report.pretend {
        for (n, batch) in report.batches.iter().enumerate() {
            formatter.println(&format!(
                "would invalidate batch {}/{} ({} paths):",
                n + 1,
                report.batches.len(),
                batch.len()
            ));
            for path in batch {
                formatter.println(&format!("  {path}"));
            }
        }
    }

    let size = humansize::format_size(report.bytes, humansize::BINARY);
    let verb = if report.pretend { "Would upload" } else { "Uploaded" };
    let (new, changed) = reason_counts(&report);
    formatter.success(&format!(
        "{verb} {} of {} file(s) ({new} new, {changed} changed, {size}) to '{}'.",
        report.uploaded.len(),
        report.scanned,
        report.site
    ));
    if !report.invalidations.is_empty() {
        formatter.println(&format!(
            "Submitted {} invalidation(s): {}",
            report.invalidations.len(),
            report.invalidations.join(", ")
        ));
    }
    ExitCode::Success
}
