//! CLI command definitions and execution
//!
//! Each command lives in its own module with an `Args` struct and an
//! `execute` function returning an exit code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use s3site_aws::{AwsContext, CloudFrontCdn, S3Store};
use s3site_core::config::CONFIG_ENV;
use s3site_core::{Config, ConfigManager, DeletePolicy, SiteManager};

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

mod clone;
mod completions;
mod create;
mod delete;
mod list;
mod sync;

/// s3site - static websites on S3
///
/// Create, sync, list, clone and delete static websites hosted on S3,
/// optionally fronted by a CloudFront distribution.
#[derive(Parser, Debug)]
#[command(name = "s3site")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (default: ~/.s3site/config.toml)
    #[arg(long, global = true, env = CONFIG_ENV, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Disable progress bar
    #[arg(long, global = true, default_value = "false")]
    pub no_progress: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new static website, or update an existing one
    Create(create::CreateArgs),

    /// Upload new and changed files and invalidate them on the CDN
    Sync(sync::SyncArgs),

    /// List all static websites
    List(list::ListArgs),

    /// Download every file of a site
    Clone(clone::CloneArgs),

    /// Delete a site, its distribution and all of its files
    Delete(delete::DeleteArgs),

    /// Generate shell completion scripts
    Completions(completions::CompletionsArgs),
}

/// Loaded configuration plus connected AWS clients
pub(crate) struct Session {
    pub config: Config,
    pub store: S3Store,
    pub cdn: CloudFrontCdn,
}

impl Session {
    async fn open(config_path: Option<PathBuf>) -> s3site_core::Result<Self> {
        let manager = match config_path {
            Some(path) => ConfigManager::with_path(path),
            None => ConfigManager::new()?,
        };
        let config = manager.load()?;
        tracing::debug!(path = %manager.config_path().display(), "configuration loaded");

        let aws = AwsContext::connect(config.aws.clone()).await?;
        Ok(Self {
            store: aws.s3()?,
            cdn: aws.cloudfront()?,
            config,
        })
    }

    pub fn sites(&self) -> SiteManager<'_> {
        SiteManager::new(&self.store, &self.cdn)
            .with_delete_policy(DeletePolicy::from(&self.config.delete))
    }
}

/// Load configuration and connect, reporting failures through the formatter
pub(crate) async fn open_session(
    config_path: Option<PathBuf>,
    formatter: &Formatter,
) -> Result<Session, ExitCode> {
    Session::open(config_path).await.map_err(|e| {
        formatter.error(&e.to_string());
        ExitCode::GeneralError
    })
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let output_config = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        no_progress: cli.no_progress,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Create(args) => create::execute(args, cli.config, output_config).await,
        Commands::Sync(args) => sync::execute(args, cli.config, output_config).await,
        Commands::List(args) => list::execute(args, cli.config, output_config).await,
        Commands::Clone(args) => clone::execute(args, cli.config, output_config).await,
        Commands::Delete(args) => delete::execute(args, cli.config, output_config).await,
        Commands::Completions(args) => completions::execute(args),
    }
}

/// Report an interrupt; in-flight work is abandoned
pub fn interrupted() -> ExitCode {
    tracing::warn!("Exiting...");
    ExitCode::GeneralError
}
