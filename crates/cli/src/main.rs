//! s3site - static websites on S3
//!
//! Create, sync, list, clone and delete static websites hosted on S3,
//! optionally fronted by a CloudFront distribution.

use clap::Parser;

use s3site::commands::{self, Cli};
use s3site::{crash_report, logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.debug);
    crash_report::install();

    let exit_code = tokio::select! {
        code = commands::execute(cli) => code,
        _ = tokio::signal::ctrl_c() => commands::interrupted(),
    };

    std::process::exit(exit_code.as_i32());
}
