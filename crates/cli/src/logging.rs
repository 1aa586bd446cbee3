//! Tracing subscriber setup

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Filter used when `RUST_LOG` is unset
pub fn default_directives(debug: bool) -> &'static str {
    if debug {
        "warn,s3site=debug,s3site_core=debug,s3site_aws=debug"
    } else {
        "warn,s3site=info,s3site_core=info,s3site_aws=info"
    }
}

/// Install the global subscriber; `RUST_LOG` wins over `--debug`
pub fn init(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(debug)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(debug))
        .with(filter)
        .init();
}
