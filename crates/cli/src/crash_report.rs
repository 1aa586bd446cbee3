//! Crash reports for unexpected panics
//!
//! A panic writes `~/.s3site/logs/crash-report-<pid>.txt` with enough
//! context to file a bug, then the default hook prints the panic as usual.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context;

/// Render the report body
pub fn render(panic: &str, location: Option<String>) -> String {
    let mut report = String::new();
    let _ = writeln!(report, "s3site crash report");
    let _ = writeln!(report, "time:     {}", jiff::Timestamp::now());
    let _ = writeln!(report, "version:  {}", env!("CARGO_PKG_VERSION"));
    let _ = writeln!(
        report,
        "platform: {}-{}",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    let args: Vec<String> = std::env::args().collect();
    let _ = writeln!(report, "command:  {}", args.join(" "));
    let _ = writeln!(report, "panic:    {panic}");
    if let Some(location) = location {
        let _ = writeln!(report, "location: {location}");
    }
    report
}

/// Write a report into `dir`, returning its path
pub fn write_report(dir: &Path, body: &str) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating log directory {}", dir.display()))?;
    let path = dir.join(format!("crash-report-{}.txt", std::process::id()));
    std::fs::write(&path, body).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

fn log_dir() -> anyhow::Result<PathBuf> {
    Ok(s3site_core::config::config_dir()?.join("logs"))
}

/// Install the crash-report panic hook
pub fn install() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let payload = info.payload();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        let location = info.location().map(|l| l.to_string());
        let body = render(&message, location);

        match log_dir().and_then(|dir| write_report(&dir, &body)) {
            Ok(path) => tracing::error!(path = %path.display(), "crash report written"),
            Err(e) => tracing::error!(error = %e, "failed to write crash report"),
        }
        default_hook(info);
    }));
}
