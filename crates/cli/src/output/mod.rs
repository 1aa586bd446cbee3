//! Output formatting utilities
//!
//! This module provides formatters for CLI output in both human-readable
//! and JSON formats. It also handles progress bars and colored output.

mod formatter;
mod progress;

pub use formatter::Formatter;
pub use progress::{ProgressBar, TransferProgress};

/// Output configuration derived from CLI flags and the `[defaults]` section
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    /// Use JSON output format
    pub json: bool,
    /// Disable colored output
    pub no_color: bool,
    /// Disable progress bar
    pub no_progress: bool,
    /// Suppress non-error output
    pub quiet: bool,
}

impl OutputConfig {
    /// Apply config-file defaults; command-line flags only ever disable
    pub fn with_defaults(mut self, defaults: &s3site_core::config::Defaults) -> Self {
        if !defaults.progress {
            self.no_progress = true;
        }
        match defaults.color.as_str() {
            "never" => self.no_color = true,
            "always" if !self.no_color => console::set_colors_enabled(true),
            _ => {}
        }
        if self.no_color {
            console::set_colors_enabled(false);
            console::set_colors_enabled_stderr(false);
        }
        self
    }
}
