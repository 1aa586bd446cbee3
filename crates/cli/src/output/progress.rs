//! Progress bar utilities for transfer operations
//!
//! Provides consistent progress indication for uploads during sync and
//! downloads during clone.

use std::path::Path;
use std::sync::Mutex;

use s3site_core::TransferObserver;

use super::{Formatter, OutputConfig};

/// Progress bar wrapper
///
/// Handles progress display based on output configuration.
/// In quiet or JSON mode, progress is suppressed.
#[derive(Debug)]
pub struct ProgressBar {
    bar: Option<indicatif::ProgressBar>,
}

impl ProgressBar {
    /// Create a new progress bar with the given total size
    pub fn new(config: &OutputConfig, total: u64) -> Self {
        let bar = if config.quiet || config.json || config.no_progress {
            None
        } else {
            let bar = indicatif::ProgressBar::new(total);
            bar.set_style(
                indicatif::ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} {msg:30!} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
                    )
                    .expect("valid template")
                    .progress_chars("#>-"),
            );
            Some(bar)
        };

        Self { bar }
    }

    /// Update progress
    pub fn set_position(&self, pos: u64) {
        if let Some(bar) = &self.bar {
            bar.set_position(pos);
        }
    }

    pub fn set_length(&self, len: u64) {
        if let Some(bar) = &self.bar {
            bar.set_length(len);
        }
    }

    /// Set message
    pub fn set_message(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(message.to_string());
        }
    }

    /// Finish and clear the progress bar
    pub fn finish_and_clear(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }

    /// Check if progress bar is visible
    pub fn is_visible(&self) -> bool {
        self.bar.is_some()
    }
}

/// Renders transfer events as one progress bar per object
pub struct TransferProgress {
    formatter: Formatter,
    verb: &'static str,
    current: Mutex<Option<ProgressBar>>,
}

impl TransferProgress {
    pub fn new(formatter: Formatter, verb: &'static str) -> Self {
        Self {
            formatter,
            verb,
            current: Mutex::new(None),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&mut Option<ProgressBar>)) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut current);
    }

    fn human(&self) -> bool {
        !self.formatter.is_json() && !self.formatter.is_quiet()
    }
}

impl TransferObserver for TransferProgress {
    fn pretend(&self, path: &Path, key: &str) {
        if self.human() {
            self.formatter
                .println(&format!("would upload {} -> {key}", path.display()));
        }
    }

    fn started(&self, _path: &Path, key: &str, total: u64) {
        let bar = ProgressBar::new(self.formatter.config(), total.max(1));
        bar.set_message(key);
        self.with_bar(|current| *current = Some(bar));
    }

    fn progress(&self, _key: &str, transferred: u64, total: u64) {
        self.with_bar(|current| {
            if let Some(bar) = current {
                bar.set_length(total);
                bar.set_position(transferred);
            }
        });
    }

    fn finished(&self, key: &str, total: u64) {
        self.with_bar(|current| {
            if let Some(bar) = current.take() {
                bar.finish_and_clear();
            }
        });
        if self.human() {
            let size = humansize::format_size(total, humansize::BINARY);
            self.formatter
                .println(&format!("{} {key} ({size})", self.verb));
        }
    }
}
