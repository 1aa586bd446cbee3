//! s3site CLI library
//!
//! This module exports the CLI components for use by the binary and tests.

pub mod commands;
pub mod crash_report;
pub mod exit_code;
pub mod logging;
pub mod output;
