//! Output formatting for CLI commands
//!
//! Commands hand every result to [`Output::report`] together with a closure
//! that prints the human layout. JSON mode prints the value on one line and
//! never runs the closure, so stdout stays machine-readable.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use crate::storage;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl From<storage::OutputFormat> for OutputFormat {
    fn from(format: storage::OutputFormat) -> Self {
        match format {
            storage::OutputFormat::Text => OutputFormat::Text,
            storage::OutputFormat::Json => OutputFormat::Json,
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Prints a one-line confirmation
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Text => println!("{}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "success": true,
                        "message": message
                    })
                );
            }
        }
    }

    /// Prints `data` as JSON, or runs `text` to print it for humans
    pub fn report<T, F>(&self, data: &T, text: F) -> Result<()>
    where
        T: Serialize,
        F: FnOnce(),
    {
        match self.format {
            OutputFormat::Text => text(),
            OutputFormat::Json => {
                let json = serde_json::to_string(data).context("Failed to serialize output")?;
                println!("{}", json);
            }
        }

        Ok(())
    }

    /// Prints tab-separated columns (text only, ignored in JSON mode)
    pub fn row(&self, columns: &[&str]) {
        if self.format == OutputFormat::Text {
            println!("{}", columns.join("\t"));
        }
    }

    /// Prints a blank line (text only)
    pub fn blank(&self) {
        if self.format == OutputFormat::Text {
            println!();
        }
    }

    /// Emits a debug event (shown with --verbose or SRCPACK_LOG=debug)
    pub fn verbose(&self, message: &str) {
        debug!("{}", message);
    }

    /// Emits a debug event tagged with the command it belongs to
    pub fn verbose_ctx(&self, context: &str, message: &str) {
        debug!(command = context, "{}", message);
    }
}
