//! # Report Writers
//!
//! Render a `RunReport` to any `io::Write`.

mod json;
mod text;

use crate::reports::{ReportError, RunReport};
use std::io::Write;

pub use json::JsonWriter;
pub use text::TextWriter;

/// Renders a report to an output stream
pub trait ReportWriter: Send + Sync {
    fn write(&self, report: &RunReport, output: &mut dyn Write) -> Result<(), ReportError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Titled, column-aligned tables
    #[default]
    Text,
    /// Pretty-printed JSON document
    Json,
}

pub fn resolve_writer(format: OutputFormat) -> Box<dyn ReportWriter> {
    match format {
        OutputFormat::Text => Box::new(TextWriter),
        OutputFormat::Json => Box::new(JsonWriter),
    }
}
