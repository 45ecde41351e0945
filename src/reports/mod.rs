//! # Reports
//!
//! Summarised run results and how they are rendered.
//!
//! - `aggregate`: reduce raw counters to per-node results
//! - `writer`: text and JSON renderings of a `RunReport`

pub mod aggregate;
pub mod writer;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

pub use aggregate::{aggregate, aggregate_suite, TestResult, TestSuiteResult};
pub use writer::{resolve_writer, OutputFormat, ReportWriter};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything a finished run reports
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub namespace: String,
    /// Set when the run was interrupted while load tests were executing
    pub cancelled: bool,
    pub suites: Vec<TestSuiteResult>,
    pub unprovisioned_nodes: Vec<String>,
}

impl RunReport {
    pub fn new(
        namespace: &str,
        suites: Vec<TestSuiteResult>,
        unprovisioned_nodes: Vec<String>,
        cancelled: bool,
    ) -> Self {
        Self {
            generated_at: Utc::now(),
            namespace: namespace.to_string(),
            cancelled,
            suites,
            unprovisioned_nodes,
        }
    }
}
