//! # Observability
//!
//! Observability modules for metrics and logging.
//!
//! - `metrics`: Prometheus metrics collection
//! - `logging`: tracing subscriber setup

pub mod logging;
pub mod metrics;

pub use logging::{LogFormat, Telemetry};
