//! # Metrics
//!
//! Prometheus metrics for monitoring an evaluation run.
//!
//! ## Metrics Exposed
//!
//! - `node_perf_requests_total` - Probe requests by suite, node and outcome
//! - `node_perf_request_duration_seconds` - Probe request latency by suite
//! - `node_perf_probes_provisioned_total` - Probes that became reachable
//! - `node_perf_provisioning_failures_total` - Nodes that could not be provisioned
//! - `node_perf_teardown_failures_total` - Failed namespace teardowns
//! - `node_perf_phase_duration_seconds` - Duration of each run phase

use anyhow::Result;
use prometheus::{HistogramVec, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "node_perf_requests_total",
            "Total number of probe requests issued",
        ),
        &["suite", "node", "outcome"],
    )
    .expect("Failed to create REQUESTS_TOTAL metric - this should never happen")
});

static REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "node_perf_request_duration_seconds",
            "Duration of probe requests in seconds",
        )
        .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["suite"],
    )
    .expect("Failed to create REQUEST_DURATION metric - this should never happen")
});

static PROBES_PROVISIONED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "node_perf_probes_provisioned_total",
        "Total number of probes provisioned and reachable",
    )
    .expect("Failed to create PROBES_PROVISIONED_TOTAL metric - this should never happen")
});

static PROVISIONING_FAILURES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "node_perf_provisioning_failures_total",
        "Total number of nodes whose probe could not be provisioned",
    )
    .expect("Failed to create PROVISIONING_FAILURES_TOTAL metric - this should never happen")
});

static TEARDOWN_FAILURES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "node_perf_teardown_failures_total",
        "Total number of failed namespace teardowns",
    )
    .expect("Failed to create TEARDOWN_FAILURES_TOTAL metric - this should never happen")
});

static PHASE_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "node_perf_phase_duration_seconds",
            "Duration of run phases in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0]),
        &["phase"],
    )
    .expect("Failed to create PHASE_DURATION metric - this should never happen")
});

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEST_DURATION.clone()))?;
    REGISTRY.register(Box::new(PROBES_PROVISIONED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PROVISIONING_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TEARDOWN_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PHASE_DURATION.clone()))?;
    Ok(())
}

/// Record one probe request
pub fn record_request(suite: &str, node: &str, outcome: &str, duration: f64) {
    REQUESTS_TOTAL
        .with_label_values(&[suite, node, outcome])
        .inc();
    REQUEST_DURATION.with_label_values(&[suite]).observe(duration);
}

pub fn increment_probes_provisioned() {
    PROBES_PROVISIONED_TOTAL.inc();
}

pub fn increment_provisioning_failures() {
    PROVISIONING_FAILURES_TOTAL.inc();
}

pub fn increment_teardown_failures() {
    TEARDOWN_FAILURES_TOTAL.inc();
}

pub fn observe_phase_duration(phase: &str, duration: f64) {
    PHASE_DURATION.with_label_values(&[phase]).observe(duration);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics() {
        // Registering twice is rejected by the registry, so only check the first call here
        let registry = Registry::new();
        assert!(registry.register(Box::new(REQUESTS_TOTAL.clone())).is_ok());
        assert!(registry.register(Box::new(PHASE_DURATION.clone())).is_ok());
    }

    #[test]
    fn test_record_request() {
        let counter = REQUESTS_TOTAL.with_label_values(&["Ping Test", "node-a", "success"]);
        let before = counter.get();
        record_request("Ping Test", "node-a", "success", 0.012);
        assert_eq!(counter.get(), before + 1);
    }

    #[test]
    fn test_increment_probes_provisioned() {
        let before = PROBES_PROVISIONED_TOTAL.get();
        increment_probes_provisioned();
        assert_eq!(PROBES_PROVISIONED_TOTAL.get(), before + 1);
    }

    #[test]
    fn test_increment_provisioning_failures() {
        let before = PROVISIONING_FAILURES_TOTAL.get();
        increment_provisioning_failures();
        assert_eq!(PROVISIONING_FAILURES_TOTAL.get(), before + 1);
    }

    #[test]
    fn test_increment_teardown_failures() {
        let before = TEARDOWN_FAILURES_TOTAL.get();
        increment_teardown_failures();
        assert_eq!(TEARDOWN_FAILURES_TOTAL.get(), before + 1);
    }

    #[test]
    fn test_observe_phase_duration() {
        observe_phase_duration("provisioning", 12.5);
        let histogram = PHASE_DURATION.with_label_values(&["provisioning"]);
        assert!(histogram.get_sample_count() >= 1);
    }
}
