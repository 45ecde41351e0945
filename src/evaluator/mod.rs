//! # Evaluator
//!
//! Test orchestration: provision one probe per node, drive each probe with HTTP load,
//! and collect per-node counters for aggregation.
//!
//! - `manifests`: cluster objects that make up a probe
//! - `provisioner`: namespace recreation and per-node probe provisioning
//! - `load`: the worker pool that issues requests against a probe
//! - `runner`: the run state machine tying the phases together

pub mod load;
pub mod manifests;
pub mod provisioner;
pub mod runner;

use crate::cluster::ClusterError;
use crate::constants::*;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub use load::{ExecutionFault, LoadGenerator, RequestOutcome};
pub use manifests::{ManifestBuilder, ProbeIdentity};
pub use provisioner::{NodeFailure, ProbeProvisioner, ProvisioningReport};
pub use runner::{RunOutput, TestRunner};

/// A provisioned probe, reachable at `base_url`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeService {
    pub id: String,
    pub node_name: String,
    pub base_url: String,
    pub deployment_name: String,
    pub service_name: String,
    pub ingress_name: String,
}

impl ProbeService {
    /// URL of a probe endpoint below the base URL
    pub fn endpoint(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

/// Append `path` to `base`, inserting a single `/` between them
pub fn join_url(base: &str, path: &str) -> String {
    let path = path.trim_start_matches('/');
    if base.ends_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// Raw counters for one node within one suite
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Test {
    pub node_name: String,
    pub total_requests_count: u64,
    pub total_failed_requests_count: u64,
    pub total_latency: Duration,
}

impl Test {
    pub fn new(node_name: &str) -> Self {
        Self {
            node_name: node_name.to_string(),
            ..Default::default()
        }
    }

    /// Count one request
    pub fn record(&mut self, latency: Duration, failed: bool) {
        self.total_requests_count += 1;
        self.total_latency += latency;
        if failed {
            self.total_failed_requests_count += 1;
        }
    }

    /// Fold another worker's counters into this one
    pub fn merge(&mut self, other: &Test) {
        self.total_requests_count += other.total_requests_count;
        self.total_failed_requests_count += other.total_failed_requests_count;
        self.total_latency += other.total_latency;
    }
}

/// Per-node tests of one suite, in node order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSuite {
    pub name: String,
    pub tests: Vec<Test>,
}

/// A fixed load pattern against one probe endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuiteDefinition {
    pub name: &'static str,
    pub path: &'static str,
    pub worker_count: usize,
    pub iterations_per_worker: usize,
}

impl SuiteDefinition {
    pub const PING: Self = Self {
        name: PING_SUITE_NAME,
        path: PING_PATH,
        worker_count: LOAD_TEST_WORKER_COUNT,
        iterations_per_worker: ITERATION_COUNT,
    };

    pub const CPU_INTENSIVE: Self = Self {
        name: CPU_SUITE_NAME,
        path: CPU_INTENSIVE_PATH,
        worker_count: LOAD_TEST_WORKER_COUNT,
        iterations_per_worker: ITERATION_COUNT,
    };

    /// Suites run against every probe, in order
    pub fn builtin() -> Vec<Self> {
        vec![Self::PING, Self::CPU_INTENSIVE]
    }

    pub fn total_requests(&self) -> u64 {
        (self.worker_count * self.iterations_per_worker) as u64
    }
}

/// Phases of a run, in the order they execute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Discovering,
    Provisioning,
    Executing,
    Aggregating,
    TearingDown,
    Done,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Discovering => "discovering",
            RunPhase::Provisioning => "provisioning",
            RunPhase::Executing => "executing",
            RunPhase::Aggregating => "aggregating",
            RunPhase::TearingDown => "tearing_down",
            RunPhase::Done => "done",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to list nodes: {0}")]
    List(#[source] ClusterError),
    #[error("no nodes matched selector '{selector}'")]
    NoNodes { selector: String },
}

#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("failed to look up namespace {namespace}: {source}")]
    NamespaceLookup {
        namespace: String,
        #[source]
        source: ClusterError,
    },
    #[error("failed to delete existing namespace {namespace}: {source}")]
    NamespaceDeletion {
        namespace: String,
        #[source]
        source: ClusterError,
    },
    #[error("failed to create namespace {namespace}: {source}")]
    NamespaceCreation {
        namespace: String,
        #[source]
        source: ClusterError,
    },
    #[error("failed to provision probe on node {node}: {source}")]
    Node {
        node: String,
        #[source]
        source: ClusterError,
    },
    #[error("ingress for node {node} has no host rule to build a URL from")]
    MissingIngressRule { node: String },
    #[error("no probe could be provisioned on any of the {count} selected nodes")]
    AllNodesFailed { count: usize },
}

impl ProvisioningError {
    /// Node the failure belongs to, for per-node failures
    pub fn node(&self) -> Option<&str> {
        match self {
            ProvisioningError::Node { node, .. }
            | ProvisioningError::MissingIngressRule { node } => Some(node),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("node discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),
    #[error("provisioning failed: {0}")]
    Provisioning(#[from] ProvisioningError),
    #[error("run cancelled during {0}")]
    Cancelled(RunPhase),
}

impl EvaluatorError {
    /// Phase the run failed in
    pub fn phase(&self) -> RunPhase {
        match self {
            EvaluatorError::Discovery(_) => RunPhase::Discovering,
            EvaluatorError::Provisioning(_) => RunPhase::Provisioning,
            EvaluatorError::Cancelled(phase) => *phase,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://a.example.com/", "ping"), "http://a.example.com/ping");
        assert_eq!(join_url("http://a.example.com", "ping"), "http://a.example.com/ping");
        assert_eq!(
            join_url("https://a.example.com/probe", "/cpu-intensive-task"),
            "https://a.example.com/probe/cpu-intensive-task"
        );
    }

    #[test]
    fn test_record_and_merge() {
        let mut first = Test::new("node-a");
        first.record(Duration::from_millis(10), false);
        first.record(Duration::from_millis(30), true);

        let mut second = Test::new("node-a");
        second.record(Duration::from_millis(20), false);

        first.merge(&second);
        assert_eq!(first.total_requests_count, 3);
        assert_eq!(first.total_failed_requests_count, 1);
        assert_eq!(first.total_latency, Duration::from_millis(60));
        assert_eq!(first.node_name, "node-a");
    }

    #[test]
    fn test_builtin_suites() {
        let suites = SuiteDefinition::builtin();
        assert_eq!(suites.len(), 2);
        assert_eq!(suites[0].name, "Ping Test");
        assert_eq!(suites[0].path, "ping");
        assert_eq!(suites[1].name, "CPU Intensive Load Test");
        assert_eq!(suites[1].path, "cpu-intensive-task");
        assert!(suites.iter().all(|s| s.total_requests() == 100));
    }

    #[test]
    fn test_error_phase() {
        let err = EvaluatorError::from(DiscoveryError::NoNodes {
            selector: String::new(),
        });
        assert_eq!(err.phase(), RunPhase::Discovering);

        let err = EvaluatorError::from(ProvisioningError::AllNodesFailed { count: 3 });
        assert_eq!(err.phase(), RunPhase::Provisioning);

        let err = EvaluatorError::Cancelled(RunPhase::Provisioning);
        assert_eq!(err.phase(), RunPhase::Provisioning);
        assert_eq!(err.to_string(), "run cancelled during provisioning");
    }

    #[test]
    fn test_node_of_per_node_failures() {
        let err = ProvisioningError::MissingIngressRule {
            node: "node-b".to_string(),
        };
        assert_eq!(err.node(), Some("node-b"));
        assert_eq!(ProvisioningError::AllNodesFailed { count: 1 }.node(), None);
    }
}
