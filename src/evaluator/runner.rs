//! # Test Runner
//!
//! Drives a run through its phases:
//!
//! ```text
//! Discovering -> Provisioning -> Executing (suite 1..k) -> Aggregating -> TearingDown -> Done
//! ```
//!
//! Teardown deletes the run namespace. It is attempted exactly once per run, on success,
//! on failure, and when the run future is dropped before finishing.
//!
//! Cancelling the run token before execution starts fails the run with
//! `EvaluatorError::Cancelled`. Cancelling during execution stops the load and returns
//! the partial results flagged as cancelled.

use crate::cluster::{ClusterAdapter, NodeSelector};
use crate::config::EvaluatorConfig;
use crate::evaluator::manifests::ManifestBuilder;
use crate::evaluator::provisioner::{ProbeProvisioner, ProvisioningReport};
use crate::evaluator::{
    DiscoveryError, EvaluatorError, LoadGenerator, ProbeService, RunPhase, SuiteDefinition,
    TestSuite,
};
use crate::observability::metrics;
use crate::reports::{aggregate_suite, TestSuiteResult};
use futures::future::join_all;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

/// Aggregated results of a completed (or cancelled) run
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    pub suites: Vec<TestSuiteResult>,
    pub unprovisioned_nodes: Vec<String>,
    pub cancelled: bool,
}

pub struct TestRunner {
    cluster: Arc<dyn ClusterAdapter>,
    provisioner: ProbeProvisioner,
    load: LoadGenerator,
    namespace: String,
    selector: NodeSelector,
    suites: Vec<SuiteDefinition>,
    parallel_nodes: bool,
    cancel: CancellationToken,
}

impl std::fmt::Debug for TestRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestRunner")
            .field("namespace", &self.namespace)
            .field("selector", &self.selector)
            .field("suites", &self.suites)
            .field("parallel_nodes", &self.parallel_nodes)
            .finish_non_exhaustive()
    }
}

impl TestRunner {
    pub fn new(
        cluster: Arc<dyn ClusterAdapter>,
        config: &EvaluatorConfig,
        load: LoadGenerator,
        cancel: CancellationToken,
    ) -> Self {
        let provisioner = ProbeProvisioner::new(
            Arc::clone(&cluster),
            ManifestBuilder::from_config(config),
            config.timeouts.namespace_deletion_duration(),
            config.execution.fail_fast,
        );
        Self {
            cluster,
            provisioner,
            load,
            namespace: config.namespace.clone(),
            selector: NodeSelector {
                label_selector: config.node_selector.label_selector.clone(),
                field_selector: config.node_selector.field_selector.clone(),
            },
            suites: SuiteDefinition::builtin(),
            parallel_nodes: config.execution.parallel_nodes,
            cancel,
        }
    }

    /// Replace the built-in suites
    pub fn with_suites(mut self, suites: Vec<SuiteDefinition>) -> Self {
        self.suites = suites;
        self
    }

    /// Run every phase and tear down the namespace
    pub async fn run(&self) -> Result<RunOutput, EvaluatorError> {
        let run_id = uuid::Uuid::new_v4();
        let span = info_span!("run", run_id = %run_id, namespace = %self.namespace);

        async {
            let mut teardown = TeardownGuard::arm(Arc::clone(&self.cluster), &self.namespace);
            let result = self.run_phases().await;

            let started = Instant::now();
            teardown.teardown().await;
            observe_phase(RunPhase::TearingDown, started);

            match &result {
                Ok(output) if output.cancelled => info!("run cancelled, returning partial results"),
                Ok(_) => info!(phase = %RunPhase::Done, "run complete"),
                Err(e) => warn!(phase = %e.phase(), error = %e, "run failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_phases(&self) -> Result<RunOutput, EvaluatorError> {
        let started = Instant::now();
        let nodes = self
            .until_cancelled(RunPhase::Discovering, self.discover())
            .await??;
        observe_phase(RunPhase::Discovering, started);
        info!(nodes = ?nodes, "resolved nodes to evaluate");

        let started = Instant::now();
        let report: ProvisioningReport = self
            .until_cancelled(RunPhase::Provisioning, self.provisioner.provision(&nodes))
            .await??;
        observe_phase(RunPhase::Provisioning, started);

        let started = Instant::now();
        let (suites, cancelled) = self.execute(&report.services).await;
        observe_phase(RunPhase::Executing, started);

        let started = Instant::now();
        let suites = suites.iter().map(aggregate_suite).collect();
        observe_phase(RunPhase::Aggregating, started);

        Ok(RunOutput {
            suites,
            unprovisioned_nodes: report.unprovisioned_nodes(),
            cancelled,
        })
    }

    /// Node names matching the selector, without duplicates
    async fn discover(&self) -> Result<Vec<String>, DiscoveryError> {
        let nodes = self
            .cluster
            .list_nodes(&self.selector)
            .await
            .map_err(DiscoveryError::List)?;

        let mut seen = HashSet::new();
        let names: Vec<String> = nodes
            .into_iter()
            .filter_map(|node| node.metadata.name)
            .filter(|name| seen.insert(name.clone()))
            .collect();

        if names.is_empty() {
            return Err(DiscoveryError::NoNodes {
                selector: self.selector.to_string(),
            });
        }
        Ok(names)
    }

    /// Run every suite against every probe, returning the suites and whether the run was
    /// cancelled part way
    async fn execute(&self, services: &[ProbeService]) -> (Vec<TestSuite>, bool) {
        let mut suites = Vec::with_capacity(self.suites.len());
        for suite in &self.suites {
            if self.cancel.is_cancelled() {
                break;
            }
            info!(suite = suite.name, probes = services.len(), "running suite");

            let tests = if self.parallel_nodes {
                let urls: Vec<String> = services.iter().map(|s| s.endpoint(suite.path)).collect();
                join_all(services.iter().zip(&urls).map(|(service, url)| {
                    self.load
                        .run_suite(&self.cancel, suite, &service.node_name, url)
                }))
                .await
            } else {
                let mut tests = Vec::with_capacity(services.len());
                for service in services {
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    let url = service.endpoint(suite.path);
                    debug!(suite = suite.name, node = %service.node_name, url = %url, "load testing probe");
                    tests.push(
                        self.load
                            .run_suite(&self.cancel, suite, &service.node_name, &url)
                            .await,
                    );
                }
                tests
            };

            suites.push(TestSuite {
                name: suite.name.to_string(),
                tests,
            });
        }
        (suites, self.cancel.is_cancelled())
    }

    async fn until_cancelled<F: Future>(
        &self,
        phase: RunPhase,
        future: F,
    ) -> Result<F::Output, EvaluatorError> {
        info!(phase = %phase, "entering phase");
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(EvaluatorError::Cancelled(phase)),
            output = future => Ok(output),
        }
    }
}

fn observe_phase(phase: RunPhase, started: Instant) {
    metrics::observe_phase_duration(phase.as_str(), started.elapsed().as_secs_f64());
}

/// Deletes the run namespace exactly once
///
/// `teardown` deletes it in place. If the guard is dropped while still armed (the run
/// future was dropped), deletion is spawned onto the current runtime instead.
struct TeardownGuard {
    cluster: Arc<dyn ClusterAdapter>,
    namespace: String,
    armed: bool,
}

impl TeardownGuard {
    fn arm(cluster: Arc<dyn ClusterAdapter>, namespace: &str) -> Self {
        Self {
            cluster,
            namespace: namespace.to_string(),
            armed: true,
        }
    }

    async fn teardown(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        delete_namespace(self.cluster.as_ref(), &self.namespace).await;
    }
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let cluster = Arc::clone(&self.cluster);
                let namespace = std::mem::take(&mut self.namespace);
                warn!(namespace = %namespace, "run dropped before teardown, deleting namespace in background");
                handle.spawn(async move {
                    delete_namespace(cluster.as_ref(), &namespace).await;
                });
            }
            Err(_) => {
                metrics::increment_teardown_failures();
                warn!(namespace = %self.namespace, "no runtime available, namespace was not deleted");
            }
        }
    }
}

async fn delete_namespace(cluster: &dyn ClusterAdapter, namespace: &str) {
    info!(phase = %RunPhase::TearingDown, namespace, "deleting namespace");
    match cluster.delete_namespace(namespace).await {
        Ok(()) => info!(namespace, "cleaned up all probe resources"),
        Err(e) => {
            metrics::increment_teardown_failures();
            warn!(namespace, error = %e, "failed to clean up probe resources");
        }
    }
}
