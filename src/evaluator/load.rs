//! # Load Generator
//!
//! Drives one probe endpoint with a fixed number of GET requests from a pool of
//! workers.
//!
//! All workers and the coordinator meet on a barrier before the first request so the
//! load starts at the same moment on every worker. The coordinator then joins every
//! worker before merging their counters, which makes the request count exact.

use crate::constants::PROBE_STATUS_SUCCESS;
use crate::evaluator::{SuiteDefinition, Test};
use crate::observability::metrics;
use crate::probe::ProbeResponse;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Barrier;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Why a single request counted as failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionFault {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected status code {0}")]
    UnexpectedStatus(u16),
    #[error("malformed response body: {0}")]
    MalformedBody(String),
    #[error("probe reported status '{0}'")]
    UnsuccessfulStatus(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    Success,
    Failed(ExecutionFault),
}

impl RequestOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, RequestOutcome::Failed(_))
    }

    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            RequestOutcome::Success => "success",
            RequestOutcome::Failed(ExecutionFault::Transport(_)) => "transport_error",
            RequestOutcome::Failed(ExecutionFault::UnexpectedStatus(_)) => "unexpected_status",
            RequestOutcome::Failed(ExecutionFault::MalformedBody(_)) => "malformed_body",
            RequestOutcome::Failed(ExecutionFault::UnsuccessfulStatus(_)) => "unsuccessful_status",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadGenerator {
    client: reqwest::Client,
}

impl LoadGenerator {
    /// Build a generator whose requests time out after `request_timeout`
    pub fn new(request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Run one suite against one endpoint
    ///
    /// Returns the merged counters of every worker. When `cancel` fires, workers stop
    /// before their next request and the counters cover only the requests that
    /// completed.
    pub async fn run_suite(
        &self,
        cancel: &CancellationToken,
        suite: &SuiteDefinition,
        node: &str,
        url: &str,
    ) -> Test {
        let mut total = Test::new(node);
        if suite.worker_count == 0 {
            return total;
        }

        let barrier = Arc::new(Barrier::new(suite.worker_count + 1));
        let mut workers = JoinSet::new();
        for worker in 0..suite.worker_count {
            let client = self.client.clone();
            let barrier = Arc::clone(&barrier);
            let cancel = cancel.clone();
            let suite_name = suite.name;
            let node = node.to_string();
            let url = url.to_string();
            let iterations = suite.iterations_per_worker;

            workers.spawn(async move {
                let mut test = Test::new(&node);
                tokio::select! {
                    _ = barrier.wait() => {}
                    _ = cancel.cancelled() => return test,
                }

                for _ in 0..iterations {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let (latency, outcome) = tokio::select! {
                        result = execute(&client, &url) => result,
                        _ = cancel.cancelled() => break,
                    };
                    if let RequestOutcome::Failed(fault) = &outcome {
                        debug!(node = %node, worker, url = %url, error = %fault, "request failed");
                    }
                    metrics::record_request(suite_name, &node, outcome.label(), latency.as_secs_f64());
                    test.record(latency, outcome.is_failure());
                }
                test
            });
        }

        tokio::select! {
            _ = barrier.wait() => {}
            _ = cancel.cancelled() => {}
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(test) => total.merge(&test),
                Err(e) => warn!(node, suite = suite.name, error = %e, "load worker did not complete"),
            }
        }
        total
    }
}

/// Issue one request and classify it
///
/// Latency covers sending the request and receiving the response headers.
pub async fn execute(client: &reqwest::Client, url: &str) -> (Duration, RequestOutcome) {
    let started = Instant::now();
    let response = client.get(url).send().await;
    let latency = started.elapsed();

    let outcome = match response {
        Err(e) => RequestOutcome::Failed(ExecutionFault::Transport(e.to_string())),
        Ok(response) if response.status() != StatusCode::OK => RequestOutcome::Failed(
            ExecutionFault::UnexpectedStatus(response.status().as_u16()),
        ),
        Ok(response) => match response.json::<ProbeResponse>().await {
            Err(e) => RequestOutcome::Failed(ExecutionFault::MalformedBody(e.to_string())),
            Ok(body) if body.status == PROBE_STATUS_SUCCESS => RequestOutcome::Success,
            Ok(body) => RequestOutcome::Failed(ExecutionFault::UnsuccessfulStatus(body.status)),
        },
    };
    (latency, outcome)
}
