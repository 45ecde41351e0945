//! # Load Generator Integration Tests
//!
//! Drives stub probes directly, without a cluster.

mod common;

use common::*;
use node_perf_evaluator::evaluator::load::execute;
use node_perf_evaluator::evaluator::{
    ExecutionFault, LoadGenerator, RequestOutcome, SuiteDefinition,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn generator() -> LoadGenerator {
    init_rustls();
    LoadGenerator::new(Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_request_count_is_workers_times_iterations() {
    let addr = spawn_probe().await;
    let suite = SuiteDefinition {
        worker_count: 4,
        iterations_per_worker: 7,
        ..SuiteDefinition::PING
    };
    let test = generator()
        .run_suite(
            &CancellationToken::new(),
            &suite,
            "node-a",
            &format!("http://{addr}/ping"),
        )
        .await;

    assert_eq!(test.node_name, "node-a");
    assert_eq!(test.total_requests_count, 28);
    assert_eq!(test.total_failed_requests_count, 0);
    assert!(test.total_latency > Duration::ZERO);
}

#[tokio::test]
async fn test_default_suite_issues_one_hundred_requests() {
    let addr = spawn_probe().await;
    let test = generator()
        .run_suite(
            &CancellationToken::new(),
            &SuiteDefinition::PING,
            "node-a",
            &format!("http://{addr}/ping"),
        )
        .await;
    assert_eq!(test.total_requests_count, 100);
    assert_eq!(test.total_failed_requests_count, 0);
}

#[tokio::test]
async fn test_every_failure_kind_is_counted() {
    let urls = [
        format!("http://{}/ping", spawn_failing_probe().await),
        format!("http://{}/ping", spawn_garbage_probe().await),
        format!("http://{}/ping", spawn_unhealthy_probe().await),
        format!("http://{}/ping", closed_port().await),
    ];
    let suite = SuiteDefinition {
        worker_count: 2,
        iterations_per_worker: 3,
        ..SuiteDefinition::PING
    };
    let generator = generator();

    for url in &urls {
        let test = generator
            .run_suite(&CancellationToken::new(), &suite, "node-x", url)
            .await;
        assert_eq!(test.total_requests_count, 6, "{url}");
        assert_eq!(test.total_failed_requests_count, 6, "{url}");
    }
}

#[tokio::test]
async fn test_execute_classifies_responses() {
    init_rustls();
    let client = reqwest::Client::new();

    let (_, outcome) = execute(&client, &format!("http://{}/ping", spawn_probe().await)).await;
    assert_eq!(outcome, RequestOutcome::Success);

    let (_, outcome) =
        execute(&client, &format!("http://{}/ping", spawn_failing_probe().await)).await;
    assert_eq!(
        outcome,
        RequestOutcome::Failed(ExecutionFault::UnexpectedStatus(500))
    );

    let (_, outcome) =
        execute(&client, &format!("http://{}/ping", spawn_garbage_probe().await)).await;
    assert!(matches!(
        outcome,
        RequestOutcome::Failed(ExecutionFault::MalformedBody(_))
    ));

    let (_, outcome) =
        execute(&client, &format!("http://{}/ping", spawn_unhealthy_probe().await)).await;
    assert_eq!(
        outcome,
        RequestOutcome::Failed(ExecutionFault::UnsuccessfulStatus("error".to_string()))
    );

    let (_, outcome) = execute(&client, &format!("http://{}/ping", closed_port().await)).await;
    assert!(matches!(
        outcome,
        RequestOutcome::Failed(ExecutionFault::Transport(_))
    ));
}

#[tokio::test]
async fn test_cpu_intensive_endpoint_succeeds() {
    let addr = spawn_probe().await;
    let suite = SuiteDefinition {
        worker_count: 2,
        iterations_per_worker: 2,
        ..SuiteDefinition::CPU_INTENSIVE
    };
    let test = generator()
        .run_suite(
            &CancellationToken::new(),
            &suite,
            "node-a",
            &format!("http://{addr}/{}", suite.path),
        )
        .await;
    assert_eq!(test.total_requests_count, 4);
    assert_eq!(test.total_failed_requests_count, 0);
}

#[tokio::test]
async fn test_cancellation_stops_workers() {
    let addr = spawn_slow_probe(Duration::from_millis(50)).await;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(120)).await;
        trigger.cancel();
    });

    let test = generator()
        .run_suite(&cancel, &SuiteDefinition::PING, "node-a", &format!("http://{addr}/ping"))
        .await;

    assert!(test.total_requests_count < 100);
    assert_eq!(test.total_failed_requests_count, 0);
}

#[tokio::test]
async fn test_cancelled_before_start_issues_nothing() {
    let addr = spawn_probe().await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let test = generator()
        .run_suite(&cancel, &SuiteDefinition::PING, "node-a", &format!("http://{addr}/ping"))
        .await;
    assert_eq!(test.total_requests_count, 0);
}
