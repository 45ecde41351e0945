//! # Aggregation
//!
//! Reduces raw per-node counters into the summary statistics that get reported.

use crate::evaluator::{Test, TestSuite};
use serde::{Serialize, Serializer};
use std::time::Duration;

/// Summary of one node's results within a suite
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub node_name: String,
    /// Serialized as whole nanoseconds
    #[serde(serialize_with = "serialize_nanos")]
    pub average_latency: Duration,
    pub failed_request_count: u64,
    pub failed_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSuiteResult {
    pub suite_name: String,
    pub results: Vec<TestResult>,
}

/// Summarise one node's counters
///
/// A test with no requests has zero average latency and zero failure percentage.
pub fn aggregate(test: &Test) -> TestResult {
    let (average_latency, failed_percentage) = if test.total_requests_count == 0 {
        (Duration::ZERO, 0.0)
    } else {
        let total = test.total_requests_count;
        let average = Duration::from_nanos(
            u64::try_from(test.total_latency.as_nanos() / u128::from(total)).unwrap_or(u64::MAX),
        );
        let failed = test.total_failed_requests_count.min(total);
        (average, failed as f64 / total as f64 * 100.0)
    };

    TestResult {
        node_name: test.node_name.clone(),
        average_latency,
        failed_request_count: test.total_failed_requests_count,
        failed_percentage,
    }
}

/// Summarise a suite, keeping node order
pub fn aggregate_suite(suite: &TestSuite) -> TestSuiteResult {
    TestSuiteResult {
        suite_name: suite.name.clone(),
        results: suite.tests.iter().map(aggregate).collect(),
    }
}

fn serialize_nanos<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test(requests: u64, failed: u64, latency: Duration) -> Test {
        Test {
            node_name: "node-a".to_string(),
            total_requests_count: requests,
            total_failed_requests_count: failed,
            total_latency: latency,
        }
    }

    #[test]
    fn test_average_latency_and_percentage() {
        let result = aggregate(&test(100, 25, Duration::from_millis(1500)));
        assert_eq!(result.average_latency, Duration::from_millis(15));
        assert_eq!(result.failed_request_count, 25);
        assert!((result.failed_percentage - 25.0).abs() < f64::EPSILON);
        assert_eq!(result.node_name, "node-a");
    }

    #[test]
    fn test_empty_test_yields_zeros() {
        let result = aggregate(&test(0, 0, Duration::ZERO));
        assert_eq!(result.average_latency, Duration::ZERO);
        assert_eq!(result.failed_percentage, 0.0);
        assert_eq!(result.failed_request_count, 0);
    }

    #[test]
    fn test_all_failed_is_one_hundred_percent() {
        let result = aggregate(&test(100, 100, Duration::from_secs(1)));
        assert_eq!(result.failed_percentage, 100.0);
    }

    #[test]
    fn test_percentage_stays_in_range() {
        for (requests, failed) in [(1, 0), (1, 1), (3, 1), (7, 7), (100, 3)] {
            let pct = aggregate(&test(requests, failed, Duration::from_millis(5))).failed_percentage;
            assert!((0.0..=100.0).contains(&pct), "{pct} out of range");
        }
    }

    #[test]
    fn test_suite_keeps_node_order() {
        let suite = TestSuite {
            name: "Ping Test".to_string(),
            tests: vec![
                Test::new("node-c"),
                Test::new("node-a"),
                Test::new("node-b"),
            ],
        };
        let result = aggregate_suite(&suite);
        let nodes: Vec<_> = result.results.iter().map(|r| r.node_name.as_str()).collect();
        assert_eq!(nodes, ["node-c", "node-a", "node-b"]);
        assert_eq!(result.suite_name, "Ping Test");
    }

    #[test]
    fn test_json_field_names() {
        let value = serde_json::to_value(aggregate(&test(4, 1, Duration::from_micros(10)))).unwrap();
        assert_eq!(value["nodeName"], "node-a");
        assert_eq!(value["averageLatency"], 2500);
        assert_eq!(value["failedRequestCount"], 1);
        assert_eq!(value["failedPercentage"], 25.0);
    }
}
