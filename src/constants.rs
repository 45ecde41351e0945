//! # Constants
//!
//! Shared constants used throughout the evaluator.
//!
//! Timeouts and naming values represent reasonable defaults and can be overridden
//! through the config file where applicable. Suite sizes are fixed.

/// Default namespace that holds every probe created by a run
pub const DEFAULT_NAMESPACE: &str = "node-perf-evaluator";

/// Default probe container image
pub const DEFAULT_PROBE_IMAGE: &str = "node-perf-probe:latest";

/// Default hostname suffix appended to the per-probe ingress host
pub const DEFAULT_HOSTNAME_SUFFIX: &str = "localhost";

/// Default URL scheme used to reach probes through the ingress
pub const DEFAULT_PROTOCOL_SCHEME: &str = "http";

/// Default ingress path prefix
pub const DEFAULT_PATH_PREFIX: &str = "/";

/// Port the probe container listens on
pub const PROBE_CONTAINER_PORT: i32 = 8080;

/// Port exposed by the cluster-local probe service
pub const PROBE_SERVICE_PORT: i32 = 80;

/// Name of the probe container port
pub const PROBE_PORT_NAME: &str = "http-port";

/// Environment variable the probe reads its listen port from
pub const PROBE_PORT_ENV: &str = "SERVICE_PORT";

/// Value of the `app` label on every object created by the evaluator
pub const APP_LABEL_VALUE: &str = "node-perf-evaluator";

/// Value of the `type` label on probe objects
pub const PROBE_TYPE_LABEL_VALUE: &str = "node-probe";

/// Label carrying the probe's unique id
pub const PROBE_ID_LABEL: &str = "node-perf-evaluator/probe-id";

/// Annotation carrying the node a probe is pinned to
/// (node names are not always valid label values)
pub const NODE_ANNOTATION: &str = "node-perf-evaluator/node";

/// Number of concurrent workers driving one probe
pub const LOAD_TEST_WORKER_COUNT: usize = 10;

/// Sequential requests issued by each worker
pub const ITERATION_COUNT: usize = 10;

/// Name and request path of the ping suite
pub const PING_SUITE_NAME: &str = "Ping Test";
pub const PING_PATH: &str = "ping";

/// Name and request path of the CPU intensive suite
pub const CPU_SUITE_NAME: &str = "CPU Intensive Load Test";
pub const CPU_INTENSIVE_PATH: &str = "cpu-intensive-task";

/// Value of the `status` field in a successful probe response
pub const PROBE_STATUS_SUCCESS: &str = "success";

/// Default per-request HTTP timeout (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Default readiness poll interval (milliseconds)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Default deployment rollout timeout (seconds)
pub const DEFAULT_ROLLOUT_TIMEOUT_SECS: u64 = 60;

/// Default ingress address assignment timeout (seconds)
pub const DEFAULT_INGRESS_TIMEOUT_SECS: u64 = 60;

/// Default namespace deletion timeout (seconds)
pub const DEFAULT_NAMESPACE_DELETION_TIMEOUT_SECS: u64 = 30;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;
