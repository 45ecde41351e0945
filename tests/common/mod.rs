//! Common test utilities
//!
//! - `FakeCluster`: a `ClusterAdapter` that records every call and routes each probe's
//!   ingress to an in-process stub server
//! - stub probe servers bound on `127.0.0.1:0`

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{http::StatusCode, routing::get, Router};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Node, Service};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use node_perf_evaluator::cluster::{ClusterAdapter, ClusterError, NodeSelector};
use node_perf_evaluator::config::EvaluatorConfig;
use node_perf_evaluator::evaluator::manifests::probe_node;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use std::time::Duration;
use tokio::net::TcpListener;

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` to ensure it's only called once across all tests.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        // Ignore the error when another test binary path already installed one
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Cluster operations observed by `FakeCluster`, in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListNodes,
    GetNamespace(String),
    DeleteNamespace(String),
    WaitForNamespaceDeletion(String),
    CreateNamespace(String),
    CreateDeployment { node: String },
    CreateService { node: String },
    CreateIngress { node: String },
}

/// In-memory `ClusterAdapter`
///
/// Probe objects are accepted immediately. Created ingresses have their host replaced
/// by the address of the node's stub server so the load generator reaches it directly.
#[derive(Debug, Default)]
pub struct FakeCluster {
    nodes: Vec<String>,
    probes: HashMap<String, SocketAddr>,
    namespace_exists: Mutex<bool>,
    fail_list: bool,
    fail_namespace_wait: bool,
    fail_teardown: bool,
    hang_deployments: bool,
    failing_nodes: HashSet<String>,
    fail_deployment_attempt: Option<usize>,
    deployment_attempts: AtomicUsize,
    deployments: Mutex<Vec<Deployment>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeCluster {
    pub fn new(nodes: &[&str]) -> Self {
        Self {
            nodes: nodes.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Route the probe of `node` to a stub server
    pub fn with_probe(mut self, node: &str, addr: SocketAddr) -> Self {
        self.probes.insert(node.to_string(), addr);
        self
    }

    pub fn with_existing_namespace(self) -> Self {
        *self.namespace_exists.lock().unwrap() = true;
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn failing_namespace_wait(mut self) -> Self {
        self.fail_namespace_wait = true;
        self
    }

    pub fn failing_teardown(mut self) -> Self {
        self.fail_teardown = true;
        self
    }

    /// Deployments never finish rolling out
    pub fn hanging_deployments(mut self) -> Self {
        self.hang_deployments = true;
        self
    }

    /// Every deployment for `node` is rejected
    pub fn failing_node(mut self, node: &str) -> Self {
        self.failing_nodes.insert(node.to_string());
        self
    }

    /// The `attempt`-th deployment creation (1-based) is rejected
    pub fn failing_deployment_attempt(mut self, attempt: usize) -> Self {
        self.fail_deployment_attempt = Some(attempt);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| predicate(call)).count()
    }

    pub fn namespace_deletions(&self) -> usize {
        self.count(|call| matches!(call, Call::DeleteNamespace(_)))
    }

    pub fn deployments(&self) -> Vec<Deployment> {
        self.deployments.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn node_of(metadata: &ObjectMeta) -> String {
    probe_node(metadata).unwrap_or_default().to_string()
}

#[async_trait]
impl ClusterAdapter for FakeCluster {
    async fn list_nodes(&self, _selector: &NodeSelector) -> Result<Vec<Node>, ClusterError> {
        self.record(Call::ListNodes);
        if self.fail_list {
            return Err(ClusterError::Rejected("nodes is forbidden".to_string()));
        }
        Ok(self
            .nodes
            .iter()
            .map(|name| Node {
                metadata: ObjectMeta {
                    name: Some(name.clone()),
                    ..Default::default()
                },
                ..Default::default()
            })
            .collect())
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, ClusterError> {
        self.record(Call::GetNamespace(name.to_string()));
        let exists = *self.namespace_exists.lock().unwrap();
        Ok(exists.then(|| Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }))
    }

    async fn create_namespace(&self, namespace: &Namespace) -> Result<Namespace, ClusterError> {
        let name = namespace.metadata.name.clone().unwrap_or_default();
        self.record(Call::CreateNamespace(name));
        *self.namespace_exists.lock().unwrap() = true;
        Ok(namespace.clone())
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), ClusterError> {
        self.record(Call::DeleteNamespace(name.to_string()));
        if self.fail_teardown {
            return Err(ClusterError::Rejected("namespace deletion refused".to_string()));
        }
        Ok(())
    }

    async fn wait_for_namespace_deletion(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<(), ClusterError> {
        self.record(Call::WaitForNamespaceDeletion(name.to_string()));
        if self.fail_namespace_wait {
            return Err(ClusterError::Timeout {
                what: format!("namespace {name} to be deleted"),
                timeout,
            });
        }
        *self.namespace_exists.lock().unwrap() = false;
        Ok(())
    }

    async fn create_deployment(
        &self,
        deployment: &Deployment,
    ) -> Result<Deployment, ClusterError> {
        let node = node_of(&deployment.metadata);
        let attempt = self.deployment_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.hang_deployments {
            std::future::pending::<()>().await;
        }
        if self.failing_nodes.contains(&node) || self.fail_deployment_attempt == Some(attempt) {
            return Err(ClusterError::Timeout {
                what: format!("deployment for {node} to roll out"),
                timeout: Duration::from_secs(60),
            });
        }
        self.record(Call::CreateDeployment { node });
        self.deployments.lock().unwrap().push(deployment.clone());
        Ok(deployment.clone())
    }

    async fn create_service(&self, service: &Service) -> Result<Service, ClusterError> {
        self.record(Call::CreateService {
            node: node_of(&service.metadata),
        });
        Ok(service.clone())
    }

    async fn create_ingress(&self, ingress: &Ingress) -> Result<Ingress, ClusterError> {
        let node = node_of(&ingress.metadata);
        self.record(Call::CreateIngress { node: node.clone() });

        let mut created = ingress.clone();
        if let Some(addr) = self.probes.get(&node) {
            let rules = created
                .spec
                .as_mut()
                .and_then(|spec| spec.rules.as_mut())
                .ok_or_else(|| ClusterError::Rejected("ingress has no rules".to_string()))?;
            for rule in rules {
                rule.host = Some(addr.to_string());
            }
        }
        Ok(created)
    }
}

/// Config for runs against `FakeCluster`
pub fn test_config() -> EvaluatorConfig {
    let mut config = EvaluatorConfig {
        namespace: "perf-test".to_string(),
        ..EvaluatorConfig::default()
    };
    config.timeouts.request_secs = 5;
    config
}

/// Serve `router` on an ephemeral local port
pub async fn spawn_stub(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// A real probe service
pub async fn spawn_probe() -> SocketAddr {
    spawn_stub(node_perf_evaluator::probe::router()).await
}

/// Answers every request with a 500
pub async fn spawn_failing_probe() -> SocketAddr {
    spawn_stub(Router::new().fallback(|| async { StatusCode::INTERNAL_SERVER_ERROR })).await
}

/// Answers 200 with a body that is not a probe response
pub async fn spawn_garbage_probe() -> SocketAddr {
    spawn_stub(Router::new().route("/ping", get(|| async { "pong" }))).await
}

/// Answers 200 with a well-formed body reporting failure
pub async fn spawn_unhealthy_probe() -> SocketAddr {
    spawn_stub(Router::new().route(
        "/ping",
        get(|| async { axum::Json(serde_json::json!({ "status": "error" })) }),
    ))
    .await
}

/// Answers `/ping` successfully after `delay`
pub async fn spawn_slow_probe(delay: Duration) -> SocketAddr {
    spawn_stub(Router::new().route(
        "/ping",
        get(move || async move {
            tokio::time::sleep(delay).await;
            axum::Json(serde_json::json!({ "status": "success" }))
        }),
    ))
    .await
}

/// An address nothing listens on
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
