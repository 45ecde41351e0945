//! # Cluster Adapter
//!
//! The narrow set of cluster operations the evaluator needs, behind a trait so the
//! orchestration logic never touches the kube client directly.
//!
//! - `kubernetes`: implementation backed by a `kube::Client`
//! - `wait`: bounded polling and the readiness predicates used by creation calls
//!
//! Creation calls that have a readiness condition block until the object is ready or
//! the wait times out, so callers can treat creation as atomic.

pub mod kubernetes;
pub mod wait;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Node, Service};
use k8s_openapi::api::networking::v1::Ingress;
use std::time::Duration;
use thiserror::Error;

pub use kubernetes::KubeClusterAdapter;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("Kubernetes API request failed: {0}")]
    Api(#[from] kube::Error),
    #[error("failed to load Kubernetes client configuration: {0}")]
    ClientConfig(String),
    #[error("timed out after {}s waiting for {what}", timeout.as_secs())]
    Timeout { what: String, timeout: Duration },
    #[error("{0}")]
    Rejected(String),
}

/// Label/field selector restricting which nodes are listed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSelector {
    pub label_selector: Option<String>,
    pub field_selector: Option<String>,
}

impl NodeSelector {
    /// Label selector, treating blank strings as unset
    pub fn labels(&self) -> Option<&str> {
        non_blank(self.label_selector.as_deref())
    }

    /// Field selector, treating blank strings as unset
    pub fn fields(&self) -> Option<&str> {
        non_blank(self.field_selector.as_deref())
    }
}

impl std::fmt::Display for NodeSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.labels(), self.fields()) {
            (None, None) => f.write_str("<all nodes>"),
            (Some(labels), None) => write!(f, "labels: {labels}"),
            (None, Some(fields)) => write!(f, "fields: {fields}"),
            (Some(labels), Some(fields)) => write!(f, "labels: {labels}, fields: {fields}"),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Cluster operations consumed by the evaluator
#[async_trait]
pub trait ClusterAdapter: Send + Sync {
    /// List nodes matching the selector
    async fn list_nodes(&self, selector: &NodeSelector) -> Result<Vec<Node>, ClusterError>;

    /// Get a namespace, `None` when it does not exist
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, ClusterError>;

    async fn create_namespace(&self, namespace: &Namespace) -> Result<Namespace, ClusterError>;

    /// Request deletion of a namespace (and, by cascade, everything in it)
    ///
    /// A namespace that is already gone is not an error.
    async fn delete_namespace(&self, name: &str) -> Result<(), ClusterError>;

    /// Block until the namespace no longer exists
    async fn wait_for_namespace_deletion(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<(), ClusterError>;

    /// Create a deployment and block until its rollout is complete
    async fn create_deployment(&self, deployment: &Deployment)
        -> Result<Deployment, ClusterError>;

    async fn create_service(&self, service: &Service) -> Result<Service, ClusterError>;

    /// Create an ingress and block until it has a routable address
    ///
    /// Returns the ingress as observed once the address is assigned.
    async fn create_ingress(&self, ingress: &Ingress) -> Result<Ingress, ClusterError>;
}
