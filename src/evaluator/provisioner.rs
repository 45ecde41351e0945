//! # Probe Provisioner
//!
//! Turns a list of node names into reachable probe endpoints.
//!
//! The namespace is recreated first so every run starts from an empty namespace, then
//! each node's deployment, service and ingress are created concurrently. A run owns
//! its namespace exclusively: two runs against the same namespace will delete each
//! other's probes.

use crate::cluster::{ClusterAdapter, ClusterError};
use crate::evaluator::manifests::{ManifestBuilder, ProbeIdentity};
use crate::evaluator::{ProbeService, ProvisioningError};
use crate::observability::metrics;
use futures::future::{join_all, try_join_all};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A node whose probe could not be provisioned
#[derive(Debug)]
pub struct NodeFailure {
    pub node: String,
    pub error: ProvisioningError,
}

/// Outcome of provisioning: the reachable probes, in node order, and the nodes that failed
#[derive(Debug, Default)]
pub struct ProvisioningReport {
    pub services: Vec<ProbeService>,
    pub failures: Vec<NodeFailure>,
}

impl ProvisioningReport {
    pub fn unprovisioned_nodes(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.node.clone()).collect()
    }
}

pub struct ProbeProvisioner {
    cluster: Arc<dyn ClusterAdapter>,
    manifests: ManifestBuilder,
    namespace_deletion_timeout: Duration,
    fail_fast: bool,
}

impl std::fmt::Debug for ProbeProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeProvisioner")
            .field("namespace", &self.manifests.namespace_name())
            .field("fail_fast", &self.fail_fast)
            .finish_non_exhaustive()
    }
}

impl ProbeProvisioner {
    pub fn new(
        cluster: Arc<dyn ClusterAdapter>,
        manifests: ManifestBuilder,
        namespace_deletion_timeout: Duration,
        fail_fast: bool,
    ) -> Self {
        Self {
            cluster,
            manifests,
            namespace_deletion_timeout,
            fail_fast,
        }
    }

    /// Recreate the namespace and provision one probe per node
    ///
    /// With `fail_fast` the first node failure aborts provisioning. Otherwise failed
    /// nodes are collected in the report, and only a run where every node failed is an
    /// error.
    pub async fn provision(
        &self,
        nodes: &[String],
    ) -> Result<ProvisioningReport, ProvisioningError> {
        self.recreate_namespace().await?;

        let mut report = ProvisioningReport::default();
        if self.fail_fast {
            report.services = try_join_all(nodes.iter().map(|node| self.provision_node(node)))
                .await
                .inspect_err(|e| {
                    metrics::increment_provisioning_failures();
                    warn!(error = %e, "aborting provisioning after node failure");
                })?;
            return Ok(report);
        }

        let results = join_all(nodes.iter().map(|node| self.provision_node(node))).await;
        for (node, result) in nodes.iter().zip(results) {
            match result {
                Ok(service) => report.services.push(service),
                Err(error) => {
                    metrics::increment_provisioning_failures();
                    warn!(node = %node, error = %error, "node could not be provisioned, skipping it");
                    report.failures.push(NodeFailure {
                        node: node.clone(),
                        error,
                    });
                }
            }
        }

        if report.services.is_empty() && !nodes.is_empty() {
            return Err(ProvisioningError::AllNodesFailed { count: nodes.len() });
        }
        Ok(report)
    }

    /// Delete the namespace if it exists, wait for it to disappear, then create it
    pub async fn recreate_namespace(&self) -> Result<(), ProvisioningError> {
        let namespace = self.manifests.namespace_name();

        let existing = self
            .cluster
            .get_namespace(namespace)
            .await
            .map_err(|source| ProvisioningError::NamespaceLookup {
                namespace: namespace.to_string(),
                source,
            })?;

        if existing.is_some() {
            info!(namespace, "deleting existing namespace");
            let deletion: Result<(), ClusterError> = async {
                self.cluster.delete_namespace(namespace).await?;
                self.cluster
                    .wait_for_namespace_deletion(namespace, self.namespace_deletion_timeout)
                    .await
            }
            .await;
            deletion.map_err(|source| ProvisioningError::NamespaceDeletion {
                    namespace: namespace.to_string(),
                    source,
                })?;
        }

        self.cluster
            .create_namespace(&self.manifests.namespace())
            .await
            .map_err(|source| ProvisioningError::NamespaceCreation {
                namespace: namespace.to_string(),
                source,
            })?;
        info!(namespace, "namespace created");
        Ok(())
    }

    async fn provision_node(&self, node: &str) -> Result<ProbeService, ProvisioningError> {
        let probe = ProbeIdentity::generate(node);
        let node_error = |source: ClusterError| ProvisioningError::Node {
            node: node.to_string(),
            source,
        };
        debug!(node, probe_id = %probe.id, "provisioning probe");

        let deployment = self
            .cluster
            .create_deployment(&self.manifests.deployment(&probe))
            .await
            .map_err(node_error)?;
        let service = self
            .cluster
            .create_service(&self.manifests.service(&probe))
            .await
            .map_err(node_error)?;
        let ingress = self
            .cluster
            .create_ingress(&self.manifests.ingress(&probe))
            .await
            .map_err(node_error)?;

        let base_url = self.manifests.base_url(&ingress).ok_or_else(|| {
            ProvisioningError::MissingIngressRule {
                node: node.to_string(),
            }
        })?;

        metrics::increment_probes_provisioned();
        info!(node, base_url = %base_url, "probe ready");

        let fallback = probe.object_name();
        Ok(ProbeService {
            id: probe.id,
            node_name: node.to_string(),
            base_url,
            deployment_name: deployment.metadata.name.unwrap_or_else(|| fallback.clone()),
            service_name: service.metadata.name.unwrap_or_else(|| fallback.clone()),
            ingress_name: ingress.metadata.name.unwrap_or(fallback),
        })
    }
}
