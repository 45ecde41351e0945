//! # Kubernetes Cluster Adapter
//!
//! `ClusterAdapter` implementation backed by a `kube::Client`.

use crate::cluster::wait::{ingress_address, is_rollout_complete, poll_until};
use crate::cluster::{ClusterAdapter, ClusterError, NodeSelector};
use crate::config::TimeoutConfig;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Node, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::{
    api::{Api, DeleteParams, ListParams, PostParams},
    config::{KubeConfigOptions, Kubeconfig},
    Client, Config,
};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Poll interval and creation timeouts used by the adapter's readiness waits
#[derive(Debug, Clone)]
pub struct WaitSettings {
    pub poll_interval: Duration,
    pub rollout_timeout: Duration,
    pub ingress_timeout: Duration,
}

impl From<&TimeoutConfig> for WaitSettings {
    fn from(timeouts: &TimeoutConfig) -> Self {
        Self {
            poll_interval: timeouts.poll_interval_duration(),
            rollout_timeout: timeouts.rollout_duration(),
            ingress_timeout: timeouts.ingress_duration(),
        }
    }
}

#[derive(Clone)]
pub struct KubeClusterAdapter {
    client: Client,
    wait: WaitSettings,
}

impl std::fmt::Debug for KubeClusterAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterAdapter")
            .field("wait", &self.wait)
            .finish_non_exhaustive()
    }
}

impl KubeClusterAdapter {
    pub fn new(client: Client, wait: WaitSettings) -> Self {
        Self { client, wait }
    }

    /// Build a client from an explicit kubeconfig file and/or context
    ///
    /// With neither set this is `Client::try_default()`: in-cluster config, then
    /// `KUBECONFIG`, then `~/.kube/config`.
    pub async fn connect(
        kube_config: Option<&Path>,
        context: Option<&str>,
        wait: WaitSettings,
    ) -> Result<Self, ClusterError> {
        let options = KubeConfigOptions {
            context: context.map(str::to_string),
            ..KubeConfigOptions::default()
        };

        let config = match kube_config {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    ClusterError::ClientConfig(format!(
                        "failed to read kubeconfig {}: {e}",
                        path.display()
                    ))
                })?;
                Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .map_err(|e| ClusterError::ClientConfig(e.to_string()))?
            }
            None if context.is_some() => Config::from_kubeconfig(&options)
                .await
                .map_err(|e| ClusterError::ClientConfig(e.to_string()))?,
            None => Config::infer()
                .await
                .map_err(|e| ClusterError::ClientConfig(e.to_string()))?,
        };

        info!(cluster_url = %config.cluster_url, "connecting to Kubernetes API");
        let client = Client::try_from(config)?;
        Ok(Self::new(client, wait))
    }

    fn namespaces(&self) -> Api<Namespace> {
        Api::all(self.client.clone())
    }

    fn namespace_of<'a>(meta_namespace: Option<&'a String>) -> Result<&'a str, ClusterError> {
        meta_namespace
            .map(String::as_str)
            .ok_or_else(|| ClusterError::Rejected("object has no namespace set".to_string()))
    }

    fn name_of<'a>(meta_name: Option<&'a String>) -> Result<&'a str, ClusterError> {
        meta_name
            .map(String::as_str)
            .ok_or_else(|| ClusterError::Rejected("object has no name set".to_string()))
    }
}

#[async_trait]
impl ClusterAdapter for KubeClusterAdapter {
    async fn list_nodes(&self, selector: &NodeSelector) -> Result<Vec<Node>, ClusterError> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let mut params = ListParams::default();
        if let Some(labels) = selector.labels() {
            params = params.labels(labels);
        }
        if let Some(fields) = selector.fields() {
            params = params.fields(fields);
        }
        let list = nodes.list(&params).await?;
        Ok(list.items)
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, ClusterError> {
        Ok(self.namespaces().get_opt(name).await?)
    }

    async fn create_namespace(&self, namespace: &Namespace) -> Result<Namespace, ClusterError> {
        Ok(self
            .namespaces()
            .create(&PostParams::default(), namespace)
            .await?)
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), ClusterError> {
        match self
            .namespaces()
            .delete(name, &DeleteParams::background())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                debug!(namespace = name, "namespace already deleted");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn wait_for_namespace_deletion(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<(), ClusterError> {
        let namespaces = self.namespaces();
        poll_until(
            &format!("namespace {name} to be deleted"),
            self.wait.poll_interval,
            timeout,
            || {
                let namespaces = namespaces.clone();
                async move { Ok::<_, ClusterError>(namespaces.get_opt(name).await?.is_none()) }
            },
        )
        .await
    }

    async fn create_deployment(
        &self,
        deployment: &Deployment,
    ) -> Result<Deployment, ClusterError> {
        let namespace = Self::namespace_of(deployment.metadata.namespace.as_ref())?;
        let name = Self::name_of(deployment.metadata.name.as_ref())?;
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);

        deployments
            .create(&PostParams::default(), deployment)
            .await?;

        poll_until(
            &format!("deployment {namespace}/{name} to roll out"),
            self.wait.poll_interval,
            self.wait.rollout_timeout,
            || {
                let deployments = deployments.clone();
                async move {
                    Ok::<_, ClusterError>(is_rollout_complete(&deployments.get(name).await?))
                }
            },
        )
        .await?;

        Ok(deployments.get(name).await?)
    }

    async fn create_service(&self, service: &Service) -> Result<Service, ClusterError> {
        let namespace = Self::namespace_of(service.metadata.namespace.as_ref())?;
        let services: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        Ok(services.create(&PostParams::default(), service).await?)
    }

    async fn create_ingress(&self, ingress: &Ingress) -> Result<Ingress, ClusterError> {
        let namespace = Self::namespace_of(ingress.metadata.namespace.as_ref())?;
        let name = Self::name_of(ingress.metadata.name.as_ref())?;
        let ingresses: Api<Ingress> = Api::namespaced(self.client.clone(), namespace);

        ingresses.create(&PostParams::default(), ingress).await?;

        poll_until(
            &format!("ingress {namespace}/{name} to be assigned an address"),
            self.wait.poll_interval,
            self.wait.ingress_timeout,
            || {
                let ingresses = ingresses.clone();
                async move {
                    Ok::<_, ClusterError>(ingress_address(&ingresses.get(name).await?).is_some())
                }
            },
        )
        .await?;

        Ok(ingresses.get(name).await?)
    }
}
