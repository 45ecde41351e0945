//! # Readiness Waits
//!
//! Bounded polling plus the conditions the adapter waits on after creating objects.

use crate::cluster::ClusterError;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::networking::v1::Ingress;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Poll `check` every `interval` until it returns `true`, failing after `timeout`
///
/// The first check runs immediately. Errors returned by `check` abort the wait.
pub async fn poll_until<F, Fut>(
    what: &str,
    interval: Duration,
    timeout: Duration,
    mut check: F,
) -> Result<(), ClusterError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, ClusterError>>,
{
    let polling = async {
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            if check().await? {
                debug!(what, attempts, "wait condition satisfied");
                return Ok(());
            }
            tokio::time::sleep(interval).await;
        }
    };

    match tokio::time::timeout(timeout, polling).await {
        Ok(result) => result,
        Err(_elapsed) => Err(ClusterError::Timeout {
            what: what.to_string(),
            timeout,
        }),
    }
}

/// Whether a deployment's rollout has converged
///
/// Available and updated replicas must both equal the desired replica count, and the
/// controller must have observed the latest generation.
pub fn is_rollout_complete(deployment: &Deployment) -> bool {
    let desired = deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.replicas)
        .unwrap_or(1);
    let Some(status) = deployment.status.as_ref() else {
        return false;
    };
    let generation = deployment.metadata.generation.unwrap_or(0);

    status.available_replicas.unwrap_or(0) == desired
        && status.updated_replicas.unwrap_or(0) == desired
        && status.observed_generation.unwrap_or(0) >= generation
}

/// The first load balancer address assigned to an ingress, if any
pub fn ingress_address(ingress: &Ingress) -> Option<String> {
    ingress
        .status
        .as_ref()?
        .load_balancer
        .as_ref()?
        .ingress
        .as_ref()?
        .iter()
        .find_map(|lb| {
            lb.ip
                .clone()
                .filter(|ip| !ip.is_empty())
                .or_else(|| lb.hostname.clone().filter(|h| !h.is_empty()))
        })
}
