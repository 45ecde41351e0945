//! # Probe Manifests
//!
//! Builds the namespace, deployment, service and ingress objects for a probe.
//!
//! Every probe is pinned to its node with a required node affinity on
//! `metadata.name`, so the scheduler can never place it elsewhere, and tolerates all
//! taints so tainted nodes picked by the node selector are still measured.

use crate::config::{EvaluatorConfig, IngressConfig};
use crate::constants::*;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Affinity, Container, ContainerPort, EnvVar, HTTPGetAction, Namespace, NodeAffinity,
    NodeSelector, NodeSelectorRequirement, NodeSelectorTerm, PodSpec, PodTemplateSpec, Probe,
    Service, ServicePort, ServiceSpec, Toleration,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

/// Identity of one probe: a generated id and the node it is pinned to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeIdentity {
    pub id: String,
    pub node_name: String,
}

impl ProbeIdentity {
    /// New identity with a freshly generated id
    pub fn generate(node_name: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            node_name: node_name.to_string(),
        }
    }

    /// Name shared by the probe's deployment, service and ingress
    ///
    /// Derived from the id rather than the node name, which may not be a valid
    /// DNS-1035 label.
    pub fn object_name(&self) -> String {
        format!("probe-{}", self.id)
    }
}

/// Builds probe objects for one run
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    namespace: String,
    image: String,
    ingress: IngressConfig,
}

impl ManifestBuilder {
    pub fn new(namespace: &str, image: &str, ingress: IngressConfig) -> Self {
        Self {
            namespace: namespace.to_string(),
            image: image.to_string(),
            ingress,
        }
    }

    pub fn from_config(config: &EvaluatorConfig) -> Self {
        Self::new(
            &config.namespace,
            &config.test_service.image,
            config.ingress.clone(),
        )
    }

    pub fn namespace_name(&self) -> &str {
        &self.namespace
    }

    pub fn namespace(&self) -> Namespace {
        Namespace {
            metadata: ObjectMeta {
                name: Some(self.namespace.clone()),
                labels: Some(BTreeMap::from([(
                    "app".to_string(),
                    APP_LABEL_VALUE.to_string(),
                )])),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Externally reachable host of a probe
    pub fn host(&self, probe: &ProbeIdentity) -> String {
        format!(
            "{}.{}",
            probe.id,
            self.ingress.hostname_suffix.trim_matches('.')
        )
    }

    pub fn deployment(&self, probe: &ProbeIdentity) -> Deployment {
        let labels = probe_labels(probe);
        let container = Container {
            name: "probe".to_string(),
            image: Some(self.image.clone()),
            ports: Some(vec![ContainerPort {
                name: Some(PROBE_PORT_NAME.to_string()),
                container_port: PROBE_CONTAINER_PORT,
                ..Default::default()
            }]),
            env: Some(vec![EnvVar {
                name: PROBE_PORT_ENV.to_string(),
                value: Some(PROBE_CONTAINER_PORT.to_string()),
                ..Default::default()
            }]),
            readiness_probe: Some(Probe {
                http_get: Some(HTTPGetAction {
                    path: Some(format!("/{PING_PATH}")),
                    port: IntOrString::String(PROBE_PORT_NAME.to_string()),
                    ..Default::default()
                }),
                period_seconds: Some(2),
                ..Default::default()
            }),
            ..Default::default()
        };

        let affinity = Affinity {
            node_affinity: Some(NodeAffinity {
                required_during_scheduling_ignored_during_execution: Some(NodeSelector {
                    node_selector_terms: vec![NodeSelectorTerm {
                        match_fields: Some(vec![NodeSelectorRequirement {
                            key: "metadata.name".to_string(),
                            operator: "In".to_string(),
                            values: Some(vec![probe.node_name.clone()]),
                        }]),
                        ..Default::default()
                    }],
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        Deployment {
            metadata: self.object_meta(probe),
            spec: Some(DeploymentSpec {
                replicas: Some(1),
                selector: LabelSelector {
                    match_labels: Some(labels.clone()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        annotations: Some(node_annotation(probe)),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![container],
                        affinity: Some(affinity),
                        tolerations: Some(vec![Toleration {
                            operator: Some("Exists".to_string()),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn service(&self, probe: &ProbeIdentity) -> Service {
        Service {
            metadata: self.object_meta(probe),
            spec: Some(ServiceSpec {
                type_: Some("ClusterIP".to_string()),
                selector: Some(probe_labels(probe)),
                ports: Some(vec![ServicePort {
                    name: Some("http".to_string()),
                    port: PROBE_SERVICE_PORT,
                    target_port: Some(IntOrString::String(PROBE_PORT_NAME.to_string())),
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn ingress(&self, probe: &ProbeIdentity) -> Ingress {
        let host = self.host(probe);
        let mut metadata = self.object_meta(probe);
        if !self.ingress.annotations.is_empty() {
            let annotations = metadata.annotations.get_or_insert_with(BTreeMap::new);
            annotations.extend(self.ingress.annotations.clone());
        }

        let tls = self.ingress.tls_secret_name.as_ref().map(|secret| {
            vec![IngressTLS {
                hosts: Some(vec![host.clone()]),
                secret_name: Some(secret.clone()),
            }]
        });

        Ingress {
            metadata,
            spec: Some(IngressSpec {
                ingress_class_name: self.ingress.class_name.clone(),
                tls,
                rules: Some(vec![IngressRule {
                    host: Some(host),
                    http: Some(HTTPIngressRuleValue {
                        paths: vec![HTTPIngressPath {
                            path: Some(self.ingress.path_prefix.clone()),
                            path_type: "Prefix".to_string(),
                            backend: IngressBackend {
                                service: Some(IngressServiceBackend {
                                    name: probe.object_name(),
                                    port: Some(ServiceBackendPort {
                                        number: Some(PROBE_SERVICE_PORT),
                                        ..Default::default()
                                    }),
                                }),
                                ..Default::default()
                            },
                        }],
                    }),
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// `scheme://host+path` of the first rule of a created ingress
    pub fn base_url(&self, ingress: &Ingress) -> Option<String> {
        let rule = ingress.spec.as_ref()?.rules.as_ref()?.first()?;
        let host = rule.host.as_deref().filter(|h| !h.is_empty())?;
        let path = rule
            .http
            .as_ref()
            .and_then(|http| http.paths.first())
            .and_then(|p| p.path.as_deref())
            .unwrap_or("");
        Some(format!("{}://{host}{path}", self.ingress.protocol_scheme))
    }

    fn object_meta(&self, probe: &ProbeIdentity) -> ObjectMeta {
        ObjectMeta {
            name: Some(probe.object_name()),
            namespace: Some(self.namespace.clone()),
            labels: Some(probe_labels(probe)),
            annotations: Some(node_annotation(probe)),
            ..Default::default()
        }
    }
}

/// Node a probe object was created for, read back from its annotation
pub fn probe_node(metadata: &ObjectMeta) -> Option<&str> {
    metadata
        .annotations
        .as_ref()?
        .get(NODE_ANNOTATION)
        .map(String::as_str)
}

fn probe_labels(probe: &ProbeIdentity) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app".to_string(), APP_LABEL_VALUE.to_string()),
        ("type".to_string(), PROBE_TYPE_LABEL_VALUE.to_string()),
        (PROBE_ID_LABEL.to_string(), probe.id.clone()),
    ])
}

fn node_annotation(probe: &ProbeIdentity) -> BTreeMap<String, String> {
    BTreeMap::from([(NODE_ANNOTATION.to_string(), probe.node_name.clone())])
}
