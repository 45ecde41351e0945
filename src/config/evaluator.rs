//! # Evaluator Configuration
//!
//! Schema of the YAML config file. Every field has a default, so an empty file (or no
//! file at all) yields a runnable configuration against the current kube context.
//!
//! ```yaml
//! kubeConfig: /home/me/.kube/config
//! namespace: node-perf-evaluator
//! nodeSelector:
//!   labelSelector: node-role.kubernetes.io/worker
//! testService:
//!   image: registry.example.com/node-perf-probe:1.0.0
//! ingress:
//!   className: nginx
//!   hostnameSuffix: perf.example.com
//!   protocolScheme: https
//!   tlsSecretName: perf-wildcard-tls
//! ```

use crate::config::{env_var_or_default_bool, env_var_or_default_str};
use crate::constants::*;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Top-level evaluator configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvaluatorConfig {
    /// Path to a kubeconfig file. Falls back to in-cluster config / `KUBECONFIG` /
    /// `~/.kube/config` when unset.
    pub kube_config: Option<PathBuf>,
    /// Kubeconfig context to use instead of the current context
    pub kube_context: Option<String>,
    /// Namespace that holds every probe. Deleted and recreated on each run, so it must
    /// not be shared with anything else.
    pub namespace: String,
    pub node_selector: NodeSelectorConfig,
    pub test_service: TestServiceConfig,
    pub ingress: IngressConfig,
    pub execution: ExecutionConfig,
    pub timeouts: TimeoutConfig,
    pub logging: LoggingConfig,
}

/// Restricts which nodes are evaluated
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeSelectorConfig {
    pub label_selector: Option<String>,
    pub field_selector: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestServiceConfig {
    /// Probe container image
    pub image: String,
}

/// How probes are exposed outside the cluster
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IngressConfig {
    pub class_name: Option<String>,
    /// Each probe gets the host `<probe-id>.<hostnameSuffix>`
    pub hostname_suffix: String,
    pub tls_secret_name: Option<String>,
    /// `http` or `https`
    pub protocol_scheme: String,
    pub path_prefix: String,
    /// Extra annotations copied onto every ingress (rewrite rules, timeouts, ...)
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutionConfig {
    /// Load test every node of a suite at the same time instead of one after another
    pub parallel_nodes: bool,
    /// Abort the whole run when a single node cannot be provisioned
    pub fail_fast: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeoutConfig {
    pub request_secs: u64,
    pub poll_interval_millis: u64,
    pub rollout_secs: u64,
    pub ingress_secs: u64,
    pub namespace_deletion_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub level: String,
    /// Log format (json, text)
    pub format: String,
    /// Enable color in text format logs
    pub enable_color: bool,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            kube_config: None,
            kube_context: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
            node_selector: NodeSelectorConfig::default(),
            test_service: TestServiceConfig::default(),
            ingress: IngressConfig::default(),
            execution: ExecutionConfig::default(),
            timeouts: TimeoutConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for TestServiceConfig {
    fn default() -> Self {
        Self {
            image: DEFAULT_PROBE_IMAGE.to_string(),
        }
    }
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            class_name: None,
            hostname_suffix: DEFAULT_HOSTNAME_SUFFIX.to_string(),
            tls_secret_name: None,
            protocol_scheme: DEFAULT_PROTOCOL_SCHEME.to_string(),
            path_prefix: DEFAULT_PATH_PREFIX.to_string(),
            annotations: BTreeMap::new(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            poll_interval_millis: DEFAULT_POLL_INTERVAL_MS,
            rollout_secs: DEFAULT_ROLLOUT_TIMEOUT_SECS,
            ingress_secs: DEFAULT_INGRESS_TIMEOUT_SECS,
            namespace_deletion_secs: DEFAULT_NAMESPACE_DELETION_TIMEOUT_SECS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            format: "text".to_string(),
            enable_color: true,
        }
    }
}

impl EvaluatorConfig {
    /// Read and validate a config file
    ///
    /// Environment overrides (`LOG_LEVEL`, `LOG_FORMAT`, `LOG_ENABLE_COLOR`) are applied
    /// after parsing.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse config content without validating it
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document deserializes to unit, not to an empty mapping
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Default configuration with environment overrides applied
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        self.logging.level = env_var_or_default_str("LOG_LEVEL", &self.logging.level);
        self.logging.format = env_var_or_default_str("LOG_FORMAT", &self.logging.format);
        self.logging.enable_color =
            env_var_or_default_bool("LOG_ENABLE_COLOR", self.logging.enable_color);
    }

    /// Check values the cluster would otherwise reject halfway through a run
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_dns_label(&self.namespace) {
            return Err(ConfigError::Invalid {
                field: "namespace",
                reason: format!(
                    "'{}' is not a valid DNS-1123 label (lowercase alphanumerics and '-', at most 63 characters)",
                    self.namespace
                ),
            });
        }
        if self.test_service.image.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "testService.image",
                reason: "must not be empty".to_string(),
            });
        }
        if !matches!(self.ingress.protocol_scheme.as_str(), "http" | "https") {
            return Err(ConfigError::Invalid {
                field: "ingress.protocolScheme",
                reason: format!("expected http or https, got '{}'", self.ingress.protocol_scheme),
            });
        }
        if !self.ingress.path_prefix.starts_with('/') {
            return Err(ConfigError::Invalid {
                field: "ingress.pathPrefix",
                reason: format!("'{}' must start with '/'", self.ingress.path_prefix),
            });
        }
        if self.ingress.hostname_suffix.trim_matches('.').is_empty() {
            return Err(ConfigError::Invalid {
                field: "ingress.hostnameSuffix",
                reason: "must not be empty".to_string(),
            });
        }
        let timeouts = [
            ("timeouts.requestSecs", self.timeouts.request_secs),
            ("timeouts.pollIntervalMillis", self.timeouts.poll_interval_millis),
            ("timeouts.rolloutSecs", self.timeouts.rollout_secs),
            ("timeouts.ingressSecs", self.timeouts.ingress_secs),
            (
                "timeouts.namespaceDeletionSecs",
                self.timeouts.namespace_deletion_secs,
            ),
        ];
        for (field, value) in timeouts {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }
}

impl TimeoutConfig {
    pub fn request_duration(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn poll_interval_duration(&self) -> Duration {
        Duration::from_millis(self.poll_interval_millis)
    }

    pub fn rollout_duration(&self) -> Duration {
        Duration::from_secs(self.rollout_secs)
    }

    pub fn ingress_duration(&self) -> Duration {
        Duration::from_secs(self.ingress_secs)
    }

    pub fn namespace_deletion_duration(&self) -> Duration {
        Duration::from_secs(self.namespace_deletion_secs)
    }
}

fn is_dns_label(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 63
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !value.starts_with('-')
        && !value.ends_with('-')
}
