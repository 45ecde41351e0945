//! # Configuration
//!
//! Evaluator configuration loaded from a YAML file, with a few settings that can be
//! overridden from environment variables.
//!
//! - `evaluator`: the config file schema, defaults and validation

pub mod evaluator;

pub use evaluator::{
    ConfigError, EvaluatorConfig, ExecutionConfig, IngressConfig, LoggingConfig,
    NodeSelectorConfig, TestServiceConfig, TimeoutConfig,
};

/// Read environment variable or return default value
pub(crate) fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
pub(crate) fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| {
            let v_lower = v.to_lowercase();
            v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
        })
        .unwrap_or(default)
}

/// Read environment variable as string or return default
pub(crate) fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Port for the metrics server from `METRICS_PORT`, if set and valid
pub fn metrics_port_from_env() -> Option<u16> {
    std::env::var("METRICS_PORT")
        .ok()
        .and_then(|v| v.trim().parse().ok())
}
