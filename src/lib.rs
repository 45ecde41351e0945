//! Node Performance Evaluator Library
//!
//! Core functionality of the node performance evaluator: cluster access, probe
//! provisioning, load generation, aggregation and reporting. The binaries in this
//! package are thin wrappers around these modules.

pub mod cli;
pub mod cluster;
pub mod config;
pub mod constants;
pub mod evaluator;
pub mod observability;
pub mod probe;
pub mod reports;
pub mod server;
