//! Carousel Terraform - infrastructure controller backed by the terraform CLI
//!
//! Provides:
//! - `CommandRunner`: re-runnable subprocess with captured, optionally echoed output
//! - Cluster discovery from `terraform state pull`
//! - Host to resource resolution through `terraform state list`
//! - Tainting, workspace selection and apply construction
//! - `TerraformController`, tying all of the above to the core `Controller` trait

#![warn(unreachable_pub)]

pub mod apply;
pub mod config;
pub mod controller;
pub mod graph;
pub mod runner;
pub mod state;
pub mod taint;
pub mod workspace;

use carousel_core::Runnable;
use std::sync::Arc;

pub use apply::{apply_args, build_apply};
pub use config::{ApplyOptions, BinaryConfig, ValuePair, DEFAULT_BINARY};
pub use controller::TerraformController;
pub use graph::{matching_resources, ClusterGraph};
pub use runner::{CommandRunner, RunOptions};
pub use state::{parse_cluster, StateReader};
pub use taint::{classify_taint_failure, Tainter};
pub use workspace::WorkspaceSelector;

/// Builds a runnable for one argument, such as a resource or workspace name
pub type RunnableFactory = Arc<dyn Fn(&str) -> Arc<dyn Runnable> + Send + Sync>;
