//! Terraform-backed controller

use crate::apply::build_apply;
use crate::config::{ApplyOptions, BinaryConfig};
use crate::graph::ClusterGraph;
use crate::runner::{CommandRunner, RunOptions};
use crate::state::StateReader;
use crate::taint::Tainter;
use crate::workspace::WorkspaceSelector;
use carousel_core::{Cluster, ClusterState, Controller, ControllerError, Runnable, Step};
use std::path::PathBuf;
use std::sync::Arc;

/// Controller driving the terraform CLI
///
/// The configuration must have a blue and a green module sized by
/// `versionBlueCount`/`versionGreenCount` and expose
/// `blueHostnames`, `blueVersion`, `greenHostnames` and `greenVersion` outputs.
#[derive(Clone)]
pub struct TerraformController {
    config: BinaryConfig,
    apply: ApplyOptions,
    state: StateReader,
    tainter: Tainter,
    graph: ClusterGraph,
    workspace: WorkspaceSelector,
}

impl TerraformController {
    /// Create a controller running `config.binary`
    pub fn new(config: BinaryConfig, apply: ApplyOptions) -> Self {
        let commands = Commands {
            binary: config.binary.clone(),
            dir: config.working_directory.clone(),
        };

        let state = StateReader::new(commands.run(&["state", "pull"]));
        let graph = ClusterGraph::new(state.clone(), commands.run(&["state", "list"]));

        let taint = commands.clone();
        let tainter = Tainter::new(
            graph.clone(),
            Arc::new(move |resource: &str| taint.run(&["taint", resource])),
        );

        let select = commands.clone();
        let create = commands.clone();
        let workspace = WorkspaceSelector::new(
            commands.run(&["init"]),
            commands.run(&["workspace", "show"]),
            commands.run(&["workspace", "list"]),
            Arc::new(move |name: &str| select.run(&["workspace", "select", name])),
            Arc::new(move |name: &str| create.run(&["workspace", "new", name])),
        );

        Self {
            config,
            apply,
            state,
            tainter,
            graph,
            workspace,
        }
    }

    /// Binary configuration
    #[must_use]
    pub fn config(&self) -> &BinaryConfig {
        &self.config
    }
}

/// Builds plain runners for one binary and directory
#[derive(Clone)]
struct Commands {
    binary: String,
    dir: Option<PathBuf>,
}

impl Commands {
    fn run(&self, args: &[&str]) -> Arc<dyn Runnable> {
        Arc::new(CommandRunner::new(
            self.dir.as_deref(),
            &self.binary,
            RunOptions::default(),
            args.iter().copied(),
        ))
    }
}

#[async_trait::async_trait]
impl Controller for TerraformController {
    async fn get_cluster(&self) -> Result<Cluster, ControllerError> {
        self.state.get_cluster().await
    }

    fn create_apply(&self, target: &ClusterState, step: &Step) -> Arc<dyn Runnable> {
        Arc::new(build_apply(target, step, &self.config, self.apply))
    }

    async fn resources_for_host(&self, hostname: &str) -> Result<Vec<String>, ControllerError> {
        self.graph.resources_for_host(hostname).await
    }

    async fn taint_resources(&self, resources: &[String]) -> Result<(), ControllerError> {
        self.tainter.taint_resources(resources).await
    }

    async fn taint_host(&self, hostname: &str) -> Result<(), ControllerError> {
        self.tainter.taint_host(hostname).await
    }

    async fn select_workspace(&self, name: &str) -> Result<(), ControllerError> {
        self.workspace.select_workspace(name).await
    }
}
