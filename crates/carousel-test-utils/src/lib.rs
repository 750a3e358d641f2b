//! Testing utilities for the Carousel workspace
//!
//! Shared fixtures: an in-memory controller that behaves like a provisioning
//! tool, a recording validator, and cluster builders.

#![allow(missing_docs)]

use carousel_core::{
    Cluster, ClusterGroup, ClusterGroupState, ClusterState, Color, Controller, ControllerError,
    HostValidator, Runnable, RunnableError, Step,
};
use parking_lot::Mutex;
use semver::Version;
use std::collections::HashSet;
use std::sync::Arc;

pub fn version(text: &str) -> Version {
    Version::parse(text).unwrap()
}

/// Planning state with zero versions
pub fn state(blue: usize, green: usize) -> ClusterState {
    ClusterState::new(
        ClusterGroupState::new(blue, Version::new(0, 0, 0)),
        ClusterGroupState::new(green, Version::new(0, 0, 0)),
    )
}

/// Observed cluster with `count` generated hosts in `color` at `ver`
pub fn cluster(color: Color, count: usize, ver: &str) -> Cluster {
    let mut cluster = Cluster::default();
    cluster[color] = ClusterGroup::new((1..=count).map(|id| hostname(color, id)).collect(), version(ver));
    cluster
}

pub fn hostname(color: Color, id: usize) -> String {
    format!("{color}-{id:04}.example.com")
}

#[derive(Debug, Default)]
struct Infra {
    cluster: Cluster,
    next_id: usize,
    tainted: HashSet<String>,
    untaintable: HashSet<String>,
    lossy_taints: HashSet<String>,
    failing_applies: HashSet<usize>,
    unavailable_after: Option<usize>,
    applies: Vec<Step>,
    taint_log: Vec<String>,
    get_cluster_calls: usize,
    workspace: String,
}

impl Infra {
    fn fresh_host(&mut self, color: Color) -> String {
        self.next_id += 1;
        hostname(color, self.next_id)
    }

    fn apply(&mut self, target: &ClusterState, step: &Step) -> Result<(), RunnableError> {
        let index = self.applies.len();
        self.applies.push(*step);
        if self.failing_applies.contains(&index) {
            return Err(RunnableError::new("exit status 1")
                .with_output(Vec::new(), b"Error: simulated apply failure".to_vec())
                .with_exit_code(Some(1)));
        }

        for color in Color::ALL {
            let mut hosts = std::mem::take(&mut self.cluster[color].hosts);
            for host in &mut hosts {
                if self.tainted.remove(host.as_str()) {
                    *host = self.fresh_host(color);
                }
            }
            hosts.truncate(step[color]);
            while hosts.len() < step[color] {
                let host = self.fresh_host(color);
                hosts.push(host);
            }
            self.cluster[color].hosts = hosts;
            self.cluster[color].version = target[color].version.clone();
        }
        Ok(())
    }
}

/// In-memory controller
///
/// Applies resize each group to the step's count, replace tainted hosts with
/// freshly named ones and set each group's version to the target's. New hosts
/// are named `<color>-<id>.example.com` with ids continuing across groups.
#[derive(Debug, Clone, Default)]
pub struct SimulatedController {
    infra: Arc<Mutex<Infra>>,
}

impl SimulatedController {
    pub fn new(cluster: Cluster) -> Self {
        let next_id = Color::ALL.iter().map(|&c| cluster[c].hosts.len()).sum();
        Self {
            infra: Arc::new(Mutex::new(Infra {
                cluster,
                next_id,
                ..Infra::default()
            })),
        }
    }

    /// Fail the `index`th apply (zero based, counted across all steps)
    #[must_use]
    pub fn failing_apply(self, index: usize) -> Self {
        self.infra.lock().failing_applies.insert(index);
        self
    }

    /// Refuse to taint `host`
    #[must_use]
    pub fn untaintable(self, host: &str) -> Self {
        self.infra.lock().untaintable.insert(host.to_string());
        self
    }

    /// Report a failure when tainting `host`, but taint it anyway
    #[must_use]
    pub fn lossy_taint(self, host: &str) -> Self {
        self.infra.lock().lossy_taints.insert(host.to_string());
        self
    }

    /// Fail every `get_cluster` call after the first `calls`
    #[must_use]
    pub fn unavailable_after(self, calls: usize) -> Self {
        self.infra.lock().unavailable_after = Some(calls);
        self
    }

    /// Stop failing applies and observations
    pub fn heal(&self) {
        let mut infra = self.infra.lock();
        infra.failing_applies.clear();
        infra.unavailable_after = None;
    }

    pub fn cluster(&self) -> Cluster {
        self.infra.lock().cluster.clone()
    }

    pub fn applies(&self) -> Vec<Step> {
        self.infra.lock().applies.clone()
    }

    pub fn taint_log(&self) -> Vec<String> {
        self.infra.lock().taint_log.clone()
    }

    pub fn get_cluster_calls(&self) -> usize {
        self.infra.lock().get_cluster_calls
    }

    pub fn workspace(&self) -> String {
        self.infra.lock().workspace.clone()
    }

    pub fn as_controller(&self) -> Arc<dyn Controller> {
        Arc::new(self.clone())
    }
}

struct SimulatedApply {
    infra: Arc<Mutex<Infra>>,
    target: ClusterState,
    step: Step,
}

#[async_trait::async_trait]
impl Runnable for SimulatedApply {
    async fn output(&self) -> Result<Vec<u8>, RunnableError> {
        self.infra.lock().apply(&self.target, &self.step)?;
        Ok(b"Apply complete!".to_vec())
    }

    fn describe(&self) -> String {
        format!(
            "simulated apply versionBlueCount={} versionGreenCount={}",
            self.step.blue, self.step.green
        )
    }
}

#[async_trait::async_trait]
impl Controller for SimulatedController {
    async fn get_cluster(&self) -> Result<Cluster, ControllerError> {
        let mut infra = self.infra.lock();
        infra.get_cluster_calls += 1;
        if infra.unavailable_after.is_some_and(|calls| infra.get_cluster_calls > calls) {
            return Err(ControllerError::ClusterUnavailable("simulated outage".into()));
        }
        Ok(infra.cluster.clone())
    }

    fn create_apply(&self, target: &ClusterState, step: &Step) -> Arc<dyn Runnable> {
        Arc::new(SimulatedApply {
            infra: Arc::clone(&self.infra),
            target: target.clone(),
            step: *step,
        })
    }

    async fn resources_for_host(&self, hostname: &str) -> Result<Vec<String>, ControllerError> {
        if hostname.trim().is_empty() {
            return Err(ControllerError::EmptyHostname);
        }
        let infra = self.infra.lock();
        let (color, index) = infra
            .cluster
            .find_host(hostname)
            .ok_or_else(|| ControllerError::HostNotInGroup(hostname.to_string()))?;
        Ok(vec![format!("module.{color}.instance.node[{index}]")])
    }

    async fn taint_resources(&self, resources: &[String]) -> Result<(), ControllerError> {
        self.infra.lock().taint_log.extend(resources.iter().cloned());
        Ok(())
    }

    async fn taint_host(&self, hostname: &str) -> Result<(), ControllerError> {
        let mut infra = self.infra.lock();
        if infra.untaintable.contains(hostname) {
            return Err(ControllerError::TaintHost {
                host: hostname.to_string(),
                reason: "simulated taint failure".into(),
            });
        }
        if infra.cluster.find_host(hostname).is_none() {
            return Err(ControllerError::HostNotInGroup(hostname.to_string()));
        }
        infra.tainted.insert(hostname.to_string());
        infra.taint_log.push(hostname.to_string());
        if infra.lossy_taints.contains(hostname) {
            return Err(ControllerError::TaintHost {
                host: hostname.to_string(),
                reason: "simulated lost acknowledgement".into(),
            });
        }
        Ok(())
    }

    async fn select_workspace(&self, name: &str) -> Result<(), ControllerError> {
        if !name.is_empty() {
            self.infra.lock().workspace = name.to_string();
        }
        Ok(())
    }
}

/// Validator that rejects a fixed set of hosts and records every call
#[derive(Debug, Default)]
pub struct RecordingValidator {
    rejected: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl RecordingValidator {
    pub fn rejecting<I, S>(hosts: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            rejected: hosts.into_iter().map(Into::into).collect(),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn accepting() -> Arc<Self> {
        Self::rejecting(Vec::<String>::new())
    }

    /// Hosts checked so far, sorted
    pub fn calls(&self) -> Vec<String> {
        let mut calls = self.calls.lock().clone();
        calls.sort();
        calls
    }
}

#[async_trait::async_trait]
impl HostValidator for RecordingValidator {
    async fn validate(&self, hostname: &str) -> bool {
        self.calls.lock().push(hostname.to_string());
        !self.rejected.contains(hostname)
    }
}
