//! Collaborator seams
//!
//! The executor drives infrastructure only through these traits:
//! - [`Controller`]: observe the cluster, build apply actions, taint hosts
//! - [`Runnable`]: a deferred, re-runnable action
//! - [`HostValidator`]: decides whether a freshly provisioned host is healthy

use crate::error::{ControllerError, RunnableError};
use crate::model::{Cluster, ClusterState, Step};
use std::sync::Arc;

/// A deferred action that can be run any number of times
#[async_trait::async_trait]
pub trait Runnable: Send + Sync {
    /// Run to completion and return the captured output
    ///
    /// # Errors
    /// `RunnableError` with whatever output was captured
    async fn output(&self) -> Result<Vec<u8>, RunnableError>;

    /// Human readable description, printed verbatim for dry runs
    fn describe(&self) -> String;
}

/// Infrastructure controller
///
/// Implement this trait to drive a provisioning tool. `create_apply` is the
/// unit of infrastructure change: after its runnable succeeds, `get_cluster`
/// must reflect the change.
#[async_trait::async_trait]
pub trait Controller: Send + Sync {
    /// Observe the current cluster
    async fn get_cluster(&self) -> Result<Cluster, ControllerError>;

    /// Build the action that realizes `step` on the way to `target`
    fn create_apply(&self, target: &ClusterState, step: &Step) -> Arc<dyn Runnable>;

    /// Resolve a host to the resources backing it
    async fn resources_for_host(&self, hostname: &str) -> Result<Vec<String>, ControllerError>;

    /// Mark resources for replacement on the next apply
    async fn taint_resources(&self, resources: &[String]) -> Result<(), ControllerError>;

    /// Mark every resource of a host for replacement on the next apply
    async fn taint_host(&self, hostname: &str) -> Result<(), ControllerError> {
        let resources = self.resources_for_host(hostname).await?;
        self.taint_resources(&resources).await
    }

    /// Switch to the named workspace before a migration begins
    async fn select_workspace(&self, name: &str) -> Result<(), ControllerError>;
}

/// Host health predicate
#[async_trait::async_trait]
pub trait HostValidator: Send + Sync {
    /// True if the host is healthy
    async fn validate(&self, hostname: &str) -> bool;
}

#[async_trait::async_trait]
impl<F> HostValidator for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    async fn validate(&self, hostname: &str) -> bool {
        self(hostname)
    }
}

/// Validator that accepts every host
#[must_use]
pub fn accept_all() -> Arc<dyn HostValidator> {
    Arc::new(|_: &str| true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closures_are_validators() {
        let only_good: Arc<dyn HostValidator> = Arc::new(|host: &str| host.starts_with("good"));
        assert!(only_good.validate("good-1").await);
        assert!(!only_good.validate("bad-1").await);
        assert!(accept_all().validate("anything").await);
    }
}
