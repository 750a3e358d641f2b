//! Resource tainting
//!
//! Tainted resources are replaced on the next apply. Some resources (data
//! sources, for one) cannot be tainted; terraform reports that on stderr and
//! it is not treated as a failure.

use crate::graph::ClusterGraph;
use crate::RunnableFactory;
use carousel_core::{ControllerError, RunnableError};

/// Map a failed `terraform taint` run to an error, or `None` when benign
#[must_use]
pub fn classify_taint_failure(resource: &str, runner: &str, err: RunnableError) -> Option<ControllerError> {
    let text = err.diagnostic_text().to_lowercase();
    if text.contains("cannot be tainted") {
        None
    } else if text.contains("no such resource instance") {
        Some(ControllerError::NoSuchResource(resource.to_string()))
    } else {
        Some(ControllerError::TaintResource {
            runner: runner.to_string(),
            source: err,
        })
    }
}

/// Taints hosts by tainting every resource behind them
#[derive(Clone)]
pub struct Tainter {
    graph: ClusterGraph,
    taint: RunnableFactory,
}

impl Tainter {
    /// Create from a resource graph and a builder for `taint <resource>` runs
    pub fn new(graph: ClusterGraph, taint: RunnableFactory) -> Self {
        Self { graph, taint }
    }

    /// Taint each resource in order, stopping at the first real failure
    ///
    /// # Errors
    /// `ControllerError::NoSuchResource` or `ControllerError::TaintResource`
    pub async fn taint_resources(&self, resources: &[String]) -> Result<(), ControllerError> {
        for resource in resources {
            let runner = (self.taint)(resource);
            match runner.output().await {
                Ok(_) => tracing::debug!(resource, "tainted resource"),
                Err(err) => {
                    if let Some(failure) = classify_taint_failure(resource, &runner.describe(), err) {
                        return Err(failure);
                    }
                    tracing::debug!(resource, "resource cannot be tainted, skipping");
                }
            }
        }
        Ok(())
    }

    /// Taint every resource behind `hostname`
    ///
    /// # Errors
    /// `ControllerError::TaintHost` if the host cannot be resolved, otherwise
    /// see [`Tainter::taint_resources`]
    pub async fn taint_host(&self, hostname: &str) -> Result<(), ControllerError> {
        let resources = self
            .graph
            .resources_for_host(hostname)
            .await
            .map_err(|err| ControllerError::TaintHost {
                host: hostname.to_string(),
                reason: err.to_string(),
            })?;
        self.taint_resources(&resources).await
    }
}
