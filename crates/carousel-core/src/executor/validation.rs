//! Host validation fan-out
//!
//! One task per new host. Each task validates its host and, if the host is
//! bad, taints it. Tasks only report an outcome; the caller owns the
//! known-good set and folds outcomes into it after every task has joined.

use crate::controller::{Controller, HostValidator};
use crate::error::{ControllerError, StepFailure, TaintErrors};
use futures::future::join_all;
use std::sync::Arc;

/// Result of validating one host
#[derive(Debug)]
enum HostOutcome {
    Valid,
    Tainted,
    TaintFailed(ControllerError),
}

/// Outcomes of one validation round, reduced after the join
#[derive(Debug, Default)]
pub(crate) struct ValidationRound {
    /// Hosts that passed
    pub(crate) valid: Vec<String>,
    /// Hosts that failed, tainted or not
    pub(crate) invalid: Vec<String>,
    /// Failed hosts whose taint did not go through
    pub(crate) untainted: Vec<String>,
    /// Taint failures, in host order
    pub(crate) taint_errors: TaintErrors,
}

impl ValidationRound {
    /// Number of hosts checked
    pub(crate) fn checked(&self) -> usize {
        self.valid.len() + self.invalid.len()
    }

    /// A re-application is needed
    pub(crate) fn needs_rerun(&self) -> bool {
        !self.invalid.is_empty()
    }
}

/// Validate `hosts` concurrently and taint the bad ones
///
/// # Errors
/// `StepFailure::Validation` if a task panicked or was cancelled
pub(crate) async fn validate_hosts(
    controller: &Arc<dyn Controller>,
    validator: &Arc<dyn HostValidator>,
    hosts: Vec<String>,
) -> Result<ValidationRound, StepFailure> {
    let handles: Vec<_> = hosts
        .iter()
        .map(|host| {
            let controller = Arc::clone(controller);
            let validator = Arc::clone(validator);
            let host = host.clone();
            tokio::spawn(async move { check_host(controller.as_ref(), validator.as_ref(), &host).await })
        })
        .collect();

    let mut round = ValidationRound::default();
    for (host, joined) in hosts.into_iter().zip(join_all(handles).await) {
        let outcome = joined.map_err(|err| StepFailure::Validation {
            host: host.clone(),
            reason: err.to_string(),
        })?;
        match outcome {
            HostOutcome::Valid => round.valid.push(host),
            HostOutcome::Tainted => round.invalid.push(host),
            HostOutcome::TaintFailed(err) => {
                round.taint_errors.push(err);
                round.untainted.push(host.clone());
                round.invalid.push(host);
            }
        }
    }
    Ok(round)
}

async fn check_host(controller: &dyn Controller, validator: &dyn HostValidator, host: &str) -> HostOutcome {
    if validator.validate(host).await {
        tracing::debug!(host, "host is valid");
        return HostOutcome::Valid;
    }

    tracing::debug!(host, "check failed, tainting host");
    match controller.taint_host(host).await {
        Ok(()) => HostOutcome::Tainted,
        Err(err) => {
            tracing::warn!(host, error = %err, "failed to taint host");
            HostOutcome::TaintFailed(err)
        }
    }
}
