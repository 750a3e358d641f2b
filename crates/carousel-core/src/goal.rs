//! Goal state resolution
//!
//! The goal of a rollout is always "the other color holds the new nodes,
//! the current color is drained". The current color keeps its version so a
//! drained group still records what it last ran.

use crate::error::GoalError;
use crate::model::ClusterState;
use semver::Version;

/// Compute the end state of a rollout of `node_count` nodes at `version`
///
/// # Errors
/// `GoalError::DetermineGroup` if `current` has nodes in both colors
pub fn build_end_state(
    current: &ClusterState,
    node_count: usize,
    version: Version,
) -> Result<ClusterState, GoalError> {
    let group = current.group()?;

    let mut end = current.clone();
    end[group].count = 0;
    end[group.other()].count = node_count;
    end[group.other()].version = version;

    tracing::debug!(from = %current, to = %end, "resolved goal state");
    Ok(end)
}
