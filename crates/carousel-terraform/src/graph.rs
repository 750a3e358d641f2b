//! Host to resource resolution

use crate::state::StateReader;
use carousel_core::{Color, ControllerError, Runnable};
use std::sync::Arc;

/// Resources in a `terraform state list` listing that back the host at `index`
///
/// Lines carrying `[index]` belong to that host. When some of them also name
/// the host's color (`module.green...`), the others are dropped.
#[must_use]
pub fn matching_resources(listing: &str, color: Color, index: usize) -> Vec<String> {
    let needle = format!("[{index}]");
    let matches: Vec<&str> = listing
        .lines()
        .map(str::trim)
        .filter(|line| line.contains(&needle))
        .collect();

    let colored: Vec<&str> = matches
        .iter()
        .copied()
        .filter(|line| line.contains(color.as_str()))
        .collect();

    let chosen = if colored.is_empty() { matches } else { colored };
    chosen.into_iter().map(String::from).collect()
}

/// Resolves hosts to resources through the state and `terraform state list`
#[derive(Clone)]
pub struct ClusterGraph {
    state: StateReader,
    list: Arc<dyn Runnable>,
}

impl ClusterGraph {
    /// Create from a state reader and the runnable that lists resources
    pub fn new(state: StateReader, list: Arc<dyn Runnable>) -> Self {
        Self { state, list }
    }

    /// Resources backing `hostname`
    ///
    /// # Errors
    /// - `ControllerError::EmptyHostname` for a blank hostname
    /// - `ControllerError::HostNotInGroup` if no group has the host
    /// - `ControllerError::ResourceListing` if listing fails
    /// - Errors from reading the cluster
    pub async fn resources_for_host(&self, hostname: &str) -> Result<Vec<String>, ControllerError> {
        if hostname.trim().is_empty() {
            return Err(ControllerError::EmptyHostname);
        }

        let cluster = self.state.get_cluster().await?;
        let (color, index) = cluster
            .find_host(hostname)
            .ok_or_else(|| ControllerError::HostNotInGroup(hostname.to_string()))?;

        let listing = self
            .list
            .output()
            .await
            .map_err(|err| ControllerError::ResourceListing(err.to_string()))?;
        let resources = matching_resources(&String::from_utf8_lossy(&listing), color, index);
        tracing::debug!(host = hostname, %color, index, ?resources, "resolved host resources");
        Ok(resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LIST: &str = "module.green.data.null_data_source.name[0]
module.green.data.null_data_source.name[1]
module.green.random_id.ID[0]
module.green.random_id.ID[1]
";

    const COUNT_LIST: &str = "module.green[0].data.null_data_source.name
module.green[1].data.null_data_source.name
module.green[0].random_id.ID
module.green[1].random_id.ID
";

    #[test]
    fn matches_index_suffix() {
        assert_eq!(
            matching_resources(LIST, Color::Green, 0),
            vec!["module.green.data.null_data_source.name[0]", "module.green.random_id.ID[0]"]
        );
        assert_eq!(
            matching_resources(LIST, Color::Green, 1),
            vec!["module.green.data.null_data_source.name[1]", "module.green.random_id.ID[1]"]
        );
    }

    #[test]
    fn matches_counted_modules() {
        assert_eq!(
            matching_resources(COUNT_LIST, Color::Green, 1),
            vec!["module.green[1].data.null_data_source.name", "module.green[1].random_id.ID"]
        );
    }

    #[test]
    fn prefers_resources_of_host_color() {
        let listing = "module.blue.aws_instance.node[0]\nmodule.green.aws_instance.node[0]\n";
        assert_eq!(
            matching_resources(listing, Color::Blue, 0),
            vec!["module.blue.aws_instance.node[0]"]
        );
    }

    #[test]
    fn index_ten_does_not_match_one() {
        let listing = "module.green.node[1]\nmodule.green.node[10]\n";
        assert_eq!(matching_resources(listing, Color::Green, 1), vec!["module.green.node[1]"]);
    }
}
