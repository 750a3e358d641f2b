//! Cluster discovery from terraform state
//!
//! The configuration must expose two outputs per color:
//! `<color>Hostnames` (list of hostnames) and `<color>Version` (semver).

use carousel_core::{Cluster, ClusterGroup, Color, ControllerError, Runnable};
use semver::Version;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct StateFile {
    #[allow(dead_code)]
    version: u32,
    #[serde(default)]
    outputs: HashMap<String, OutputValue>,
}

#[derive(Debug, Deserialize)]
struct OutputValue {
    value: serde_json::Value,
}

/// Parse a pulled state file into a cluster
///
/// Null hostname entries are kept as empty placeholders so positions keep
/// matching resource indices.
///
/// # Errors
/// `ControllerError::InvalidState` for malformed state or versions
pub fn parse_cluster(data: &[u8]) -> Result<Cluster, ControllerError> {
    let state: StateFile = serde_json::from_slice(data)
        .map_err(|err| ControllerError::InvalidState(format!("failed to build terraform state: {err}")))?;

    let mut cluster = Cluster::default();
    for color in Color::ALL {
        let hosts = match state.outputs.get(&format!("{color}Hostnames")) {
            Some(output) => parse_hosts(color, &output.value)?,
            None => Vec::new(),
        };
        let version = match state.outputs.get(&format!("{color}Version")) {
            Some(output) => parse_version(color, &output.value)?,
            None => carousel_core::zero_version(),
        };
        cluster[color] = ClusterGroup::new(hosts, version);
    }
    Ok(cluster)
}

fn parse_hosts(color: Color, value: &serde_json::Value) -> Result<Vec<String>, ControllerError> {
    match value {
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                serde_json::Value::String(host) => Ok(host.clone()),
                serde_json::Value::Null => Ok(String::new()),
                other => Err(ControllerError::InvalidState(format!(
                    "{color}Hostnames[{i}] is not a string: {other}"
                ))),
            })
            .collect(),
        other => Err(ControllerError::InvalidState(format!(
            "{color}Hostnames is not a list: {other}"
        ))),
    }
}

fn parse_version(color: Color, value: &serde_json::Value) -> Result<Version, ControllerError> {
    let text = value.as_str().ok_or_else(|| {
        ControllerError::InvalidState(format!("{color}Version is not a string: {value}"))
    })?;
    Version::parse(text.trim())
        .map_err(|err| ControllerError::InvalidState(format!("{err}: {color} {text}")))
}

/// Reads the cluster through `terraform state pull`
#[derive(Clone)]
pub struct StateReader {
    pull: Arc<dyn Runnable>,
}

impl StateReader {
    /// Create from the runnable that prints the state file
    pub fn new(pull: Arc<dyn Runnable>) -> Self {
        Self { pull }
    }

    /// Pull and parse the state
    ///
    /// # Errors
    /// `ControllerError::ClusterUnavailable` if the pull fails,
    /// `ControllerError::InvalidState` if the state cannot be parsed
    pub async fn get_cluster(&self) -> Result<Cluster, ControllerError> {
        let data = self
            .pull
            .output()
            .await
            .map_err(|err| ControllerError::ClusterUnavailable(format!("failed to pull state: {err}")))?;
        let cluster = parse_cluster(&data)?;
        tracing::debug!(cluster = %cluster.as_cluster_state(), "pulled cluster state");
        Ok(cluster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const EMPTY_STATE: &str = r#"{
        "version": 4,
        "terraform_version": "0.13.4",
        "serial": 1007,
        "outputs": {},
        "resources": []
    }"#;

    const CLEAN_STATE: &str = r#"{
        "version": 4,
        "terraform_version": "0.13.4",
        "serial": 1002,
        "outputs": {
            "blueHostnames": {"value": [], "type": ["tuple", []]},
            "blueVersion": {"value": "0.10.0", "type": "string"},
            "greenHostnames": {
                "value": ["carousel-demo-ffdbb6.example.com", "carousel-demo-ea9412.example.com"],
                "type": ["tuple", ["string", "string"]]
            },
            "greenVersion": {"value": "0.10.0", "type": "string"}
        },
        "resources": []
    }"#;

    #[test]
    fn empty_state_is_empty_cluster() {
        assert_eq!(parse_cluster(EMPTY_STATE.as_bytes()).unwrap(), Cluster::default());
    }

    #[test]
    fn clean_state_lists_hosts() {
        let cluster = parse_cluster(CLEAN_STATE.as_bytes()).unwrap();
        assert!(cluster.blue.hosts.is_empty());
        assert_eq!(cluster.blue.version, Version::new(0, 10, 0));
        assert_eq!(
            cluster.green.hosts,
            vec!["carousel-demo-ffdbb6.example.com", "carousel-demo-ea9412.example.com"]
        );
        assert_eq!(cluster.green.version, Version::new(0, 10, 0));
    }

    #[test]
    fn empty_json_is_rejected() {
        assert!(matches!(parse_cluster(b"{}"), Err(ControllerError::InvalidState(_))));
        assert!(matches!(parse_cluster(b""), Err(ControllerError::InvalidState(_))));
    }

    #[test]
    fn null_hosts_keep_their_slot() {
        let state = r#"{"version": 4, "outputs": {"greenHostnames": {"value": ["a", null, "c"]}}}"#;
        let cluster = parse_cluster(state.as_bytes()).unwrap();
        assert_eq!(cluster.green.hosts, vec!["a", "", "c"]);
    }

    #[test]
    fn bad_version_names_color() {
        let state = r#"{"version": 4, "outputs": {"blueVersion": {"value": "latest"}}}"#;
        let err = parse_cluster(state.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("blue latest"));
    }

    #[test]
    fn non_string_host_is_rejected() {
        let state = r#"{"version": 4, "outputs": {"blueHostnames": {"value": ["a", 3]}}}"#;
        let err = parse_cluster(state.as_bytes()).unwrap_err();
        assert_eq!(
            err,
            ControllerError::InvalidState("blueHostnames[1] is not a string: 3".into())
        );
    }
}
