//! End-to-end controller tests against a scripted stand-in for the terraform binary
#![cfg(unix)]

use carousel_core::{ClusterGroupState, ClusterState, Color, Controller, ControllerError, Step};
use carousel_terraform::{ApplyOptions, BinaryConfig, TerraformController, ValuePair};
use semver::Version;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const STATE: &str = r#"{
  "version": 4,
  "outputs": {
    "blueHostnames": {"value": []},
    "blueVersion": {"value": "0.10.0"},
    "greenHostnames": {"value": ["carousel-demo-ffdbb6.example.com", "carousel-demo-ea9412.example.com"]},
    "greenVersion": {"value": "0.10.0"}
  }
}"#;

struct FakeTerraform {
    dir: TempDir,
    binary: PathBuf,
    log: PathBuf,
}

impl FakeTerraform {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.json");
        let log = dir.path().join("calls.log");
        std::fs::write(&state, STATE).unwrap();

        let script = format!(
            r#"#!/bin/sh
echo "$@" >> "{log}"
case "$1" in
  state)
    if [ "$2" = "pull" ]; then cat "{state}"; else printf 'module.green.random_id.ID[0]\nmodule.green.random_id.ID[1]\n'; fi ;;
  workspace)
    if [ "$2" = "show" ]; then echo default; elif [ "$2" = "list" ]; then printf '* default\n'; fi ;;
  taint)
    if [ "$2" = "module.green.random_id.ID[1]" ]; then echo "Error: No such resource instance" >&2; exit 1; fi ;;
  apply)
    echo "TF_VAR_token=$TF_VAR_token" >> "{log}" ;;
esac
"#,
            log = log.display(),
            state = state.display(),
        );
        let binary = dir.path().join("terraform");
        std::fs::write(&binary, script).unwrap();
        std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();

        Self { dir, binary, log }
    }

    fn controller(&self) -> TerraformController {
        let mut config = BinaryConfig::default()
            .with_binary(self.binary.display().to_string())
            .with_working_directory(self.dir.path())
            .with_arg("region", "us-east-2");
        config.private_args.push(ValuePair::new("token", "s3cr3t"));
        TerraformController::new(config, ApplyOptions::default())
    }

    fn calls(&self) -> Vec<String> {
        read_lines(&self.log)
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(String::from)
        .collect()
}

#[tokio::test]
async fn reads_cluster_from_state() {
    let fake = FakeTerraform::new();
    let cluster = fake.controller().get_cluster().await.unwrap();
    assert_eq!(cluster.green.hosts.len(), 2);
    assert_eq!(cluster.green.version, Version::new(0, 10, 0));
    assert_eq!(cluster.as_cluster_state().group().unwrap(), Color::Green);
    assert_eq!(fake.calls(), vec!["state pull"]);
}

#[tokio::test]
async fn apply_passes_counts_versions_and_private_args() {
    let fake = FakeTerraform::new();
    let target = ClusterState::new(
        ClusterGroupState::new(2, Version::new(1, 0, 0)),
        ClusterGroupState::new(0, Version::new(0, 10, 0)),
    );
    let apply = fake.controller().create_apply(&target, &Step::new(1, 2));
    assert!(apply.describe().starts_with("TF_VAR_token=xxxx "));

    apply.output().await.unwrap();
    assert_eq!(
        fake.calls(),
        vec![
            "apply --auto-approve -var versionBlueCount=1 -var versionBlue=1.0.0 \
             -var versionGreenCount=2 -var versionGreen=0.10.0 -var region=us-east-2",
            "TF_VAR_token=s3cr3t",
        ]
    );
}

#[tokio::test]
async fn taints_resources_at_host_index() {
    let fake = FakeTerraform::new();
    let controller = fake.controller();

    controller.taint_host("carousel-demo-ffdbb6.example.com").await.unwrap();
    assert_eq!(
        fake.calls(),
        vec!["state pull", "state list", "taint module.green.random_id.ID[0]"]
    );

    let err = controller
        .taint_host("carousel-demo-ea9412.example.com")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ControllerError::NoSuchResource("module.green.random_id.ID[1]".into())
    );
}

#[tokio::test]
async fn unknown_host_cannot_be_tainted() {
    let fake = FakeTerraform::new();
    let err = fake.controller().taint_host("nope.example.com").await.unwrap_err();
    assert!(matches!(err, ControllerError::TaintHost { .. }));
    assert!(!fake.calls().iter().any(|call| call.starts_with("taint")));
}

#[tokio::test]
async fn new_workspace_is_created() {
    let fake = FakeTerraform::new();
    fake.controller().select_workspace("staging").await.unwrap();
    assert_eq!(
        fake.calls(),
        vec!["init", "workspace show", "workspace list", "workspace new staging"]
    );
}
