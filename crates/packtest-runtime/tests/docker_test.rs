//! Instance teardown through `DockerCli` against a fake `docker` script.

#![cfg(unix)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;

use packtest_common::error::HarnessError;
use packtest_common::process::Tool;
use packtest_common::types::{ImageRef, InstanceState};
use packtest_runtime::backend::ContainerRuntime;
use packtest_runtime::backend::docker::DockerCli;
use packtest_runtime::instance::RunningInstance;

/// Removes an image once; later removals report it missing. Containers
/// listed in `gone` answer like ones deleted behind the harness's back.
const FAKE_DOCKER: &str = r#"#!/bin/sh
dir="$(dirname "$0")"
echo "$@" >> "$dir/calls.txt"
case "$1" in
  run)
    echo "9f86d081884c7d659a2f"
    ;;
  inspect)
    echo '{"Status":"running","Running":true,"ExitCode":0}'
    ;;
  port)
    echo "0.0.0.0:32768"
    ;;
  stop|rm)
    if [ -f "$dir/gone" ]; then
      echo "Error response from daemon: No such container: $2" >&2
      exit 1
    fi
    ;;
  rmi)
    if [ -f "$dir/in-use" ]; then
      echo "Error response from daemon: conflict: unable to delete $3 (image is in use)" >&2
      exit 1
    fi
    if [ -f "$dir/removed" ]; then
      echo "Error: No such image: $3" >&2
      exit 1
    fi
    touch "$dir/removed"
    ;;
esac
"#;

fn docker(dir: &Path) -> Arc<dyn ContainerRuntime> {
    let path = dir.join("docker");
    std::fs::write(&path, FAKE_DOCKER).expect("write fake docker");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
    Arc::new(DockerCli::new(Tool::new(path)))
}

fn calls(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("calls.txt"))
        .expect("calls")
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn instances_sharing_a_built_image_both_destroy_cleanly() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runtime = docker(dir.path());
    let image = ImageRef::built("qwertyuiopasdfgh");

    let mut first = RunningInstance::new(Arc::clone(&runtime), image.clone(), "first");
    let mut second = RunningInstance::new(runtime, image, "second");
    let _ = first.start_and_wait_blocking().expect("first ready");
    let _ = second.start_and_wait_blocking().expect("second ready");

    first.destroy().expect("first destroy");
    second.destroy().expect("second destroy");

    assert_eq!(second.state(), InstanceState::Destroyed);
    let removals = calls(dir.path())
        .into_iter()
        .filter(|c| c.starts_with("rmi"))
        .count();
    assert_eq!(removals, 2);
}

#[test]
fn container_removed_elsewhere_destroys_cleanly() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut app = RunningInstance::new(docker(dir.path()), ImageRef::existing("nginx:latest"), "nginx");
    let _ = app.start_and_wait_blocking().expect("ready");

    std::fs::write(dir.path().join("gone"), "").expect("mark gone");
    app.destroy().expect("destroy");

    let log = calls(dir.path());
    assert!(log.contains(&"stop 9f86d081884c7d659a2f".to_string()));
    assert!(log.contains(&"rm 9f86d081884c7d659a2f".to_string()));
}

#[test]
fn other_removal_failures_are_still_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut app = RunningInstance::new(docker(dir.path()), ImageRef::built("qwertyuiopasdfgh"), "simple_app");
    let _ = app.start_and_wait_blocking().expect("ready");

    std::fs::write(dir.path().join("in-use"), "").expect("mark in use");
    let err = app.destroy().unwrap_err();

    match err {
        HarnessError::Teardown { failures } => {
            assert_eq!(failures.len(), 1);
            assert!(failures[0].contains("image is in use"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
