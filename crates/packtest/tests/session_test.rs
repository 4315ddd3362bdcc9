//! End-to-end session flow with fake `docker`/`pack` executables and an
//! in-memory container runtime.

#![cfg(unix)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use packtest::common::config::HarnessConfig;
use packtest::common::error::{HarnessError, Result};
use packtest::common::tag::TagGenerator;
use packtest::common::types::{ContainerId, ImageRef, InstanceState};
use packtest::image::descriptor::BuilderDescriptor;
use packtest::image::options::BuildOptions;
use packtest::pipeline::descriptor::{ComponentInfo, Order};
use packtest::runtime::backend::{ContainerRuntime, HealthStatus, LaunchSpec};
use packtest::sandbox::Role;
use packtest::session::Session;

/// Plays the lifecycle binaries: detect selects the staged sample
/// component, build writes one layer's metadata.
const FAKE_DOCKER: &str = r#"#!/bin/sh
workspace=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-v" ]; then
    case "$arg" in
      *:/workspace) workspace="${arg%:/workspace}" ;;
    esac
  fi
  prev="$arg"
done
case "$*" in
  */lifecycle/detector*)
    printf '[[buildpacks]]\nid = "sample.buildpack"\nversion = "0.0.1"\n' > "$workspace/group.toml"
    printf '[node]\nversion = "10.x"\n' > "$workspace/plan.toml"
    ;;
  */lifecycle/builder*)
    mkdir -p "$workspace/sample.buildpack"
    echo 'version = "10.15.1"' > "$workspace/sample.buildpack/node.toml"
    ;;
esac
"#;

const FAKE_PACK: &str = r#"#!/bin/sh
echo "$@" >> "$(dirname "$0")/pack-calls.txt"
echo "Successfully built image $2"
"#;

#[derive(Default)]
struct FakeRuntime {
    launched: Mutex<Vec<LaunchSpec>>,
    removed_images: Mutex<Vec<String>>,
}

impl ContainerRuntime for FakeRuntime {
    fn launch(&self, spec: &LaunchSpec) -> Result<ContainerId> {
        self.launched.lock().unwrap().push(spec.clone());
        Ok(ContainerId::new("5e884898da28"))
    }
    fn health(&self, _id: &ContainerId) -> Result<HealthStatus> {
        Ok(HealthStatus::Healthy)
    }
    fn published_port(&self, _id: &ContainerId, _port: Option<u16>) -> Result<u16> {
        Ok(32770)
    }
    fn logs(&self, _id: &ContainerId) -> Result<String> {
        Ok(String::new())
    }
    fn stop(&self, _id: &ContainerId) -> Result<()> {
        Ok(())
    }
    fn remove(&self, _id: &ContainerId) -> Result<()> {
        Ok(())
    }
    fn remove_image(&self, image: &str) -> Result<()> {
        self.removed_images.lock().unwrap().push(image.to_string());
        Ok(())
    }
    fn prune_images(&self) -> Result<()> {
        Ok(())
    }
    fn is_available(&self) -> bool {
        true
    }
}

struct Harness {
    tools: tempfile::TempDir,
    root: tempfile::TempDir,
    runtime: Arc<FakeRuntime>,
}

fn install(dir: &Path, name: &str, script: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, script).expect("write fake tool");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
    path
}

impl Harness {
    fn new() -> Self {
        packtest::logging::init();
        Self {
            tools: tempfile::tempdir().expect("tempdir"),
            root: tempfile::tempdir().expect("tempdir"),
            runtime: Arc::new(FakeRuntime::default()),
        }
    }

    fn config(&self, build_image: Option<&str>) -> HarnessConfig {
        let docker = install(self.tools.path(), "docker", FAKE_DOCKER);
        let pack = install(self.tools.path(), "pack", FAKE_PACK);
        let mut config = HarnessConfig::from_lookup(|_| None);
        config.temp_root = self.root.path().to_path_buf();
        config.docker = docker;
        config.pack = pack;
        config.stack.build_image = build_image.map(str::to_string);
        config
    }

    fn open(&self, build_image: Option<&str>) -> Session {
        Session::open_with_runtime(
            self.config(build_image),
            Arc::clone(&self.runtime) as Arc<dyn ContainerRuntime>,
        )
        .expect("open session")
        .with_tags(TagGenerator::with_seed(11, 16))
    }

    fn root_is_empty(&self) -> bool {
        std::fs::read_dir(self.root.path()).expect("read root").next().is_none()
    }
}

fn write_component(root: &Path) {
    std::fs::create_dir_all(root.join("bin")).expect("mkdir");
    std::fs::write(
        root.join("buildpack.toml"),
        "[buildpack]\nid = \"sample.buildpack\"\nversion = \"0.0.1\"\n",
    )
    .expect("write descriptor");
    for name in ["detect", "build"] {
        std::fs::write(root.join("bin").join(name), "#!/bin/sh\n").expect("write bin");
    }
}

#[test]
fn session_allocates_and_releases_its_sandbox() {
    let h = Harness::new();
    let mut session = h.open(Some("example/build"));

    for role in Role::ALL {
        let path = session.sandbox().path(role).expect("role");
        assert!(path.starts_with(h.root.path()));
    }
    assert!(!h.root_is_empty());

    session.teardown().expect("teardown");
    session.teardown().expect("second teardown");
    assert!(h.root_is_empty());
}

#[test]
fn detect_then_build_through_the_session() {
    let h = Harness::new();
    let mut session = h.open(Some("example/build"));
    let component = tempfile::tempdir().expect("tempdir");
    let app = tempfile::tempdir().expect("tempdir");
    write_component(component.path());

    let info = session.stage_component(component.path()).expect("stage");
    let detection = session
        .detect(app.path(), &Order::single(info.clone()))
        .expect("detect");
    assert_eq!(detection.group.buildpacks, vec![info]);
    assert_eq!(detection.plan.version_of("node"), Some("10.x"));

    let output = session
        .build(app.path(), &detection.group, &detection.plan)
        .expect("build");
    let node = output
        .layer_metadata("sample.buildpack", "node")
        .expect("read")
        .expect("present");
    assert_eq!(node.version, "10.15.1");

    session.teardown().expect("teardown");
}

#[test]
fn detect_without_build_image_is_a_config_error() {
    let h = Harness::new();
    let mut session = h.open(None);
    let app = tempfile::tempdir().expect("tempdir");

    let err = session
        .detect(app.path(), &Order::single(ComponentInfo::new("sample.buildpack", "0.0.1")))
        .unwrap_err();

    assert!(matches!(err, HarnessError::Config { .. }));
    assert!(err.to_string().contains("CNB_BUILD_IMAGE"));
    session.teardown().expect("teardown");
}

#[test]
fn packed_image_runs_labelled_and_is_cleaned_up() {
    let h = Harness::new();
    let mut session = h.open(None);
    let app = tempfile::tempdir().expect("tempdir");
    let descriptor = BuilderDescriptor::new()
        .component("sample.buildpack", "/fixtures/sample")
        .group(vec![ComponentInfo::new("sample.buildpack", "0.0.1")]);

    let packed = session.pack(app.path(), &descriptor).expect("pack");
    let staging = session.sandbox().path(Role::Staging).expect("staging");
    assert!(std::fs::read_dir(staging).expect("read").next().is_none());

    let mut instance = session.instance(packed.image().clone(), "simple_app");
    let endpoint = instance.start_and_wait_blocking().expect("ready");
    assert_eq!(endpoint.url("/"), "http://localhost:32770/");
    assert_eq!(instance.state(), InstanceState::Ready);

    let launched = h.runtime.launched.lock().unwrap()[0].clone();
    assert_eq!(
        launched.labels.get("packtest.session").map(String::as_str),
        Some(session.id().as_str())
    );

    instance.destroy().expect("destroy");
    assert_eq!(
        *h.runtime.removed_images.lock().unwrap(),
        vec![packed.image().name().to_string()]
    );
    session.teardown().expect("teardown");
    assert!(h.root_is_empty());
}

#[test]
fn tags_differ_across_builds_in_one_session() {
    let h = Harness::new();
    let mut session = h.open(None);
    let app = tempfile::tempdir().expect("tempdir");

    let first = session.build_app(app.path(), &BuildOptions::new()).expect("first");
    let second = session.build_app(app.path(), &BuildOptions::new()).expect("second");

    assert_ne!(first.image(), second.image());
    let calls = std::fs::read_to_string(h.tools.path().join("pack-calls.txt")).expect("calls");
    assert_eq!(calls.lines().count(), 2);
    assert!(calls.contains("--builder cloudfoundry/cnb:cflinuxfs3"));
    session.teardown().expect("teardown");
}

#[test]
fn existing_images_are_not_removed() {
    let h = Harness::new();
    let mut session = h.open(None);

    let mut instance = session.instance(ImageRef::existing("nginx:latest"), "nginx");
    let _ = instance.start_and_wait_blocking().expect("ready");
    instance.destroy().expect("destroy");

    assert!(h.runtime.removed_images.lock().unwrap().is_empty());
    session.teardown().expect("teardown");
}
