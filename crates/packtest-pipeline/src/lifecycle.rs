//! Detect and build stage invocation.
//!
//! Both stages follow the same protocol: write input descriptors into the
//! sandbox inputs root, run the lifecycle binary once inside the build
//! image with the sandbox roots mounted, then decode the declared outputs
//! from the workspace root. A nonzero exit is a hard failure and nothing is
//! retried.

use std::path::{Path, PathBuf};

use packtest_common::constants::{
    APP_MOUNT, BUILDER_BIN, CACHE_MOUNT, COMPONENTS_MOUNT, DETECTOR_BIN, GROUP_FILE, INPUTS_MOUNT,
    ORDER_FILE, PLAN_FILE, WORKSPACE_MOUNT,
};
use packtest_common::error::{HarnessError, Result};
use packtest_common::fs;
use packtest_common::process::Tool;
use packtest_sandbox::{Role, Sandbox};

use crate::component::{self, StagedComponent};
use crate::descriptor::{BuildPlan, ComponentInfo, DetectionResult, Group, Order};
use crate::output::BuildOutput;

const INPUT_MODE: u32 = 0o666;

/// Sandbox roots the lifecycle reads from and writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelinePaths {
    /// Mounted at `/workspace`; receives output descriptors.
    pub workspace: PathBuf,
    /// Mounted at `/cache` during build.
    pub cache: PathBuf,
    /// Mounted at `/inputs`; holds input descriptors.
    pub inputs: PathBuf,
    /// Mounted at `/buildpacks`; holds staged components.
    pub components: PathBuf,
}

impl PipelinePaths {
    /// Takes the lifecycle roles from a sandbox.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::NotFound` if the sandbox lacks a role.
    pub fn from_sandbox(sandbox: &Sandbox) -> Result<Self> {
        Ok(Self {
            workspace: sandbox.path(Role::Workspace)?.to_path_buf(),
            cache: sandbox.path(Role::Cache)?.to_path_buf(),
            inputs: sandbox.path(Role::Inputs)?.to_path_buf(),
            components: sandbox.path(Role::Components)?.to_path_buf(),
        })
    }
}

/// Runs the lifecycle stages of one session.
#[derive(Debug)]
pub struct LifecycleRunner {
    docker: Tool,
    build_image: String,
    paths: PipelinePaths,
    staged: Vec<StagedComponent>,
}

impl LifecycleRunner {
    /// Creates a runner using `docker` to run lifecycle binaries from
    /// `build_image`.
    #[must_use]
    pub fn new(docker: Tool, build_image: impl Into<String>, paths: PipelinePaths) -> Self {
        Self {
            docker,
            build_image: build_image.into(),
            paths,
            staged: Vec::new(),
        }
    }

    /// Stages the component at `source_root` into the components root.
    ///
    /// # Errors
    ///
    /// Returns an error if the component cannot be read or copied.
    pub fn stage_component(&mut self, source_root: &Path) -> Result<ComponentInfo> {
        let staged = component::stage(source_root, &self.paths.components)?;
        let info = staged.info.clone();
        self.staged.retain(|s| s.info.id != info.id || s.info.version != info.version);
        self.staged.push(staged);
        Ok(info)
    }

    /// Returns the components staged so far.
    #[must_use]
    pub fn staged(&self) -> &[StagedComponent] {
        &self.staged
    }

    /// Returns the sandbox roots in use.
    #[must_use]
    pub const fn paths(&self) -> &PipelinePaths {
        &self.paths
    }

    /// Runs detection of `app_dir` against the candidate `order`.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::ToolFailed` if the detector exits nonzero and
    /// `HarnessError::Descriptor` if it did not produce a valid group and
    /// plan.
    pub fn detect(&self, app_dir: &Path, order: &Order) -> Result<DetectionResult> {
        let order_path = self.write_input(order, ORDER_FILE)?;
        tracing::info!(order = %order_path.display(), groups = order.groups.len(), "running detect stage");

        let group_path = self.paths.workspace.join(GROUP_FILE);
        let plan_path = self.paths.workspace.join(PLAN_FILE);
        for stale in [&group_path, &plan_path] {
            remove_stale(stale)?;
        }

        let args = self.lifecycle_args(
            app_dir,
            false,
            DETECTOR_BIN,
            &[
                ("-buildpacks", COMPONENTS_MOUNT.to_string()),
                ("-order", container_path(INPUTS_MOUNT, ORDER_FILE)),
                ("-group", container_path(WORKSPACE_MOUNT, GROUP_FILE)),
                ("-plan", container_path(WORKSPACE_MOUNT, PLAN_FILE)),
            ],
        )?;
        let _output = self.docker.run(&args)?;

        let group: Group = fs::read_toml(&group_path)?;
        group.validate(&group_path)?;
        let plan: BuildPlan = fs::read_toml(&plan_path)?;

        tracing::info!(
            selected = ?group.buildpacks.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
            "detect stage selected group"
        );
        Ok(DetectionResult { group, plan })
    }

    /// Runs the build of `app_dir` with the chosen `group` and `plan`.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::ToolFailed` if the builder exits nonzero.
    pub fn build(&self, app_dir: &Path, group: &Group, plan: &BuildPlan) -> Result<BuildOutput> {
        let _ = self.write_input(group, GROUP_FILE)?;
        let _ = self.write_input(plan, PLAN_FILE)?;
        tracing::info!(components = group.buildpacks.len(), "running build stage");

        let args = self.lifecycle_args(
            app_dir,
            true,
            BUILDER_BIN,
            &[
                ("-buildpacks", COMPONENTS_MOUNT.to_string()),
                ("-group", container_path(INPUTS_MOUNT, GROUP_FILE)),
                ("-plan", container_path(INPUTS_MOUNT, PLAN_FILE)),
            ],
        )?;
        let _output = self.docker.run(&args)?;

        Ok(BuildOutput::new(
            self.paths.workspace.clone(),
            self.paths.cache.clone(),
        ))
    }

    fn write_input<T: serde::Serialize>(&self, value: &T, name: &str) -> Result<PathBuf> {
        let path = self.paths.inputs.join(name);
        fs::write_toml(value, &path, INPUT_MODE)?;
        Ok(path)
    }

    /// Assembles `docker run` arguments: mounts, image, binary, then flags.
    fn lifecycle_args(
        &self,
        app_dir: &Path,
        with_cache: bool,
        binary: &str,
        flags: &[(&str, String)],
    ) -> Result<Vec<String>> {
        if self.staged.is_empty() {
            tracing::warn!("no components staged; the lifecycle will see an empty component root");
        }
        let app_dir = std::path::absolute(app_dir).map_err(|e| HarnessError::Io {
            path: app_dir.to_path_buf(),
            source: e,
        })?;

        let mut args = vec!["run".to_string(), "--rm".to_string()];
        let mut mount = |host: &Path, target: &str| {
            args.push("-v".into());
            args.push(format!("{}:{target}", host.display()));
        };
        mount(&self.paths.workspace, WORKSPACE_MOUNT);
        mount(&app_dir, APP_MOUNT);
        if with_cache {
            mount(&self.paths.cache, CACHE_MOUNT);
        }
        mount(&self.paths.components, COMPONENTS_MOUNT);
        mount(&self.paths.inputs, INPUTS_MOUNT);

        args.push(self.build_image.clone());
        args.push(binary.to_string());
        for (flag, value) in flags {
            args.push((*flag).to_string());
            args.push(value.clone());
        }
        Ok(args)
    }
}

fn container_path(mount: &str, file: &str) -> String {
    format!("{mount}/{file}")
}

fn remove_stale(path: &Path) -> Result<()> {
    if fs::file_exists(path)? {
        std::fs::remove_file(path).map_err(|e| HarnessError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner(dir: &Path) -> LifecycleRunner {
        LifecycleRunner::new(
            Tool::new("docker"),
            "example/build",
            PipelinePaths {
                workspace: dir.join("ws"),
                cache: dir.join("cache"),
                inputs: dir.join("inputs"),
                components: dir.join("bp"),
            },
        )
    }

    #[test]
    fn detect_args_follow_invocation_contract() {
        let dir = tempfile::tempdir().expect("tempdir");
        let r = runner(dir.path());
        let args = r
            .lifecycle_args(
                Path::new("/src/app"),
                false,
                DETECTOR_BIN,
                &[("-order", container_path(INPUTS_MOUNT, ORDER_FILE))],
            )
            .expect("args");

        let ws = format!("{}:/workspace", dir.path().join("ws").display());
        assert_eq!(&args[..4], &["run", "--rm", "-v", ws.as_str()]);
        assert!(args.contains(&"/src/app:/workspace/app".to_string()));
        assert!(!args.iter().any(|a| a.ends_with(":/cache")));
        let image_at = args.iter().position(|a| a == "example/build").expect("image");
        assert_eq!(args[image_at + 1], "/lifecycle/detector");
        assert_eq!(&args[image_at + 2..], &["-order", "/inputs/order.toml"]);
    }

    #[test]
    fn build_args_mount_cache() {
        let dir = tempfile::tempdir().expect("tempdir");
        let r = runner(dir.path());
        let args = r
            .lifecycle_args(Path::new("/src/app"), true, BUILDER_BIN, &[])
            .expect("args");
        let cache = format!("{}:/cache", dir.path().join("cache").display());
        assert!(args.contains(&cache));
        assert_eq!(args.last().map(String::as_str), Some("/lifecycle/builder"));
    }

    #[test]
    fn write_input_places_descriptor_in_inputs_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let r = runner(dir.path());
        let order = Order::single(ComponentInfo::new("sample.buildpack", "0.0.1"));
        let path = r.write_input(&order, ORDER_FILE).expect("write");
        assert_eq!(path, dir.path().join("inputs").join("order.toml"));
        let decoded: Order = fs::read_toml(&path).expect("read");
        assert_eq!(decoded, order);
    }
}
