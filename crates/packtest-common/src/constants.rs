//! Fixed names, paths, and defaults of the pipeline contract.

/// Component descriptor file at the root of every component.
pub const COMPONENT_DESCRIPTOR: &str = "buildpack.toml";
/// Detect input: ordered candidate groups.
pub const ORDER_FILE: &str = "order.toml";
/// Detect output and build input: the chosen group.
pub const GROUP_FILE: &str = "group.toml";
/// Detect output and build input: the build plan.
pub const PLAN_FILE: &str = "plan.toml";
/// Build output: process and launch metadata.
pub const LAUNCH_FILE: &str = "launch.toml";

/// Executables every component must provide under `bin/`.
pub const COMPONENT_EXECUTABLES: [&str; 2] = ["detect", "build"];
/// Alias directory pointing at the staged version of a component.
pub const LATEST_ALIAS: &str = "latest";

/// Workspace mount point inside the lifecycle container.
pub const WORKSPACE_MOUNT: &str = "/workspace";
/// Application source mount point inside the lifecycle container.
pub const APP_MOUNT: &str = "/workspace/app";
/// Cache mount point inside the lifecycle container.
pub const CACHE_MOUNT: &str = "/cache";
/// Component root mount point inside the lifecycle container.
pub const COMPONENTS_MOUNT: &str = "/buildpacks";
/// Input descriptor mount point inside the lifecycle container.
pub const INPUTS_MOUNT: &str = "/inputs";

/// Detect stage binary inside the build image.
pub const DETECTOR_BIN: &str = "/lifecycle/detector";
/// Build stage binary inside the build image.
pub const BUILDER_BIN: &str = "/lifecycle/builder";

/// Environment variable naming the build image.
pub const ENV_BUILD_IMAGE: &str = "CNB_BUILD_IMAGE";
/// Environment variable naming the run image.
pub const ENV_RUN_IMAGE: &str = "CNB_RUN_IMAGE";
/// Environment variable naming the stack id.
pub const ENV_STACK_ID: &str = "CNB_STACK_ID";
/// Environment variable overriding the container runtime CLI.
pub const ENV_DOCKER: &str = "PACKTEST_DOCKER";
/// Environment variable overriding the packaging CLI.
pub const ENV_PACK: &str = "PACKTEST_PACK";
/// Environment variable overriding the sandbox parent directory.
pub const ENV_TMPDIR: &str = "PACKTEST_TMPDIR";

/// Default container runtime CLI.
pub const DEFAULT_DOCKER: &str = "docker";
/// Default packaging CLI.
pub const DEFAULT_PACK: &str = "pack";
/// Default tag of the intermediate builder image.
pub const DEFAULT_BUILDER_IMAGE: &str = "packtest-acceptance-builder";
/// Stock builder used by direct `pack build` invocations.
pub const DEFAULT_BUILDER: &str = "cloudfoundry/cnb:cflinuxfs3";

/// Length of generated image tags.
pub const TAG_LENGTH: usize = 16;
/// Seconds between readiness polls.
pub const READINESS_POLL_SECS: u64 = 1;
/// Seconds from start until readiness polling gives up.
pub const READINESS_DEADLINE_SECS: u64 = 40;

/// Container label key identifying the owning session.
pub const SESSION_LABEL: &str = "packtest.session";

/// Application name used in logs and temp directory prefixes.
pub const APP_NAME: &str = "packtest";
