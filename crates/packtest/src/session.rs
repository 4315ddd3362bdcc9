//! One harness session: sandbox, pipeline, packaging, and instances.
//!
//! Stages run strictly in order through the filesystem-resident
//! descriptors: detect before build, build before pack. A session is not
//! meant to be driven from two call sites at once.

use std::path::Path;
use std::sync::Arc;

use packtest_common::config::HarnessConfig;
use packtest_common::constants::SESSION_LABEL;
use packtest_common::error::Result;
use packtest_common::process::Tool;
use packtest_common::tag::TagGenerator;
use packtest_common::types::{ImageRef, SessionId};
use packtest_image::descriptor::BuilderDescriptor;
use packtest_image::options::BuildOptions;
use packtest_image::pack::{ImageBuilder, PackedImage};
use packtest_pipeline::descriptor::{BuildPlan, ComponentInfo, DetectionResult, Group, Order};
use packtest_pipeline::lifecycle::{LifecycleRunner, PipelinePaths};
use packtest_pipeline::output::BuildOutput;
use packtest_runtime::backend::ContainerRuntime;
use packtest_runtime::backend::docker::DockerCli;
use packtest_runtime::instance::RunningInstance;
use packtest_sandbox::{Role, Sandbox, SandboxLayout};

/// Resources and collaborators owned by one harness session.
pub struct Session {
    id: SessionId,
    config: HarnessConfig,
    sandbox: Sandbox,
    lifecycle: LifecycleRunner,
    images: ImageBuilder,
    tags: TagGenerator,
    runtime: Arc<dyn ContainerRuntime>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("sandbox", &self.sandbox)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Opens a session using the docker CLI named in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the sandbox cannot be allocated.
    pub fn open(config: HarnessConfig) -> Result<Self> {
        let runtime = Arc::new(DockerCli::from_config(&config));
        Self::open_with_runtime(config, runtime)
    }

    /// Opens a session launching instances through `runtime`.
    ///
    /// # Errors
    ///
    /// Returns an error if the sandbox cannot be allocated.
    pub fn open_with_runtime(config: HarnessConfig, runtime: Arc<dyn ContainerRuntime>) -> Result<Self> {
        let id = SessionId::generate();
        if !runtime.is_available() {
            tracing::warn!(session = %id, "container runtime not found; instances will fail to launch");
        }
        let sandbox = Sandbox::create(&SandboxLayout::new(&config.temp_root))?;

        let lifecycle = LifecycleRunner::new(
            Tool::new(&config.docker),
            config.stack.build_image.clone().unwrap_or_default(),
            PipelinePaths::from_sandbox(&sandbox)?,
        );
        let images = ImageBuilder::from_config(&config, sandbox.path(Role::Staging)?);
        let tags = TagGenerator::from_entropy(config.tag_length);

        tracing::info!(session = %id, root = %config.temp_root.display(), "session opened");
        Ok(Self {
            id,
            config,
            sandbox,
            lifecycle,
            images,
            tags,
            runtime,
        })
    }

    /// Replaces the tag generator, e.g. with a seeded one.
    #[must_use]
    pub fn with_tags(mut self, tags: TagGenerator) -> Self {
        self.tags = tags;
        self
    }

    /// Session identifier.
    #[must_use]
    pub const fn id(&self) -> &SessionId {
        &self.id
    }

    /// Configuration the session was opened with.
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// The session's sandbox.
    #[must_use]
    pub const fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// Copies a component into the sandbox so detect and build can see it.
    ///
    /// # Errors
    ///
    /// Returns an error if the component is invalid or cannot be copied.
    pub fn stage_component(&mut self, source_root: &Path) -> Result<ComponentInfo> {
        self.lifecycle.stage_component(source_root)
    }

    /// Runs the detect stage.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Config` if no build image is configured, or the
    /// stage's error.
    pub fn detect(&self, app_dir: &Path, order: &Order) -> Result<DetectionResult> {
        let _ = self.config.stack.require_build_image()?;
        self.lifecycle.detect(app_dir, order)
    }

    /// Runs the build stage.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Config` if no build image is configured, or the
    /// stage's error.
    pub fn build(&self, app_dir: &Path, group: &Group, plan: &BuildPlan) -> Result<BuildOutput> {
        let _ = self.config.stack.require_build_image()?;
        self.lifecycle.build(app_dir, group, plan)
    }

    /// Creates a builder from `descriptor` and packs `source` with it.
    ///
    /// # Errors
    ///
    /// Returns the failing tool's error with its combined output.
    pub fn pack(&mut self, source: &Path, descriptor: &BuilderDescriptor) -> Result<PackedImage> {
        self.images.pack(source, descriptor, &mut self.tags)
    }

    /// Packs `source` against an existing builder.
    ///
    /// # Errors
    ///
    /// Returns the failing tool's error with its combined output.
    pub fn build_app(&mut self, source: &Path, options: &BuildOptions) -> Result<PackedImage> {
        self.images.build(source, options, &mut self.tags)
    }

    /// Prepares an instance of `image`, labelled with this session and
    /// polled with the configured readiness policy.
    #[must_use]
    pub fn instance(&self, image: ImageRef, label: impl Into<String>) -> RunningInstance {
        RunningInstance::new(Arc::clone(&self.runtime), image, label)
            .with_label(SESSION_LABEL, self.id.as_str())
            .with_policy(self.config.readiness)
    }

    /// Removes every sandbox directory. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Teardown` listing directories that could not
    /// be removed.
    pub fn teardown(&mut self) -> Result<()> {
        tracing::info!(session = %self.id, "tearing down session");
        self.sandbox.teardown()
    }
}
