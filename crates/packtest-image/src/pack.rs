//! Image packaging through the external `pack` tool.
//!
//! [`ImageBuilder::pack`] turns a [`BuilderDescriptor`] into an intermediate
//! builder image and builds the application under a fresh random tag.
//! [`ImageBuilder::build`] skips the builder step and builds against an
//! existing builder with caller-chosen [`BuildOptions`].

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use packtest_common::config::{HarnessConfig, Stack};
use packtest_common::error::{HarnessError, Result};
use packtest_common::process::Tool;
use packtest_common::tag::TagGenerator;
use packtest_common::types::ImageRef;

use crate::descriptor::{BuilderDescriptor, BuilderStack};
use crate::options::BuildOptions;

/// An application image produced by a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedImage {
    image: ImageRef,
    build_logs: String,
}

impl PackedImage {
    /// Reference to the built image.
    #[must_use]
    pub const fn image(&self) -> &ImageRef {
        &self.image
    }

    /// Combined output of the `pack build` run.
    #[must_use]
    pub fn build_logs(&self) -> &str {
        &self.build_logs
    }
}

/// Drives `pack` (and `docker`, for the permission fix-up) for one session.
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    pack: Tool,
    docker: Tool,
    staging: PathBuf,
    builder_image: String,
    default_builder: String,
    run_image: Option<String>,
    stack: Option<BuilderStack>,
    fix_permissions: bool,
}

impl ImageBuilder {
    /// Creates a builder staging its descriptor files under `staging`.
    #[must_use]
    pub fn new(pack: Tool, docker: Tool, staging: impl Into<PathBuf>) -> Self {
        Self {
            pack,
            docker,
            staging: staging.into(),
            builder_image: packtest_common::constants::DEFAULT_BUILDER_IMAGE.into(),
            default_builder: packtest_common::constants::DEFAULT_BUILDER.into(),
            run_image: None,
            stack: None,
            fix_permissions: false,
        }
    }

    /// Creates a builder from the harness configuration.
    #[must_use]
    pub fn from_config(config: &HarnessConfig, staging: impl Into<PathBuf>) -> Self {
        let mut builder = Self::new(
            Tool::new(&config.pack),
            Tool::new(&config.docker),
            staging,
        )
        .builder_image(config.builder_image.clone())
        .default_builder(config.default_builder.clone())
        .fix_permissions(config.fix_builder_permissions);
        builder.run_image.clone_from(&config.stack.run_image);
        builder.stack = stack_section(&config.stack);
        builder
    }

    /// Tag given to the intermediate builder image.
    #[must_use]
    pub fn builder_image(mut self, tag: impl Into<String>) -> Self {
        self.builder_image = tag.into();
        self
    }

    /// Builder used by [`ImageBuilder::build`] when the options name none.
    #[must_use]
    pub fn default_builder(mut self, builder: impl Into<String>) -> Self {
        self.default_builder = builder.into();
        self
    }

    /// Run image passed to `pack build` after creating a builder.
    #[must_use]
    pub fn run_image(mut self, image: impl Into<String>) -> Self {
        self.run_image = Some(image.into());
        self
    }

    /// Stack section written into descriptors that do not name one.
    #[must_use]
    pub fn stack(mut self, stack: BuilderStack) -> Self {
        self.stack = Some(stack);
        self
    }

    /// Re-commits the builder image with a readable `/buildpacks`.
    #[must_use]
    pub const fn fix_permissions(mut self, enabled: bool) -> Self {
        self.fix_permissions = enabled;
        self
    }

    /// Creates a builder image from `descriptor` and builds `source` with it.
    ///
    /// The descriptor is staged as a temporary file that is removed whether
    /// or not packaging succeeds.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::ToolFailed` carrying the tool's combined
    /// output if any step exits nonzero.
    pub fn pack(
        &self,
        source: &Path,
        descriptor: &BuilderDescriptor,
        tags: &mut TagGenerator,
    ) -> Result<PackedImage> {
        for dangling in descriptor.dangling_references() {
            tracing::warn!(id = %dangling.id, version = %dangling.version, "group references an undeclared component");
        }

        let staged = tempfile::Builder::new()
            .prefix("builder-")
            .suffix(".toml")
            .tempfile_in(&self.staging)
            .map_err(|e| HarnessError::Io {
                path: self.staging.clone(),
                source: e,
            })?;
        let encoded = self.with_stack(descriptor).encode()?;
        std::fs::write(staged.path(), encoded).map_err(|e| HarnessError::Io {
            path: staged.path().to_path_buf(),
            source: e,
        })?;

        tracing::info!(
            builder = %self.builder_image,
            components = descriptor.buildpacks.len(),
            groups = descriptor.groups.len(),
            "creating builder image"
        );
        let created = self.pack.run([
            "create-builder".to_string(),
            self.builder_image.clone(),
            "-b".to_string(),
            staged.path().display().to_string(),
        ]);
        let staged_path = staged.path().to_path_buf();
        let closed = staged.close().map_err(|e| HarnessError::Io {
            path: staged_path,
            source: e,
        });
        let _ = created?;
        closed?;

        if self.fix_permissions {
            self.fix_builder_permissions()?;
        }

        let mut options = BuildOptions::new()
            .builder(self.builder_image.clone())
            .no_pull(true);
        if let Some(run_image) = &self.run_image {
            options = options.run_image(run_image.clone());
        }
        self.build(source, &options, tags)
    }

    /// Builds `source` into an application image.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::ToolFailed` carrying the tool's combined
    /// output if `pack build` exits nonzero.
    pub fn build(
        &self,
        source: &Path,
        options: &BuildOptions,
        tags: &mut TagGenerator,
    ) -> Result<PackedImage> {
        let source = std::path::absolute(source).map_err(|e| HarnessError::Io {
            path: source.to_path_buf(),
            source: e,
        })?;
        let name = options
            .image_name()
            .map_or_else(|| tags.next_tag(), ToString::to_string);

        tracing::info!(image = %name, source = %source.display(), "building application image");
        let output = self
            .pack
            .run(options.args(&name, &source, &self.default_builder))?;
        tracing::info!(image = %name, "application image built");

        Ok(PackedImage {
            image: ImageRef::built(name),
            build_logs: output.combined(),
        })
    }

    fn with_stack<'a>(&self, descriptor: &'a BuilderDescriptor) -> Cow<'a, BuilderDescriptor> {
        match (&descriptor.stack, &self.stack) {
            (None, Some(stack)) => Cow::Owned(descriptor.clone().stack(stack.clone())),
            _ => Cow::Borrowed(descriptor),
        }
    }

    /// Runs `chmod 0755 /buildpacks` as root in the builder image and
    /// commits the result over the same tag.
    fn fix_builder_permissions(&self) -> Result<()> {
        tracing::info!(builder = %self.builder_image, "fixing builder component permissions");
        let created = self.docker.run([
            "create",
            "--user",
            "root",
            self.builder_image.as_str(),
            "chmod",
            "0755",
            "/buildpacks",
        ])?;
        let container = created.stdout.trim().to_string();

        let result = self
            .docker
            .run(["start", "-a", container.as_str()])
            .and_then(|_| {
                self.docker
                    .run(["commit", container.as_str(), self.builder_image.as_str()])
            });

        if let Err(e) = self.docker.run(["rm", container.as_str()]) {
            tracing::warn!(container = %container, error = %e, "failed to remove fix-up container");
        }
        result.map(|_| ())
    }
}

/// The configured stack as a descriptor section, when it is fully named.
fn stack_section(stack: &Stack) -> Option<BuilderStack> {
    Some(BuilderStack {
        id: stack.id.clone()?,
        build_image: stack.build_image.clone()?,
        run_image: stack.run_image.clone()?,
    })
}
