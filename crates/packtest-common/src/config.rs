//! Harness configuration model.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{HarnessError, Result};
use crate::types::ReadinessPolicy;

/// The build/run image pair a pipeline runs against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    /// Stack identifier.
    pub id: Option<String>,
    /// Image hosting the lifecycle binaries.
    pub build_image: Option<String>,
    /// Base image of produced application images.
    pub run_image: Option<String>,
}

impl Stack {
    /// The cflinuxfs3 stack.
    #[must_use]
    pub fn cflinuxfs3() -> Self {
        Self {
            id: Some("org.cloudfoundry.stacks.cflinuxfs3".into()),
            build_image: Some("cfbuildpacks/cflinuxfs3-cnb-experimental:build".into()),
            run_image: Some("cfbuildpacks/cflinuxfs3-cnb-experimental:run".into()),
        }
    }

    /// Returns the build image or a configuration error naming the variable.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Config` if no build image is configured.
    pub fn require_build_image(&self) -> Result<&str> {
        self.build_image
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| HarnessError::Config {
                message: format!("no build image configured (set {})", constants::ENV_BUILD_IMAGE),
            })
    }
}

/// Root configuration for a harness session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Parent directory for sandbox roots.
    pub temp_root: PathBuf,
    /// Container runtime CLI.
    pub docker: PathBuf,
    /// Packaging CLI.
    pub pack: PathBuf,
    /// Build and run images.
    pub stack: Stack,
    /// Tag of the intermediate builder image created by `pack`.
    pub builder_image: String,
    /// Stock builder used when build options name none.
    pub default_builder: String,
    /// Re-commit the builder image with readable `/buildpacks`.
    ///
    /// Some packaging tool versions produce builder images whose component
    /// directory is unreadable by the unprivileged build user.
    pub fix_builder_permissions: bool,
    /// Readiness polling of launched instances.
    pub readiness: ReadinessPolicy,
    /// Length of generated image tags.
    pub tag_length: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            temp_root: std::env::temp_dir(),
            docker: PathBuf::from(constants::DEFAULT_DOCKER),
            pack: PathBuf::from(constants::DEFAULT_PACK),
            stack: Stack::default(),
            builder_image: constants::DEFAULT_BUILDER_IMAGE.into(),
            default_builder: constants::DEFAULT_BUILDER.into(),
            fix_builder_permissions: false,
            readiness: ReadinessPolicy::default(),
            tag_length: constants::TAG_LENGTH,
        }
    }
}

impl HarnessConfig {
    /// Builds a configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    ///
    /// Unset or empty variables keep their defaults.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(dir) = get(constants::ENV_TMPDIR) {
            config.temp_root = PathBuf::from(dir);
        }
        if let Some(docker) = get(constants::ENV_DOCKER) {
            config.docker = PathBuf::from(docker);
        }
        if let Some(pack) = get(constants::ENV_PACK) {
            config.pack = PathBuf::from(pack);
        }
        config.stack = Stack {
            id: get(constants::ENV_STACK_ID),
            build_image: get(constants::ENV_BUILD_IMAGE),
            run_image: get(constants::ENV_RUN_IMAGE),
        };

        tracing::debug!(
            docker = %config.docker.display(),
            pack = %config.pack.display(),
            build_image = ?config.stack.build_image,
            run_image = ?config.stack.run_image,
            "harness configuration loaded"
        );
        config
    }
}
