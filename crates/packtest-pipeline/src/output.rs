//! What the build stage leaves behind in the workspace.
//!
//! Each component gets a launch root `<workspace>/<component id>/` holding
//! a `launch.toml` and one `<layer>.toml` per layer it produced. Accessors
//! read lazily: an absent file is `Ok(None)`, malformed content an error.

use std::path::{Path, PathBuf};

use packtest_common::constants::LAUNCH_FILE;
use packtest_common::error::Result;
use packtest_common::fs;

use crate::descriptor::{LaunchMetadata, LayerMetadata};

/// Result of a build stage run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    workspace_root: PathBuf,
    cache_root: PathBuf,
}

impl BuildOutput {
    /// Wraps the workspace and cache roots the build wrote into.
    #[must_use]
    pub const fn new(workspace_root: PathBuf, cache_root: PathBuf) -> Self {
        Self {
            workspace_root,
            cache_root,
        }
    }

    /// Directory holding `component`'s launch layers and metadata.
    #[must_use]
    pub fn launch_root(&self, component: &str) -> PathBuf {
        self.workspace_root.join(component)
    }

    /// Directory holding `component`'s cached layers.
    #[must_use]
    pub fn cache_root(&self, component: &str) -> PathBuf {
        self.cache_root.join(component)
    }

    /// Returns the workspace root.
    #[must_use]
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Reads the metadata `component` recorded for `layer`.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Descriptor` if the file exists but is
    /// malformed.
    pub fn layer_metadata(&self, component: &str, layer: &str) -> Result<Option<LayerMetadata>> {
        fs::read_optional_toml(&self.launch_root(component).join(format!("{layer}.toml")))
    }

    /// Reads `component`'s launch descriptor.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Descriptor` if the file exists but is
    /// malformed.
    pub fn launch_metadata(&self, component: &str) -> Result<Option<LaunchMetadata>> {
        fs::read_optional_toml(&self.launch_root(component).join(LAUNCH_FILE))
    }
}
