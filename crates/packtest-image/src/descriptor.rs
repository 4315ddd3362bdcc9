//! The builder descriptor consumed by `pack create-builder`.
//!
//! Groups are expected to reference only components declared in the same
//! descriptor. That is the producer's responsibility; [`BuilderDescriptor::dangling_references`]
//! reports violations for diagnostics but nothing here rejects them.

use std::path::Path;

use packtest_common::error::{HarnessError, Result};
use packtest_common::fs;
use packtest_pipeline::descriptor::{ComponentInfo, Group};
use serde::{Deserialize, Serialize};

/// A component and where the packaging tool can find it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderComponent {
    /// Component identifier.
    pub id: String,
    /// Source location: a local directory, archive, or URL.
    pub uri: String,
}

impl BuilderComponent {
    /// A component sourced from a local directory.
    #[must_use]
    pub fn local(id: impl Into<String>, dir: &Path) -> Self {
        Self {
            id: id.into(),
            uri: dir.display().to_string(),
        }
    }
}

/// Stack the builder is created for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderStack {
    /// Stack identifier.
    pub id: String,
    /// Build image.
    #[serde(rename = "build-image")]
    pub build_image: String,
    /// Run image.
    #[serde(rename = "run-image")]
    pub run_image: String,
}

/// Declarative description of a builder image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderDescriptor {
    /// Components, in declaration order.
    #[serde(default)]
    pub buildpacks: Vec<BuilderComponent>,
    /// Groups, in preference order.
    #[serde(default)]
    pub groups: Vec<Group>,
    /// Stack section, when the packaging tool wants one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<BuilderStack>,
}

impl BuilderDescriptor {
    /// An empty descriptor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a component.
    #[must_use]
    pub fn component(mut self, id: impl Into<String>, uri: impl Into<String>) -> Self {
        self.buildpacks.push(BuilderComponent {
            id: id.into(),
            uri: uri.into(),
        });
        self
    }

    /// Appends a group.
    #[must_use]
    pub fn group(mut self, members: Vec<ComponentInfo>) -> Self {
        self.groups.push(Group::new(members));
        self
    }

    /// Sets the stack section.
    #[must_use]
    pub fn stack(mut self, stack: BuilderStack) -> Self {
        self.stack = Some(stack);
        self
    }

    /// Group members whose id no declared component has.
    #[must_use]
    pub fn dangling_references(&self) -> Vec<&ComponentInfo> {
        self.groups
            .iter()
            .flat_map(|g| g.buildpacks.iter())
            .filter(|member| !self.buildpacks.iter().any(|c| c.id == member.id))
            .collect()
    }

    /// Serializes to the packaging tool's TOML format.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Encode` if serialization fails.
    pub fn encode(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    /// Parses a descriptor previously produced by [`BuilderDescriptor::encode`].
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Descriptor` if the text is not a valid
    /// descriptor.
    pub fn decode(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| HarnessError::Descriptor {
            path: "builder.toml".into(),
            message: e.to_string(),
        })
    }

    /// Writes the descriptor to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        fs::write_toml(self, path, 0o644)
    }

    /// Reads a descriptor from `path`.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Descriptor` if the file is missing or
    /// malformed.
    pub fn read_from(path: &Path) -> Result<Self> {
        fs::read_toml(path)
    }
}
