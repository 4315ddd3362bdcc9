//! Typed interchange descriptors.
//!
//! These mirror the TOML files the lifecycle reads and writes. Decoded
//! results are validated at the parse boundary and immutable afterwards.

use std::path::Path;

use packtest_common::error::{HarnessError, Result};
use serde::{Deserialize, Serialize};

/// Identifier and version of one component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentInfo {
    /// Component identifier, e.g. `org.example.nodejs`.
    pub id: String,
    /// Component version.
    pub version: String,
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ComponentInfo {
    /// Creates an unnamed component reference.
    #[must_use]
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            name: None,
        }
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(HarnessError::Descriptor {
                path: path.to_path_buf(),
                message: "component id is empty".into(),
            });
        }
        if self.version.trim().is_empty() {
            return Err(HarnessError::Descriptor {
                path: path.to_path_buf(),
                message: format!("component {} has an empty version", self.id),
            });
        }
        Ok(())
    }
}

/// An ordered selection of components used together for one build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Components in execution order.
    #[serde(default)]
    pub buildpacks: Vec<ComponentInfo>,
}

impl Group {
    /// Creates a group from its components.
    #[must_use]
    pub const fn new(buildpacks: Vec<ComponentInfo>) -> Self {
        Self { buildpacks }
    }

    /// Validates a group decoded from `path`.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Descriptor` if the group is empty or any entry
    /// lacks an id or version.
    pub fn validate(&self, path: &Path) -> Result<()> {
        if self.buildpacks.is_empty() {
            return Err(HarnessError::Descriptor {
                path: path.to_path_buf(),
                message: "group selects no components".into(),
            });
        }
        self.buildpacks.iter().try_for_each(|c| c.validate(path))
    }
}

/// Candidate groups tried in order by the detect stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Candidate groups, most preferred first.
    #[serde(default)]
    pub groups: Vec<Group>,
}

impl Order {
    /// Creates an order from its candidate groups.
    #[must_use]
    pub const fn new(groups: Vec<Group>) -> Self {
        Self { groups }
    }

    /// An order with a single one-component group.
    #[must_use]
    pub fn single(component: ComponentInfo) -> Self {
        Self::new(vec![Group::new(vec![component])])
    }
}

/// Opaque requirements produced by detection and consumed by the build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildPlan(toml::Table);

impl BuildPlan {
    /// An empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a requirement on `dependency` at `version`.
    #[must_use]
    pub fn require(mut self, dependency: impl Into<String>, version: impl Into<String>) -> Self {
        let mut entry = toml::Table::new();
        let _ = entry.insert("version".into(), toml::Value::String(version.into()));
        let _ = self.0.insert(dependency.into(), toml::Value::Table(entry));
        self
    }

    /// Returns the raw entry for `dependency`.
    #[must_use]
    pub fn get(&self, dependency: &str) -> Option<&toml::Value> {
        self.0.get(dependency)
    }

    /// Returns the version required for `dependency`, if declared.
    #[must_use]
    pub fn version_of(&self, dependency: &str) -> Option<&str> {
        self.get(dependency)?.get("version")?.as_str()
    }

    /// Returns whether the plan has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the underlying table.
    #[must_use]
    pub const fn as_table(&self) -> &toml::Table {
        &self.0
    }
}

/// What the detect stage chose.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    /// The selected group.
    pub group: Group,
    /// Requirements for the build stage.
    pub plan: BuildPlan,
}

/// A process the launched image can run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    /// Process type, e.g. `web`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Command line.
    pub command: String,
}

/// Launch descriptor written by the build stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchMetadata {
    /// Declared processes.
    #[serde(default)]
    pub processes: Vec<Process>,
}

impl LaunchMetadata {
    /// Returns the process of the given type.
    #[must_use]
    pub fn process(&self, kind: &str) -> Option<&Process> {
        self.processes.iter().find(|p| p.kind == kind)
    }
}

/// Metadata a component recorded for one of its layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerMetadata {
    /// Version of the dependency installed in the layer.
    #[serde(default)]
    pub version: String,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: toml::Table,
}
