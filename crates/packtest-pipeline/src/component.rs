//! Staging component definitions into the sandbox.
//!
//! A component source root holds a `buildpack.toml` descriptor and the
//! `bin/detect` and `bin/build` executables. Staging copies them into the
//! components root as `<id>/<version>/` and points `<id>/latest` at that
//! version, so the whole root can be mounted into the lifecycle container.

use std::path::{Path, PathBuf};

use packtest_common::constants::{COMPONENT_DESCRIPTOR, COMPONENT_EXECUTABLES, LATEST_ALIAS};
use packtest_common::error::{HarnessError, Result};
use packtest_common::fs;
use serde::{Deserialize, Serialize};

use crate::descriptor::ComponentInfo;

/// Contents of a component's `buildpack.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    /// Identity of the component.
    pub buildpack: ComponentInfo,
}

/// A component copied into the sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedComponent {
    /// Identity read from the descriptor.
    pub info: ComponentInfo,
    /// Versioned directory inside the components root.
    pub path: PathBuf,
}

/// Reads and validates the descriptor at `source_root`.
///
/// # Errors
///
/// Returns `HarnessError::Descriptor` if the descriptor is missing,
/// malformed, or names an unusable id or version.
pub fn load_descriptor(source_root: &Path) -> Result<ComponentDescriptor> {
    let path = source_root.join(COMPONENT_DESCRIPTOR);
    let descriptor: ComponentDescriptor = fs::read_toml(&path)?;
    let info = &descriptor.buildpack;

    for (field, value) in [("id", &info.id), ("version", &info.version)] {
        if value.trim().is_empty() {
            return Err(HarnessError::Descriptor {
                path,
                message: format!("component {field} is empty"),
            });
        }
        if value.contains('/') || value.contains('\\') || value == ".." || value == "." {
            return Err(HarnessError::Descriptor {
                path,
                message: format!("component {field} '{value}' is not a valid path segment"),
            });
        }
    }

    Ok(descriptor)
}

/// Copies the component at `source_root` into `components_root`.
///
/// Staging the same component twice replaces the earlier copy.
///
/// # Errors
///
/// Returns an error if the descriptor is invalid, an executable is missing,
/// or any copy fails.
pub fn stage(source_root: &Path, components_root: &Path) -> Result<StagedComponent> {
    let descriptor = load_descriptor(source_root)?;
    let info = descriptor.buildpack;

    let id_dir = components_root.join(&info.id);
    let version_dir = id_dir.join(&info.version);
    let bin_dir = version_dir.join("bin");

    if fs::file_exists(&version_dir)? {
        std::fs::remove_dir_all(&version_dir).map_err(|e| HarnessError::Io {
            path: version_dir.clone(),
            source: e,
        })?;
    }
    std::fs::create_dir_all(&bin_dir).map_err(|e| HarnessError::Io {
        path: bin_dir.clone(),
        source: e,
    })?;
    for dir in [&id_dir, &version_dir, &bin_dir] {
        fs::set_mode(dir, 0o755)?;
    }

    fs::copy_file(
        &source_root.join(COMPONENT_DESCRIPTOR),
        &version_dir.join(COMPONENT_DESCRIPTOR),
    )?;

    for name in COMPONENT_EXECUTABLES {
        let from = source_root.join("bin").join(name);
        if !fs::file_exists(&from)? {
            return Err(HarnessError::NotFound {
                kind: "component executable",
                id: from.display().to_string(),
            });
        }
        let to = bin_dir.join(name);
        fs::copy_file(&from, &to)?;
        fs::set_mode(&to, 0o755)?;
    }

    link_latest(&id_dir, &info.version)?;

    tracing::info!(id = %info.id, version = %info.version, path = %version_dir.display(), "component staged");
    Ok(StagedComponent {
        info,
        path: version_dir,
    })
}

/// Points `<id>/latest` at the staged version with a relative link, so the
/// link also resolves inside the container mount.
#[cfg(unix)]
fn link_latest(id_dir: &Path, version: &str) -> Result<()> {
    let link = id_dir.join(LATEST_ALIAS);
    if link.symlink_metadata().is_ok() {
        std::fs::remove_file(&link).map_err(|e| HarnessError::Io {
            path: link.clone(),
            source: e,
        })?;
    }
    std::os::unix::fs::symlink(version, &link).map_err(|e| HarnessError::Io { path: link, source: e })
}

#[cfg(not(unix))]
fn link_latest(_id_dir: &Path, _version: &str) -> Result<()> {
    Ok(())
}
