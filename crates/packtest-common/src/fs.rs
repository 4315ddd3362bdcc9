//! Filesystem helpers and TOML descriptor I/O.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{HarnessError, Result};

/// Walks up from `start` until a directory containing `marker` is found.
///
/// # Errors
///
/// Returns `HarnessError::NotFound` if the filesystem root is reached
/// without finding the marker.
pub fn find_root(start: &Path, marker: &str) -> Result<PathBuf> {
    let start = std::path::absolute(start).map_err(|e| HarnessError::Io {
        path: start.to_path_buf(),
        source: e,
    })?;

    for dir in start.ancestors() {
        if file_exists(&dir.join(marker))? {
            return Ok(dir.to_path_buf());
        }
    }

    Err(HarnessError::NotFound {
        kind: "directory containing",
        id: format!("{marker} above {}", start.display()),
    })
}

/// Returns whether `path` exists.
///
/// # Errors
///
/// Returns an error if existence cannot be determined (e.g. permissions).
pub fn file_exists(path: &Path) -> Result<bool> {
    path.try_exists().map_err(|e| HarnessError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Copies a single file, preserving its permission bits.
///
/// # Errors
///
/// Returns an error if the source cannot be read or the target written.
pub fn copy_file(from: &Path, to: &Path) -> Result<()> {
    let _bytes = std::fs::copy(from, to).map_err(|e| HarnessError::Io {
        path: from.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

/// Writes `contents` to `path`, creating parent directories.
///
/// On Unix the file gets `mode` so later stages running as another user can
/// read it.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be created or written.
pub fn write_file(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| HarnessError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::write(path, contents).map_err(|e| HarnessError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    set_mode(path, mode)
}

/// Sets Unix permission bits on `path`. No-op elsewhere.
///
/// # Errors
///
/// Returns an error if the permissions cannot be changed.
#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).map_err(|e| {
        HarnessError::Io {
            path: path.to_path_buf(),
            source: e,
        }
    })
}

/// Sets Unix permission bits on `path`. No-op elsewhere.
///
/// # Errors
///
/// Never fails on non-Unix platforms.
#[cfg(not(unix))]
pub const fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Serializes `value` as TOML into `path`.
///
/// # Errors
///
/// Returns an error if encoding fails or the file cannot be written.
pub fn write_toml<T: Serialize>(value: &T, path: &Path, mode: u32) -> Result<()> {
    let encoded = toml::to_string(value)?;
    tracing::debug!(path = %path.display(), "writing descriptor");
    write_file(path, encoded.as_bytes(), mode)
}

/// Reads and decodes a required TOML descriptor.
///
/// # Errors
///
/// Returns `HarnessError::Descriptor` if the file is missing or malformed.
pub fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    read_optional_toml(path)?.ok_or_else(|| HarnessError::Descriptor {
        path: path.to_path_buf(),
        message: "required descriptor was not produced".into(),
    })
}

/// Reads and decodes an optional TOML descriptor.
///
/// A missing file yields `Ok(None)`; only unreadable or malformed content is
/// an error.
///
/// # Errors
///
/// Returns `HarnessError::Descriptor` if the file exists but cannot be
/// decoded, or `HarnessError::Io` if it cannot be read.
pub fn read_optional_toml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !file_exists(path)? {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).map_err(|e| HarnessError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    toml::from_str(&content)
        .map(Some)
        .map_err(|e| HarnessError::Descriptor {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}
