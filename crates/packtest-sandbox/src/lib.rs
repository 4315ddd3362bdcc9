//! # packtest-sandbox
//!
//! Ephemeral filesystem roots owned by one harness session.
//!
//! A [`Sandbox`] allocates one directory per [`Role`] when it is created.
//! Directories are opened up enough for the unprivileged user of the next
//! pipeline stage to read and write them. Every directory that was created
//! is removed exactly once by [`Sandbox::teardown`]; a failed allocation
//! removes whatever was already allocated before the error is returned.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use packtest_common::constants::APP_NAME;
use packtest_common::error::{HarnessError, Result};
use tempfile::TempDir;

/// A named directory role within a sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    /// Lifecycle workspace: output descriptors and layers.
    Workspace,
    /// Build cache.
    Cache,
    /// Input descriptors handed to the lifecycle.
    Inputs,
    /// Staged component definitions.
    Components,
    /// Scratch space for the harness itself.
    Staging,
}

impl Role {
    /// Every role, in allocation order.
    pub const ALL: [Self; 5] = [
        Self::Workspace,
        Self::Cache,
        Self::Inputs,
        Self::Components,
        Self::Staging,
    ];

    /// Directory name prefix for this role.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Workspace => "workspace",
            Self::Cache => "cache",
            Self::Inputs => "inputs",
            Self::Components => "buildpack",
            Self::Staging => "staging",
        }
    }

    /// Permission bits applied after creation.
    ///
    /// Roles mounted into lifecycle containers are world-writable because the
    /// lifecycle runs as a different user.
    #[must_use]
    pub const fn mode(self) -> u32 {
        match self {
            Self::Workspace | Self::Cache | Self::Inputs => 0o777,
            Self::Components => 0o755,
            Self::Staging => 0o700,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Where each role's directory is allocated.
#[derive(Debug, Clone)]
pub struct SandboxLayout {
    root: PathBuf,
    overrides: BTreeMap<Role, PathBuf>,
}

impl SandboxLayout {
    /// Allocates every role under `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            overrides: BTreeMap::new(),
        }
    }

    /// Allocates `role` under `parent` instead of the common root.
    #[must_use]
    pub fn with_role_root(mut self, role: Role, parent: impl Into<PathBuf>) -> Self {
        let _ = self.overrides.insert(role, parent.into());
        self
    }

    /// Returns the parent directory used for `role`.
    #[must_use]
    pub fn parent_for(&self, role: Role) -> &Path {
        self.overrides.get(&role).unwrap_or(&self.root)
    }
}

/// The set of ephemeral directories owned by one session.
#[derive(Debug, Default)]
pub struct Sandbox {
    dirs: Vec<(Role, TempDir)>,
}

impl Sandbox {
    /// Allocates every role according to `layout`.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Io` if any directory cannot be created or its
    /// permissions cannot be set. Directories allocated before the failure
    /// have been removed by the time the error is returned.
    pub fn create(layout: &SandboxLayout) -> Result<Self> {
        let mut sandbox = Self::empty();

        for role in Role::ALL {
            match allocate(layout.parent_for(role), role) {
                Ok(dir) => {
                    tracing::debug!(%role, path = %dir.path().display(), "allocated sandbox root");
                    sandbox.dirs.push((role, dir));
                }
                Err(e) => {
                    tracing::warn!(%role, error = %e, "sandbox allocation failed, releasing partial state");
                    if let Err(cleanup) = sandbox.teardown() {
                        tracing::warn!(error = %cleanup, "partial sandbox cleanup incomplete");
                    }
                    return Err(e);
                }
            }
        }

        tracing::info!(roots = sandbox.dirs.len(), "sandbox created");
        Ok(sandbox)
    }

    /// Allocates every role under `root`.
    ///
    /// # Errors
    ///
    /// Same as [`Sandbox::create`].
    pub fn create_in(root: impl Into<PathBuf>) -> Result<Self> {
        Self::create(&SandboxLayout::new(root))
    }

    /// A sandbox that owns nothing. Tearing it down is a no-op.
    #[must_use]
    pub const fn empty() -> Self {
        Self { dirs: Vec::new() }
    }

    /// Returns the directory allocated for `role`.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::NotFound` if the role was never allocated or
    /// the sandbox has been torn down.
    pub fn path(&self, role: Role) -> Result<&Path> {
        self.dirs
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, dir)| dir.path())
            .ok_or_else(|| HarnessError::NotFound {
                kind: "sandbox role",
                id: role.to_string(),
            })
    }

    /// Iterates over the allocated roles and their directories.
    pub fn roles(&self) -> impl Iterator<Item = (Role, &Path)> {
        self.dirs.iter().map(|(role, dir)| (*role, dir.path()))
    }

    /// Returns whether no directories are currently owned.
    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.dirs.is_empty()
    }

    /// Removes every allocated directory.
    ///
    /// Each directory is released at most once; calling this again, or on a
    /// sandbox that never allocated anything, does nothing. A directory that
    /// has already vanished counts as removed.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Teardown` listing every directory that could
    /// not be removed. All directories are attempted regardless.
    pub fn teardown(&mut self) -> Result<()> {
        let mut failures = Vec::new();

        for (role, dir) in self.dirs.drain(..) {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => tracing::debug!(%role, path = %path.display(), "removed sandbox root"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => failures.push(format!("{role} {}: {e}", path.display())),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(HarnessError::Teardown { failures })
        }
    }
}

fn allocate(parent: &Path, role: Role) -> Result<TempDir> {
    let dir = tempfile::Builder::new()
        .prefix(&format!("{APP_NAME}-{}-", role.prefix()))
        .tempdir_in(parent)
        .map_err(|e| HarnessError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    packtest_common::fs::set_mode(dir.path(), role.mode())?;
    Ok(dir)
}
