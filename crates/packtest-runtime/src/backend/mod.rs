//! Container runtime abstraction.

pub mod docker;

use std::collections::BTreeMap;
use std::time::Duration;

use packtest_common::error::Result;
use packtest_common::types::ContainerId;

/// Health check the runtime runs inside the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheck {
    /// Shell command; exit 0 means healthy.
    pub command: String,
    /// Time between checks.
    pub interval: Duration,
    /// Time a single check may take.
    pub timeout: Duration,
}

impl HealthCheck {
    /// Creates a health check running `command` every `interval`.
    #[must_use]
    pub fn new(command: impl Into<String>, interval: Duration, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            interval,
            timeout,
        }
    }
}

/// What to launch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Image name or tag.
    pub image: String,
    /// Container port to publish; `None` publishes every exposed port.
    pub port: Option<u16>,
    /// Optional health check.
    pub health_check: Option<HealthCheck>,
    /// Environment variable assignments.
    pub env: BTreeMap<String, String>,
    /// Container labels.
    pub labels: BTreeMap<String, String>,
}

/// Health as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Health check has not passed yet.
    Starting,
    /// Health check passes.
    Healthy,
    /// Health check fails.
    Unhealthy,
    /// Running with no health check configured.
    None,
    /// The container is no longer running.
    Exited,
}

/// Container operations the harness needs from a runtime.
///
/// Implementors are shared between the instances of one session.
pub trait ContainerRuntime: Send + Sync {
    /// Launches a detached container.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be started.
    fn launch(&self, spec: &LaunchSpec) -> Result<ContainerId>;

    /// Queries the container's current health.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be queried.
    fn health(&self, id: &ContainerId) -> Result<HealthStatus>;

    /// Resolves the host port published for `port` (or the first published
    /// port).
    ///
    /// # Errors
    ///
    /// Returns an error if no mapping exists.
    fn published_port(&self, id: &ContainerId, port: Option<u16>) -> Result<u16>;

    /// Returns the container's output.
    ///
    /// # Errors
    ///
    /// Returns an error if logs cannot be retrieved.
    fn logs(&self, id: &ContainerId) -> Result<String>;

    /// Stops a running container.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be stopped.
    fn stop(&self, id: &ContainerId) -> Result<()>;

    /// Removes a stopped container.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be removed.
    fn remove(&self, id: &ContainerId) -> Result<()>;

    /// Removes an image.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be removed.
    fn remove_image(&self, image: &str) -> Result<()>;

    /// Removes dangling images.
    ///
    /// # Errors
    ///
    /// Returns an error if pruning fails.
    fn prune_images(&self) -> Result<()>;

    /// Returns whether the runtime can be used on this host.
    fn is_available(&self) -> bool;
}
