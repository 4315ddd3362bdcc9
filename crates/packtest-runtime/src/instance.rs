//! One launched instance and its readiness state machine.
//!
//! ```text
//! Created ──start──▶ Started ──wait──▶ Ready | Unhealthy | TimedOut
//!    └──────────────────┴──────────────────┴────destroy──▶ Destroyed
//! ```
//!
//! `destroy` is reachable from every state and is idempotent. An instance
//! dropped without being destroyed is torn down on a best-effort basis.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use packtest_common::error::{HarnessError, Result};
use packtest_common::types::{ContainerId, ImageRef, InstanceState, ReadinessPolicy};

use crate::backend::{ContainerRuntime, HealthCheck, LaunchSpec};
use crate::probe::Endpoint;
use crate::readiness::{self, ReadinessOutcome};

/// A container launched from an image, owned by the caller that created it.
pub struct RunningInstance {
    runtime: Arc<dyn ContainerRuntime>,
    image: ImageRef,
    label: String,
    port: Option<u16>,
    health_check: Option<HealthCheck>,
    env: BTreeMap<String, String>,
    labels: BTreeMap<String, String>,
    policy: ReadinessPolicy,
    state: InstanceState,
    container: Option<ContainerId>,
    endpoint: Option<Endpoint>,
    started_at: Option<DateTime<Utc>>,
    image_removed: bool,
}

impl std::fmt::Debug for RunningInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningInstance")
            .field("image", &self.image)
            .field("label", &self.label)
            .field("state", &self.state)
            .field("container", &self.container)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl RunningInstance {
    /// Prepares an instance of `image`; `label` names the fixture it was
    /// built from in diagnostics.
    #[must_use]
    pub fn new(runtime: Arc<dyn ContainerRuntime>, image: ImageRef, label: impl Into<String>) -> Self {
        Self {
            runtime,
            image,
            label: label.into(),
            port: None,
            health_check: None,
            env: BTreeMap::new(),
            labels: BTreeMap::new(),
            policy: ReadinessPolicy::default(),
            state: InstanceState::Created,
            container: None,
            endpoint: None,
            started_at: None,
            image_removed: false,
        }
    }

    /// Publishes `port` and resolves the endpoint from it.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Declares a health check for the runtime to run.
    #[must_use]
    pub fn with_health_check(mut self, check: HealthCheck) -> Self {
        self.health_check = Some(check);
        self
    }

    /// Sets an environment variable in the container.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.env.insert(key.into(), value.into());
        self
    }

    /// Attaches a container label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.labels.insert(key.into(), value.into());
        self
    }

    /// Overrides the readiness poll interval and deadline.
    #[must_use]
    pub const fn with_policy(mut self, policy: ReadinessPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> InstanceState {
        self.state
    }

    /// Fixture label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Image the instance runs.
    #[must_use]
    pub const fn image(&self) -> &ImageRef {
        &self.image
    }

    /// Runtime-assigned container id, once started.
    #[must_use]
    pub const fn container_id(&self) -> Option<&ContainerId> {
        self.container.as_ref()
    }

    /// Addressable endpoint, once ready.
    #[must_use]
    pub const fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    /// When the container was launched.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Launches the container.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::InvalidState` unless the instance is
    /// `Created`, or the runtime's error if the launch fails.
    pub fn start(&mut self) -> Result<&ContainerId> {
        self.expect_state(InstanceState::Created, "created")?;

        let spec = LaunchSpec {
            image: self.image.name().to_string(),
            port: self.port,
            health_check: self.health_check.clone(),
            env: self.env.clone(),
            labels: self.labels.clone(),
        };
        let id = self.runtime.launch(&spec)?;
        tracing::info!(label = %self.label, container = %id, image = %self.image, "instance started");

        self.started_at = Some(Utc::now());
        self.state = InstanceState::Started;
        Ok(&*self.container.insert(id))
    }

    /// Polls health until the instance is ready, unhealthy, or out of time.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Unhealthy` or `HarnessError::TimedOut`
    /// carrying the fixture label, `HarnessError::InvalidState` unless the
    /// instance is `Started`, or the runtime's error if a health or port
    /// query fails.
    pub async fn wait_until_ready(&mut self) -> Result<&Endpoint> {
        self.expect_state(InstanceState::Started, "started")?;
        let id = self.started_container()?;

        let runtime = Arc::clone(&self.runtime);
        let outcome = readiness::wait_for_ready(self.policy, || runtime.health(&id)).await?;

        match outcome {
            ReadinessOutcome::Ready { polls } => {
                let port = self.runtime.published_port(&id, self.port)?;
                let endpoint = Endpoint::localhost(port);
                tracing::info!(
                    label = %self.label,
                    container = %id,
                    endpoint = %endpoint,
                    polls,
                    "instance ready"
                );
                self.state = InstanceState::Ready;
                Ok(&*self.endpoint.insert(endpoint))
            }
            ReadinessOutcome::Unhealthy { polls } => {
                self.state = InstanceState::Unhealthy;
                self.log_diagnostics(&id, polls);
                Err(HarnessError::Unhealthy {
                    label: self.label.clone(),
                    container: id.to_string(),
                })
            }
            ReadinessOutcome::TimedOut { polls } => {
                self.state = InstanceState::TimedOut;
                self.log_diagnostics(&id, polls);
                Err(HarnessError::TimedOut {
                    label: self.label.clone(),
                    container: id.to_string(),
                    deadline: self.policy.deadline,
                })
            }
        }
    }

    /// Starts the instance and waits for readiness on a private
    /// current-thread runtime.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::InvalidState` when called from within an
    /// async runtime; otherwise the same as [`RunningInstance::start`] and
    /// [`RunningInstance::wait_until_ready`].
    pub fn start_and_wait_blocking(&mut self) -> Result<Endpoint> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(HarnessError::InvalidState {
                expected: "a blocking context",
                actual: "an async runtime".into(),
            });
        }
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| HarnessError::Io {
                path: "tokio runtime".into(),
                source: e,
            })?;
        let _ = self.start()?;
        rt.block_on(self.wait_until_ready()).cloned()
    }

    /// Returns the container's output.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::NotFound` if no container is live.
    pub fn logs(&self) -> Result<String> {
        let id = self.container.as_ref().ok_or_else(|| HarnessError::NotFound {
            kind: "container",
            id: self.label.clone(),
        })?;
        self.runtime.logs(id)
    }

    /// Stops and removes the container, then removes the image if the
    /// harness built it.
    ///
    /// Every step is attempted even if an earlier one fails. Calling it
    /// again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Teardown` listing every step that failed.
    pub fn destroy(&mut self) -> Result<()> {
        if self.state == InstanceState::Destroyed {
            return Ok(());
        }
        let mut failures = Vec::new();

        if let Some(id) = self.container.take() {
            if let Err(e) = self.runtime.stop(&id) {
                failures.push(format!("stop {id}: {e}"));
            }
            if let Err(e) = self.runtime.remove(&id) {
                failures.push(format!("remove {id}: {e}"));
            }
        }
        if self.image.is_owned() && !self.image_removed {
            self.image_removed = true;
            if let Err(e) = self.runtime.remove_image(self.image.name()) {
                failures.push(format!("remove image {}: {e}", self.image));
            }
            if let Err(e) = self.runtime.prune_images() {
                failures.push(format!("prune images: {e}"));
            }
        }

        self.endpoint = None;
        self.state = InstanceState::Destroyed;

        if failures.is_empty() {
            tracing::info!(label = %self.label, "instance destroyed");
            Ok(())
        } else {
            tracing::warn!(label = %self.label, failures = ?failures, "instance teardown incomplete");
            Err(HarnessError::Teardown { failures })
        }
    }

    fn expect_state(&self, expected: InstanceState, name: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(HarnessError::InvalidState {
                expected: name,
                actual: self.state.to_string(),
            })
        }
    }

    fn started_container(&self) -> Result<ContainerId> {
        self.container.clone().ok_or_else(|| HarnessError::InvalidState {
            expected: "started",
            actual: self.state.to_string(),
        })
    }

    fn log_diagnostics(&self, id: &ContainerId, polls: u32) {
        let waited = self
            .started_at
            .map(|t| (Utc::now() - t).to_std().unwrap_or(Duration::ZERO));
        match self.runtime.logs(id) {
            Ok(logs) => tracing::warn!(
                label = %self.label,
                container = %id,
                state = %self.state,
                polls,
                waited = ?waited,
                logs = %logs,
                "instance did not become ready"
            ),
            Err(e) => tracing::warn!(
                label = %self.label,
                container = %id,
                state = %self.state,
                polls,
                error = %e,
                "instance did not become ready; logs unavailable"
            ),
        }
    }
}

impl Drop for RunningInstance {
    fn drop(&mut self) {
        if self.state == InstanceState::Destroyed {
            return;
        }
        tracing::warn!(label = %self.label, state = %self.state, "instance dropped without destroy");
        if let Err(e) = self.destroy() {
            tracing::warn!(label = %self.label, error = %e, "best-effort teardown failed");
        }
    }
}
