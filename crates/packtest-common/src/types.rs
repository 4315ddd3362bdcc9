//! Domain primitive types used across the packtest workspace.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};

/// Unique identifier for one harness session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a random session ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Runtime-assigned identifier of a launched container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a container ID from the runtime's output.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the conventional 12-character short form.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short())
    }
}

/// Reference to a runnable image.
///
/// Images produced by the harness are `owned` and get removed when the
/// instance running them is destroyed; images supplied by the caller are
/// left alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef {
    name: String,
    owned: bool,
}

impl ImageRef {
    /// Refers to an image the harness built and must clean up.
    #[must_use]
    pub fn built(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owned: true,
        }
    }

    /// Refers to a pre-existing image the harness must not remove.
    #[must_use]
    pub fn existing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owned: false,
        }
    }

    /// Returns the image name or tag.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns whether the harness owns this image.
    #[must_use]
    pub const fn is_owned(&self) -> bool {
        self.owned
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// How long and how often to poll a started instance for readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessPolicy {
    /// Interval between health queries.
    pub poll_interval: Duration,
    /// Total time allowed from start until the instance must be healthy.
    pub deadline: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(crate::constants::READINESS_POLL_SECS),
            deadline: Duration::from_secs(crate::constants::READINESS_DEADLINE_SECS),
        }
    }
}

impl ReadinessPolicy {
    /// Checks that the policy can drive a poll loop.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Config` if the poll interval is zero.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(HarnessError::Config {
                message: "readiness poll interval must be non-zero".into(),
            });
        }
        Ok(())
    }
}

/// Lifecycle state of a running instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstanceState {
    /// Configured but not launched.
    Created,
    /// Launched; readiness not yet established.
    Started,
    /// Reported healthy; endpoint resolved.
    Ready,
    /// Reported unhealthy before becoming ready.
    Unhealthy,
    /// Did not become healthy before the deadline.
    TimedOut,
    /// Container and owned image removed.
    Destroyed,
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Started => write!(f, "started"),
            Self::Ready => write!(f, "ready"),
            Self::Unhealthy => write!(f, "unhealthy"),
            Self::TimedOut => write!(f, "timed-out"),
            Self::Destroyed => write!(f, "destroyed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_id_display_uses_short_form() {
        let id = ContainerId::new("0123456789abcdef0123");
        assert_eq!(id.to_string(), "0123456789ab");
        assert_eq!(id.as_str(), "0123456789abcdef0123");
    }

    #[test]
    fn container_id_short_keeps_short_ids() {
        assert_eq!(ContainerId::new("abc").short(), "abc");
    }

    #[test]
    fn image_ref_ownership() {
        assert!(ImageRef::built("abc").is_owned());
        assert!(!ImageRef::existing("nginx:latest").is_owned());
    }

    #[test]
    fn default_readiness_policy_matches_contract() {
        let policy = ReadinessPolicy::default();
        assert_eq!(policy.poll_interval, Duration::from_secs(1));
        assert_eq!(policy.deadline, Duration::from_secs(40));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let policy = ReadinessPolicy {
            poll_interval: Duration::ZERO,
            ..ReadinessPolicy::default()
        };
        assert!(matches!(policy.validate(), Err(HarnessError::Config { .. })));
        assert!(ReadinessPolicy::default().validate().is_ok());
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }
}
