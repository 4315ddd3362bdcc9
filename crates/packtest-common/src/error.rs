//! Unified error types for the packtest workspace.
//!
//! Every packtest crate returns [`HarnessError`]. Variants follow the
//! harness failure taxonomy: resource allocation, external process,
//! descriptor, instance health, and teardown failures.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid or missing.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// An external program could not be started at all.
    #[error("failed to launch {program}: {source}")]
    Spawn {
        /// Program that was being launched.
        program: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// An external program ran and exited unsuccessfully.
    ///
    /// The rendered message carries the full command line and the combined
    /// standard output and error of the process.
    #[error(
        "`{program} {args}` failed with {}\nStd out + error:\n{output}",
        status.map_or_else(|| "no exit code (terminated by signal)".to_string(), |c| format!("exit code {c}"))
    )]
    ToolFailed {
        /// Program that failed.
        program: String,
        /// Arguments, joined with spaces.
        args: String,
        /// Exit code, if the process exited normally.
        status: Option<i32>,
        /// Combined stdout and stderr captured from the process.
        output: String,
    },

    /// A required descriptor was missing, malformed, or failed validation.
    #[error("invalid descriptor {path}: {message}")]
    Descriptor {
        /// Descriptor file path.
        path: PathBuf,
        /// What was wrong with it.
        message: String,
    },

    /// A descriptor could not be serialized.
    #[error("failed to encode descriptor: {message}")]
    Encode {
        /// Serializer error message.
        message: String,
    },

    /// The instance reported itself unhealthy before becoming ready.
    #[error("instance '{label}' (container {container}) reported unhealthy")]
    Unhealthy {
        /// Fixture or source label of the instance.
        label: String,
        /// Container identifier.
        container: String,
    },

    /// The instance did not become ready before the deadline.
    #[error("instance '{label}' (container {container}) not healthy after {}s", deadline.as_secs())]
    TimedOut {
        /// Fixture or source label of the instance.
        label: String,
        /// Container identifier.
        container: String,
        /// Deadline that elapsed.
        deadline: Duration,
    },

    /// The container runtime answered with output that could not be parsed.
    #[error("unexpected container runtime response to {operation}: {message}")]
    RuntimeResponse {
        /// Runtime operation that was queried.
        operation: &'static str,
        /// What was wrong with the response.
        message: String,
    },

    /// An HTTP request against an instance endpoint failed.
    #[error("HTTP probe of {url} failed: {message}")]
    Probe {
        /// Requested URL.
        url: String,
        /// Transport error or unexpected status.
        message: String,
    },

    /// A lifecycle operation was invoked in the wrong state.
    #[error("invalid instance state: expected {expected}, found {actual}")]
    InvalidState {
        /// State the operation requires.
        expected: &'static str,
        /// State the instance was actually in.
        actual: String,
    },

    /// One or more best-effort teardown steps failed.
    #[error("teardown incomplete: {}", failures.join("; "))]
    Teardown {
        /// Description of every failed step.
        failures: Vec<String>,
    },
}

impl From<toml::ser::Error> for HarnessError {
    fn from(e: toml::ser::Error) -> Self {
        Self::Encode {
            message: e.to_string(),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_failure_message_contains_output_and_status() {
        let err = HarnessError::ToolFailed {
            program: "pack".into(),
            args: "create-builder b -b builder.toml".into(),
            status: Some(1),
            output: "unknown buildpack id".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("`pack create-builder b -b builder.toml`"));
        assert!(msg.contains("exit code 1"));
        assert!(msg.contains("Std out + error"));
        assert!(msg.contains("unknown buildpack id"));
    }

    #[test]
    fn tool_failure_without_status_mentions_signal() {
        let err = HarnessError::ToolFailed {
            program: "docker".into(),
            args: "run".into(),
            status: None,
            output: String::new(),
        };
        assert!(err.to_string().contains("terminated by signal"));
    }

    #[test]
    fn health_failures_carry_label() {
        let err = HarnessError::TimedOut {
            label: "simple_app".into(),
            container: "abc123".into(),
            deadline: Duration::from_secs(40),
        };
        assert!(err.to_string().contains("simple_app"));
        assert!(err.to_string().contains("40s"));
    }

    #[test]
    fn teardown_lists_every_failure() {
        let err = HarnessError::Teardown {
            failures: vec!["stop: boom".into(), "rm: bang".into()],
        };
        assert_eq!(err.to_string(), "teardown incomplete: stop: boom; rm: bang");
    }
}
