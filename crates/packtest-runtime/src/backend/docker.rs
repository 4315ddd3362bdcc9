//! [`ContainerRuntime`] backed by the docker CLI.

use std::time::Duration;

use packtest_common::config::HarnessConfig;
use packtest_common::error::{HarnessError, Result};
use packtest_common::process::{Tool, ToolOutput};
use packtest_common::types::ContainerId;
use serde::Deserialize;

use super::{ContainerRuntime, HealthStatus, LaunchSpec};

/// Subset of `docker inspect`'s `.State` object.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerState {
    running: bool,
    #[serde(default)]
    exit_code: i64,
    #[serde(default)]
    health: Option<HealthState>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthState {
    status: String,
}

/// Drives containers through `docker`.
#[derive(Debug, Clone)]
pub struct DockerCli {
    tool: Tool,
}

impl DockerCli {
    /// Wraps a docker-compatible CLI.
    #[must_use]
    pub const fn new(tool: Tool) -> Self {
        Self { tool }
    }

    /// Uses the CLI named in the configuration.
    #[must_use]
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(Tool::new(&config.docker))
    }
}

impl ContainerRuntime for DockerCli {
    fn launch(&self, spec: &LaunchSpec) -> Result<ContainerId> {
        let output = self.tool.run(run_args(spec))?;
        let id = output.stdout.trim();
        if id.is_empty() {
            return Err(HarnessError::RuntimeResponse {
                operation: "run",
                message: "no container id printed".into(),
            });
        }
        let id = ContainerId::new(id);
        tracing::info!(container = %id, image = %spec.image, "container launched");
        Ok(id)
    }

    fn health(&self, id: &ContainerId) -> Result<HealthStatus> {
        let output = self
            .tool
            .run(["inspect", "--format", "{{json .State}}", id.as_str()])?;
        parse_state(&output.stdout)
    }

    fn published_port(&self, id: &ContainerId, port: Option<u16>) -> Result<u16> {
        let mut args = vec!["port".to_string(), id.as_str().to_string()];
        if let Some(port) = port {
            args.push(port.to_string());
        }
        let output = self.tool.run(args)?;
        parse_port(&output.stdout)
    }

    fn logs(&self, id: &ContainerId) -> Result<String> {
        Ok(self.tool.run(["logs", id.as_str()])?.combined())
    }

    fn stop(&self, id: &ContainerId) -> Result<()> {
        tolerate_missing(self.tool.run(["stop", id.as_str()]))
    }

    fn remove(&self, id: &ContainerId) -> Result<()> {
        tolerate_missing(self.tool.run(["rm", id.as_str()]))
    }

    fn remove_image(&self, image: &str) -> Result<()> {
        tolerate_missing(self.tool.run(["rmi", "-f", image]))
    }

    fn prune_images(&self) -> Result<()> {
        let _ = self.tool.run(["image", "prune", "-f"])?;
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.tool.is_available()
    }
}

/// Treats a removal target that no longer exists as already removed.
fn tolerate_missing(result: Result<ToolOutput>) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(HarnessError::ToolFailed { output, args, .. }) if output.contains("No such") => {
            tracing::debug!(args = %args, "removal target already gone");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// `docker run` arguments for a detached, port-publishing launch.
fn run_args(spec: &LaunchSpec) -> Vec<String> {
    let mut args = vec!["run".to_string(), "-d".to_string()];
    match spec.port {
        Some(port) => {
            args.push("-p".into());
            args.push(port.to_string());
        }
        None => args.push("-P".into()),
    }
    if let Some(check) = &spec.health_check {
        args.push("--health-cmd".into());
        args.push(check.command.clone());
        args.push("--health-interval".into());
        args.push(duration_flag(check.interval));
        args.push("--health-timeout".into());
        args.push(duration_flag(check.timeout));
    }
    for (key, value) in &spec.env {
        args.push("-e".into());
        args.push(format!("{key}={value}"));
    }
    for (key, value) in &spec.labels {
        args.push("--label".into());
        args.push(format!("{key}={value}"));
    }
    args.push(spec.image.clone());
    args
}

fn duration_flag(d: Duration) -> String {
    if d.subsec_millis() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}ms", d.as_millis())
    }
}

fn parse_state(json: &str) -> Result<HealthStatus> {
    let state: ContainerState =
        serde_json::from_str(json.trim()).map_err(|e| HarnessError::RuntimeResponse {
            operation: "inspect",
            message: e.to_string(),
        })?;

    if !state.running {
        tracing::debug!(exit_code = state.exit_code, "container is not running");
        return Ok(HealthStatus::Exited);
    }
    Ok(match state.health.as_ref().map(|h| h.status.as_str()) {
        None => HealthStatus::None,
        Some("healthy") => HealthStatus::Healthy,
        Some("unhealthy") => HealthStatus::Unhealthy,
        Some(_) => HealthStatus::Starting,
    })
}

/// Reads the host port from the first mapping `docker port` prints, either
/// `0.0.0.0:32768` or `8080/tcp -> 0.0.0.0:32768`.
fn parse_port(output: &str) -> Result<u16> {
    let invalid = |message: String| HarnessError::RuntimeResponse {
        operation: "port",
        message,
    };
    let line = output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| invalid("no published ports".into()))?;
    let address = line.rsplit("->").next().unwrap_or(line).trim();
    let port = address
        .rsplit(':')
        .next()
        .ok_or_else(|| invalid(format!("no port in '{line}'")))?;
    port.trim()
        .parse()
        .map_err(|_| invalid(format!("invalid port in '{line}'")))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::super::HealthCheck;
    use super::*;

    #[test]
    fn run_args_publish_all_ports_by_default() {
        let spec = LaunchSpec {
            image: "abcdefghijklmnop".into(),
            ..LaunchSpec::default()
        };
        assert_eq!(run_args(&spec), ["run", "-d", "-P", "abcdefghijklmnop"]);
    }

    #[test]
    fn run_args_carry_health_check_env_and_labels() {
        let spec = LaunchSpec {
            image: "img".into(),
            port: Some(8080),
            health_check: Some(HealthCheck::new(
                "curl -f localhost/health",
                Duration::from_secs(1),
                Duration::from_secs(40),
            )),
            env: BTreeMap::from([("PORT".to_string(), "8080".to_string())]),
            labels: BTreeMap::from([("packtest.session".to_string(), "s-1".to_string())]),
        };
        assert_eq!(
            run_args(&spec),
            [
                "run",
                "-d",
                "-p",
                "8080",
                "--health-cmd",
                "curl -f localhost/health",
                "--health-interval",
                "1s",
                "--health-timeout",
                "40s",
                "-e",
                "PORT=8080",
                "--label",
                "packtest.session=s-1",
                "img",
            ]
        );
    }

    #[test]
    fn sub_second_durations_use_milliseconds() {
        assert_eq!(duration_flag(Duration::from_millis(1500)), "1500ms");
        assert_eq!(duration_flag(Duration::from_secs(2)), "2s");
    }

    #[test]
    fn state_without_health_is_none() {
        let json = r#"{"Status":"running","Running":true,"ExitCode":0}"#;
        assert_eq!(parse_state(json).unwrap(), HealthStatus::None);
    }

    #[test]
    fn state_maps_health_status() {
        let state = |s: &str| format!(r#"{{"Running":true,"Health":{{"Status":"{s}","FailingStreak":0}}}}"#);
        assert_eq!(parse_state(&state("healthy")).unwrap(), HealthStatus::Healthy);
        assert_eq!(parse_state(&state("unhealthy")).unwrap(), HealthStatus::Unhealthy);
        assert_eq!(parse_state(&state("starting")).unwrap(), HealthStatus::Starting);
    }

    #[test]
    fn stopped_container_is_exited() {
        let json = r#"{"Status":"exited","Running":false,"ExitCode":1,"Health":{"Status":"healthy"}}"#;
        assert_eq!(parse_state(json).unwrap(), HealthStatus::Exited);
    }

    #[test]
    fn garbage_state_is_an_error() {
        assert!(matches!(
            parse_state("Error: No such object"),
            Err(HarnessError::RuntimeResponse { operation: "inspect", .. })
        ));
    }

    #[test]
    fn missing_targets_count_as_removed() {
        let failed = |output: &str| {
            Err(HarnessError::ToolFailed {
                program: "docker".into(),
                args: "rmi -f qwertyuiopasdfgh".into(),
                status: Some(1),
                output: output.into(),
            })
        };
        assert!(tolerate_missing(failed("Error: No such image: qwertyuiopasdfgh")).is_ok());
        assert!(tolerate_missing(failed("Error response from daemon: No such container: 9f86d081884c")).is_ok());
        assert!(matches!(
            tolerate_missing(failed("Error: conflict: image is in use")),
            Err(HarnessError::ToolFailed { .. })
        ));
    }

    #[test]
    fn port_parses_both_output_shapes() {
        assert_eq!(parse_port("0.0.0.0:32768\n").unwrap(), 32768);
        assert_eq!(parse_port("8080/tcp -> 0.0.0.0:32769\n8080/tcp -> [::]:32769\n").unwrap(), 32769);
    }

    #[test]
    fn missing_port_mapping_is_an_error() {
        assert!(parse_port("").is_err());
        assert!(parse_port("8080/tcp -> 0.0.0.0:http").is_err());
    }
}
