//! Renderer that shells out to `salt-run` on the master.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use pillar_ci_core::{ConfigTree, PillarRenderer, RenderError, RenderResult};
use tokio::process::Command;
use tracing::debug;

use crate::pillar::pillar_from_str;

/// Default `salt-run` executable.
pub const DEFAULT_SALT_RUN: &str = "salt-run";

/// Compiles pillar with `salt-run pillar.show_pillar <node> pillarenv=<env>`.
#[derive(Debug, Clone)]
pub struct SaltRunRenderer {
    binary: PathBuf,
    config_dir: Option<PathBuf>,
    timeout: Duration,
}

impl SaltRunRenderer {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            config_dir: None,
            timeout,
        }
    }

    /// Point `salt-run` at a non-default master configuration directory.
    pub fn with_config_dir(mut self, config_dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(config_dir.into());
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Arguments passed to the executable for one render.
    pub fn command_args(&self, node: &str, environment: &str) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(dir) = &self.config_dir {
            args.push("-c".to_string());
            args.push(dir.to_string_lossy().into_owned());
        }
        args.extend([
            "--out=json".to_string(),
            "pillar.show_pillar".to_string(),
            node.to_string(),
            format!("pillarenv={environment}"),
        ]);
        args
    }
}

#[async_trait]
impl PillarRenderer for SaltRunRenderer {
    async fn render(&self, node: &str, environment: &str) -> RenderResult<ConfigTree> {
        let start = Instant::now();

        let child = Command::new(&self.binary)
            .args(self.command_args(node, environment))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RenderError::Unreachable {
                node: node.to_string(),
                environment: environment.to_string(),
                message: format!("failed to spawn {}: {e}", self.binary.display()),
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| RenderError::Timeout {
                node: node.to_string(),
                environment: environment.to_string(),
                timeout: self.timeout,
            })?
            .map_err(|e| RenderError::failed(node, environment, e.to_string()))?;

        debug!(
            node = %node,
            environment = %environment,
            exit_code = output.status.code().unwrap_or(-1),
            duration_ms = start.elapsed().as_millis() as u64,
            "salt-run finished"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("salt-run exited with code {}", output.status.code().unwrap_or(-1))
            } else {
                stderr
            };
            return Err(RenderError::failed(node, environment, message));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        pillar_from_str(node, environment, &stdout)
    }

    fn name(&self) -> &str {
        "salt-run"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_args() {
        let renderer = SaltRunRenderer::new(DEFAULT_SALT_RUN, Duration::from_secs(60));
        assert_eq!(
            renderer.command_args("web01.local", "dev.change_common_pillar"),
            vec![
                "--out=json",
                "pillar.show_pillar",
                "web01.local",
                "pillarenv=dev.change_common_pillar",
            ]
        );
    }

    #[test]
    fn test_command_args_with_config_dir() {
        let renderer = SaltRunRenderer::new(DEFAULT_SALT_RUN, Duration::from_secs(60))
            .with_config_dir("/srv/salt/etc");
        let args = renderer.command_args("n1", "base");
        assert_eq!(&args[..2], &["-c", "/srv/salt/etc"]);
        assert_eq!(args.last().map(String::as_str), Some("pillarenv=base"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_unreachable() {
        let renderer = SaltRunRenderer::new(
            "/nonexistent/pillar-ci/salt-run",
            Duration::from_secs(5),
        );
        let err = renderer.render("n1", "base").await.unwrap_err();
        assert!(matches!(err, RenderError::Unreachable { .. }));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_failed() {
        let renderer = SaltRunRenderer::new("false", Duration::from_secs(5));
        let err = renderer.render("n1", "base").await.unwrap_err();
        match err {
            RenderError::Failed { message, .. } => assert!(message.contains("exited with code")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}
