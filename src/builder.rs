//! 本地构建步骤

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Command;
use std::time::Instant;
use tracing::{debug, info};

use common::ExecutionResult;

use crate::config::BuildConfig;
use crate::error::{DeployError, Result};

/// 产出部署产物的本地构建
#[async_trait]
pub trait LocalBuilder: Send + Sync {
    /// 执行一次构建；非零退出返回 `BuildFailure`
    async fn build(&self) -> Result<ExecutionResult>;
}

/// 通过 `sh -c` 执行构建命令
#[derive(Debug, Clone)]
pub struct ShellBuilder {
    command: String,
    workdir: PathBuf,
}

impl ShellBuilder {
    pub fn new(command: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            workdir: workdir.into(),
        }
    }

    pub fn from_config(config: &BuildConfig) -> Self {
        Self::new(config.command.clone(), config.workdir.clone())
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait]
impl LocalBuilder for ShellBuilder {
    async fn build(&self) -> Result<ExecutionResult> {
        let start_time = Instant::now();
        info!(command = %self.command, workdir = %self.workdir.display(), "Running local build");

        let output = tokio::task::spawn_blocking({
            let command = self.command.clone();
            let workdir = self.workdir.clone();
            move || Command::new("sh").args(["-c", &command]).current_dir(&workdir).output()
        })
        .await
        .map_err(|e| DeployError::BuildFailure {
            exit_code: None,
            stderr: format!("Build task panicked: {}", e),
        })?
        .map_err(|e| DeployError::BuildFailure {
            exit_code: None,
            stderr: format!("Failed to spawn build command: {}", e),
        })?;

        let duration_secs = start_time.elapsed().as_secs_f64();
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !stdout.trim().is_empty() {
            debug!(output = %stdout.trim_end(), "Build output");
        }

        if !output.status.success() {
            return Err(DeployError::BuildFailure {
                exit_code: output.status.code(),
                stderr: stderr.trim_end().to_string(),
            });
        }

        info!(duration_secs = duration_secs, "Local build finished");
        Ok(ExecutionResult::new(0, stdout, stderr, duration_secs))
    }
}
