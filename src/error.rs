//! 统一错误模型
//! 部署、状态查询与统计报告共用的错误类型

use thiserror::Error;

/// 结果类型别名
pub type Result<T> = std::result::Result<T, DeployError>;

/// 部署错误类型
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Build failed ({}): {stderr}", exit_label(.exit_code))]
    BuildFailure {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Remote command failed on {host} (exit code {exit_code}): {command}")]
    RemoteCommandFailure {
        host: String,
        command: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("Transfer to {host}:{remote_path} failed: {reason}")]
    RemoteTransferFailure {
        host: String,
        remote_path: String,
        reason: String,
    },

    #[error("Stats payload for key '{key}' could not be decoded: {reason}")]
    StatsDecodeError { key: String, reason: String },

    #[error("Status query failed on {} host(s): {}", .failed.len(), .failed.join(", "))]
    StatusFailures { failed: Vec<String> },

    #[error("SSH connection error: {0}")]
    SshConnectionError(String),

    #[error("SSH authentication failed: {0}")]
    SshAuthenticationError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_label(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code".to_string(),
    }
}

impl DeployError {
    /// 是否为远程主机上的失败（命令、传输或连接）
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            DeployError::RemoteCommandFailure { .. }
                | DeployError::RemoteTransferFailure { .. }
                | DeployError::SshConnectionError(_)
                | DeployError::SshAuthenticationError(_)
        )
    }

    /// 失败所在主机（如果能确定）
    pub fn host(&self) -> Option<&str> {
        match self {
            DeployError::RemoteCommandFailure { host, .. }
            | DeployError::RemoteTransferFailure { host, .. } => Some(host),
            _ => None,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        DeployError::Config(msg.into())
    }

    pub fn stats_decode(key: impl Into<String>, reason: impl Into<String>) -> Self {
        DeployError::StatsDecodeError {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

impl From<config::ConfigError> for DeployError {
    fn from(e: config::ConfigError) -> Self {
        DeployError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_failure_message() {
        let err = DeployError::BuildFailure {
            exit_code: Some(2),
            stderr: "undefined: foo".to_string(),
        };
        assert_eq!(err.to_string(), "Build failed (exit code 2): undefined: foo");

        let err = DeployError::BuildFailure {
            exit_code: None,
            stderr: "killed".to_string(),
        };
        assert!(err.to_string().contains("no exit code"));
    }

    #[test]
    fn test_remote_command_failure_message() {
        let err = DeployError::RemoteCommandFailure {
            host: "dl1".to_string(),
            command: "systemctl restart downloader@api.service".to_string(),
            exit_code: 5,
            stdout: String::new(),
            stderr: "Unit not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Remote command failed on dl1 (exit code 5): systemctl restart downloader@api.service"
        );
        assert!(err.is_remote());
        assert_eq!(err.host(), Some("dl1"));
    }

    #[test]
    fn test_status_failures_message() {
        let err = DeployError::StatusFailures {
            failed: vec!["dl1".to_string(), "dl3".to_string()],
        };
        assert_eq!(err.to_string(), "Status query failed on 2 host(s): dl1, dl3");
        assert!(!err.is_remote());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "downloader");
        let err: DeployError = io_err.into();
        assert!(matches!(err, DeployError::Io(_)));
    }

    #[test]
    fn test_stats_decode_helper() {
        let err = DeployError::stats_decode("processor", "expected a string");
        assert_eq!(
            err.to_string(),
            "Stats payload for key 'processor' could not be decoded: expected a string"
        );
    }
}
