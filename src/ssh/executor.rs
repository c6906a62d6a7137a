//! SSH执行器模块
//! 提供SSH连接管理和命令执行能力
//!
//! 使用 russh 库实现真实的 SSH 连接和命令执行

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, error, info, warn};

use async_trait::async_trait;
use russh::client;
use russh::client::{Config, Handle};
use russh::ChannelMsg;
use russh_keys::key::PublicKey;
use russh_keys::load_secret_key;
use russh_keys::PublicKeyBase64;

use common::{ExecutionResult, HostKeyVerification, SshAuth, SshConfig};

use super::known_hosts::fingerprint;
use crate::error::{DeployError, Result};

/// SSH客户端
pub struct SSHClient {
    config: SshConfig,
}

impl SSHClient {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    /// 获取配置的引用
    pub fn config(&self) -> &SshConfig {
        &self.config
    }

    /// 创建带验证策略的会话处理器
    fn create_session(&self) -> SSHSession {
        SSHSession {
            verification_mode: self.config.host_key_verification.clone(),
            known_hosts: self.config.known_hosts.clone(),
            host_key: self.config.known_hosts_key(),
        }
    }

    /// 建立连接并完成认证
    pub async fn open(&self) -> Result<SshConnection> {
        debug!(
            host = %self.config.host,
            port = %self.config.port,
            user = %self.config.username,
            "Opening SSH connection"
        );

        let client_config = Arc::new(Config {
            preferred: russh::Preferred::default(),
            ..Default::default()
        });

        // TCP 连接与握手共用一个总超时
        let connect_timeout = Duration::from_secs(
            self.config.connect_timeout_secs + self.config.handshake_timeout_secs,
        );
        let session = self.create_session();

        let mut handle = timeout(
            connect_timeout,
            client::connect(client_config, (self.config.host.clone(), self.config.port), session),
        )
        .await
        .map_err(|_| {
            DeployError::SshConnectionError(format!(
                "Connection to {} timed out after {}s",
                self.config.target(),
                connect_timeout.as_secs()
            ))
        })?
        .map_err(|e| {
            error!(error = %e, target = %self.config.target(), "SSH connection failed");
            if e.to_string().contains("Host key") || e.to_string().contains("fingerprint") {
                DeployError::SshConnectionError(format!(
                    "Host key verification failed for {}: {}",
                    self.config.target(),
                    e
                ))
            } else {
                DeployError::SshConnectionError(format!(
                    "Failed to connect to {}: {}",
                    self.config.target(),
                    e
                ))
            }
        })?;

        self.authenticate(&mut handle).await?;

        Ok(SshConnection {
            handle,
            target: self.config.target(),
            command_timeout: Duration::from_secs(self.config.command_timeout_secs),
        })
    }

    async fn authenticate(&self, handle: &mut Handle<SSHSession>) -> Result<()> {
        let username = self.config.username.clone();
        let auth_result = match &self.config.auth {
            SshAuth::Password { password } => {
                handle.authenticate_password(username, password.clone()).await
            }
            SshAuth::Key {
                key_path,
                passphrase,
            } => {
                let key = load_secret_key(key_path, passphrase.as_deref()).map_err(|e| {
                    error!(error = %e, key_path = %key_path.display(), "Failed to load SSH private key");
                    DeployError::SshAuthenticationError(format!(
                        "Failed to load private key {}: {}",
                        key_path.display(),
                        e
                    ))
                })?;
                handle.authenticate_publickey(username, Arc::new(key)).await
            }
        };

        match auth_result {
            Ok(true) => {
                debug!(target = %self.config.target(), "SSH authentication succeeded");
                Ok(())
            }
            Ok(false) => Err(DeployError::SshAuthenticationError(format!(
                "Credentials rejected by {}",
                self.config.target()
            ))),
            Err(e) => Err(DeployError::SshAuthenticationError(format!(
                "{}: {}",
                self.config.target(),
                e
            ))),
        }
    }

    /// 在一次性连接上执行命令，可选地写入标准输入
    pub async fn execute(&self, command: &str, stdin: Option<&[u8]>) -> Result<ExecutionResult> {
        let connection = self.open().await?;
        let result = connection.exec(command, stdin).await;
        connection.close().await;
        result
    }
}

/// 已认证的 SSH 连接，可以顺序执行多条命令
pub struct SshConnection {
    handle: Handle<SSHSession>,
    target: String,
    command_timeout: Duration,
}

impl SshConnection {
    /// 在新通道上执行命令，等待通道关闭后返回
    pub async fn exec(&self, command: &str, stdin: Option<&[u8]>) -> Result<ExecutionResult> {
        let start_time = std::time::Instant::now();
        let deadline = Instant::now() + self.command_timeout;

        let mut channel = self.handle.channel_open_session().await.map_err(|e| {
            error!(error = %e, target = %self.target, "Failed to open SSH channel");
            DeployError::SshConnectionError(format!("Failed to open channel on {}: {}", self.target, e))
        })?;

        channel.exec(true, command).await.map_err(|e| {
            DeployError::SshConnectionError(format!("Failed to exec on {}: {}", self.target, e))
        })?;

        if let Some(input) = stdin {
            channel.data(input).await.map_err(|e| {
                DeployError::SshConnectionError(format!(
                    "Failed to write stdin on {}: {}",
                    self.target, e
                ))
            })?;
        }
        channel.eof().await.map_err(|e| {
            DeployError::SshConnectionError(format!("Failed to send EOF on {}: {}", self.target, e))
        })?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = None;
        let mut timed_out = false;

        loop {
            match timeout_at(deadline, channel.wait()).await {
                Ok(Some(ChannelMsg::Data { ref data })) => {
                    stdout.extend_from_slice(data);
                }
                Ok(Some(ChannelMsg::ExtendedData { ref data, ext })) => {
                    // SSH_EXTENDED_DATA_STDERR
                    if ext == 1 {
                        stderr.extend_from_slice(data);
                    }
                }
                Ok(Some(ChannelMsg::ExitStatus { exit_status })) => {
                    exit_code = Some(exit_status as i32);
                }
                Ok(Some(ChannelMsg::ExitSignal { signal_name, .. })) => {
                    warn!(target = %self.target, signal = ?signal_name, "Remote command killed by signal");
                }
                Ok(Some(ChannelMsg::Close)) | Ok(None) => break,
                Ok(Some(_)) => {}
                Err(_) => {
                    warn!(target = %self.target, command = %command, "Command timed out");
                    timed_out = true;
                    break;
                }
            }
        }

        let _ = channel.close().await;

        let duration_secs = start_time.elapsed().as_secs_f64();
        let stdout = String::from_utf8_lossy(&stdout).to_string();
        let stderr = String::from_utf8_lossy(&stderr).to_string();

        if timed_out {
            return Ok(ExecutionResult::timeout(stdout, stderr, duration_secs));
        }

        // 没有退出状态（例如被信号终止）按失败处理
        let exit_code = exit_code.unwrap_or(-1);

        info!(
            target = %self.target,
            exit_code = exit_code,
            duration_secs = duration_secs,
            stdout_len = stdout.len(),
            stderr_len = stderr.len(),
            "Command executed"
        );

        Ok(ExecutionResult::new(exit_code, stdout, stderr, duration_secs))
    }

    /// 关闭连接
    pub async fn close(self) {
        let _ = self
            .handle
            .disconnect(russh::Disconnect::ByApplication, "", "English")
            .await;
    }
}

/// SSH 客户端会话处理器
pub struct SSHSession {
    verification_mode: HostKeyVerification,
    known_hosts: Option<std::collections::HashMap<String, String>>,
    host_key: String,
}

impl SSHSession {
    /// 根据验证策略判断是否接受服务器公钥
    fn accept_key(&self, fingerprint: &str) -> bool {
        if self.verification_mode == HostKeyVerification::Disabled {
            warn!(host = %self.host_key, "Host key verification DISABLED - accepting all keys");
            return true;
        }

        let stored = self
            .known_hosts
            .as_ref()
            .and_then(|known_hosts| known_hosts.get(&self.host_key));

        match (stored, &self.verification_mode) {
            (Some(stored), _) if stored == fingerprint => {
                debug!(host = %self.host_key, "Host key verified");
                true
            }
            (Some(stored), _) => {
                error!(
                    host = %self.host_key,
                    expected = %stored,
                    actual = %fingerprint,
                    "Host key mismatch - REJECTING CONNECTION"
                );
                false
            }
            (None, HostKeyVerification::Accept) => {
                info!(
                    host = %self.host_key,
                    fingerprint = %fingerprint,
                    "Unknown host - accepting host key"
                );
                true
            }
            (None, _) => {
                error!(host = %self.host_key, "Unknown host in strict mode - rejecting connection");
                false
            }
        }
    }
}

#[async_trait]
impl client::Handler for SSHSession {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let fingerprint = fingerprint(&server_public_key.public_key_bytes());
        Ok(self.accept_key(&fingerprint))
    }
}
