//! 基于 SSH 的 [`HostExecutor`] 实现

use async_trait::async_trait;
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

use common::ExecutionResult;

use super::executor::{SSHClient, SshConnection};
use super::known_hosts::load_known_hosts_file;
use crate::config::SshSettings;
use crate::error::{DeployError, Result};
use crate::executor::HostExecutor;
use crate::models::Host;

/// 对远程 shell 参数加引号
pub fn quote(value: &str) -> String {
    shell_escape::unix::escape(Cow::Borrowed(value)).into_owned()
}

/// 用 sudo 包装命令；有 sudo 密码时从标准输入读取
pub fn sudo_command(command: &str, with_password: bool) -> String {
    if with_password {
        format!("sudo -S -p '' sh -c {}", quote(command))
    } else {
        format!("sudo -n sh -c {}", quote(command))
    }
}

/// 把标准输入写入远程临时文件
pub fn upload_command(tmp_path: &str) -> String {
    format!("cat > {}", quote(tmp_path))
}

/// 把临时文件移动到目标位置并设置权限；目标是目录时放到目录内，文件名取本地文件名
pub fn install_command(tmp_path: &str, remote_path: &str, file_name: &str, mode: u32) -> String {
    format!(
        "dest={remote}; if [ -d \"$dest\" ]; then dest=\"$dest\"/{name}; fi; mv {tmp} \"$dest\" && chmod {mode:04o} \"$dest\"",
        remote = quote(remote_path),
        name = quote(file_name),
        tmp = quote(tmp_path),
        mode = mode,
    )
}

/// 删除临时文件
pub fn cleanup_command(tmp_path: &str) -> String {
    format!("rm -f {}", quote(tmp_path))
}

/// 非零退出转换为 `RemoteCommandFailure`
fn check_result(host: &Host, command: &str, result: ExecutionResult) -> Result<String> {
    if result.is_success() {
        return Ok(result.stdout);
    }
    Err(DeployError::RemoteCommandFailure {
        host: host.to_string(),
        command: command.to_string(),
        exit_code: result.exit_code,
        stdout: result.stdout,
        stderr: result.stderr,
    })
}

/// 通过 SSH 执行远程操作，每个操作使用独立连接
pub struct SshHostExecutor {
    settings: SshSettings,
    known_hosts: Option<HashMap<String, String>>,
}

impl SshHostExecutor {
    pub fn new(settings: SshSettings, known_hosts: Option<HashMap<String, String>>) -> Self {
        Self {
            settings,
            known_hosts,
        }
    }

    /// 从配置创建，同时加载 known_hosts 文件
    pub async fn from_settings(settings: SshSettings) -> Self {
        let known_hosts = match &settings.known_hosts_file {
            Some(path) => load_known_hosts_file(path).await,
            None => None,
        };
        Self::new(settings, known_hosts)
    }

    fn client(&self, host: &Host) -> SSHClient {
        SSHClient::new(self.settings.for_host(host, self.known_hosts.clone()))
    }

    /// sudo 密码作为标准输入（带换行）
    fn sudo_stdin(&self, client: &SSHClient) -> Option<Vec<u8>> {
        client
            .config()
            .sudo_password
            .as_ref()
            .map(|password| format!("{}\n", password).into_bytes())
    }

    fn privilege(&self, client: &SSHClient, elevate: bool) -> Privilege {
        if elevate {
            Privilege::Sudo {
                password: self.sudo_stdin(client),
            }
        } else {
            Privilege::User
        }
    }

    /// 上传到临时文件后移动到目标位置；错误以文本形式返回，由调用方包装
    async fn transfer(
        &self,
        host: &Host,
        local_path: &Path,
        remote_path: &str,
        mode: u32,
        elevate: bool,
    ) -> std::result::Result<(), String> {
        let content = tokio::fs::read(local_path)
            .await
            .map_err(|e| format!("Failed to read {}: {}", local_path.display(), e))?;
        let file_name = local_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| format!("Not a file: {}", local_path.display()))?;

        let client = self.client(host);
        let connection = client.open().await.map_err(|e| e.to_string())?;

        let tmp_path = format!("/tmp/fleet-deploy-{}", uuid::Uuid::new_v4().simple());
        let install = install_command(&tmp_path, remote_path, &file_name, mode);
        let privilege = self.privilege(&client, elevate);

        let result =
            upload_and_install(&connection, host, &content, &tmp_path, &install, &privilege).await;
        connection.close().await;
        result
    }
}

/// 命令的执行身份
#[derive(Debug, Clone, PartialEq)]
pub enum Privilege {
    /// 登录用户
    User,
    /// sudo；有密码时从标准输入写入
    Sudo { password: Option<Vec<u8>> },
}

impl Privilege {
    /// 包装后的命令与需要写入的标准输入
    pub fn wrap(&self, command: &str) -> (String, Option<&[u8]>) {
        match self {
            Privilege::User => (command.to_string(), None),
            Privilege::Sudo { password } => (
                sudo_command(command, password.is_some()),
                password.as_deref(),
            ),
        }
    }
}

/// 已打开的远程 shell 通道
#[async_trait]
pub trait RemoteChannel: Send + Sync {
    async fn exec(&self, command: &str, stdin: Option<&[u8]>) -> Result<ExecutionResult>;
}

#[async_trait]
impl RemoteChannel for SshConnection {
    async fn exec(&self, command: &str, stdin: Option<&[u8]>) -> Result<ExecutionResult> {
        SshConnection::exec(self, command, stdin).await
    }
}

/// 写入临时文件并安装；任一步失败都会删除临时文件
pub async fn upload_and_install<C: RemoteChannel + ?Sized>(
    channel: &C,
    host: &Host,
    content: &[u8],
    tmp_path: &str,
    install: &str,
    privilege: &Privilege,
) -> std::result::Result<(), String> {
    debug!(host = %host, tmp_path = %tmp_path, bytes = content.len(), "Uploading artifact");

    let uploaded = channel
        .exec(&upload_command(tmp_path), Some(content))
        .await
        .map_err(|e| e.to_string())
        .and_then(|result| expect_success("upload", result));

    let installed = match uploaded {
        Ok(()) => {
            let (command, stdin) = privilege.wrap(install);
            channel
                .exec(&command, stdin)
                .await
                .map_err(|e| e.to_string())
                .and_then(|result| expect_success("install", result))
        }
        Err(reason) => Err(reason),
    };

    if installed.is_err() {
        remove_upload(channel, host, tmp_path).await;
    }
    installed
}

/// 删除临时文件；它属于登录用户，不需要 sudo
async fn remove_upload<C: RemoteChannel + ?Sized>(channel: &C, host: &Host, tmp_path: &str) {
    match channel.exec(&cleanup_command(tmp_path), None).await {
        Ok(result) if result.is_success() => {
            debug!(host = %host, tmp_path = %tmp_path, "Removed temporary upload");
        }
        Ok(result) => {
            warn!(host = %host, exit_code = result.exit_code, "Failed to remove temporary upload");
        }
        Err(e) => warn!(host = %host, error = %e, "Failed to remove temporary upload"),
    }
}

/// 传输步骤的结果检查
fn expect_success(step: &str, result: ExecutionResult) -> std::result::Result<(), String> {
    if result.is_success() {
        Ok(())
    } else {
        Err(format!(
            "{} exited with {}: {}",
            step,
            result.exit_code,
            result.output_summary(200)
        ))
    }
}

#[async_trait]
impl HostExecutor for SshHostExecutor {
    async fn run(&self, host: &Host, command: &str) -> Result<String> {
        info!(host = %host, command = %command, "run");
        let result = self.client(host).execute(command, None).await?;
        check_result(host, command, result)
    }

    async fn sudo(&self, host: &Host, command: &str) -> Result<String> {
        info!(host = %host, command = %command, "sudo");
        let client = self.client(host);
        let privilege = self.privilege(&client, true);
        let (wrapped, stdin) = privilege.wrap(command);
        let result = client.execute(&wrapped, stdin).await?;
        check_result(host, command, result)
    }

    async fn put(
        &self,
        host: &Host,
        local_path: &Path,
        remote_path: &str,
        mode: u32,
        elevate: bool,
    ) -> Result<()> {
        info!(
            host = %host,
            local_path = %local_path.display(),
            remote_path = %remote_path,
            mode = %format!("{:04o}", mode),
            elevate = elevate,
            "put"
        );

        self.transfer(host, local_path, remote_path, mode, elevate)
            .await
            .map_err(|reason| DeployError::RemoteTransferFailure {
                host: host.to_string(),
                remote_path: remote_path.to_string(),
                reason,
            })
    }
}
