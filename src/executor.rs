//! 远程执行抽象
//!
//! 编排层只依赖 [`HostExecutor`]，主机作为参数显式传入每一次调用。
//! 生产实现见 [`crate::ssh::SshHostExecutor`]。

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;
use crate::models::Host;

/// 单台主机上的命令执行与文件传输
///
/// 不做重试：任何失败都直接返回给调用方。
#[async_trait]
pub trait HostExecutor: Send + Sync {
    /// 执行命令，非零退出码返回 `RemoteCommandFailure`，成功返回 stdout
    async fn run(&self, host: &Host, command: &str) -> Result<String>;

    /// 与 `run` 相同，但先提升权限
    async fn sudo(&self, host: &Host, command: &str) -> Result<String>;

    /// 复制本地文件到远程路径并设置权限位，失败返回 `RemoteTransferFailure`
    async fn put(
        &self,
        host: &Host,
        local_path: &Path,
        remote_path: &str,
        mode: u32,
        elevate: bool,
    ) -> Result<()>;
}
