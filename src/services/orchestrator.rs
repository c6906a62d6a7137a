//! 部署编排
//! 构建、复制、重启、状态查询以及组合的 deploy 流程
//!
//! 所有主机严格顺序处理；除状态查询外，任何失败立即终止本次调用。

use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::FleetConfig;
use crate::error::{DeployError, Result};
use crate::executor::HostExecutor;
use crate::builder::LocalBuilder;
use crate::models::{Host, HostSet, ServiceName};

/// 一次命令行调用的运行上下文
///
/// 构建标记只在本次调用内有效，同一调用中的多个动作共享它。
#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    build_executed: bool,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            build_executed: false,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// 本次调用中构建是否已经成功执行
    pub fn build_executed(&self) -> bool {
        self.build_executed
    }

    fn mark_built(&mut self) {
        self.build_executed = true;
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

/// 部署计划：产物、安装位置与服务单元
#[derive(Debug, Clone)]
pub struct DeployPlan {
    pub artifact_path: PathBuf,
    pub remote_path: String,
    pub mode: u32,
    pub unit_template: String,
}

impl DeployPlan {
    pub fn from_config(config: &FleetConfig) -> Result<Self> {
        Ok(Self {
            artifact_path: config.artifact_path(),
            remote_path: config.artifact.remote_path.clone(),
            mode: config.artifact.mode_bits()?,
            unit_template: config.services.unit_template.clone(),
        })
    }

    /// 重启单个服务的命令
    pub fn restart_command(&self, service: ServiceName) -> String {
        format!("systemctl restart {}", service.unit(&self.unit_template))
    }

    /// 一次查询所有服务状态的命令
    pub fn status_command(&self) -> String {
        let units: Vec<String> = ServiceName::ALL
            .iter()
            .map(|service| service.unit(&self.unit_template))
            .collect();
        format!("systemctl status --no-pager {}", units.join(" "))
    }
}

/// 部署编排器
pub struct Orchestrator {
    executor: Arc<dyn HostExecutor>,
    builder: Arc<dyn LocalBuilder>,
    plan: DeployPlan,
}

impl Orchestrator {
    pub fn new(
        executor: Arc<dyn HostExecutor>,
        builder: Arc<dyn LocalBuilder>,
        plan: DeployPlan,
    ) -> Self {
        Self {
            executor,
            builder,
            plan,
        }
    }

    pub fn plan(&self) -> &DeployPlan {
        &self.plan
    }

    /// 本地构建，同一次调用中最多执行一次
    #[instrument(skip(self, ctx), fields(run_id = %ctx.run_id()))]
    pub async fn build(&self, ctx: &mut RunContext) -> Result<()> {
        if ctx.build_executed() {
            info!("Build already executed in this run, skipping");
            return Ok(());
        }

        self.builder.build().await.map_err(|e| {
            error!(error = %e, "Local build failed");
            e
        })?;
        ctx.mark_built();
        Ok(())
    }

    /// 把产物复制到每台主机
    pub async fn copy(&self, hosts: &HostSet) -> Result<()> {
        for host in hosts {
            self.copy_host(host).await?;
        }
        Ok(())
    }

    /// 按固定顺序重启每台主机上的服务
    pub async fn restart(&self, hosts: &HostSet) -> Result<()> {
        for host in hosts {
            self.restart_host(host).await?;
        }
        Ok(())
    }

    /// 构建一次，然后逐台复制并重启
    ///
    /// 主机 i 失败时，之前的主机保持已部署状态，之后的主机不会被触碰。
    #[instrument(skip(self, ctx, hosts), fields(run_id = %ctx.run_id(), hosts = hosts.len()))]
    pub async fn deploy(&self, ctx: &mut RunContext, hosts: &HostSet) -> Result<()> {
        self.build(ctx).await?;

        let total = hosts.len();
        for (index, host) in hosts.iter().enumerate() {
            info!(host = %host, progress = %format!("{}/{}", index + 1, total), "Deploying host");

            let step = match self.copy_host(host).await {
                Ok(()) => self.restart_host(host).await,
                Err(e) => Err(e),
            };
            if let Err(e) = step {
                error!(
                    host = %host,
                    completed = index,
                    remaining = total - index - 1,
                    error = %e,
                    "Deploy aborted"
                );
                return Err(e);
            }
        }

        info!(hosts = total, "Deploy finished");
        Ok(())
    }

    /// 把每台主机的原始状态输出写到 `out`
    ///
    /// 单台主机失败不影响后续主机，所有失败在结束时汇总返回。
    pub async fn status<W: Write>(&self, hosts: &HostSet, out: &mut W) -> Result<()> {
        let command = self.plan.status_command();
        let mut failed = Vec::new();

        for host in hosts {
            info!(host = %host, command = %command, "Querying service status");
            match self.executor.run(host, &command).await {
                Ok(output) => {
                    write_raw(out, &output)?;
                }
                Err(e) => {
                    // systemctl status 对停止的服务返回非零，输出仍然有用
                    if let DeployError::RemoteCommandFailure { stdout, .. } = &e {
                        write_raw(out, stdout)?;
                    }
                    warn!(host = %host, error = %e, "Status query failed");
                    failed.push(host.to_string());
                }
            }
        }
        out.flush()?;

        if failed.is_empty() {
            Ok(())
        } else {
            Err(DeployError::StatusFailures { failed })
        }
    }

    async fn copy_host(&self, host: &Host) -> Result<()> {
        self.executor
            .put(
                host,
                &self.plan.artifact_path,
                &self.plan.remote_path,
                self.plan.mode,
                true,
            )
            .await
    }

    async fn restart_host(&self, host: &Host) -> Result<()> {
        for service in ServiceName::ALL {
            self.executor
                .sudo(host, &self.plan.restart_command(service))
                .await?;
        }
        Ok(())
    }
}

fn write_raw<W: Write>(out: &mut W, output: &str) -> std::io::Result<()> {
    if output.is_empty() {
        return Ok(());
    }
    out.write_all(output.as_bytes())?;
    if !output.ends_with('\n') {
        out.write_all(b"\n")?;
    }
    Ok(())
}
