//! 动作分发
//! 按命令行给出的顺序执行动作，所有动作共享同一个运行上下文

use clap::ValueEnum;
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::builder::{LocalBuilder, ShellBuilder};
use crate::config::FleetConfig;
use crate::error::{DeployError, Result};
use crate::executor::HostExecutor;
use crate::models::{HostSet, StatKey};
use crate::services::{DeployPlan, Orchestrator, RunContext, StatsCollector};

/// 可在命令行调用的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Action {
    /// 本地构建产物
    Build,
    /// 复制产物到目标主机
    Copy,
    /// 重启目标主机上的服务
    Restart,
    /// 查询目标主机上的服务状态
    Status,
    /// 输出计数器统计
    Stats,
    /// 构建、复制并重启
    Deploy,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Build => "build",
            Action::Copy => "copy",
            Action::Restart => "restart",
            Action::Status => "status",
            Action::Stats => "stats",
            Action::Deploy => "deploy",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Dispatcher {
    orchestrator: Orchestrator,
    stats: StatsCollector,
}

impl Dispatcher {
    pub fn new(orchestrator: Orchestrator, stats: StatsCollector) -> Self {
        Self {
            orchestrator,
            stats,
        }
    }

    /// 使用 shell 构建器和给定的远程执行器组装
    pub fn from_config(config: &FleetConfig, executor: Arc<dyn HostExecutor>) -> Result<Self> {
        let builder: Arc<dyn LocalBuilder> = Arc::new(ShellBuilder::from_config(&config.build));
        let orchestrator = Orchestrator::new(executor.clone(), builder, DeployPlan::from_config(config)?);
        let stats = StatsCollector::from_config(executor, &config.stats)?;
        Ok(Self::new(orchestrator, stats))
    }

    /// 顺序执行动作
    ///
    /// 只读动作（status、stats）失败不会中断后续动作，在全部动作结束后返回；
    /// 其它动作的错误立即返回。
    pub async fn run<W: Write>(
        &self,
        actions: &[Action],
        hosts: &HostSet,
        out: &mut W,
    ) -> Result<()> {
        let mut ctx = RunContext::new();
        let mut deferred: Option<DeployError> = None;

        info!(
            run_id = %ctx.run_id(),
            actions = %actions.iter().map(Action::as_str).collect::<Vec<_>>().join(","),
            hosts = hosts.len(),
            "Starting run"
        );

        for action in actions {
            if hosts.is_empty() && matches!(action, Action::Copy | Action::Restart | Action::Status)
            {
                warn!(action = %action, "No target hosts, nothing to do");
            }

            match action {
                Action::Build => self.orchestrator.build(&mut ctx).await?,
                Action::Copy => self.orchestrator.copy(hosts).await?,
                Action::Restart => self.orchestrator.restart(hosts).await?,
                Action::Deploy => self.orchestrator.deploy(&mut ctx, hosts).await?,
                Action::Stats => match self.stats.collect(&StatKey::ALL).await {
                    Ok(report) => report.render(out)?,
                    Err(e) => {
                        error!(error = %e, "Stats report skipped");
                        defer(&mut deferred, e);
                    }
                },
                Action::Status => {
                    if let Err(e) = self.orchestrator.status(hosts, out).await {
                        defer(&mut deferred, e);
                    }
                }
            }
        }

        match deferred {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// 只保留第一个失败
fn defer(deferred: &mut Option<DeployError>, e: DeployError) {
    if deferred.is_none() {
        *deferred = Some(e);
    }
}
