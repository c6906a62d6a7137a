//! 测试公共模块
//! 提供记录调用的远程执行器与本地构建器

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ::common::ExecutionResult;
use fleet_deploy::{
    builder::LocalBuilder,
    dispatcher::Dispatcher,
    error::{DeployError, Result},
    executor::HostExecutor,
    models::{Host, HostSet},
    services::{DeployPlan, Orchestrator, StatsCollector},
};

/// 被记录的一次调用
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Build,
    Run {
        host: String,
        command: String,
    },
    Sudo {
        host: String,
        command: String,
    },
    Put {
        host: String,
        local_path: PathBuf,
        remote_path: String,
        mode: u32,
        elevate: bool,
    },
}

impl Call {
    pub fn host(&self) -> Option<&str> {
        match self {
            Call::Build => None,
            Call::Run { host, .. } | Call::Sudo { host, .. } | Call::Put { host, .. } => Some(host),
        }
    }
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

/// 记录所有调用的远程执行器，可按主机与命令注入失败
#[derive(Default)]
pub struct MockExecutor {
    log: CallLog,
    command_failures: Mutex<Vec<(String, String)>>,
    put_failures: Mutex<Vec<String>>,
    responses: Mutex<Vec<(String, String)>>,
}

impl MockExecutor {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    /// 主机上包含 `pattern` 的命令以退出码 1 失败
    pub fn fail_command(&self, host: &str, pattern: &str) {
        self.command_failures
            .lock()
            .unwrap()
            .push((host.to_string(), pattern.to_string()));
    }

    /// 主机上的文件传输失败
    pub fn fail_put(&self, host: &str) {
        self.put_failures.lock().unwrap().push(host.to_string());
    }

    /// 包含 `pattern` 的命令返回 `stdout`
    pub fn respond(&self, pattern: &str, stdout: &str) {
        self.responses
            .lock()
            .unwrap()
            .push((pattern.to_string(), stdout.to_string()));
    }

    fn execute(&self, host: &Host, command: &str) -> Result<String> {
        let host = host.to_string();
        let fails = self
            .command_failures
            .lock()
            .unwrap()
            .iter()
            .any(|(h, pattern)| *h == host && command.contains(pattern.as_str()));
        if fails {
            return Err(DeployError::RemoteCommandFailure {
                host,
                command: command.to_string(),
                exit_code: 1,
                stdout: format!("{} failed output", command),
                stderr: "boom".to_string(),
            });
        }

        Ok(self
            .responses
            .lock()
            .unwrap()
            .iter()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
            .map(|(_, stdout)| stdout.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl HostExecutor for MockExecutor {
    async fn run(&self, host: &Host, command: &str) -> Result<String> {
        self.log.lock().unwrap().push(Call::Run {
            host: host.to_string(),
            command: command.to_string(),
        });
        self.execute(host, command)
    }

    async fn sudo(&self, host: &Host, command: &str) -> Result<String> {
        self.log.lock().unwrap().push(Call::Sudo {
            host: host.to_string(),
            command: command.to_string(),
        });
        self.execute(host, command)
    }

    async fn put(
        &self,
        host: &Host,
        local_path: &Path,
        remote_path: &str,
        mode: u32,
        elevate: bool,
    ) -> Result<()> {
        self.log.lock().unwrap().push(Call::Put {
            host: host.to_string(),
            local_path: local_path.to_path_buf(),
            remote_path: remote_path.to_string(),
            mode,
            elevate,
        });
        if self.put_failures.lock().unwrap().contains(&host.to_string()) {
            return Err(DeployError::RemoteTransferFailure {
                host: host.to_string(),
                remote_path: remote_path.to_string(),
                reason: "connection reset".to_string(),
            });
        }
        Ok(())
    }
}

/// 记录构建次数的本地构建器
pub struct MockBuilder {
    log: CallLog,
    fail: bool,
}

impl MockBuilder {
    pub fn new(log: CallLog) -> Self {
        Self { log, fail: false }
    }

    pub fn failing(log: CallLog) -> Self {
        Self { log, fail: true }
    }
}

#[async_trait]
impl LocalBuilder for MockBuilder {
    async fn build(&self) -> Result<ExecutionResult> {
        self.log.lock().unwrap().push(Call::Build);
        if self.fail {
            return Err(DeployError::BuildFailure {
                exit_code: Some(2),
                stderr: "undefined: main".to_string(),
            });
        }
        Ok(ExecutionResult::success(String::new(), 0.0))
    }
}

/// 测试用部署计划
pub fn test_plan() -> DeployPlan {
    DeployPlan {
        artifact_path: PathBuf::from("/src/downloader"),
        remote_path: "/usr/local/lib/downloader/bin".to_string(),
        mode: 0o755,
        unit_template: "downloader@{}.service".to_string(),
    }
}

/// 测试装置：共享调用记录的执行器、构建器、编排器与分发器
pub struct Harness {
    pub log: CallLog,
    pub executor: Arc<MockExecutor>,
    pub orchestrator: Orchestrator,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_builder(MockBuilder::new)
    }

    pub fn failing_build() -> Self {
        Self::with_builder(MockBuilder::failing)
    }

    fn with_builder(make: impl FnOnce(CallLog) -> MockBuilder) -> Self {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let executor = Arc::new(MockExecutor::new(log.clone()));
        let builder = Arc::new(make(log.clone()));
        let orchestrator = Orchestrator::new(executor.clone(), builder, test_plan());
        Self {
            log,
            executor,
            orchestrator,
        }
    }

    /// 基于同一执行器再组装一个分发器
    pub fn dispatcher(&self, key_prefix: &str) -> Dispatcher {
        let log = self.log.clone();
        let builder = Arc::new(MockBuilder::new(log));
        let orchestrator = Orchestrator::new(self.executor.clone(), builder, test_plan());
        let stats = StatsCollector::new(
            self.executor.clone(),
            Host::new("localhost"),
            "redis-cli get",
            key_prefix,
        );
        Dispatcher::new(orchestrator, stats)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.lock().unwrap().clone()
    }

    pub fn builds(&self) -> usize {
        self.calls().iter().filter(|c| **c == Call::Build).count()
    }

    /// 涉及某主机的所有调用
    pub fn calls_for(&self, host: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.host() == Some(host))
            .collect()
    }
}

pub fn hosts(specs: &[&str]) -> HostSet {
    HostSet::parse(specs).unwrap()
}

/// 一台主机完整部署后预期的调用序列
pub fn deployed(host: &str) -> Vec<Call> {
    let mut calls = vec![Call::Put {
        host: host.to_string(),
        local_path: PathBuf::from("/src/downloader"),
        remote_path: "/usr/local/lib/downloader/bin".to_string(),
        mode: 0o755,
        elevate: true,
    }];
    for service in ["api", "processor", "notifier"] {
        calls.push(Call::Sudo {
            host: host.to_string(),
            command: format!("systemctl restart downloader@{}.service", service),
        });
    }
    calls
}
