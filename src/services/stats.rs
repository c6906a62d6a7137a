//! 计数器统计
//!
//! 计数器存储中每个键保存的是"JSON 字符串形式的 JSON 对象"，
//! 因此需要先解出外层字符串，再把内容解析为对象。

use serde_json::{Map, Value};
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::StatsConfig;
use crate::error::{DeployError, Result};
use crate::executor::HostExecutor;
use crate::models::{Host, StatKey, StatRow};
use crate::ssh::remote::quote;

/// 解码一个键的原始查询输出，行顺序与对象的字段顺序一致
pub fn decode_payload(key: &str, raw: &str) -> Result<Vec<StatRow>> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "(nil)" {
        return Err(DeployError::stats_decode(key, "no value stored"));
    }

    let inner: String = serde_json::from_str(raw)
        .map_err(|e| DeployError::stats_decode(key, format!("expected a JSON string: {}", e)))?;
    let object: Map<String, Value> = serde_json::from_str(&inner)
        .map_err(|e| DeployError::stats_decode(key, format!("expected a JSON object: {}", e)))?;

    Ok(object
        .into_iter()
        .map(|(name, value)| StatRow::new(name, value))
        .collect())
}

/// 所有键的统计结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsReport {
    groups: Vec<(StatKey, Vec<StatRow>)>,
}

impl StatsReport {
    pub fn push(&mut self, key: StatKey, rows: Vec<StatRow>) {
        self.groups.push((key, rows));
    }

    pub fn groups(&self) -> &[(StatKey, Vec<StatRow>)] {
        &self.groups
    }

    /// 按键顺序展开的所有行
    pub fn rows(&self) -> impl Iterator<Item = &StatRow> {
        self.groups.iter().flat_map(|(_, rows)| rows.iter())
    }

    /// 每行一个指标，两列右对齐
    pub fn render<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        for row in self.rows() {
            writeln!(out, "{}", row)?;
        }
        out.flush()
    }
}

/// 从计数器存储读取统计
pub struct StatsCollector {
    executor: Arc<dyn HostExecutor>,
    host: Host,
    command: String,
    key_prefix: String,
}

impl StatsCollector {
    pub fn new(
        executor: Arc<dyn HostExecutor>,
        host: Host,
        command: impl Into<String>,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            host,
            command: command.into(),
            key_prefix: key_prefix.into(),
        }
    }

    pub fn from_config(executor: Arc<dyn HostExecutor>, config: &StatsConfig) -> Result<Self> {
        let host: Host = config.host.parse()?;
        Ok(Self::new(
            executor,
            host,
            config.command.clone(),
            config.key_prefix.clone(),
        ))
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    /// 读取单个键的命令
    pub fn query_command(&self, key: StatKey) -> String {
        let full_key = format!("{}{}", self.key_prefix, key.as_str());
        format!("{} {}", self.command, quote(&full_key))
    }

    /// 依次读取并解码所有键；任何一个键失败则整体失败
    pub async fn collect(&self, keys: &[StatKey]) -> Result<StatsReport> {
        let mut report = StatsReport::default();

        for key in keys {
            let command = self.query_command(*key);
            debug!(host = %self.host, key = %key, "Querying counter store");

            let raw = self.executor.run(&self.host, &command).await?;
            let rows = decode_payload(key.as_str(), &raw).map_err(|e| {
                error!(key = %key, error = %e, "Failed to decode stats payload");
                e
            })?;
            report.push(*key, rows);
        }

        info!(host = %self.host, keys = keys.len(), rows = report.rows().count(), "Stats collected");
        Ok(report)
    }
}
