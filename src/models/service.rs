//! 受管服务与计数器统计模型

use serde_json::Value;
use std::fmt;

/// 部署后需要重启的服务，固定集合、固定顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceName {
    Api,
    Processor,
    Notifier,
}

impl ServiceName {
    /// 重启顺序
    pub const ALL: [ServiceName; 3] = [ServiceName::Api, ServiceName::Processor, ServiceName::Notifier];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceName::Api => "api",
            ServiceName::Processor => "processor",
            ServiceName::Notifier => "notifier",
        }
    }

    /// 按模板生成 systemd 单元名，模板中的 `{}` 替换为服务名
    pub fn unit(&self, template: &str) -> String {
        template.replace("{}", self.as_str())
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 计数器存储中的统计键，固定集合、固定顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatKey {
    Processor,
    Notifier,
}

impl StatKey {
    pub const ALL: [StatKey; 2] = [StatKey::Processor, StatKey::Notifier];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatKey::Processor => "processor",
            StatKey::Notifier => "notifier",
        }
    }
}

impl fmt::Display for StatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 统计报告中的一行：指标名与原样输出的值
#[derive(Debug, Clone, PartialEq)]
pub struct StatRow {
    pub name: String,
    pub value: Value,
}

impl StatRow {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// 值的文本形式：字符串不带引号，其余按 JSON 输出
    pub fn value_text(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for StatRow {
    /// 两列右对齐，宽度 30 / 10
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>30}{:>10}", self.name, self.value_text())
    }
}
