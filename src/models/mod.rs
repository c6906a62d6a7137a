//! 数据模型模块
//! 目标主机、受管服务与统计键

pub mod host;
pub mod service;

pub use host::{Host, HostSet};
pub use service::{ServiceName, StatKey, StatRow};
