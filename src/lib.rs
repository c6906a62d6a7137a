//! 下载服务集群部署工具
//! 本地构建、分发产物、重启服务、查询状态与计数器统计

pub mod builder;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod models;
pub mod services;
pub mod ssh;
pub mod telemetry;
