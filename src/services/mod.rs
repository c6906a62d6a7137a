//! 部署编排与统计服务

pub mod orchestrator;
pub mod stats;

pub use orchestrator::{DeployPlan, Orchestrator, RunContext};
pub use stats::{decode_payload, StatsCollector, StatsReport};
