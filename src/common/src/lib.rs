//! fleet-deploy 与 SSH 传输层共享的类型

pub mod execution;
pub mod ssh;

pub use execution::ExecutionResult;
pub use ssh::{HostKeyVerification, SshAuth, SshConfig};
