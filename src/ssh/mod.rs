//! SSH执行模块
//! 远程命令执行、文件传输与主机密钥校验

pub mod executor;
pub mod known_hosts;
pub mod remote;

pub use executor::{SSHClient, SshConnection};
pub use remote::SshHostExecutor;
