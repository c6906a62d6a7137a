//! SSH 连接配置模型
//!
//! 每次远程调用都显式携带一个 `SshConfig`，不存在隐式的"当前主机"

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// 主机密钥验证策略
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyVerification {
    /// 严格模式：只接受已知的主机密钥
    Strict,
    /// 接受模式：已知主机必须匹配，未知主机首次接受
    #[default]
    Accept,
    /// 禁用验证（不安全，仅用于开发/测试）
    Disabled,
}

impl std::str::FromStr for HostKeyVerification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "accept" => Ok(Self::Accept),
            "disabled" | "none" | "false" => Ok(Self::Disabled),
            _ => Err(format!("Unknown host key verification mode: {}", s)),
        }
    }
}

/// SSH 认证方式
#[derive(Debug, Clone)]
pub enum SshAuth {
    /// 密码认证
    Password { password: String },
    /// 私钥认证
    Key {
        /// 私钥文件路径（OpenSSH/PEM 格式）
        key_path: PathBuf,
        /// 私钥密码（如果有）
        passphrase: Option<String>,
    },
}

/// 单台主机的 SSH 连接配置
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// 主机地址
    pub host: String,

    /// 端口
    pub port: u16,

    /// 用户名
    pub username: String,

    /// 认证方式
    pub auth: SshAuth,

    /// sudo 密码；为空时使用 `sudo -n`
    pub sudo_password: Option<String>,

    /// 连接超时（秒）
    pub connect_timeout_secs: u64,

    /// 握手超时（秒）
    pub handshake_timeout_secs: u64,

    /// 单条命令超时（秒）
    pub command_timeout_secs: u64,

    /// 主机密钥验证策略
    pub host_key_verification: HostKeyVerification,

    /// 已知主机指纹：known_hosts 主机名 -> SHA256 十六进制指纹
    pub known_hosts: Option<HashMap<String, String>>,
}

pub fn default_ssh_port() -> u16 {
    22
}

pub fn default_connect_timeout() -> u64 {
    10
}

pub fn default_command_timeout() -> u64 {
    300
}

impl SshConfig {
    /// 创建新的 SSH 配置
    pub fn new(host: String, username: String, auth: SshAuth) -> Self {
        Self {
            host,
            port: default_ssh_port(),
            username,
            auth,
            sudo_password: None,
            connect_timeout_secs: default_connect_timeout(),
            handshake_timeout_secs: default_connect_timeout(),
            command_timeout_secs: default_command_timeout(),
            host_key_verification: HostKeyVerification::default(),
            known_hosts: None,
        }
    }

    /// 创建使用密码认证的配置
    pub fn with_password(host: String, username: String, password: String) -> Self {
        Self::new(host, username, SshAuth::Password { password })
    }

    /// 创建使用私钥认证的配置
    pub fn with_key(
        host: String,
        username: String,
        key_path: PathBuf,
        passphrase: Option<String>,
    ) -> Self {
        Self::new(
            host,
            username,
            SshAuth::Key {
                key_path,
                passphrase,
            },
        )
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_sudo_password(mut self, password: Option<String>) -> Self {
        self.sudo_password = password;
        self
    }

    pub fn with_connect_timeout(mut self, timeout_secs: u64) -> Self {
        self.connect_timeout_secs = timeout_secs;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout_secs: u64) -> Self {
        self.handshake_timeout_secs = timeout_secs;
        self
    }

    pub fn with_command_timeout(mut self, timeout_secs: u64) -> Self {
        self.command_timeout_secs = timeout_secs;
        self
    }

    pub fn with_host_key_verification(mut self, verification: HostKeyVerification) -> Self {
        self.host_key_verification = verification;
        self
    }

    pub fn with_known_hosts(mut self, known_hosts: Option<HashMap<String, String>>) -> Self {
        self.known_hosts = known_hosts;
        self
    }

    /// 获取目标地址字符串
    pub fn target(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }

    /// known_hosts 中使用的主机名（非 22 端口为 `[host]:port`）
    pub fn known_hosts_key(&self) -> String {
        if self.port == default_ssh_port() {
            self.host.clone()
        } else {
            format!("[{}]:{}", self.host, self.port)
        }
    }
}
