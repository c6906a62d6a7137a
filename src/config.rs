//! 配置系统
//! 默认值 -> 可选配置文件 -> `FLEET_` 前缀环境变量，敏感信息使用 Secret 包装

use config::{Config, ConfigError, Environment, File};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use common::{HostKeyVerification, SshAuth, SshConfig};

use crate::models::{Host, HostSet};

#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
    /// 本地构建命令，通过 `sh -c` 执行
    pub command: String,
    /// 构建工作目录
    pub workdir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactConfig {
    /// 构建产物的本地路径（相对路径基于构建工作目录）
    pub local_path: PathBuf,
    /// 远程安装路径
    pub remote_path: String,
    /// 安装后的文件权限，八进制字符串，例如 "0755"
    pub mode: String,
}

impl ArtifactConfig {
    /// 解析八进制权限位
    pub fn mode_bits(&self) -> Result<u32, ConfigError> {
        let raw = self.mode.trim();
        let digits = raw.strip_prefix("0o").unwrap_or(raw);
        u32::from_str_radix(digits, 8)
            .ok()
            .filter(|bits| *bits <= 0o7777)
            .ok_or_else(|| ConfigError::Message(format!("Invalid artifact mode: {}", self.mode)))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServicesConfig {
    /// systemd 单元名模板，`{}` 替换为服务名
    pub unit_template: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SshSettings {
    /// 默认 SSH 用户名
    pub username: String,
    /// 默认端口
    pub port: u16,
    /// SSH 密码（使用 Secret 包装，防止日志泄露）
    #[serde(default)]
    pub password: Option<Secret<String>>,
    /// 私钥文件路径；配置后优先于密码认证
    #[serde(default)]
    pub private_key: Option<PathBuf>,
    /// 私钥密码
    #[serde(default)]
    pub private_key_passphrase: Option<Secret<String>>,
    /// sudo 密码；未配置时要求免密 sudo
    #[serde(default)]
    pub sudo_password: Option<Secret<String>>,
    /// 连接超时（秒）
    pub connect_timeout_secs: u64,
    /// 握手超时（秒）
    pub handshake_timeout_secs: u64,
    /// 命令执行超时（秒）
    pub command_timeout_secs: u64,
    /// 主机密钥验证策略（strict/accept/disabled）
    pub host_key_verification: HostKeyVerification,
    /// known_hosts 文件路径（可选）
    #[serde(default)]
    pub known_hosts_file: Option<PathBuf>,
}

impl SshSettings {
    fn to_auth(&self) -> SshAuth {
        match &self.private_key {
            Some(key_path) => SshAuth::Key {
                key_path: key_path.clone(),
                passphrase: self
                    .private_key_passphrase
                    .as_ref()
                    .map(|p| p.expose_secret().clone()),
            },
            None => SshAuth::Password {
                password: self
                    .password
                    .as_ref()
                    .map(|p| p.expose_secret().clone())
                    .unwrap_or_default(),
            },
        }
    }

    /// 为指定主机生成连接配置：主机级用户/端口优先于全局默认
    pub fn for_host(&self, host: &Host, known_hosts: Option<HashMap<String, String>>) -> SshConfig {
        SshConfig::new(
            host.address.clone(),
            host.user.clone().unwrap_or_else(|| self.username.clone()),
            self.to_auth(),
        )
        .with_port(host.port.unwrap_or(self.port))
        .with_sudo_password(self.sudo_password.as_ref().map(|p| p.expose_secret().clone()))
        .with_connect_timeout(self.connect_timeout_secs)
        .with_handshake_timeout(self.handshake_timeout_secs)
        .with_command_timeout(self.command_timeout_secs)
        .with_host_key_verification(self.host_key_verification.clone())
        .with_known_hosts(known_hosts)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsConfig {
    /// 执行计数器查询的主机
    pub host: String,
    /// 查询命令前缀，键名追加在末尾
    pub command: String,
    /// 键名前缀
    #[serde(default)]
    pub key_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: compact, pretty, json
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FleetConfig {
    pub build: BuildConfig,
    pub artifact: ArtifactConfig,
    pub services: ServicesConfig,
    pub ssh: SshSettings,
    pub stats: StatsConfig,
    pub logging: LoggingConfig,
    /// 未通过命令行指定时使用的默认主机列表
    #[serde(default)]
    pub hosts: Vec<String>,
}

impl FleetConfig {
    /// 仅从默认值与环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// 加载配置：默认值 -> 配置文件（可选）-> 环境变量
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            .set_default("build.command", "go build -o downloader")?
            .set_default("build.workdir", ".")?
            .set_default("artifact.local_path", "downloader")?
            .set_default("artifact.remote_path", "/usr/local/lib/downloader/bin")?
            .set_default("artifact.mode", "0755")?
            .set_default("services.unit_template", "downloader@{}.service")?
            // SSH 默认配置
            .set_default("ssh.username", "root")?
            .set_default("ssh.port", 22)?
            .set_default("ssh.connect_timeout_secs", 10)?
            .set_default("ssh.handshake_timeout_secs", 10)?
            .set_default("ssh.command_timeout_secs", 300)?
            .set_default("ssh.host_key_verification", "accept")?
            // 计数器存储
            .set_default("stats.host", "localhost")?
            .set_default("stats.command", "redis-cli get")?
            .set_default("stats.key_prefix", "")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "compact")?;

        if let Some(path) = file {
            settings = settings.add_source(File::from(path).required(true));
        }

        // 环境变量（前缀为 FLEET_，层级分隔符为 __）
        settings = settings.add_source(
            Environment::with_prefix("FLEET")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("hosts")
                .try_parsing(true),
        );

        let config: FleetConfig = settings.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.build.command.trim().is_empty() {
            return Err(ConfigError::Message("build.command must not be empty".to_string()));
        }
        if !self.services.unit_template.contains("{}") {
            return Err(ConfigError::Message(
                "services.unit_template must contain '{}'".to_string(),
            ));
        }
        if self.artifact.remote_path.trim().is_empty() {
            return Err(ConfigError::Message("artifact.remote_path must not be empty".to_string()));
        }
        self.artifact.mode_bits()?;
        if self.stats.command.trim().is_empty() {
            return Err(ConfigError::Message("stats.command must not be empty".to_string()));
        }
        Ok(())
    }

    /// 本次运行的目标主机：命令行给出时使用命令行，否则使用配置中的 `hosts`
    ///
    /// 按合并 SSH 默认用户与端口后的连接目标去重。
    pub fn target_hosts(&self, cli_hosts: &[String]) -> crate::error::Result<HostSet> {
        let hosts = if cli_hosts.is_empty() {
            HostSet::parse(&self.hosts)?
        } else {
            HostSet::parse(cli_hosts)?
        };
        Ok(hosts.dedup_by_target(&self.ssh.username, self.ssh.port))
    }

    /// 构建产物的本地路径（相对路径基于构建工作目录）
    pub fn artifact_path(&self) -> PathBuf {
        if self.artifact.local_path.is_absolute() {
            self.artifact.local_path.clone()
        } else {
            self.build.workdir.join(&self.artifact.local_path)
        }
    }
}

/// 加载 .env 文件：FLEET_ENV 指定时只加载 `.env.{FLEET_ENV}`
pub fn load_dotenv() {
    if let Ok(env) = std::env::var("FLEET_ENV") {
        dotenv::from_filename(format!(".env.{}", env)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::from_filename(".env.development").ok();
        dotenv::dotenv().ok();
    }
}
