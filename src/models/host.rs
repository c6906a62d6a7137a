//! 目标主机模型

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::DeployError;

/// 单台目标主机：`[user@]address[:port]`
///
/// 未指定的用户与端口在建立连接时回退到全局 SSH 配置
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Host {
    pub address: String,
    pub user: Option<String>,
    pub port: Option<u16>,
}

impl Host {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            user: None,
            port: None,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// 实际连接目标 `user@address:port`，未指定的部分取默认值；主机名不区分大小写
    pub fn resolved_target(&self, default_user: &str, default_port: u16) -> String {
        format!(
            "{}@{}:{}",
            self.user.as_deref().unwrap_or(default_user),
            self.address.to_ascii_lowercase(),
            self.port.unwrap_or(default_port)
        )
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(user) = &self.user {
            write!(f, "{}@", user)?;
        }
        write!(f, "{}", self.address)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        Ok(())
    }
}

impl FromStr for Host {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let spec = s.trim();
        let (user, rest) = match spec.split_once('@') {
            Some((user, rest)) => (Some(user), rest),
            None => (None, spec),
        };
        let (address, port) = match rest.rsplit_once(':') {
            Some((address, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| DeployError::config(format!("Invalid port in host '{}'", s)))?;
                (address, Some(port))
            }
            None => (rest, None),
        };

        if address.is_empty() {
            return Err(DeployError::config(format!("Empty address in host '{}'", s)));
        }
        if matches!(user, Some("")) {
            return Err(DeployError::config(format!("Empty user in host '{}'", s)));
        }

        Ok(Host {
            address: address.to_string(),
            user: user.map(str::to_string),
            port,
        })
    }
}

/// 一次运行的目标主机集合：保持给定顺序，去重保留首次出现
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostSet {
    hosts: Vec<Host>,
}

impl HostSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从主机描述列表构造；每项可以是逗号分隔的多个主机
    pub fn parse<I, S>(specs: I) -> Result<Self, DeployError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = HostSet::new();
        for spec in specs {
            for part in spec.as_ref().split(',') {
                if part.trim().is_empty() {
                    continue;
                }
                set.insert(part.parse()?);
            }
        }
        Ok(set)
    }

    /// 插入主机；已存在时忽略并返回 false
    pub fn insert(&mut self, host: Host) -> bool {
        if self.hosts.contains(&host) {
            return false;
        }
        self.hosts.push(host);
        true
    }

    /// 按实际连接目标去重，保留每个目标第一次出现的写法
    pub fn dedup_by_target(self, default_user: &str, default_port: u16) -> HostSet {
        let mut seen = HashSet::new();
        let hosts = self
            .hosts
            .into_iter()
            .filter(|host| seen.insert(host.resolved_target(default_user, default_port)))
            .collect();
        HostSet { hosts }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Host> {
        self.hosts.iter()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

impl FromIterator<Host> for HostSet {
    fn from_iter<T: IntoIterator<Item = Host>>(iter: T) -> Self {
        let mut set = HostSet::new();
        for host in iter {
            set.insert(host);
        }
        set
    }
}

impl<'a> IntoIterator for &'a HostSet {
    type Item = &'a Host;
    type IntoIter = std::slice::Iter<'a, Host>;

    fn into_iter(self) -> Self::IntoIter {
        self.hosts.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_host() {
        let host: Host = "dl1".parse().unwrap();
        assert_eq!(host, Host::new("dl1"));
        assert_eq!(host.to_string(), "dl1");
    }

    #[test]
    fn test_parse_user_and_port() {
        let host: Host = " deploy@dl2.example.com:2222 ".parse().unwrap();
        assert_eq!(host.address, "dl2.example.com");
        assert_eq!(host.user.as_deref(), Some("deploy"));
        assert_eq!(host.port, Some(2222));
        assert_eq!(host.to_string(), "deploy@dl2.example.com:2222");
    }

    #[test]
    fn test_parse_rejects_bad_specs() {
        assert!("dl1:notaport".parse::<Host>().is_err());
        assert!("@dl1".parse::<Host>().is_err());
        assert!("deploy@".parse::<Host>().is_err());
        assert!(":22".parse::<Host>().is_err());
    }

    #[test]
    fn test_host_set_keeps_order_and_dedupes() {
        let set = HostSet::parse(["dl2,dl1", "dl2", " ,dl3"]).unwrap();
        let names: Vec<String> = set.iter().map(Host::to_string).collect();
        assert_eq!(names, vec!["dl2", "dl1", "dl3"]);
    }

    #[test]
    fn test_host_set_distinguishes_ports() {
        let set = HostSet::parse(["dl1", "dl1:2222"]).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_dedup_by_target_merges_default_spellings() {
        let set = HostSet::parse(["dl1", "root@dl1", "dl1:22", "DL1", "deploy@dl1", "dl1:2222"])
            .unwrap()
            .dedup_by_target("root", 22);
        let names: Vec<String> = set.iter().map(Host::to_string).collect();
        assert_eq!(names, vec!["dl1", "deploy@dl1", "dl1:2222"]);
    }

    #[test]
    fn test_resolved_target() {
        let host: Host = "dl1:2200".parse().unwrap();
        assert_eq!(host.resolved_target("root", 22), "root@dl1:2200");
        assert_eq!(Host::new("Dl2").resolved_target("deploy", 22), "deploy@dl2:22");
    }

    #[test]
    fn test_empty_host_set() {
        let set = HostSet::parse(Vec::<String>::new()).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_from_iterator_dedupes() {
        let set: HostSet = vec![Host::new("a"), Host::new("b"), Host::new("a")]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
    }
}
