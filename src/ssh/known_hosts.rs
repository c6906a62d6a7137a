//! known_hosts 解析与主机密钥指纹

use base64::Engine;
use sha2::Digest;
use std::collections::HashMap;
use std::path::Path;
use tracing::{error, info, warn};

/// 计算 SSH 公钥（原始字节）的 SHA256 十六进制指纹
pub fn fingerprint(key_bytes: &[u8]) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(key_bytes);
    hex::encode(hasher.finalize())
}

/// 解析 OpenSSH known_hosts 内容，返回 主机名 -> 指纹
///
/// 跳过注释、哈希过的主机名（`|1|...`）与 `@cert-authority` 等标记行。
pub fn parse_known_hosts(content: &str) -> HashMap<String, String> {
    let mut known_hosts = HashMap::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('@') {
            continue;
        }

        // 格式: host patterns, key type, base64 public key [comment]
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            continue;
        }

        let key_bytes = match base64::engine::general_purpose::STANDARD.decode(parts[2]) {
            Ok(bytes) => bytes,
            Err(_) => continue,
        };
        let hash = fingerprint(&key_bytes);

        for pattern in parts[0].split(',') {
            if pattern.starts_with('|') || pattern.is_empty() {
                continue;
            }
            known_hosts.insert(pattern.to_string(), hash.clone());
        }
    }

    known_hosts
}

/// 从文件加载 known_hosts；读取失败时返回 None
pub async fn load_known_hosts_file(path: &Path) -> Option<HashMap<String, String>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            error!(error = %e, path = %path.display(), "Failed to read known_hosts file");
            return None;
        }
    };

    let known_hosts = parse_known_hosts(&content);
    if known_hosts.is_empty() {
        warn!(path = %path.display(), "No valid entries found in known_hosts file");
    } else {
        info!(path = %path.display(), count = known_hosts.len(), "Loaded known_hosts");
    }

    Some(known_hosts)
}
