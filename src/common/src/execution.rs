//! 命令执行结果
//!
//! 远程命令与本地构建共用

/// 超时退出码，与 coreutils `timeout` 一致
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// 一条命令结束后的退出码、输出与耗时
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_secs: f64,
    /// 命令在截止时间前没有结束
    pub timed_out: bool,
}

impl ExecutionResult {
    /// 命令正常结束（退出码可以非零）
    pub fn new(exit_code: i32, stdout: String, stderr: String, duration_secs: f64) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            duration_secs,
            timed_out: false,
        }
    }

    pub fn success(stdout: String, duration_secs: f64) -> Self {
        Self::new(0, stdout, String::new(), duration_secs)
    }

    /// 超时结果，保留截止前收到的输出
    pub fn timeout(stdout: String, stderr: String, duration_secs: f64) -> Self {
        Self {
            timed_out: true,
            ..Self::new(TIMEOUT_EXIT_CODE, stdout, stderr, duration_secs)
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// stdout 与 stderr 合并后的文本
    pub fn full_output(&self) -> String {
        let stdout = self.stdout.trim_end();
        let stderr = self.stderr.trim_end();
        match (stdout.is_empty(), stderr.is_empty()) {
            (_, true) => stdout.trim_start().to_string(),
            (true, false) => stderr.trim_start().to_string(),
            (false, false) => format!("{}\n{}", stdout.trim_start(), stderr),
        }
    }

    /// 截断到 `max_len` 个字符，用于错误信息
    pub fn output_summary(&self, max_len: usize) -> String {
        let full = self.full_output();
        match full.char_indices().nth(max_len) {
            Some((cut, _)) => format!("{}...", &full[..cut]),
            None => full,
        }
    }
}
