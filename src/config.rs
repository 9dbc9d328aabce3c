//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `AI_PLAYER__*` 覆盖（双下划线表示嵌套，如 `AI_PLAYER__INTERACTION__MAX_TURNS=10`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::core::RetryPolicy;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub interaction: InteractionSection,
    #[serde(default)]
    pub archive: ArchiveSection,
}

/// [interaction] 段：单次 think 的轮数上限与传输重试
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct InteractionSection {
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    /// 单次传输尝试超时（秒），退避睡眠计入其中
    #[serde(default = "default_transport_timeout_secs")]
    pub transport_timeout_secs: u64,
    #[serde(default = "default_max_transport_retries")]
    pub max_transport_retries: u32,
    #[serde(default = "default_interaction_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_interaction_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
}

fn default_max_turns() -> usize {
    20
}

fn default_transport_timeout_secs() -> u64 {
    45
}

fn default_max_transport_retries() -> u32 {
    3
}

fn default_interaction_backoff_base_ms() -> u64 {
    100
}

fn default_interaction_backoff_cap_ms() -> u64 {
    2000
}

impl Default for InteractionSection {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            transport_timeout_secs: default_transport_timeout_secs(),
            max_transport_retries: default_max_transport_retries(),
            backoff_base_ms: default_interaction_backoff_base_ms(),
            backoff_cap_ms: default_interaction_backoff_cap_ms(),
        }
    }
}

impl InteractionSection {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_transport_retries,
            attempt_timeout: Duration::from_secs(self.transport_timeout_secs),
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            backoff_cap: Duration::from_millis(self.backoff_cap_ms),
        }
    }
}

/// [archive] 段：历史归档触发阈值与归档调用重试
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ArchiveSection {
    /// 历史少于该轮数时不归档
    #[serde(default = "default_min_history")]
    pub min_history: usize,
    /// 归档后至少保留的最近轮数
    #[serde(default = "default_retain_turns")]
    pub retain_turns: usize,
    #[serde(default = "default_archive_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_archive_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_archive_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_archive_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
}

fn default_min_history() -> usize {
    30
}

fn default_retain_turns() -> usize {
    15
}

fn default_archive_timeout_secs() -> u64 {
    120
}

fn default_archive_max_retries() -> u32 {
    3
}

fn default_archive_backoff_base_ms() -> u64 {
    500
}

fn default_archive_backoff_cap_ms() -> u64 {
    5000
}

impl Default for ArchiveSection {
    fn default() -> Self {
        Self {
            min_history: default_min_history(),
            retain_turns: default_retain_turns(),
            timeout_secs: default_archive_timeout_secs(),
            max_retries: default_archive_max_retries(),
            backoff_base_ms: default_archive_backoff_base_ms(),
            backoff_cap_ms: default_archive_backoff_cap_ms(),
        }
    }
}

impl ArchiveSection {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            attempt_timeout: Duration::from_secs(self.timeout_secs),
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            backoff_cap: Duration::from_millis(self.backoff_cap_ms),
        }
    }
}

const ENV_PREFIX: &str = "AI_PLAYER";

/// 工作目录下可选的默认配置文件（按优先级）
const DEFAULT_CONFIG_FILES: [&str; 3] = ["config/default.toml", "../config/default.toml", "default.toml"];

/// 加载 AppConfig，三层来源依次覆盖：
/// 默认配置文件（取第一个存在的）< 显式指定的文件 < `AI_PLAYER__<段>__<键>` 环境变量。
/// 文件缺失不报错，缺失的键取内置默认值。
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let default_file = DEFAULT_CONFIG_FILES
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists());
    let explicit_file = config_path.filter(|path| path.exists());

    let mut builder = config::Config::builder();
    for path in default_file.into_iter().chain(explicit_file) {
        tracing::debug!(path = %path.display(), "loading config file");
        builder = builder.add_source(config::File::from(path).required(false));
    }

    builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}

/// 按默认来源再读一次；已运行的 EngineContext 保持旧参数，需要时由调用方用新配置重建
pub fn reload_config() -> Result<AppConfig, config::ConfigError> {
    load_config(None)
}
