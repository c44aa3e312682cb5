//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存系统的配置结构和解析逻辑。

use crate::error::{CacheError, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_VERSION: u32 = 1;

/// 未设置时使用的加锁超时（毫秒）
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 3000;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub config_version: Option<u32>,
    #[serde(default)]
    pub cache: CacheConfig,
    /// 以Redis作为L2的连接配置（可选）
    #[serde(default)]
    pub l2: Option<RedisTierConfig>,
    /// 以Redis作为L3的连接配置（可选）
    #[serde(default)]
    pub l3: Option<RedisTierConfig>,
}

/// 协调器配置
///
/// 定义重试次数、加锁超时以及L1本地缓存的行为
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct CacheConfig {
    /// 服务名称，用于日志和指标标签
    pub service_name: String,
    /// 后端读写的尝试次数
    pub retry: u32,
    /// 默认加锁超时（毫秒）
    pub lock_timeout_ms: u64,
    /// L2读取失败后是否继续回源L3
    pub l2_failover: bool,
    /// 是否启用指标收集
    pub enable_metrics: bool,
    /// L1缓存配置
    pub l1: L1Config,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            service_name: "default".to_string(),
            retry: 3,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            l2_failover: false,
            enable_metrics: true,
            l1: L1Config::default(),
        }
    }
}

impl CacheConfig {
    /// 默认加锁超时
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        if self.service_name.is_empty() {
            return Err(CacheError::ConfigError(
                "service_name cannot be empty".to_string(),
            ));
        }

        if self.service_name.len() > 64 {
            return Err(CacheError::ConfigError(format!(
                "service_name '{}' exceeds maximum length of 64 characters",
                self.service_name
            )));
        }

        // 指标键以冒号分隔
        if self.service_name.contains(':') {
            return Err(CacheError::ConfigError(format!(
                "service_name '{}' cannot contain ':'",
                self.service_name
            )));
        }

        if !(1..=100).contains(&self.retry) {
            return Err(CacheError::ConfigError(
                "retry must be between 1 and 100".to_string(),
            ));
        }

        if !(1..=600_000).contains(&self.lock_timeout_ms) {
            return Err(CacheError::ConfigError(
                "lock_timeout_ms must be between 1 and 600000 ms".to_string(),
            ));
        }

        self.l1.validate()
    }
}

/// L1缓存配置
///
/// 定义内存缓存的相关配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct L1Config {
    /// 最大缓存条目数
    pub max_capacity: u64,
    /// 默认过期时间（秒），0表示永不过期
    pub default_ttl_secs: u64,
    /// 过期清理间隔（秒），0表示禁用自动清理
    pub cleanup_interval_secs: u64,
}

impl Default for L1Config {
    fn default() -> Self {
        Self {
            max_capacity: 10000,
            default_ttl_secs: 300,
            cleanup_interval_secs: 60,
        }
    }
}

impl L1Config {
    /// 默认过期时间，None表示永不过期
    pub fn default_ttl(&self) -> Option<Duration> {
        (self.default_ttl_secs > 0).then(|| Duration::from_secs(self.default_ttl_secs))
    }

    /// 清理间隔，None表示不启动后台清理
    pub fn cleanup_interval(&self) -> Option<Duration> {
        (self.cleanup_interval_secs > 0).then(|| Duration::from_secs(self.cleanup_interval_secs))
    }

    fn validate(&self) -> Result<()> {
        if self.max_capacity == 0 {
            return Err(CacheError::ConfigError(
                "L1 max_capacity cannot be zero".to_string(),
            ));
        }

        if self.max_capacity > 10_000_000 {
            return Err(CacheError::ConfigError(
                "L1 max_capacity cannot exceed 10,000,000".to_string(),
            ));
        }

        if self.default_ttl_secs > 86400 * 30 {
            return Err(CacheError::ConfigError(
                "L1 default_ttl_secs cannot exceed 30 days (2592000 seconds)".to_string(),
            ));
        }

        Ok(())
    }
}

/// Redis层配置
///
/// 用于以Redis实现L2或L3的读写处理器
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct RedisTierConfig {
    /// 连接字符串
    pub connection_string: SecretString,
    /// 连接超时时间（毫秒）
    pub connection_timeout_ms: u64,
    /// 命令执行超时时间（毫秒）
    pub command_timeout_ms: u64,
    /// 键前缀
    pub key_prefix: Option<String>,
}

impl Default for RedisTierConfig {
    fn default() -> Self {
        Self {
            connection_string: SecretString::new("redis://127.0.0.1:6379".to_string().into()),
            connection_timeout_ms: 5000,
            command_timeout_ms: 3000,
            key_prefix: None,
        }
    }
}

impl RedisTierConfig {
    fn validate(&self, tier: &str) -> Result<()> {
        if !(100..=30000).contains(&self.connection_timeout_ms) {
            return Err(CacheError::ConfigError(format!(
                "{} connection_timeout_ms must be between 100 and 30000 ms",
                tier
            )));
        }

        if !(100..=60000).contains(&self.command_timeout_ms) {
            return Err(CacheError::ConfigError(format!(
                "{} command_timeout_ms must be between 100 and 60000 ms",
                tier
            )));
        }

        Ok(())
    }
}

impl Config {
    /// 从TOML字符串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| CacheError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 从TOML文件加载配置
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 验证配置
    ///
    /// 检查配置的有效性，确保所有值都在合理范围内
    pub fn validate(&self) -> Result<()> {
        if let Some(version) = self.config_version {
            if version > CONFIG_VERSION {
                return Err(CacheError::ConfigError(format!(
                    "Configuration version {} is not supported. Current version is {}.",
                    version, CONFIG_VERSION
                )));
            }
        }

        self.cache.validate()?;

        if let Some(l2) = &self.l2 {
            l2.validate("l2")?;
        }
        if let Some(l3) = &self.l3 {
            l3.validate("l3")?;
        }

        Ok(())
    }
}
