//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了测试的通用工具函数和后端替身。

#![allow(dead_code)]

use async_trait::async_trait;
use mlcache::config::RedisTierConfig;
use mlcache::{CacheConfig, CacheError, GetHandler, RedisTier, Result, SetHandler};
use secrecy::SecretString;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

pub fn setup_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_span_events(FmtSpan::CLOSE)
            .with_env_filter(EnvFilter::new("debug"))
            .try_init()
            .ok();
    });
}

/// 生成唯一的服务名称，避免测试之间的指标互相干扰
pub fn generate_unique_service_name(base: &str) -> String {
    format!("{}_{}", base, uuid::Uuid::new_v4().simple())
}

/// 测试用配置，关闭后台清理任务
pub fn test_config(base: &str) -> CacheConfig {
    let mut config = CacheConfig {
        service_name: generate_unique_service_name(base),
        ..Default::default()
    };
    config.l1.cleanup_interval_secs = 0;
    config
}

/// 读取处理器替身的行为
#[derive(Clone, Debug)]
pub enum Behavior {
    /// 总是命中
    Hit(String),
    /// 总是未命中
    Miss,
    /// 总是返回错误
    Fail(String),
    /// 前N次失败，之后命中
    FailThenHit(usize, String),
}

/// 记录调用次数的读取处理器
pub struct CountingGet {
    behavior: Behavior,
    delay: Duration,
    calls: AtomicUsize,
}

impl CountingGet {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// 每次调用前等待一段时间，模拟慢后端
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<C: Send + 'static> GetHandler<String, C> for CountingGet {
    async fn get(&self, _key: &str, _ctx: &mut C) -> Result<Option<String>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.behavior {
            Behavior::Hit(value) => Ok(Some(value.clone())),
            Behavior::Miss => Ok(None),
            Behavior::Fail(msg) => Err(CacheError::BackendError(msg.clone())),
            Behavior::FailThenHit(failures, value) => {
                if n < *failures {
                    Err(CacheError::BackendError(format!("failure #{}", n + 1)))
                } else {
                    Ok(Some(value.clone()))
                }
            }
        }
    }
}

/// 记录写入内容的写入处理器
#[derive(Default)]
pub struct RecordingSet {
    fail: bool,
    calls: AtomicUsize,
    writes: Mutex<Vec<(String, String, Option<Duration>)>>,
}

impl RecordingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每次写入都失败
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> Vec<(String, String, Option<Duration>)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl<C: Send + 'static> SetHandler<String, C> for RecordingSet {
    async fn set(
        &self,
        key: &str,
        value: &String,
        ttl: Option<Duration>,
        _ctx: &mut C,
    ) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CacheError::BackendError("write rejected".to_string()));
        }
        self.writes
            .lock()
            .unwrap()
            .push((key.to_string(), value.clone(), ttl));
        Ok(())
    }
}

/// 获取Redis连接地址
pub fn get_redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

/// 测试用Redis层配置
pub fn redis_tier_config() -> RedisTierConfig {
    RedisTierConfig {
        connection_string: SecretString::new(get_redis_url().into()),
        connection_timeout_ms: 1000,
        key_prefix: Some(generate_unique_service_name("mlcache_test")),
        ..Default::default()
    }
}

/// 连接测试用Redis，不可用时返回None
pub async fn connect_redis_tier<V>() -> Option<RedisTier<V>> {
    match RedisTier::connect(&redis_tier_config()).await {
        Ok(tier) => Some(tier),
        Err(e) => {
            println!("Redis不可用，跳过测试: {}", e);
            None
        }
    }
}
