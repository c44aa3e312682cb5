//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了L1本地缓存的实现，基于内存并支持按条目过期。

use super::bounded_ttl;
use moka::future::Cache;
use moka::Expiry;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

/// L1缓存条目
///
/// 过期时间在写入时确定，读取时只关心是否存在
#[derive(Clone, Debug)]
struct LocalEntry<V> {
    value: V,
    expires_at: Option<Instant>,
}

/// 按条目过期策略，过期时间取自条目本身
struct EntryExpiry;

impl<V> Expiry<String, LocalEntry<V>> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &LocalEntry<V>,
        created_at: Instant,
    ) -> Option<Duration> {
        entry
            .expires_at
            .map(|at| at.saturating_duration_since(created_at))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &LocalEntry<V>,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        entry
            .expires_at
            .map(|at| at.saturating_duration_since(updated_at))
    }
}

/// L1本地缓存
///
/// 基于Moka的进程内缓存，每个条目带有独立的TTL，过期条目在读取时不可见，
/// 并由可选的后台任务定期清理
pub struct LocalStore<V> {
    cache: Cache<String, LocalEntry<V>>,
    default_ttl: Option<Duration>,
    sweeper: Option<JoinHandle<()>>,
}

impl<V> LocalStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// 创建新的L1缓存
    ///
    /// # 参数
    ///
    /// * `capacity` - 最大条目数
    /// * `default_ttl` - 默认过期时间，None表示永不过期
    /// * `cleanup_interval` - 后台清理间隔，None表示仅依赖惰性过期
    ///
    /// # 返回值
    ///
    /// 返回新的LocalStore实例
    pub fn new(
        capacity: u64,
        default_ttl: Option<Duration>,
        cleanup_interval: Option<Duration>,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .expire_after(EntryExpiry)
            .build();

        let sweeper =
            cleanup_interval.and_then(|every| Self::spawn_sweeper(cache.clone(), every));

        Self {
            cache,
            default_ttl,
            sweeper,
        }
    }

    fn spawn_sweeper(
        cache: Cache<String, LocalEntry<V>>,
        every: Duration,
    ) -> Option<JoinHandle<()>> {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => Some(handle.spawn(async move {
                let mut ticker = tokio::time::interval(every);
                // 第一次tick立即完成
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    cache.run_pending_tasks().await;
                    debug!("L1 sweep: entries={}", cache.entry_count());
                }
            })),
            Err(_) => {
                warn!("L1 sweeper not started: no tokio runtime in scope");
                None
            }
        }
    }

    /// 获取缓存值
    ///
    /// # 参数
    ///
    /// * `key` - 缓存键
    ///
    /// # 返回值
    ///
    /// 返回缓存值，如果不存在或已过期则返回None
    #[instrument(skip(self), level = "debug")]
    pub async fn get(&self, key: &str) -> Option<V> {
        self.get_with_expiration(key).await.map(|(value, _)| value)
    }

    /// 获取缓存值及其过期时刻
    ///
    /// 过期时刻为None表示该条目永不过期
    #[instrument(skip(self), level = "debug")]
    pub async fn get_with_expiration(&self, key: &str) -> Option<(V, Option<Instant>)> {
        match self.cache.get(key).await {
            Some(entry) => {
                if let Some(expire_time) = entry.expires_at {
                    if Instant::now() >= expire_time {
                        self.cache.remove(key).await;
                        debug!("L1 get: key={}, expired=true, removed", key);
                        return None;
                    }
                }
                debug!("L1 get: key={}, found=true", key);
                Some((entry.value, entry.expires_at))
            }
            None => {
                debug!("L1 get: key={}, found=false", key);
                None
            }
        }
    }

    /// 设置缓存值
    ///
    /// # 参数
    ///
    /// * `key` - 缓存键
    /// * `value` - 缓存值
    /// * `ttl` - 过期时间，None表示使用默认过期时间，超过 [`MAX_ENTRY_TTL`](super::MAX_ENTRY_TTL) 视为永不过期
    #[instrument(skip(self, value), level = "debug")]
    pub async fn set(&self, key: &str, value: V, ttl: Option<Duration>) {
        let ttl = bounded_ttl(ttl.or(self.default_ttl));
        let expires_at = ttl.and_then(|ttl| Instant::now().checked_add(ttl));
        self.cache
            .insert(key.to_string(), LocalEntry { value, expires_at })
            .await;
        debug!("L1 set: key={}, ttl={:?}", key, ttl);
    }

    /// 删除缓存项
    #[instrument(skip(self), level = "debug")]
    pub async fn delete(&self, key: &str) {
        self.cache.remove(key).await;
        debug!("L1 delete: key={}", key);
    }

    /// 清空L1缓存
    pub fn clear(&self) {
        self.cache.invalidate_all();
        debug!("L1 clear: 缓存已清空");
    }

    /// 当前条目数（近似值，Moka在维护任务运行后才会更新）
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// 执行挂起的维护任务，立即清理已过期条目
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }

    /// 默认过期时间
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }
}

impl<V> Drop for LocalStore<V> {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.take() {
            handle.abort();
        }
    }
}
