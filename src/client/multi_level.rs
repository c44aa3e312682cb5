//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了多级缓存客户端的实现，按 L1 -> L2 -> L3 顺序回源并逐级提升。

use super::handler::{resolve_handlers, GetHandler, HandlerPair, SetHandler};
use super::{CacheTier, LookupOptions, LookupResult};
use crate::backend::l1::LocalStore;
use crate::config::CacheConfig;
use crate::error::Result;
use crate::metrics::GLOBAL_METRICS;
use crate::sync::key_lock::KeyLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// 多级缓存客户端
///
/// L1为进程内缓存，L2、L3由调用方提供读写处理器。L1未命中时按键加锁，
/// 同一个键同一时刻只有一个调用会访问L2/L3，其余调用在获得锁后重新检查L1。
///
/// 默认处理器在构建后不可修改，单次调用可以通过 [`LookupOptions`] 覆盖。
pub struct MultiLevelCache<V, C = ()> {
    /// 服务名称
    service_name: String,
    /// 协调器配置
    config: CacheConfig,
    /// L1缓存
    l1: LocalStore<V>,
    /// 默认L2处理器
    l2: Option<Arc<HandlerPair<V, C>>>,
    /// 默认L3处理器
    l3: Option<Arc<HandlerPair<V, C>>>,
    /// 按键锁
    lock: KeyLock,
}

impl<V, C> MultiLevelCache<V, C>
where
    V: Clone + Send + Sync + 'static,
    C: Send + 'static,
{
    /// 创建新的多级缓存客户端
    ///
    /// # 参数
    ///
    /// * `config` - 协调器配置
    /// * `l2` - 默认L2处理器
    /// * `l3` - 默认L3处理器
    ///
    /// # 返回值
    ///
    /// 配置无效时返回错误
    pub fn new(
        config: CacheConfig,
        l2: Option<Arc<HandlerPair<V, C>>>,
        l3: Option<Arc<HandlerPair<V, C>>>,
    ) -> Result<Self> {
        config.validate()?;

        let l1 = LocalStore::new(
            config.l1.max_capacity,
            config.l1.default_ttl(),
            config.l1.cleanup_interval(),
        );

        info!(
            "Initializing MultiLevelCache: service={}, retry={}, l2={:?}, l3={:?}",
            config.service_name, config.retry, l2, l3
        );

        Ok(Self {
            service_name: config.service_name.clone(),
            config,
            l1,
            l2,
            l3,
            lock: KeyLock::new(),
        })
    }

    /// 服务名称
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// 协调器配置
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// L1缓存，用于直接检查或手动预热
    pub fn local(&self) -> &LocalStore<V> {
        &self.l1
    }

    /// 按键锁
    pub fn key_lock(&self) -> &KeyLock {
        &self.lock
    }

    /// 查询缓存
    ///
    /// 1. 查询L1，命中直接返回
    /// 2. 没有可用的L2读取处理器时直接返回未命中，不会加锁，也不会访问L3
    /// 3. 按键加锁，超时视为未命中且不返回错误
    /// 4. 加锁后重新查询L1
    /// 5. 查询L2（带重试），命中后写入L1
    /// 6. L2未命中时查询L3（带重试），命中后写回L2（失败忽略）并写入L1
    ///
    /// 后端读取错误在重试次数耗尽后原样返回给调用方
    #[instrument(skip(self, opts, ctx), level = "debug", fields(service = %self.service_name))]
    pub async fn get(
        &self,
        key: &str,
        opts: &LookupOptions<V, C>,
        ctx: &mut C,
    ) -> Result<LookupResult<V>> {
        let result = self.get_from_l1(key).await;
        if result.is_fresh() {
            return Ok(result);
        }

        let l2 = resolve_handlers(opts.l2.as_deref(), self.l2.as_deref());
        if l2.get.is_none() {
            debug!("no L2 get handler, skip backend lookup: key={}", key);
            return Ok(result);
        }

        let timeout = self.lock_timeout(opts);
        let _guard = match self.lock.acquire(key, timeout).await {
            Some(guard) => guard,
            None => {
                warn!("key lock timeout, treat as miss: key={}, timeout={:?}", key, timeout);
                self.record("lock", "acquire", "timeout");
                return Ok(result);
            }
        };

        // 等待锁期间可能已有其他调用写入了L1
        let result = self.get_from_l1(key).await;
        if result.is_fresh() {
            return Ok(result);
        }

        self.get_from_l2_and_set_l1(key, opts, ctx).await
    }

    /// 查询L1
    #[instrument(skip(self), level = "debug", fields(service = %self.service_name))]
    pub async fn get_from_l1(&self, key: &str) -> LookupResult<V> {
        let start = Instant::now();
        let value = self.l1.get(key).await;
        self.record_duration(CacheTier::L1.as_str(), "get", start.elapsed());
        self.record(
            CacheTier::L1.as_str(),
            "get",
            if value.is_some() { "hit" } else { "miss" },
        );
        LookupResult::from_tier(value, CacheTier::L1)
    }

    /// 查询L2，没有可用的读取处理器时返回未命中
    #[instrument(skip(self, opts, ctx), level = "debug", fields(service = %self.service_name))]
    pub async fn get_from_l2(
        &self,
        key: &str,
        opts: &LookupOptions<V, C>,
        ctx: &mut C,
    ) -> Result<LookupResult<V>> {
        let handlers = resolve_handlers(opts.l2.as_deref(), self.l2.as_deref());
        let Some(get) = handlers.get else {
            return Ok(LookupResult::miss());
        };
        let value = self.read_with_retry(CacheTier::L2, get, key, ctx).await?;
        Ok(LookupResult::from_tier(value, CacheTier::L2))
    }

    /// 查询L3，没有可用的读取处理器时返回未命中
    #[instrument(skip(self, opts, ctx), level = "debug", fields(service = %self.service_name))]
    pub async fn get_from_l3(
        &self,
        key: &str,
        opts: &LookupOptions<V, C>,
        ctx: &mut C,
    ) -> Result<LookupResult<V>> {
        let handlers = resolve_handlers(opts.l3.as_deref(), self.l3.as_deref());
        let Some(get) = handlers.get else {
            return Ok(LookupResult::miss());
        };
        let value = self.read_with_retry(CacheTier::L3, get, key, ctx).await?;
        Ok(LookupResult::from_tier(value, CacheTier::L3))
    }

    /// 写入L1
    ///
    /// `ttl` 为None或0时使用L1默认过期时间
    #[instrument(skip(self, value), level = "debug", fields(service = %self.service_name))]
    pub async fn set_l1(&self, key: &str, value: V, ttl: Option<Duration>) {
        let start = Instant::now();
        self.l1.set(key, value, non_zero(ttl)).await;
        self.record_duration(CacheTier::L1.as_str(), "set", start.elapsed());
    }

    /// 写入L2，没有可用的写入处理器时直接返回成功
    #[instrument(skip(self, value, opts, ctx), level = "debug", fields(service = %self.service_name))]
    pub async fn set_l2(
        &self,
        key: &str,
        value: &V,
        opts: &LookupOptions<V, C>,
        ctx: &mut C,
    ) -> Result<()> {
        let handlers = resolve_handlers(opts.l2.as_deref(), self.l2.as_deref());
        let Some(set) = handlers.set else {
            debug!("no L2 set handler, skip write-back: key={}", key);
            return Ok(());
        };
        let ttl = self.promotion_ttl(opts);
        self.write_with_retry(CacheTier::L2, set, key, value, ttl, ctx)
            .await
    }

    async fn get_from_l2_and_set_l1(
        &self,
        key: &str,
        opts: &LookupOptions<V, C>,
        ctx: &mut C,
    ) -> Result<LookupResult<V>> {
        let result = match self.get_from_l2(key, opts, ctx).await {
            Ok(result) => result,
            Err(e) if self.config.l2_failover && self.has_l3_get(opts) => {
                warn!("L2 get failed, fall through to L3: key={}, error={}", key, e);
                LookupResult::miss()
            }
            Err(e) => return Err(e),
        };

        if let Some(value) = &result.value {
            self.set_l1(key, value.clone(), self.promotion_ttl(opts))
                .await;
            debug!("L2 hit, promoted to L1: key={}", key);
            return Ok(result);
        }

        if !self.has_l3_get(opts) {
            return Ok(result);
        }

        self.get_from_l3_and_set_l1_l2(key, opts, ctx).await
    }

    async fn get_from_l3_and_set_l1_l2(
        &self,
        key: &str,
        opts: &LookupOptions<V, C>,
        ctx: &mut C,
    ) -> Result<LookupResult<V>> {
        let result = self.get_from_l3(key, opts, ctx).await?;

        if let Some(value) = &result.value {
            if let Err(e) = self.set_l2(key, value, opts, ctx).await {
                warn!("L2 write-back failed, ignored: key={}, error={}", key, e);
            }
            self.set_l1(key, value.clone(), self.promotion_ttl(opts))
                .await;
            debug!("L3 hit, promoted to L2 and L1: key={}", key);
        }

        Ok(result)
    }

    fn has_l3_get(&self, opts: &LookupOptions<V, C>) -> bool {
        resolve_handlers(opts.l3.as_deref(), self.l3.as_deref())
            .get
            .is_some()
    }

    /// 带重试的后端读取
    ///
    /// 总尝试次数为配置的 `retry`，不做退避，所有错误都会重试
    async fn read_with_retry(
        &self,
        tier: CacheTier,
        handler: &Arc<dyn GetHandler<V, C>>,
        key: &str,
        ctx: &mut C,
    ) -> Result<Option<V>> {
        let attempts = self.attempts();
        let mut attempt = 1;
        loop {
            self.record(tier.as_str(), "get", "attempt");
            let start = Instant::now();
            let outcome = handler.get(key, ctx).await;
            self.record_duration(tier.as_str(), "get", start.elapsed());

            match outcome {
                Ok(value) => {
                    self.record(
                        tier.as_str(),
                        "get",
                        if value.is_some() { "hit" } else { "miss" },
                    );
                    return Ok(value);
                }
                Err(e) if attempt < attempts => {
                    debug!(
                        "{} get failed, retrying: key={}, attempt={}/{}, error={}",
                        tier, key, attempt, attempts, e
                    );
                    attempt += 1;
                }
                Err(e) => {
                    self.record(tier.as_str(), "get", "error");
                    warn!(
                        "{} get failed after {} attempts: key={}, error={}",
                        tier, attempts, key, e
                    );
                    return Err(e);
                }
            }
        }
    }

    /// 带重试的后端写入
    async fn write_with_retry(
        &self,
        tier: CacheTier,
        handler: &Arc<dyn SetHandler<V, C>>,
        key: &str,
        value: &V,
        ttl: Option<Duration>,
        ctx: &mut C,
    ) -> Result<()> {
        let attempts = self.attempts();
        let mut attempt = 1;
        loop {
            let start = Instant::now();
            let outcome = handler.set(key, value, ttl, ctx).await;
            self.record_duration(tier.as_str(), "set", start.elapsed());

            match outcome {
                Ok(()) => {
                    self.record(tier.as_str(), "set", "success");
                    return Ok(());
                }
                Err(e) if attempt < attempts => {
                    debug!(
                        "{} set failed, retrying: key={}, attempt={}/{}, error={}",
                        tier, key, attempt, attempts, e
                    );
                    attempt += 1;
                }
                Err(e) => {
                    self.record(tier.as_str(), "set", "error");
                    return Err(e);
                }
            }
        }
    }

    fn attempts(&self) -> u32 {
        self.config.retry.max(1)
    }

    fn lock_timeout(&self, opts: &LookupOptions<V, C>) -> Duration {
        non_zero(opts.lock_timeout).unwrap_or_else(|| self.config.lock_timeout())
    }

    /// 提升时使用的TTL，始终取自本次调用的选项
    fn promotion_ttl(&self, opts: &LookupOptions<V, C>) -> Option<Duration> {
        non_zero(opts.ttl).or(self.l1.default_ttl())
    }

    fn record(&self, layer: &str, op: &str, result: &str) {
        if self.config.enable_metrics {
            GLOBAL_METRICS.record_request(&self.service_name, layer, op, result);
        }
    }

    fn record_duration(&self, layer: &str, op: &str, elapsed: Duration) {
        if self.config.enable_metrics {
            GLOBAL_METRICS.record_duration(&self.service_name, layer, op, elapsed.as_secs_f64());
        }
    }
}

fn non_zero(duration: Option<Duration>) -> Option<Duration> {
    duration.filter(|d| !d.is_zero())
}
