//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了多级缓存客户端的查询结果、查询选项和实现。

pub mod handler;
pub mod multi_level;

use handler::HandlerPair;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// 缓存层级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CacheTier {
    /// 未命中任何一层
    #[default]
    None,
    /// 进程内缓存
    L1,
    /// 中间层缓存
    L2,
    /// 数据源
    L3,
}

impl CacheTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheTier::None => "NONE",
            CacheTier::L1 => "L1",
            CacheTier::L2 => "L2",
            CacheTier::L3 => "L3",
        }
    }
}

impl fmt::Display for CacheTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单次查询的状态
///
/// 每次查询重新生成，`tier` 记录最终命中的层级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStatus {
    /// 是否找到
    pub found: bool,
    /// 是否为过期值（当前L1不会产生过期值，始终为false）
    pub stale: bool,
    /// 命中层级
    pub tier: CacheTier,
}

/// 单次查询的结果
#[derive(Debug, Clone, PartialEq)]
pub struct LookupResult<V> {
    pub value: Option<V>,
    pub status: CacheStatus,
}

impl<V> LookupResult<V> {
    /// 未命中
    pub fn miss() -> Self {
        Self {
            value: None,
            status: CacheStatus::default(),
        }
    }

    /// 在指定层级命中
    pub fn hit(value: V, tier: CacheTier) -> Self {
        Self {
            value: Some(value),
            status: CacheStatus {
                found: true,
                stale: false,
                tier,
            },
        }
    }

    fn from_tier(value: Option<V>, tier: CacheTier) -> Self {
        match value {
            Some(value) => Self::hit(value, tier),
            None => Self::miss(),
        }
    }

    /// 是否命中且未过期
    pub fn is_fresh(&self) -> bool {
        self.status.found && !self.status.stale
    }

    /// 取出结果值
    pub fn into_value(self) -> Option<V> {
        self.value
    }
}

/// 单次查询的选项
///
/// 其中的处理器只对本次调用生效，优先于客户端的默认处理器
pub struct LookupOptions<V, C = ()> {
    /// 提升到上层时使用的TTL，None或0表示使用L1默认过期时间
    pub ttl: Option<Duration>,
    /// 加锁超时，None或0表示使用配置的默认值（3秒）
    pub lock_timeout: Option<Duration>,
    /// 本次调用的L2处理器
    pub l2: Option<Arc<HandlerPair<V, C>>>,
    /// 本次调用的L3处理器
    pub l3: Option<Arc<HandlerPair<V, C>>>,
}

impl<V, C> LookupOptions<V, C> {
    pub fn new() -> Self {
        Self {
            ttl: None,
            lock_timeout: None,
            l2: None,
            l3: None,
        }
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    pub fn l2(mut self, handlers: Arc<HandlerPair<V, C>>) -> Self {
        self.l2 = Some(handlers);
        self
    }

    pub fn l3(mut self, handlers: Arc<HandlerPair<V, C>>) -> Self {
        self.l3 = Some(handlers);
        self
    }
}

impl<V, C> Default for LookupOptions<V, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, C> Clone for LookupOptions<V, C> {
    fn clone(&self) -> Self {
        Self {
            ttl: self.ttl,
            lock_timeout: self.lock_timeout,
            l2: self.l2.clone(),
            l3: self.l3.clone(),
        }
    }
}

impl<V, C> fmt::Debug for LookupOptions<V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupOptions")
            .field("ttl", &self.ttl)
            .field("lock_timeout", &self.lock_timeout)
            .field("l2", &self.l2)
            .field("l3", &self.l3)
            .finish()
    }
}
