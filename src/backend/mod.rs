//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存后端：L1本地缓存和可作为L2/L3的Redis层。

pub mod l1;
pub mod redis_tier;

use std::time::Duration;

/// 条目TTL上限，超过该值按永不过期处理
pub const MAX_ENTRY_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// 将过长的TTL归一为永不过期
pub(crate) fn bounded_ttl(ttl: Option<Duration>) -> Option<Duration> {
    ttl.filter(|ttl| *ttl <= MAX_ENTRY_TTL)
}
