//! mlcache - 多级读穿缓存协调器
//!
//! 按 L1（进程内 Moka 缓存）-> L2 -> L3 的顺序查询，命中后逐级提升。
//! L2、L3 由调用方以读写处理器的形式注入，L1 未命中时按键加锁，
//! 防止同一个键的并发请求同时击穿到后端。

#![doc(html_root_url = "https://docs.rs/mlcache/0.1.0")]

pub use serde;
pub use serde::{Deserialize, Serialize};
pub use tokio;

pub mod backend;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod serialization;
pub mod sync;
pub mod telemetry;

// Re-export commonly used items
pub use backend::l1::LocalStore;
pub use backend::redis_tier::RedisTier;
pub use client::handler::{get_fn, set_fn, GetHandler, HandlerPair, SetHandler};
pub use client::multi_level::MultiLevelCache;
pub use client::{CacheStatus, CacheTier, LookupOptions, LookupResult};
pub use config::{CacheConfig, Config};
pub use error::{CacheError, Result};
pub use sync::key_lock::{KeyLock, KeyLockGuard};

/// mlcache 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
