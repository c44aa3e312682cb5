//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存系统的日志初始化功能。

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// 初始化日志输出
///
/// 此函数应该在应用程序启动时调用一次。`RUST_LOG` 环境变量优先于
/// 传入的过滤规则。
///
/// # 参数
///
/// * `default_filter` - 未设置 `RUST_LOG` 时使用的过滤规则，例如 "info" 或 "mlcache=debug"
pub fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // 全局subscriber可能已由应用层设置，这里忽略重复初始化
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::NONE)
        .with_target(true)
        .try_init();
}
