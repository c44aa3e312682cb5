//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了配置检查命令的实现。

use crate::cli::CheckArgs;
use crate::config::{Config, RedisTierConfig};
use anyhow::{Context, Result};

pub fn execute(args: &CheckArgs) -> Result<()> {
    let config = Config::from_file(&args.config)
        .with_context(|| format!("Invalid configuration: {}", args.config.display()))?;

    let cache = &config.cache;
    println!("=== Configuration OK ===\n");
    println!("Service:        {}", cache.service_name);
    println!("Retry:          {}", cache.retry);
    println!("Lock timeout:   {}ms", cache.lock_timeout_ms);
    println!("L2 failover:    {}", cache.l2_failover);
    println!("Metrics:        {}", cache.enable_metrics);
    println!("L1 capacity:    {}", cache.l1.max_capacity);
    println!(
        "L1 default TTL: {}",
        match cache.l1.default_ttl_secs {
            0 => "never".to_string(),
            secs => format!("{}s", secs),
        }
    );
    println!(
        "L1 sweep:       {}",
        match cache.l1.cleanup_interval_secs {
            0 => "disabled".to_string(),
            secs => format!("every {}s", secs),
        }
    );

    print_tier("L2", config.l2.as_ref());
    print_tier("L3", config.l3.as_ref());

    Ok(())
}

fn print_tier(name: &str, tier: Option<&RedisTierConfig>) {
    match tier {
        // SecretString的Debug输出不包含连接串
        Some(redis) => println!(
            "{} redis:       {:?} (connect {}ms, command {}ms, prefix {:?})",
            name,
            redis.connection_string,
            redis.connection_timeout_ms,
            redis.command_timeout_ms,
            redis.key_prefix
        ),
        None => println!("{} redis:       not configured", name),
    }
}
