//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了并发模拟命令，用内存后端演示按键单飞和逐级提升。

use crate::cli::SimulateArgs;
use crate::client::handler::{GetHandler, HandlerPair, SetHandler};
use crate::client::multi_level::MultiLevelCache;
use crate::client::{CacheTier, LookupOptions};
use crate::config::{CacheConfig, Config};
use crate::error::{CacheError, Result as CacheResult};
use crate::metrics::get_metrics_string;
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 内存L2
#[derive(Default)]
struct MemoryTier {
    data: DashMap<String, String>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

#[async_trait]
impl GetHandler<String, ()> for MemoryTier {
    async fn get(&self, key: &str, _ctx: &mut ()) -> CacheResult<Option<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.data.get(key).map(|v| v.value().clone()))
    }
}

#[async_trait]
impl SetHandler<String, ()> for MemoryTier {
    async fn set(
        &self,
        key: &str,
        value: &String,
        _ttl: Option<Duration>,
        _ctx: &mut (),
    ) -> CacheResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.data.insert(key.to_string(), value.clone());
        Ok(())
    }
}

/// 模拟数据源，带固定延迟并可让前N次读取失败
struct SlowSource {
    latency: Duration,
    fail_first: usize,
    reads: AtomicUsize,
}

#[async_trait]
impl GetHandler<String, ()> for SlowSource {
    async fn get(&self, key: &str, _ctx: &mut ()) -> CacheResult<Option<String>> {
        let n = self.reads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        if n < self.fail_first {
            return Err(CacheError::BackendError(format!(
                "simulated failure #{}",
                n + 1
            )));
        }
        Ok(Some(format!("value-of-{}", key)))
    }
}

pub async fn execute(args: &SimulateArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::from_file(path)?.cache,
        None => CacheConfig {
            service_name: "simulate".to_string(),
            ..Default::default()
        },
    };

    let l2 = Arc::new(MemoryTier::default());
    let l3 = Arc::new(SlowSource {
        latency: Duration::from_millis(args.latency_ms),
        fail_first: args.fail_first,
        reads: AtomicUsize::new(0),
    });

    let l2_pair: HandlerPair<String, ()> = HandlerPair::new()
        .with_get(l2.clone())
        .with_set(l2.clone());
    let l3_pair: HandlerPair<String, ()> = HandlerPair::new().with_get(l3.clone());

    let cache = Arc::new(MultiLevelCache::new(
        config,
        Some(Arc::new(l2_pair)),
        Some(Arc::new(l3_pair)),
    )?);
    let opts = Arc::new(LookupOptions::new().ttl(Duration::from_secs(60)));
    let keys = args.keys.max(1);

    println!(
        "=== Simulating {} round(s) x {} lookups over {} key(s) ===\n",
        args.rounds, args.concurrency, keys
    );

    for round in 1..=args.rounds {
        let start = Instant::now();
        let lookups = (0..args.concurrency).map(|i| {
            let cache = cache.clone();
            let opts = opts.clone();
            let key = format!("key-{}", i % keys);
            tokio::spawn(async move { cache.get(&key, &opts, &mut ()).await })
        });

        let mut tiers: HashMap<CacheTier, usize> = HashMap::new();
        let mut errors = 0;
        for outcome in join_all(lookups).await {
            match outcome? {
                Ok(result) => *tiers.entry(result.status.tier).or_insert(0) += 1,
                Err(_) => errors += 1,
            }
        }

        println!("Round {} ({:?}):", round, start.elapsed());
        for tier in [CacheTier::L1, CacheTier::L2, CacheTier::L3, CacheTier::None] {
            println!(
                "  {:<4} {}",
                tier.as_str(),
                tiers.get(&tier).copied().unwrap_or(0)
            );
        }
        println!("  err  {}", errors);
    }

    println!("\nBackend invocations:");
    println!("  L2 reads:  {}", l2.reads.load(Ordering::SeqCst));
    println!("  L2 writes: {}", l2.writes.load(Ordering::SeqCst));
    println!("  L3 reads:  {}", l3.reads.load(Ordering::SeqCst));

    if args.prometheus {
        println!("\n{}", get_metrics_string());
    }

    Ok(())
}
