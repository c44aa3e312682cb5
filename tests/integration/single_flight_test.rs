//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 按键单飞集成测试

#[path = "../common/mod.rs"]
mod common;

use common::{setup_logging, test_config, Behavior, CountingGet, RecordingSet};
use futures::future::join_all;
use mlcache::{CacheTier, HandlerPair, LookupOptions, MultiLevelCache};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Barrier;

/// 测试并发未命中同一个键时只回源一次
///
/// 50个并发请求同时查询同一个键，L2只应被调用一次，其余请求在加锁后从L1读取
#[tokio::test]
async fn test_single_flight_l2() {
    setup_logging();
    let l2_get = Arc::new(
        CountingGet::new(Behavior::Hit("shared".to_string())).with_delay(Duration::from_millis(100)),
    );
    let l2: HandlerPair<String, ()> = HandlerPair::new().with_get(l2_get.clone());
    let cache = Arc::new(
        MultiLevelCache::new(test_config("single_flight_l2"), Some(Arc::new(l2)), None).unwrap(),
    );

    let concurrency = 50;
    let barrier = Arc::new(Barrier::new(concurrency));
    let handles: Vec<_> = (0..concurrency)
        .map(|_| {
            let cache = cache.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                cache
                    .get("hot_key", &LookupOptions::new(), &mut ())
                    .await
                    .unwrap()
            })
        })
        .collect();

    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(l2_get.calls(), 1, "L2 should be invoked exactly once");
    assert!(results
        .iter()
        .all(|r| r.value.as_deref() == Some("shared")));
    let from_l2 = results
        .iter()
        .filter(|r| r.status.tier == CacheTier::L2)
        .count();
    let from_l1 = results
        .iter()
        .filter(|r| r.status.tier == CacheTier::L1)
        .count();
    assert_eq!(from_l2, 1);
    assert_eq!(from_l1, concurrency - 1);
    assert!(cache.key_lock().is_empty());
}

/// 测试并发未命中同一个键时L3只回源一次
#[tokio::test]
async fn test_single_flight_l3() {
    setup_logging();
    let l2_get = Arc::new(CountingGet::new(Behavior::Miss));
    let l2_set = Arc::new(RecordingSet::new());
    let l3_get = Arc::new(
        CountingGet::new(Behavior::Hit("origin".to_string())).with_delay(Duration::from_millis(100)),
    );
    let l2: HandlerPair<String, ()> = HandlerPair::new()
        .with_get(l2_get.clone())
        .with_set(l2_set.clone());
    let l3: HandlerPair<String, ()> = HandlerPair::new().with_get(l3_get.clone());
    let cache = Arc::new(
        MultiLevelCache::new(
            test_config("single_flight_l3"),
            Some(Arc::new(l2)),
            Some(Arc::new(l3)),
        )
        .unwrap(),
    );

    let concurrency = 20;
    let barrier = Arc::new(Barrier::new(concurrency));
    let handles: Vec<_> = (0..concurrency)
        .map(|_| {
            let cache = cache.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                cache
                    .get("hot_key", &LookupOptions::new(), &mut ())
                    .await
                    .unwrap()
            })
        })
        .collect();

    for result in join_all(handles).await {
        assert_eq!(result.unwrap().value.as_deref(), Some("origin"));
    }

    assert_eq!(l2_get.calls(), 1);
    assert_eq!(l3_get.calls(), 1);
    assert_eq!(l2_set.calls(), 1);
}

/// 测试等待加锁超时时返回未命中而不是错误
#[tokio::test]
async fn test_lock_timeout_returns_miss() {
    setup_logging();
    let l2_get = Arc::new(
        CountingGet::new(Behavior::Hit("slow".to_string())).with_delay(Duration::from_millis(500)),
    );
    let l2: HandlerPair<String, ()> = HandlerPair::new().with_get(l2_get.clone());
    let cache = Arc::new(
        MultiLevelCache::new(test_config("lock_timeout"), Some(Arc::new(l2)), None).unwrap(),
    );

    let leader = {
        let cache = cache.clone();
        tokio::spawn(async move {
            cache
                .get("slow_key", &LookupOptions::new(), &mut ())
                .await
                .unwrap()
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let opts = LookupOptions::new().lock_timeout(Duration::from_millis(50));
    let start = Instant::now();
    let waiter = cache.get("slow_key", &opts, &mut ()).await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(400));
    assert!(!waiter.status.found);
    assert_eq!(waiter.status.tier, CacheTier::None);
    assert_eq!(waiter.value, None);

    let leader = leader.await.unwrap();
    assert_eq!(leader.value.as_deref(), Some("slow"));
    assert_eq!(leader.status.tier, CacheTier::L2);
    assert_eq!(l2_get.calls(), 1);
}

/// 测试不同的键互不阻塞
#[tokio::test]
async fn test_different_keys_run_in_parallel() {
    setup_logging();
    let l2_get = Arc::new(
        CountingGet::new(Behavior::Hit("v".to_string())).with_delay(Duration::from_millis(200)),
    );
    let l2: HandlerPair<String, ()> = HandlerPair::new().with_get(l2_get.clone());
    let cache = Arc::new(
        MultiLevelCache::new(test_config("parallel_keys"), Some(Arc::new(l2)), None).unwrap(),
    );

    let start = Instant::now();
    let handles: Vec<_> = (0..10)
        .map(|i| {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get(&format!("key_{}", i), &LookupOptions::new(), &mut ())
                    .await
                    .unwrap()
            })
        })
        .collect();

    for result in join_all(handles).await {
        assert_eq!(result.unwrap().status.tier, CacheTier::L2);
    }

    // 串行执行至少需要2秒
    assert!(start.elapsed() < Duration::from_millis(1000));
    assert_eq!(l2_get.calls(), 10);
    assert!(cache.key_lock().is_empty());
}
