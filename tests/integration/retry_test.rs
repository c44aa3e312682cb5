//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 后端重试与错误传播集成测试

#[path = "../common/mod.rs"]
mod common;

use common::{setup_logging, test_config, Behavior, CountingGet, RecordingSet};
use mlcache::metrics::GLOBAL_METRICS;
use mlcache::{get_fn, CacheError, CacheTier, HandlerPair, LookupOptions, MultiLevelCache};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn get_only(get: Arc<CountingGet>) -> Option<Arc<HandlerPair<String, ()>>> {
    Some(Arc::new(HandlerPair::<String, ()>::new().with_get(get)))
}

/// 测试L2持续失败时按配置次数重试并原样返回错误
#[tokio::test]
async fn test_l2_error_retried_then_returned() {
    setup_logging();
    let l2_get = Arc::new(CountingGet::new(Behavior::Fail("l2 down".to_string())));
    let l3_get = Arc::new(CountingGet::new(Behavior::Hit("V".to_string())));
    let config = test_config("l2_error");
    let service = config.service_name.clone();
    let cache = MultiLevelCache::new(config, get_only(l2_get.clone()), get_only(l3_get.clone()))
        .unwrap();

    let err = cache
        .get("K", &LookupOptions::new(), &mut ())
        .await
        .unwrap_err();

    match err {
        CacheError::BackendError(msg) => assert_eq!(msg, "l2 down"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(l2_get.calls(), 3);
    assert_eq!(l3_get.calls(), 0);
    assert!(cache.local().get("K").await.is_none());

    // 出错后锁已释放
    assert!(cache.key_lock().is_empty());
    assert!(cache.key_lock().try_acquire("K").is_some());

    assert_eq!(GLOBAL_METRICS.request_count(&service, "L2", "get", "attempt"), 3);
    assert_eq!(GLOBAL_METRICS.request_count(&service, "L2", "get", "error"), 1);
    GLOBAL_METRICS.reset_service(&service);
}

/// 测试临时失败在重试后恢复
#[tokio::test]
async fn test_transient_failure_recovers() {
    setup_logging();
    let l2_get = Arc::new(CountingGet::new(Behavior::FailThenHit(2, "bar".to_string())));
    let cache = MultiLevelCache::new(test_config("transient"), get_only(l2_get.clone()), None)
        .unwrap();

    let result = cache.get("K", &LookupOptions::new(), &mut ()).await.unwrap();
    assert_eq!(result.value.as_deref(), Some("bar"));
    assert_eq!(result.status.tier, CacheTier::L2);
    assert_eq!(l2_get.calls(), 3);
}

/// 测试失败次数等于重试次数时返回最后一次的错误
#[tokio::test]
async fn test_failures_exhaust_retry_budget() {
    setup_logging();
    let l2_get = Arc::new(CountingGet::new(Behavior::FailThenHit(3, "bar".to_string())));
    let cache = MultiLevelCache::new(test_config("exhaust"), get_only(l2_get.clone()), None)
        .unwrap();

    let err = cache
        .get("K", &LookupOptions::new(), &mut ())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Backend error: failure #3");
    assert_eq!(l2_get.calls(), 3);
}

/// 测试L3错误按配置次数重试并原样返回
#[tokio::test]
async fn test_l3_error_retried_then_returned() {
    setup_logging();
    let l2_get = Arc::new(CountingGet::new(Behavior::Miss));
    let l2_set = Arc::new(RecordingSet::new());
    let l3_get = Arc::new(CountingGet::new(Behavior::Fail("origin down".to_string())));
    let mut config = test_config("l3_error");
    config.retry = 5;
    let l2: HandlerPair<String, ()> = HandlerPair::new()
        .with_get(l2_get.clone())
        .with_set(l2_set.clone());
    let cache = MultiLevelCache::new(config, Some(Arc::new(l2)), get_only(l3_get.clone()))
        .unwrap();

    let err = cache
        .get("K", &LookupOptions::new(), &mut ())
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::BackendError(ref msg) if msg == "origin down"));
    assert_eq!(l2_get.calls(), 1);
    assert_eq!(l3_get.calls(), 5);
    assert_eq!(l2_set.calls(), 0);
    assert!(cache.key_lock().is_empty());
}

/// 测试开启L2故障转移后L2错误会继续访问L3
#[tokio::test]
async fn test_l2_failover_falls_through_to_l3() {
    setup_logging();
    let l2_get = Arc::new(CountingGet::new(Behavior::Fail("l2 down".to_string())));
    let l3_get = Arc::new(CountingGet::new(Behavior::Hit("V".to_string())));
    let mut config = test_config("l2_failover");
    config.l2_failover = true;
    let cache = MultiLevelCache::new(config, get_only(l2_get.clone()), get_only(l3_get.clone()))
        .unwrap();

    let result = cache.get("K", &LookupOptions::new(), &mut ()).await.unwrap();
    assert_eq!(result.value.as_deref(), Some("V"));
    assert_eq!(result.status.tier, CacheTier::L3);
    assert_eq!(l2_get.calls(), 3);
    assert_eq!(l3_get.calls(), 1);
    assert_eq!(cache.local().get("K").await.as_deref(), Some("V"));
}

/// 测试开启L2故障转移但没有L3时仍返回L2错误
#[tokio::test]
async fn test_l2_failover_without_l3_returns_error() {
    setup_logging();
    let l2_get = Arc::new(CountingGet::new(Behavior::Fail("l2 down".to_string())));
    let mut config = test_config("l2_failover_no_l3");
    config.l2_failover = true;
    let cache = MultiLevelCache::new(config, get_only(l2_get.clone()), None).unwrap();

    let result = cache.get("K", &LookupOptions::new(), &mut ()).await;
    assert!(matches!(result, Err(CacheError::BackendError(_))));
}

/// 测试处理器自定义错误原样返回
#[tokio::test]
async fn test_handler_error_passed_through() {
    setup_logging();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let l2: HandlerPair<String, ()> =
        HandlerPair::new().with_get(get_fn(move |_key: &str, _ctx: &mut ()| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(CacheError::handler(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "refused",
            )))
        }));
    let mut config = test_config("handler_error");
    config.retry = 2;
    let cache = MultiLevelCache::new(config, Some(Arc::new(l2)), None).unwrap();

    let err = cache
        .get("K", &LookupOptions::new(), &mut ())
        .await
        .unwrap_err();
    let CacheError::Handler(source) = err else {
        panic!("expected handler error");
    };
    let io = source.downcast_ref::<std::io::Error>().unwrap();
    assert_eq!(io.kind(), std::io::ErrorKind::ConnectionRefused);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
