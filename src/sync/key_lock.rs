//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了按键加锁机制，保证同一个键同一时刻只有一个回源流程。

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

type LockTable = DashMap<String, Arc<Semaphore>>;

/// 按键锁
///
/// 每个键对应一个容量为1的信号量，在首次使用时创建。锁表只负责查找或创建信号量，
/// 信号量的获取和释放不持有锁表分片锁，因此不同键之间不会互相阻塞。
///
/// 当最后一个持有者或等待者离开时，信号量会从锁表中移除，锁表大小只与
/// 当前正在竞争的键数量相关。
#[derive(Default)]
pub struct KeyLock {
    table: Arc<LockTable>,
}

/// 按键锁的持有凭证
///
/// 凭证被丢弃时释放锁，因此无法在未持有锁的情况下释放
#[must_use = "dropping the guard releases the key lock immediately"]
pub struct KeyLockGuard {
    table: Arc<LockTable>,
    key: String,
    permit: Option<OwnedSemaphorePermit>,
}

impl KeyLock {
    /// 创建新的按键锁
    pub fn new() -> Self {
        Self::default()
    }

    fn semaphore(&self, key: &str) -> Arc<Semaphore> {
        if let Some(existing) = self.table.get(key) {
            return existing.value().clone();
        }
        self.table
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .value()
            .clone()
    }

    /// 移除没有任何持有者和等待者的信号量
    fn forget(&self, key: &str) {
        forget_idle(&self.table, key);
    }

    fn guard(&self, key: &str, permit: OwnedSemaphorePermit) -> KeyLockGuard {
        KeyLockGuard {
            table: self.table.clone(),
            key: key.to_string(),
            permit: Some(permit),
        }
    }

    /// 在超时时间内获取键的独占锁
    ///
    /// # 参数
    ///
    /// * `key` - 缓存键
    /// * `timeout` - 最长等待时间
    ///
    /// # 返回值
    ///
    /// 成功获取返回锁凭证，超时返回None
    pub async fn acquire(&self, key: &str, timeout: Duration) -> Option<KeyLockGuard> {
        let semaphore = self.semaphore(key);
        match tokio::time::timeout(timeout, semaphore.acquire_owned()).await {
            Ok(Ok(permit)) => Some(self.guard(key, permit)),
            Ok(Err(_)) => {
                // 信号量从不关闭
                self.forget(key);
                None
            }
            Err(_) => {
                debug!("key lock timeout: key={}, timeout={:?}", key, timeout);
                self.forget(key);
                None
            }
        }
    }

    /// 尝试立即获取键的独占锁，不等待
    pub fn try_acquire(&self, key: &str) -> Option<KeyLockGuard> {
        match self.semaphore(key).try_acquire_owned() {
            Ok(permit) => Some(self.guard(key, permit)),
            Err(_) => {
                self.forget(key);
                None
            }
        }
    }

    /// 释放锁
    ///
    /// 等价于丢弃凭证
    pub fn release(&self, guard: KeyLockGuard) {
        drop(guard);
    }

    /// 锁表中的条目数
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// 锁表是否为空
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl KeyLockGuard {
    /// 被锁定的键
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyLockGuard {
    fn drop(&mut self) {
        drop(self.permit.take());
        forget_idle(&self.table, &self.key);
    }
}

fn forget_idle(table: &LockTable, key: &str) {
    // 引用计数为1说明只剩锁表自身持有
    table.remove_if(key, |_, semaphore| Arc::strong_count(semaphore) == 1);
}
