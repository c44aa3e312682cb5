//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了L2/L3后端读写处理器以及处理器的选择规则。

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// 后端读取处理器
///
/// `ctx` 为调用方传入的上下文，在同一次查询中依次传给L2和L3处理器，
/// 前一个处理器对它的修改对后一个处理器可见
#[async_trait]
pub trait GetHandler<V, C>: Send + Sync {
    /// 读取缓存值，`Ok(None)` 表示未命中
    async fn get(&self, key: &str, ctx: &mut C) -> Result<Option<V>>;
}

/// 后端写入处理器
#[async_trait]
pub trait SetHandler<V, C>: Send + Sync {
    /// 写入缓存值，`ttl` 为None表示永不过期
    async fn set(&self, key: &str, value: &V, ttl: Option<Duration>, ctx: &mut C) -> Result<()>;
}

/// 某一层后端的读写处理器组合
///
/// 构建后不可修改，通过 `Arc` 在默认配置和单次调用之间共享
pub struct HandlerPair<V, C> {
    pub get: Option<Arc<dyn GetHandler<V, C>>>,
    pub set: Option<Arc<dyn SetHandler<V, C>>>,
}

impl<V, C> HandlerPair<V, C> {
    /// 创建空的处理器组合
    pub fn new() -> Self {
        Self {
            get: None,
            set: None,
        }
    }

    /// 设置读取处理器
    pub fn with_get(mut self, handler: Arc<dyn GetHandler<V, C>>) -> Self {
        self.get = Some(handler);
        self
    }

    /// 设置写入处理器
    pub fn with_set(mut self, handler: Arc<dyn SetHandler<V, C>>) -> Self {
        self.set = Some(handler);
        self
    }
}

impl<V, C> Default for HandlerPair<V, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, C> Clone for HandlerPair<V, C> {
    fn clone(&self) -> Self {
        Self {
            get: self.get.clone(),
            set: self.set.clone(),
        }
    }
}

impl<V, C> fmt::Debug for HandlerPair<V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerPair")
            .field("get", &self.get.is_some())
            .field("set", &self.set.is_some())
            .finish()
    }
}

/// 某一层在本次调用中实际生效的处理器
pub struct ResolvedHandlers<'a, V, C> {
    pub get: Option<&'a Arc<dyn GetHandler<V, C>>>,
    pub set: Option<&'a Arc<dyn SetHandler<V, C>>>,
}

/// 选择本次调用生效的处理器
///
/// 读、写处理器分别独立选择：
///
/// | 调用覆盖 | 默认配置 | 结果     |
/// |----------|----------|----------|
/// | 有       | 任意     | 调用覆盖 |
/// | 无       | 有       | 默认配置 |
/// | 无       | 无       | 无       |
pub fn resolve_handlers<'a, V, C>(
    call: Option<&'a HandlerPair<V, C>>,
    configured: Option<&'a HandlerPair<V, C>>,
) -> ResolvedHandlers<'a, V, C> {
    ResolvedHandlers {
        get: pick(
            call.and_then(|p| p.get.as_ref()),
            configured.and_then(|p| p.get.as_ref()),
        ),
        set: pick(
            call.and_then(|p| p.set.as_ref()),
            configured.and_then(|p| p.set.as_ref()),
        ),
    }
}

fn pick<T>(call: Option<T>, configured: Option<T>) -> Option<T> {
    match (call, configured) {
        (Some(handler), _) => Some(handler),
        (None, Some(handler)) => Some(handler),
        (None, None) => None,
    }
}

/// 基于同步闭包的读取处理器
pub struct FnGetHandler<F, V, C> {
    f: F,
    _marker: PhantomData<fn(&mut C) -> V>,
}

#[async_trait]
impl<F, V, C> GetHandler<V, C> for FnGetHandler<F, V, C>
where
    F: Fn(&str, &mut C) -> Result<Option<V>> + Send + Sync,
    V: Send + 'static,
    C: Send + 'static,
{
    async fn get(&self, key: &str, ctx: &mut C) -> Result<Option<V>> {
        (self.f)(key, ctx)
    }
}

/// 基于同步闭包的写入处理器
pub struct FnSetHandler<F, V, C> {
    f: F,
    _marker: PhantomData<fn(&V, &mut C)>,
}

#[async_trait]
impl<F, V, C> SetHandler<V, C> for FnSetHandler<F, V, C>
where
    F: Fn(&str, &V, Option<Duration>, &mut C) -> Result<()> + Send + Sync,
    V: Sync + 'static,
    C: Send + 'static,
{
    async fn set(&self, key: &str, value: &V, ttl: Option<Duration>, ctx: &mut C) -> Result<()> {
        (self.f)(key, value, ttl, ctx)
    }
}

/// 将同步闭包包装为读取处理器
pub fn get_fn<V, C, F>(f: F) -> Arc<dyn GetHandler<V, C>>
where
    F: Fn(&str, &mut C) -> Result<Option<V>> + Send + Sync + 'static,
    V: Send + 'static,
    C: Send + 'static,
{
    Arc::new(FnGetHandler {
        f,
        _marker: PhantomData,
    })
}

/// 将同步闭包包装为写入处理器
pub fn set_fn<V, C, F>(f: F) -> Arc<dyn SetHandler<V, C>>
where
    F: Fn(&str, &V, Option<Duration>, &mut C) -> Result<()> + Send + Sync + 'static,
    V: Sync + 'static,
    C: Send + 'static,
{
    Arc::new(FnSetHandler {
        f,
        _marker: PhantomData,
    })
}
