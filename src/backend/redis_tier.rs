//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了基于Redis的缓存层，可作为多级缓存的L2或L3读写处理器。

use super::bounded_ttl;
use crate::client::handler::{GetHandler, HandlerPair, SetHandler};
use crate::config::RedisTierConfig;
use crate::error::{CacheError, Result};
use crate::serialization::{Serializer, SerializerEnum};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use secrecy::ExposeSecret;
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, instrument};

/// Redis缓存层
///
/// 值以JSON序列化后存储，`ctx` 不参与Redis操作
pub struct RedisTier<V> {
    manager: ConnectionManager,
    key_prefix: Option<String>,
    command_timeout: Duration,
    serializer: SerializerEnum,
    _marker: PhantomData<fn() -> V>,
}

impl<V> Clone for RedisTier<V> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            key_prefix: self.key_prefix.clone(),
            command_timeout: self.command_timeout,
            serializer: self.serializer.clone(),
            _marker: PhantomData,
        }
    }
}

impl<V> RedisTier<V> {
    /// 连接Redis
    ///
    /// # 参数
    ///
    /// * `config` - Redis层配置
    ///
    /// # 返回值
    ///
    /// 连接超时或失败时返回错误
    #[instrument(skip(config), level = "info", name = "init_redis_tier")]
    pub async fn connect(config: &RedisTierConfig) -> Result<Self> {
        let client = Client::open(config.connection_string.expose_secret())?;
        let manager = match timeout(
            Duration::from_millis(config.connection_timeout_ms),
            client.get_connection_manager(),
        )
        .await
        {
            Ok(res) => res?,
            Err(_) => {
                return Err(CacheError::Timeout(format!(
                    "Redis connection timed out after {}ms",
                    config.connection_timeout_ms
                )));
            }
        };

        Ok(Self {
            manager,
            key_prefix: config.key_prefix.clone(),
            command_timeout: Duration::from_millis(config.command_timeout_ms),
            serializer: SerializerEnum::default(),
            _marker: PhantomData,
        })
    }

    fn full_key(&self, key: &str) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{}:{}", prefix, key),
            None => key.to_string(),
        }
    }

    async fn with_timeout<T, F>(&self, op: &str, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = redis::RedisResult<T>>,
    {
        match timeout(self.command_timeout, fut).await {
            Ok(res) => Ok(res?),
            Err(_) => Err(CacheError::Timeout(format!(
                "Redis {} timed out after {:?}",
                op, self.command_timeout
            ))),
        }
    }

    /// 读取原始字节
    #[instrument(skip(self), level = "debug")]
    pub async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        let full_key = self.full_key(key);
        let bytes: Option<Vec<u8>> = self.with_timeout("GET", conn.get(&full_key)).await?;
        debug!("Redis get: key={}, found={}", full_key, bytes.is_some());
        Ok(bytes)
    }

    /// 写入原始字节，`ttl` 为None表示永不过期
    ///
    /// 过期时间按毫秒精度写入，不足1毫秒按1毫秒处理
    #[instrument(skip(self, value), level = "debug")]
    pub async fn set_bytes(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.manager.clone();
        let full_key = self.full_key(key);
        // 上限为100年，毫秒数不会溢出u64
        match bounded_ttl(ttl).map(|ttl| (ttl.as_millis() as u64).max(1)) {
            Some(millis) => {
                self.with_timeout(
                    "PSETEX",
                    conn.pset_ex::<_, _, ()>(&full_key, value, millis),
                )
                .await?
            }
            None => {
                self.with_timeout("SET", conn.set::<_, _, ()>(&full_key, value))
                    .await?
            }
        }
        debug!("Redis set: key={}, ttl={:?}", full_key, ttl);
        Ok(())
    }

    /// 删除键
    #[instrument(skip(self), level = "debug")]
    pub async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        let full_key = self.full_key(key);
        self.with_timeout("DEL", conn.del::<_, ()>(&full_key))
            .await
    }

    /// 查询键的剩余过期时间（毫秒精度），键不存在或永不过期时返回None
    #[instrument(skip(self), level = "debug")]
    pub async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let mut conn = self.manager.clone();
        let full_key = self.full_key(key);
        let millis: i64 = self.with_timeout("PTTL", conn.pttl(&full_key)).await?;
        Ok((millis > 0).then(|| Duration::from_millis(millis as u64)))
    }
}

impl<V> RedisTier<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// 构建同时包含读写处理器的组合
    pub fn into_pair<C>(self) -> HandlerPair<V, C>
    where
        C: Send + 'static,
    {
        let tier = Arc::new(self);
        HandlerPair::<V, C>::new()
            .with_get(tier.clone())
            .with_set(tier)
    }
}

#[async_trait]
impl<V, C> GetHandler<V, C> for RedisTier<V>
where
    V: DeserializeOwned + Send + 'static,
    C: Send + 'static,
{
    async fn get(&self, key: &str, _ctx: &mut C) -> Result<Option<V>> {
        match self.get_bytes(key).await? {
            Some(bytes) => Ok(Some(self.serializer.deserialize(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl<V, C> SetHandler<V, C> for RedisTier<V>
where
    V: Serialize + Sync + 'static,
    C: Send + 'static,
{
    async fn set(&self, key: &str, value: &V, ttl: Option<Duration>, _ctx: &mut C) -> Result<()> {
        let bytes = self.serializer.serialize(value)?;
        self.set_bytes(key, bytes, ttl).await
    }
}
