// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::Result;
use redis::AsyncCommands;

/// Redis客户端
///
/// 提供对Redis数据库的异步操作接口
#[derive(Clone)]
pub struct RedisClient {
    /// Redis客户端
    client: redis::Client,
}

impl RedisClient {
    /// 创建新的Redis客户端实例
    ///
    /// # 参数
    ///
    /// * `redis_url` - Redis连接URL
    ///
    /// # 返回值
    ///
    /// * `Ok(RedisClient)` - Redis客户端实例
    /// * `Err(anyhow::Error)` - 创建过程中出现的错误
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    /// 批量获取多个键的值
    ///
    /// # 参数
    ///
    /// * `keys` - 键列表
    ///
    /// # 返回值
    ///
    /// * `Ok(Vec<Option<String>>)` - 与键顺序一致的值列表
    /// * `Err(anyhow::Error)` - 获取过程中出现的错误
    pub async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut con = self.client.get_multiplexed_async_connection().await?;
        let values: Vec<Option<String>> = con.mget(keys).await?;
        Ok(values)
    }

    /// 原子地批量设置多个键值对
    ///
    /// # 参数
    ///
    /// * `items` - 键值对列表
    pub async fn set_many(&self, items: &[(String, String)]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let mut con = self.client.get_multiplexed_async_connection().await?;
        con.mset::<_, _, ()>(items).await?;
        Ok(())
    }
}
