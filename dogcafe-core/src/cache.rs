//! 键值缓存
//!
//! 路由表在启动时通过这个接口读取 / 写入。
//! `MemoryCache` 用于测试和单进程部署，`RedisCache` 需要 `redis` feature。

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::error::CacheResult;

/// 字符串键值缓存
pub trait Cache: Send + Sync {
    /// 读取，不存在或已过期返回 `None`
    fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// 写入，`ttl` 为 `None` 表示永不过期
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()>;

    /// 删除，返回键是否存在
    fn delete(&self, key: &str) -> CacheResult<bool>;

    fn has(&self, key: &str) -> CacheResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// 清空整个缓存
    fn clear(&self) -> CacheResult<()>;
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// 进程内缓存
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let now = Instant::now();
        let entries = self.entries.read();
        Ok(entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone()))
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        let entry = Entry {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.write().insert(key.to_string(), entry);
        Ok(())
    }

    fn delete(&self, key: &str) -> CacheResult<bool> {
        Ok(self.entries.write().remove(key).is_some())
    }

    fn clear(&self) -> CacheResult<()> {
        self.entries.write().clear();
        Ok(())
    }
}

/// 缓存连接配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheProperties {
    /// `memory` 或 `redis`
    pub driver: String,
    pub host: String,
    pub port: u16,
    pub password: String,
}

impl Default for CacheProperties {
    fn default() -> Self {
        Self {
            driver: "memory".to_string(),
            host: "dog-cafe-redis".to_string(),
            port: 6379,
            password: String::new(),
        }
    }
}

impl CacheProperties {
    /// 从 Environment 加载配置
    pub fn from_environment(env: &crate::config::Environment) -> Self {
        let defaults = Self::default();
        Self {
            driver: env.get_string_or("cache.driver", &defaults.driver),
            host: env.get_string_or("redis.host", &defaults.host),
            port: env
                .get_i64("redis.port")
                .and_then(|port| u16::try_from(port).ok())
                .unwrap_or(defaults.port),
            password: env.get_string_or("redis.password", &defaults.password),
        }
    }

    /// redis 连接地址
    pub fn redis_url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/", self.host, self.port)
        } else {
            format!("redis://:{}@{}:{}/", self.password, self.host, self.port)
        }
    }
}

#[cfg(feature = "redis")]
pub use self::redis_cache::RedisCache;

#[cfg(feature = "redis")]
mod redis_cache {
    use std::time::Duration;

    use parking_lot::Mutex;
    use redis::Commands;

    use super::{Cache, CacheProperties};
    use crate::error::{CacheError, CacheResult};

    /// Redis 缓存
    pub struct RedisCache {
        connection: Mutex<redis::Connection>,
    }

    impl RedisCache {
        /// 建立连接
        pub fn connect(properties: &CacheProperties) -> CacheResult<Self> {
            let client = redis::Client::open(properties.redis_url())
                .map_err(|e| CacheError::Unavailable(e.to_string()))?;
            let connection = client
                .get_connection()
                .map_err(|e| CacheError::Unavailable(e.to_string()))?;

            tracing::info!(
                "Connected to redis at {}:{}",
                properties.host,
                properties.port
            );

            Ok(Self {
                connection: Mutex::new(connection),
            })
        }
    }

    fn operation(key: &str, error: redis::RedisError) -> CacheError {
        CacheError::Operation {
            key: key.to_string(),
            message: error.to_string(),
        }
    }

    impl Cache for RedisCache {
        fn get(&self, key: &str) -> CacheResult<Option<String>> {
            self.connection
                .lock()
                .get::<_, Option<String>>(key)
                .map_err(|e| operation(key, e))
        }

        fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
            let mut connection = self.connection.lock();
            match ttl.map(|ttl| ttl.as_secs()).filter(|secs| *secs > 0) {
                Some(secs) => connection.set_ex::<_, _, ()>(key, value, secs),
                None => connection.set::<_, _, ()>(key, value),
            }
            .map_err(|e| operation(key, e))
        }

        fn delete(&self, key: &str) -> CacheResult<bool> {
            self.connection
                .lock()
                .del::<_, i64>(key)
                .map(|removed| removed == 1)
                .map_err(|e| operation(key, e))
        }

        fn has(&self, key: &str) -> CacheResult<bool> {
            self.connection
                .lock()
                .exists::<_, bool>(key)
                .map_err(|e| operation(key, e))
        }

        fn clear(&self) -> CacheResult<()> {
            let mut connection = self.connection.lock();
            redis::cmd("FLUSHDB")
                .query::<()>(&mut *connection)
                .map_err(|e| operation("*", e))
        }
    }
}
