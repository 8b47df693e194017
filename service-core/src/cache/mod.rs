//! Cache and pub/sub abstraction.
//!
//! Services receive a `dyn Cache` rather than talking to Redis directly so
//! the caching layer can be swapped in tests and when no Redis instance is
//! configured. `RedisCache` is the production implementation; `MemoryCache`
//! backs local development and the test suites.

use crate::error::AppError;
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Key/value cache with TTL, pattern invalidation and event publishing.
///
/// Values are opaque strings; callers serialize with serde_json.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError>;

    /// Delete every key matching a glob-style pattern (e.g. `recon:results:t1:*`).
    async fn delete_pattern(&self, pattern: &str) -> Result<(), AppError>;

    /// Publish an event payload on a channel (fire-and-forget fan-out).
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), AppError>;
}

/// Redis-backed cache using a multiplexed connection manager.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!("Redis connection established");
        Ok(Self { conn })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
            .await?;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let mut keys: Vec<String> = Vec::new();
        {
            let mut iter = conn.scan_match::<_, String>(pattern).await?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }
        if !keys.is_empty() {
            let mut conn = self.conn.clone();
            conn.del::<_, ()>(keys).await?;
        }
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        conn.publish::<_, _, ()>(channel, payload).await?;
        Ok(())
    }
}

/// In-process cache used when no Redis URL is configured, and in tests.
///
/// Published events are retained so tests can assert on them.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (String, Option<Instant>)>>,
    published: Mutex<Vec<(String, String)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events published so far, as (channel, payload) pairs.
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().expect("published lock").clone()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some((_, Some(expires))) if *expires <= Instant::now() => Ok(None),
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            (value.to_string(), Instant::now().checked_add(ttl)),
        );
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<(), AppError> {
        let mut entries = self.entries.write().await;
        if let Some(prefix) = pattern.strip_suffix('*') {
            entries.retain(|key, _| !key.starts_with(prefix));
        } else {
            entries.remove(pattern);
        }
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), AppError> {
        self.published
            .lock()
            .expect("published lock")
            .push((channel.to_string(), payload.to_string()));
        Ok(())
    }
}
