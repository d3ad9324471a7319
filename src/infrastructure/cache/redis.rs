//! Redis cache store

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use serde::{Deserialize, Serialize};

use crate::domain::cache::{CacheEntryOptions, CacheStore, PrefixRemoval};
use crate::domain::DomainError;

/// Configuration for the Redis store
#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// TTL for entries written without any expiry
    pub default_ttl: Duration,
    /// Key prefix for namespacing
    pub key_prefix: Option<String>,
    /// Bound on establishing the connection
    pub connection_timeout: Duration,
    /// Bound on every individual command
    pub operation_timeout: Duration,
    /// Whether `remove_by_prefix` may SCAN the keyspace
    pub allow_prefix_scan: bool,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            default_ttl: Duration::from_secs(300),
            key_prefix: None,
            connection_timeout: Duration::from_secs(2),
            operation_timeout: Duration::from_millis(250),
            allow_prefix_scan: false,
        }
    }
}

impl RedisCacheConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn with_prefix_scan(mut self, allowed: bool) -> Self {
        self.allow_prefix_scan = allowed;
        self
    }
}

/// Stored form of a value; carries the expiry so reads can re-arm it
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sliding_ms: Option<u64>,
    /// Unix epoch millis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    absolute_at_ms: Option<i64>,
}

impl Envelope {
    fn new(data: &str, options: CacheEntryOptions, now_ms: i64) -> Self {
        Self {
            data: data.to_string(),
            sliding_ms: options.sliding.map(duration_ms),
            absolute_at_ms: options
                .absolute
                .map(|a| now_ms.saturating_add(duration_ms(a) as i64)),
        }
    }

    fn remaining_absolute_ms(&self, now_ms: i64) -> Option<i64> {
        self.absolute_at_ms.map(|at| at - now_ms)
    }

    /// TTL to re-arm after a read, `None` if the entry is not sliding
    fn refreshed_ttl_ms(&self, now_ms: i64) -> Option<u64> {
        let sliding = self.sliding_ms?;
        match self.remaining_absolute_ms(now_ms) {
            Some(remaining) => Some(sliding.min(remaining.max(1) as u64)),
            None => Some(sliding),
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    (d.as_millis() as u64).max(1)
}

/// Distributed cache tier backed by Redis
///
/// Every command is bounded by `operation_timeout`; an unreachable or slow
/// server surfaces as `CacheUnavailable` instead of stalling the request.
#[derive(Clone)]
pub struct RedisCacheStore {
    connection: ConnectionManager,
    config: RedisCacheConfig,
}

impl fmt::Debug for RedisCacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCacheStore")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisCacheStore {
    /// Connects to Redis, failing if the server is not reachable in time
    pub async fn connect(config: RedisCacheConfig) -> Result<Self, DomainError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| DomainError::configuration(format!("Invalid Redis URL: {}", e)))?;

        let connection = tokio::time::timeout(config.connection_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| DomainError::cache_unavailable("Timed out connecting to Redis"))?
            .map_err(|e| DomainError::cache_unavailable(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self { connection, config })
    }

    pub fn config(&self) -> &RedisCacheConfig {
        &self.config
    }

    fn prefix_key(&self, key: &str) -> String {
        match &self.config.key_prefix {
            Some(prefix) => format!("{}:{}", prefix, key),
            None => key.to_string(),
        }
    }

    /// Runs a command under the operation timeout
    async fn bounded<T, F>(&self, op: &str, key: &str, fut: F) -> Result<T, DomainError>
    where
        F: Future<Output = Result<T, RedisError>>,
    {
        match tokio::time::timeout(self.config.operation_timeout, fut).await {
            Ok(result) => result.map_err(|e| map_redis_error(op, key, e)),
            Err(_) => Err(DomainError::cache_unavailable(format!(
                "Redis {} timed out for key '{}'",
                op, key
            ))),
        }
    }
}

fn map_redis_error(op: &str, key: &str, e: RedisError) -> DomainError {
    let message = format!("Redis {} failed for key '{}': {}", op, key, e);
    if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout() {
        DomainError::cache_unavailable(message)
    } else {
        DomainError::cache(message)
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let raw: Option<String> = self.bounded("GET", key, conn.get(&prefixed_key)).await?;
        let Some(raw) = raw else {
            return Ok(None);
        };

        let envelope: Envelope = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding malformed cache entry");
                let _: i64 = self.bounded("DEL", key, conn.del(&prefixed_key)).await?;
                return Ok(None);
            }
        };

        let now_ms = Utc::now().timestamp_millis();

        if envelope.remaining_absolute_ms(now_ms).is_some_and(|r| r <= 0) {
            let _: i64 = self.bounded("DEL", key, conn.del(&prefixed_key)).await?;
            return Ok(None);
        }

        let Some(ttl_ms) = envelope.refreshed_ttl_ms(now_ms) else {
            return Ok(Some(envelope.data));
        };

        let rearm = self.bounded("PEXPIRE", key, conn.pexpire(&prefixed_key, ttl_ms as i64));
        Ok(Some(keep_after_rearm(key, envelope.data, rearm).await))
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        options: CacheEntryOptions,
    ) -> Result<(), DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let envelope = Envelope::new(value, options, Utc::now().timestamp_millis());
        let encoded = serde_json::to_string(&envelope)
            .map_err(|e| DomainError::serialization(format!("Failed to encode entry: {}", e)))?;

        let ttl_ms = duration_ms(options.initial_ttl().unwrap_or(self.config.default_ttl));

        let _: () = self
            .bounded("SET", key, conn.pset_ex(&prefixed_key, encoded, ttl_ms))
            .await?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let _: i64 = self.bounded("DEL", key, conn.del(&prefixed_key)).await?;
        Ok(())
    }

    async fn remove_by_prefix(&self, prefix: &str) -> Result<PrefixRemoval, DomainError> {
        if !self.config.allow_prefix_scan {
            return Ok(PrefixRemoval::Unsupported);
        }

        let pattern = format!("{}*", self.prefix_key(&escape_glob(prefix)));
        let mut conn = self.connection.clone();

        let mut cursor = 0u64;
        let mut total_deleted = 0usize;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = self
                .bounded(
                    "SCAN",
                    prefix,
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(100)
                        .query_async(&mut conn),
                )
                .await?;

            if !keys.is_empty() {
                let deleted: i64 = self.bounded("DEL", prefix, conn.del(&keys)).await?;
                total_deleted += deleted as usize;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(PrefixRemoval::Removed(total_deleted))
    }

    async fn add_to_set(
        &self,
        set_key: &str,
        member: &str,
        ttl: Duration,
    ) -> Result<(), DomainError> {
        let prefixed_key = self.prefix_key(set_key);
        let mut conn = self.connection.clone();

        let _: () = self
            .bounded(
                "SADD",
                set_key,
                redis::pipe()
                    .atomic()
                    .sadd(&prefixed_key, member)
                    .ignore()
                    .pexpire(&prefixed_key, duration_ms(ttl) as i64)
                    .ignore()
                    .query_async(&mut conn),
            )
            .await?;

        Ok(())
    }

    async fn take_set(&self, set_key: &str) -> Result<Vec<String>, DomainError> {
        let prefixed_key = self.prefix_key(set_key);
        let mut conn = self.connection.clone();

        let (members,): (Vec<String>,) = self
            .bounded(
                "SMEMBERS",
                set_key,
                redis::pipe()
                    .atomic()
                    .smembers(&prefixed_key)
                    .del(&prefixed_key)
                    .ignore()
                    .query_async(&mut conn),
            )
            .await?;

        Ok(members)
    }
}

/// Escapes glob metacharacters so a prefix matches literally
fn escape_glob(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Returns a value already read, whatever the sliding re-arm did
///
/// A failed re-arm only shortens the entry's life.
async fn keep_after_rearm<F>(key: &str, data: String, rearm: F) -> String
where
    F: Future<Output = Result<bool, DomainError>>,
{
    if let Err(e) = rearm.await {
        tracing::warn!(key = %key, error = %e, "Failed to re-arm sliding expiry");
    }
    data
}
