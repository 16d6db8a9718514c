//! Key-value field cache
//!
//! Resolved policy fields are cached as string-to-string hashes in an
//! external key-value store so that evaluating a report does not cost a
//! relational round-trip. The `FieldCache` trait is the boundary to the
//! client library; `RedisFieldCache` is the production implementation,
//! `MemoryFieldCache` stands in for it in tests.
//!
//! Entries carry no expiry. They live until explicitly deleted, which
//! happens when a service reports a terminal exit code.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur during cache operations
#[derive(Debug)]
pub enum CacheError {
    /// Connection to the cache failed
    ConnectionFailed(String),

    /// A command was rejected or timed out
    CommandFailed(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::ConnectionFailed(msg) => {
                write!(f, "failed to connect to field cache: {}", msg)
            }
            CacheError::CommandFailed(msg) => write!(f, "cache command failed: {}", msg),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() {
            CacheError::ConnectionFailed(err.to_string())
        } else {
            CacheError::CommandFailed(err.to_string())
        }
    }
}

/// Trait for the hash-shaped field cache
///
/// Keys address one hash of field name to string value. Implementations
/// must be `Send + Sync`; they are shared across worker tasks.
#[async_trait]
pub trait FieldCache: Send + Sync {
    /// All fields stored under `key`. An unknown key yields an empty map.
    async fn fields(&self, key: &str) -> CacheResult<HashMap<String, String>>;

    /// Store `fields` under `key`, merging over any existing entry. No
    /// expiry is set.
    async fn store_fields(&self, key: &str, fields: &HashMap<String, String>) -> CacheResult<()>;

    /// Delete the entry under `key`. Deleting an unknown key is a no-op.
    async fn delete(&self, key: &str) -> CacheResult<()>;
}

/// Redis-backed field cache
///
/// Clones of the connection manager share one multiplexed connection and
/// reconnect on their own, so this handle is cheap to clone into workers.
#[derive(Clone)]
pub struct RedisFieldCache {
    manager: ConnectionManager,
}

impl RedisFieldCache {
    pub async fn connect(url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| CacheError::ConnectionFailed(e.to_string()))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::ConnectionFailed(e.to_string()))?;

        Ok(Self { manager })
    }
}

#[async_trait]
impl FieldCache for RedisFieldCache {
    async fn fields(&self, key: &str) -> CacheResult<HashMap<String, String>> {
        let mut conn = self.manager.clone();
        let fields: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(fields)
    }

    async fn store_fields(&self, key: &str, fields: &HashMap<String, String>) -> CacheResult<()> {
        let pairs: Vec<(&String, &String)> = fields.iter().collect();
        let mut conn = self.manager.clone();
        let _: () = conn.hset_multiple(key, &pairs).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.manager.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }
}

/// In-memory field cache (tests)
#[derive(Default)]
pub struct MemoryFieldCache {
    entries: std::sync::Mutex<HashMap<String, HashMap<String, String>>>,
}

impl MemoryFieldCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FieldCache for MemoryFieldCache {
    async fn fields(&self, key: &str) -> CacheResult<HashMap<String, String>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn store_fields(&self, key: &str, fields: &HashMap<String, String>) -> CacheResult<()> {
        self.entries
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .extend(fields.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}
