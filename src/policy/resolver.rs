//! Cache-then-store policy resolution
//!
//! `resolve` serves threshold fields from the key-value cache when it can,
//! falls back to the relational store otherwise, and primes the cache with
//! the result. Cache trouble only costs the round-trip it was saving —
//! lookups degrade to the store, priming failures are logged and dropped.
//! Relational failures propagate to the caller.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing::{debug, trace, warn};

use crate::cache::{CacheResult, FieldCache};

use super::store::PolicyStore;

/// Key prefix of cached policy entries.
pub const POLICY_CACHE_PREFIX: &str = "monitor:state:policy";

/// Bookkeeping field recording which stored policy produced the entry.
pub const FIELD_MONITOR_POLICY: &str = "monitor_policy";

/// Bookkeeping field recording when the entry was resolved.
pub const FIELD_TIMESTAMP: &str = "timestamp";

/// Cache key for one (job, service) pair.
pub fn cache_key(job_id: i64, service_name: &str) -> String {
    format!("{POLICY_CACHE_PREFIX}:{job_id}#{service_name}")
}

/// The built-in fallback thresholds, used when no policy row exists or the
/// stored policy id is zero.
pub fn default_fields() -> HashMap<String, String> {
    HashMap::from([
        ("memory".to_string(), "20".to_string()),
        ("status".to_string(), "0".to_string()),
        ("exit_code".to_string(), "2#3".to_string()),
    ])
}

/// Resolves threshold fields for (job, service) pairs.
pub struct PolicyResolver {
    cache: Arc<dyn FieldCache>,
    store: Arc<dyn PolicyStore>,
}

impl PolicyResolver {
    pub fn new(cache: Arc<dyn FieldCache>, store: Arc<dyn PolicyStore>) -> Self {
        Self { cache, store }
    }

    /// Threshold fields for `(job_id, service_name)`, cached or freshly
    /// resolved. The returned map also carries the `monitor_policy` and
    /// `timestamp` bookkeeping fields.
    pub async fn resolve(
        &self,
        job_id: i64,
        service_name: &str,
    ) -> anyhow::Result<HashMap<String, String>> {
        let key = cache_key(job_id, service_name);

        match self.cache.fields(&key).await {
            Ok(fields) if !fields.is_empty() => {
                trace!("policy cache hit for {key}");
                return Ok(fields);
            }
            Ok(_) => {}
            Err(e) => warn!("policy cache lookup failed, falling back to store: {e}"),
        }

        let row = self
            .store
            .fetch(job_id, service_name)
            .await
            .context("loading monitor policy")?;

        let (policy, mut fields) = match row {
            Some(row) if row.monitor_policy != 0 => {
                let raw = row.fields.unwrap_or_default();
                let fields: HashMap<String, String> =
                    serde_json::from_str(&raw).context("decoding monitor policy fields")?;
                (row.monitor_policy, fields)
            }
            _ => (0, default_fields()),
        };

        fields.insert(FIELD_MONITOR_POLICY.to_string(), policy.to_string());
        fields.insert(
            FIELD_TIMESTAMP.to_string(),
            Utc::now().timestamp().to_string(),
        );

        // best effort: a cold cache only costs the next resolve a store trip
        if let Err(e) = self.cache.store_fields(&key, &fields).await {
            warn!("priming policy cache for {key} failed: {e}");
        }

        Ok(fields)
    }

    /// Drop the cached entry so the next resolve re-queries the store.
    pub async fn invalidate(&self, job_id: i64, service_name: &str) -> CacheResult<()> {
        let key = cache_key(job_id, service_name);
        debug!("invalidating policy cache entry {key}");
        self.cache.delete(&key).await
    }
}
