//! Relational policy lookup
//!
//! One row per (job, service) in the `state_monitor_policy` table. The
//! `fields` column is a JSON object of field name to threshold string; a
//! `monitor_policy` of zero means the row is a placeholder and the built-in
//! defaults apply.

use async_trait::async_trait;
use sqlx::Row;
use sqlx::mysql::MySqlPool;

use crate::storage::error::StorageResult;

/// Name of the policy table.
pub const POLICY_TABLE: &str = "state_monitor_policy";

/// Stored policy row for one (job, service) pair.
#[derive(Debug, Clone)]
pub struct PolicyRow {
    /// Policy id; zero selects the built-in default field set.
    pub monitor_policy: i32,

    /// JSON-encoded field-to-threshold object.
    pub fields: Option<String>,
}

/// Trait for the relational store holding alarm policies
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// The stored policy for `(job_id, service_name)`, if any.
    async fn fetch(&self, job_id: i64, service_name: &str) -> StorageResult<Option<PolicyRow>>;
}

/// MySQL policy store
pub struct MySqlPolicyStore {
    pool: MySqlPool,
}

impl MySqlPolicyStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PolicyStore for MySqlPolicyStore {
    async fn fetch(&self, job_id: i64, service_name: &str) -> StorageResult<Option<PolicyRow>> {
        let row = sqlx::query(&format!(
            "SELECT monitor_policy, fields FROM {POLICY_TABLE} WHERE job_id = ? AND service_name = ?"
        ))
        .bind(job_id)
        .bind(service_name)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            None => Ok(None),
            Some(row) => Ok(Some(PolicyRow {
                monitor_policy: row.try_get("monitor_policy")?,
                fields: row.try_get("fields")?,
            })),
        }
    }
}

/// In-memory policy store (tests)
#[derive(Default)]
pub struct MemoryPolicyStore {
    rows: std::sync::Mutex<std::collections::HashMap<(i64, String), PolicyRow>>,
    lookups: std::sync::atomic::AtomicUsize,
}

impl MemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job_id: i64, service_name: &str, row: PolicyRow) {
        self.rows
            .lock()
            .unwrap()
            .insert((job_id, service_name.to_string()), row);
    }

    /// How many times `fetch` has been called.
    pub fn lookups(&self) -> usize {
        self.lookups.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn fetch(&self, job_id: i64, service_name: &str) -> StorageResult<Option<PolicyRow>> {
        self.lookups
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get(&(job_id, service_name.to_string()))
            .cloned())
    }
}
