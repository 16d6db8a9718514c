//! Partition backend trait definition
//!
//! This module defines the `PartitionBackend` trait: the handful of
//! primitives the rolling report store needs from a relational database.
//! Everything above this trait (month naming, lazy creation, chunking,
//! retention) is backend-agnostic.

use async_trait::async_trait;

use super::error::StorageResult;
use super::schema::ReportRow;

/// Trait for the relational backend holding the monthly report partitions
///
/// Implementations must be `Send + Sync` as they are shared across worker
/// tasks. Errors are reported as `StorageError`; an insert against a table
/// that does not exist yet must surface as `StorageError::MissingTable` so
/// the caller can create the partition and retry.
#[async_trait]
pub trait PartitionBackend: Send + Sync {
    /// Insert rows into `table` with a single multi-row statement.
    ///
    /// Returns the insert id assigned to the statement. Callers are
    /// responsible for chunking; implementations may reject oversized
    /// batches.
    async fn insert_rows(&self, table: &str, rows: &[ReportRow]) -> StorageResult<u64>;

    /// Create a monthly report partition with the fixed report schema.
    ///
    /// Must be idempotent: creating a table that already exists is a no-op.
    async fn create_report_table(&self, table: &str) -> StorageResult<()>;

    /// List all tables whose name starts with `prefix`.
    async fn list_tables(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Drop a table. Used by retention pruning only.
    async fn drop_table(&self, table: &str) -> StorageResult<()>;
}

// Shared backends: a store can own a `Box<Arc<Backend>>` while callers keep
// their own handle (tests use this to inspect what the store wrote).
#[async_trait]
impl<T: PartitionBackend + ?Sized> PartitionBackend for std::sync::Arc<T> {
    async fn insert_rows(&self, table: &str, rows: &[ReportRow]) -> StorageResult<u64> {
        (**self).insert_rows(table, rows).await
    }

    async fn create_report_table(&self, table: &str) -> StorageResult<()> {
        (**self).create_report_table(table).await
    }

    async fn list_tables(&self, prefix: &str) -> StorageResult<Vec<String>> {
        (**self).list_tables(prefix).await
    }

    async fn drop_table(&self, table: &str) -> StorageResult<()> {
        (**self).drop_table(table).await
    }
}
