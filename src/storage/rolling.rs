//! Rolling monthly report store
//!
//! Reports land in one table per calendar month, named with a fixed prefix
//! plus `YYYYMM`. The store resolves the current partition on every insert,
//! creates it lazily when the backend reports it missing, and drops
//! partitions older than the retention window.
//!
//! Retention pruning is coupled to the insert-failure path: it runs after
//! any insert whose first attempt failed, including when the
//! create-and-retry succeeded. `prune` is public so callers can also run it
//! on their own schedule.

use chrono::{DateTime, Datelike, Utc};
use tracing::{debug, error};

use super::backend::PartitionBackend;
use super::error::StorageResult;
use super::schema::ReportRow;

/// Prefix of every monthly report partition.
pub const REPORT_TABLE_PREFIX: &str = "report_state_";

/// Upper bound on rows per INSERT statement; larger batches are split.
pub const MAX_ROWS_PER_STATEMENT: usize = 500;

/// Numeric `YYYYMM` suffix for the partition holding `at`.
pub fn month_suffix(at: DateTime<Utc>) -> u32 {
    at.year() as u32 * 100 + at.month()
}

/// `YYYYMM` of the month `months` before `at`.
fn month_suffix_back(at: DateTime<Utc>, months: u32) -> u32 {
    let total = at.year() * 12 + at.month() as i32 - 1 - months as i32;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) + 1;
    year as u32 * 100 + month as u32
}

/// Store appending report rows to monthly partitions.
pub struct RollingReportStore {
    backend: Box<dyn PartitionBackend>,
    prefix: String,
    retention_months: u32,
}

impl RollingReportStore {
    pub fn new(backend: Box<dyn PartitionBackend>, retention_months: u32) -> Self {
        Self::with_prefix(backend, REPORT_TABLE_PREFIX, retention_months)
    }

    pub fn with_prefix(
        backend: Box<dyn PartitionBackend>,
        prefix: &str,
        retention_months: u32,
    ) -> Self {
        Self {
            backend,
            prefix: prefix.to_string(),
            retention_months,
        }
    }

    /// Insert rows into the current monthly partition, creating it on
    /// demand. Returns the last statement's insert id.
    pub async fn insert_reports(&self, rows: &[ReportRow]) -> StorageResult<u64> {
        self.insert_reports_at(rows, Utc::now()).await
    }

    /// Like [`insert_reports`](Self::insert_reports) with an explicit clock.
    pub async fn insert_reports_at(
        &self,
        rows: &[ReportRow],
        now: DateTime<Utc>,
    ) -> StorageResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let table = format!("{}{}", self.prefix, month_suffix(now));

        match self.insert_chunked(&table, rows).await {
            Ok(id) => Ok(id),
            Err(err) => {
                let result = if err.is_missing_table() {
                    debug!("{table} does not exist yet, creating and retrying");
                    match self.backend.create_report_table(&table).await {
                        Ok(()) => self.insert_chunked(&table, rows).await,
                        Err(create_err) => Err(create_err),
                    }
                } else {
                    Err(err)
                };

                // Retention runs whenever the first attempt failed, whether
                // or not the retry recovered. Pruning failures are logged,
                // never propagated over the insert outcome.
                if let Err(prune_err) = self.prune_at(now).await {
                    error!("dropping expired report partitions failed: {prune_err}");
                }

                result
            }
        }
    }

    async fn insert_chunked(&self, table: &str, rows: &[ReportRow]) -> StorageResult<u64> {
        let mut last_id = 0;
        for chunk in rows.chunks(MAX_ROWS_PER_STATEMENT) {
            last_id = self.backend.insert_rows(table, chunk).await?;
        }
        Ok(last_id)
    }

    /// Drop every partition older than the retention window. A retention of
    /// zero months disables pruning.
    pub async fn prune(&self) -> StorageResult<()> {
        self.prune_at(Utc::now()).await
    }

    /// Like [`prune`](Self::prune) with an explicit clock.
    pub async fn prune_at(&self, now: DateTime<Utc>) -> StorageResult<()> {
        if self.retention_months == 0 {
            return Ok(());
        }

        let threshold = month_suffix_back(now, self.retention_months);

        for table in self.backend.list_tables(&self.prefix).await? {
            let Some(suffix) = table.strip_prefix(&self.prefix) else {
                continue;
            };
            let Ok(month) = suffix.parse::<u32>() else {
                continue;
            };
            if month < threshold {
                self.backend.drop_table(&table).await?;
            }
        }

        Ok(())
    }
}
