//! In-memory partition backend (no persistence)
//!
//! Stores rows in a mutex-guarded map of table name to row vector. Used by
//! the test suite in place of a live database; behaves like the real
//! backend where the rolling store can tell the difference, in particular
//! by failing inserts against tables that were never created.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use super::backend::PartitionBackend;
use super::error::{StorageError, StorageResult};
use super::schema::ReportRow;

#[derive(Default)]
struct MemoryState {
    tables: BTreeMap<String, Vec<ReportRow>>,
    insert_batch_sizes: Vec<usize>,
    next_id: u64,
}

/// In-memory partition backend
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Names of all existing tables, sorted.
    pub fn table_names(&self) -> Vec<String> {
        self.state.lock().unwrap().tables.keys().cloned().collect()
    }

    /// Rows currently held by `table` (empty if the table does not exist).
    pub fn rows_in(&self, table: &str) -> Vec<ReportRow> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Row counts of every insert statement executed, in order.
    pub fn insert_batch_sizes(&self) -> Vec<usize> {
        self.state.lock().unwrap().insert_batch_sizes.clone()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PartitionBackend for MemoryBackend {
    async fn insert_rows(&self, table: &str, rows: &[ReportRow]) -> StorageResult<u64> {
        let mut state = self.state.lock().unwrap();

        let Some(stored) = state.tables.get_mut(table) else {
            return Err(StorageError::MissingTable(table.to_string()));
        };
        stored.extend_from_slice(rows);

        state.next_id += rows.len() as u64;
        let last_id = state.next_id;
        state.insert_batch_sizes.push(rows.len());

        Ok(last_id)
    }

    async fn create_report_table(&self, table: &str) -> StorageResult<()> {
        debug!("in-memory backend: creating table {table}");
        self.state
            .lock()
            .unwrap()
            .tables
            .entry(table.to_string())
            .or_default();
        Ok(())
    }

    async fn list_tables(&self, prefix: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .tables
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn drop_table(&self, table: &str) -> StorageResult<()> {
        debug!("in-memory backend: dropping table {table}");
        self.state.lock().unwrap().tables.remove(table);
        Ok(())
    }
}
