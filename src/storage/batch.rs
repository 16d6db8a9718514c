//! Write-batch cache
//!
//! Every worker funnels its report rows through one shared `BatchCache`,
//! which coalesces them into larger transactional inserts. Two triggers
//! bound the trade-off: a capacity cap limits memory held, a time window
//! limits how stale a buffered row may get.
//!
//! The whole decide-and-mutate sequence of [`record`](BatchCache::record)
//! runs inside a single mutex. Splitting the capacity check from the append
//! would let two workers both pass the check and overfill the buffer.
//!
//! A `BatchCache` is an explicitly constructed value. Sharing one instance
//! across several pipelines consolidates their writes; that sharing is a
//! wiring decision made where the pipelines are spawned, not something this
//! module does on its own.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, trace};

use super::error::StorageResult;
use super::rolling::RollingReportStore;
use super::schema::ReportRow;

/// Buffered rows before a size-triggered flush.
pub const BATCH_CAPACITY: usize = 200;

/// Maximum age of the oldest buffered row before a time-triggered flush.
pub const BATCH_WINDOW: Duration = Duration::from_secs(90);

struct BatchState {
    rows: Vec<ReportRow>,
    /// When the first row of the current window was buffered.
    window_start: Option<Instant>,
}

/// Shared buffer coalescing report rows into batched inserts.
pub struct BatchCache {
    store: Arc<RollingReportStore>,
    state: Mutex<BatchState>,
    capacity: usize,
    window: Duration,
}

impl BatchCache {
    pub fn new(store: Arc<RollingReportStore>) -> Self {
        Self::with_limits(store, BATCH_CAPACITY, BATCH_WINDOW)
    }

    pub fn with_limits(store: Arc<RollingReportStore>, capacity: usize, window: Duration) -> Self {
        Self {
            store,
            state: Mutex::new(BatchState {
                rows: Vec::with_capacity(capacity),
                window_start: None,
            }),
            capacity,
            window,
        }
    }

    /// Buffer one row, flushing to storage when the capacity or window
    /// trigger fires.
    ///
    /// A window-triggered flush that fails leaves the buffer (including
    /// `row`) intact for the next attempt. A capacity-triggered flush has
    /// already rotated the buffer out before `row` is accepted, so its
    /// failure is reported while `row` still starts the next window.
    pub async fn record(&self, row: ReportRow) -> StorageResult<()> {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        // capacity trigger: flush the existing buffer, then accept the new
        // row into a fresh window
        if state.rows.len() >= self.capacity {
            let pending = std::mem::take(&mut state.rows);
            state.window_start = None;

            debug!("capacity flush of {} buffered reports", pending.len());
            let result = self.store.insert_reports(&pending).await;

            state.rows.push(row);
            state.window_start = Some(now);

            return result.map(drop);
        }

        // window trigger: append, then flush everything
        let window_elapsed = state
            .window_start
            .is_some_and(|start| now.duration_since(start) > self.window);

        if !state.rows.is_empty() && window_elapsed {
            state.rows.push(row);

            debug!("window flush of {} buffered reports", state.rows.len());
            let last_id = self.store.insert_reports(&state.rows).await?;
            trace!("window flush done, last insert id {last_id}");

            state.rows.clear();
            state.window_start = None;
            return Ok(());
        }

        // plain buffering
        state.rows.push(row);
        if state.window_start.is_none() {
            state.window_start = Some(now);
        }

        Ok(())
    }

    /// Drain everything to storage, bypassing both triggers. Called on
    /// shutdown; the buffer is reset whether or not the insert succeeds.
    pub async fn flush(&self) -> StorageResult<()> {
        let mut state = self.state.lock().await;

        if state.rows.is_empty() {
            return Ok(());
        }

        let pending = std::mem::take(&mut state.rows);
        state.window_start = None;

        debug!("final flush of {} buffered reports", pending.len());
        self.store.insert_reports(&pending).await.map(drop)
    }

    /// Number of rows currently buffered.
    pub async fn buffered(&self) -> usize {
        self.state.lock().await.rows.len()
    }
}
