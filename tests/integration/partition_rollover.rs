//! Monthly partition lifecycle: lazy creation, retention pruning, and the
//! coupling of pruning to the insert-failure path.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use state_monitor::StateReport;
use state_monitor::storage::memory::MemoryBackend;
use state_monitor::storage::{PartitionBackend, ReportRow, RollingReportStore};

fn rows(count: usize) -> Vec<ReportRow> {
    (0..count)
        .map(|i| {
            let report = StateReport {
                job_id: i as i64,
                service_name: "svc".to_string(),
                ..StateReport::default()
            };
            ReportRow::from_report(&report, Utc::now())
        })
        .collect()
}

fn at(year: i32, month: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, 15, 9, 30, 0).unwrap()
}

#[tokio::test]
async fn test_partition_is_created_exactly_once() {
    let backend = Arc::new(MemoryBackend::new());
    let store = RollingReportStore::new(Box::new(backend.clone()), 6);

    store.insert_reports_at(&rows(2), at(2026, 8)).await.unwrap();
    store.insert_reports_at(&rows(2), at(2026, 8)).await.unwrap();

    assert_eq!(backend.table_names(), vec!["report_state_202608"]);
    assert_eq!(backend.rows_in("report_state_202608").len(), 4);
}

#[tokio::test]
async fn test_month_rollover_opens_a_new_partition() {
    let backend = Arc::new(MemoryBackend::new());
    let store = RollingReportStore::new(Box::new(backend.clone()), 6);

    store.insert_reports_at(&rows(1), at(2026, 8)).await.unwrap();
    store.insert_reports_at(&rows(1), at(2026, 9)).await.unwrap();

    assert_eq!(
        backend.table_names(),
        vec!["report_state_202608", "report_state_202609"]
    );
}

#[tokio::test]
async fn test_expired_partitions_fall_off_on_the_failure_path() {
    let backend = Arc::new(MemoryBackend::new());
    backend.create_report_table("report_state_202507").await.unwrap();
    backend.create_report_table("report_state_202601").await.unwrap();

    let store = RollingReportStore::new(Box::new(backend.clone()), 6);

    // the current partition does not exist yet: the failed first attempt
    // also sweeps out everything older than six months
    store.insert_reports_at(&rows(1), at(2026, 8)).await.unwrap();

    assert_eq!(
        backend.table_names(),
        vec!["report_state_202608"],
        "202507 and 202601 are both older than the retention window"
    );
}

#[tokio::test]
async fn test_successful_inserts_do_not_prune() {
    let backend = Arc::new(MemoryBackend::new());
    backend.create_report_table("report_state_202507").await.unwrap();
    backend.create_report_table("report_state_202608").await.unwrap();

    let store = RollingReportStore::new(Box::new(backend.clone()), 6);

    // clean insert: the expired partition survives until something fails
    store.insert_reports_at(&rows(1), at(2026, 8)).await.unwrap();

    assert_eq!(
        backend.table_names(),
        vec!["report_state_202507", "report_state_202608"]
    );
}

#[tokio::test]
async fn test_explicit_prune_sweeps_expired_partitions() {
    let backend = Arc::new(MemoryBackend::new());
    backend.create_report_table("report_state_202507").await.unwrap();
    backend.create_report_table("report_state_202608").await.unwrap();

    let store = RollingReportStore::new(Box::new(backend.clone()), 6);
    store.prune_at(at(2026, 8)).await.unwrap();

    assert_eq!(backend.table_names(), vec!["report_state_202608"]);
}
