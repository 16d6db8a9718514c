//! Report row definition for the monthly partitions
//!
//! Every column of `report_state_YYYYMM` except the auto-increment id maps
//! to one field here. Aggregate values (memory, load, status) stay typed
//! columns so the secondary indexes can serve threshold queries; `extend`
//! carries whatever free-form payload the reporter attached.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::StateReport;

/// Columns of a monthly report partition, in insert order.
pub const REPORT_COLUMNS: [&str; 17] = [
    "job_id",
    "service_name",
    "status",
    "env_type",
    "start_time",
    "stop_time",
    "heart_time",
    "exit_code",
    "host",
    "process_id",
    "memory",
    "load",
    "net_in",
    "net_out",
    "extend",
    "is_alarm",
    "create_time",
];

/// One row awaiting insertion into a monthly partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub job_id: i64,
    pub service_name: String,
    pub status: i32,
    pub env_type: i32,
    pub start_time: i64,
    pub stop_time: i64,
    pub heart_time: i64,
    pub exit_code: i32,
    pub host: String,
    pub process_id: i64,
    pub memory: i64,
    pub load: i64,
    pub net_in: i64,
    pub net_out: i64,
    pub extend: String,
    pub is_alarm: bool,
    pub create_time: i64,
}

impl ReportRow {
    /// Convert an evaluated report into a storable row, stamping the
    /// ingestion time.
    pub fn from_report(report: &StateReport, ingested_at: DateTime<Utc>) -> Self {
        Self {
            job_id: report.job_id,
            service_name: report.service_name.clone(),
            status: report.status,
            env_type: report.env_type,
            start_time: report.start_time,
            stop_time: report.stop_time,
            heart_time: report.heart_time,
            exit_code: report.exit_code,
            host: report.host.clone(),
            process_id: report.process_id,
            memory: report.memory,
            load: report.load,
            net_in: report.net_in,
            net_out: report.net_out,
            extend: report.extend.clone(),
            is_alarm: report.is_alarm,
            create_time: ingested_at.timestamp(),
        }
    }
}
