pub mod actors;
pub mod cache;
pub mod config;
pub mod policy;
pub mod storage;
pub mod stream;

use serde::{Deserialize, Serialize};

/// Values of the `status` field of a report.
pub mod status {
    pub const FAILED: i32 = 0;
    pub const OK: i32 = 1;
}

/// Values of the `exit_code` field of a report.
pub mod exit_code {
    pub const NOT_EXITED: i32 = 0;
    pub const EXIT_OK: i32 = 1;
    pub const EXIT_FAILED: i32 = 2;
    pub const EXIT_KILLED: i32 = 3;
}

/// Values of the `env_type` field of a report.
pub mod env_type {
    pub const DEV: i32 = 0;
    pub const TEST: i32 = 1;
    pub const INTEGRATION: i32 = 2;
    pub const STAGING: i32 = 3;
    pub const PRODUCTION: i32 = 4;
}

/// One telemetry sample reported by a monitored service instance.
///
/// Deserialized from an inbound stream message. Missing fields fall back to
/// their zero values, matching what lenient producers actually send.
/// `is_alarm` is never on the wire; the pipeline sets it after evaluation,
/// just before the report is handed to the write buffer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StateReport {
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
    #[serde(skip)]
    pub is_alarm: bool,
}

impl StateReport {
    /// Whether the reporting process has terminated (any terminal exit code).
    pub fn has_exited(&self) -> bool {
        self.exit_code >= exit_code::EXIT_OK
    }
}

/// One alarm pushed onto the outbound stream when a report violates its
/// policy. Ephemeral: serialized, sent, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmEvent {
    pub job_id: i64,
    pub service_name: String,
    pub heart_time: i64,
    pub content: String,
}
