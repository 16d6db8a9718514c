//! Pure alarm decision logic
//!
//! Given a report and its resolved threshold fields, decide whether the
//! report is alarm-worthy and with which reason. Rules are checked in a
//! fixed order and the first match wins:
//!
//! 1. memory percentage above the `memory` ceiling
//! 2. failed status matching the `status` sentinel
//! 3. terminal exit code contained in the `exit_code` set
//!
//! No I/O, no side effects — cache invalidation on terminal exit codes is
//! the engine's job, not the evaluator's.

use std::collections::HashMap;

use tracing::debug;

use crate::{StateReport, exit_code, status};

pub const FIELD_MEMORY: &str = "memory";
pub const FIELD_STATUS: &str = "status";
pub const FIELD_EXIT_CODE: &str = "exit_code";

/// Separator between entries of the `exit_code` list field, e.g. `"2#3"`.
pub const EXIT_CODE_SEPARATOR: char = '#';

/// Evaluate `report` against `fields`. Returns the alarm reason, or `None`
/// when no rule matches.
pub fn evaluate(report: &StateReport, fields: &HashMap<String, String>) -> Option<String> {
    if let Some(threshold) = int_field(fields, FIELD_MEMORY) {
        if report.memory > threshold {
            return Some(format!(
                "memory usage is too high, usage: {}",
                report.memory
            ));
        }
    }

    if let Some(threshold) = int_field(fields, FIELD_STATUS) {
        // both sides must equal the failed sentinel; a configured non-failed
        // status threshold never fires
        if report.status == status::FAILED && i64::from(report.status) == threshold {
            return Some("service status exception".to_string());
        }
    }

    if let Some(raw) = fields.get(FIELD_EXIT_CODE) {
        if report.exit_code > exit_code::NOT_EXITED {
            let matched = raw
                .split(EXIT_CODE_SEPARATOR)
                .filter_map(|value| value.trim().parse::<i32>().ok())
                .any(|code| code == report.exit_code);

            if matched {
                return Some("service exit exception".to_string());
            }
        }
    }

    None
}

/// An absent field disables its rule; so does a value that fails to parse
/// (a corrupt entry must not degenerate into a zero threshold).
fn int_field(fields: &HashMap<String, String>, name: &str) -> Option<i64> {
    let raw = fields.get(name)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            debug!("ignoring unparseable {name} threshold: {raw:?}");
            None
        }
    }
}
