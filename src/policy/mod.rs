//! Per-service alarm policies
//!
//! A policy is a flat map of field name to threshold string, resolved per
//! (job, service) pair. Resolution goes cache-first with a relational
//! fallback (`resolver`), the decision itself is a pure function over the
//! resolved fields (`evaluator`), and `PolicyEngine` ties both together
//! for the ingestion pipeline.

pub mod evaluator;
pub mod resolver;
pub mod store;

pub use evaluator::evaluate;
pub use resolver::{PolicyResolver, default_fields};
pub use store::{PolicyRow, PolicyStore};

use tracing::{error, warn};

use crate::StateReport;

/// Policy decisions for the ingestion pipeline.
pub struct PolicyEngine {
    resolver: PolicyResolver,
}

impl PolicyEngine {
    pub fn new(resolver: PolicyResolver) -> Self {
        Self { resolver }
    }

    /// Whether `report` is alarm-worthy, and why.
    ///
    /// A report whose policy cannot be resolved is treated as not
    /// alarm-worthy for this cycle (logged, next report retries). When the
    /// reporting process has exited, the cached policy entry is dropped
    /// regardless of the verdict — the job's next run may be governed by
    /// different thresholds.
    pub async fn check(&self, report: &StateReport) -> Option<String> {
        let verdict = match self
            .resolver
            .resolve(report.job_id, &report.service_name)
            .await
        {
            Ok(fields) => evaluator::evaluate(report, &fields),
            Err(e) => {
                error!(
                    "resolving policy for {}#{} failed: {e:#}",
                    report.job_id, report.service_name
                );
                None
            }
        };

        if report.has_exited() {
            if let Err(e) = self
                .resolver
                .invalidate(report.job_id, &report.service_name)
                .await
            {
                warn!(
                    "invalidating policy cache for {}#{} failed: {e}",
                    report.job_id, report.service_name
                );
            }
        }

        verdict
    }
}
