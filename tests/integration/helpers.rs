//! Test helpers and utilities for the integration suite

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use state_monitor::{
    StateReport,
    actors::emitter::EmitterHandle,
    actors::pipeline::PipelineContext,
    cache::MemoryFieldCache,
    policy::{PolicyEngine, PolicyResolver, store::MemoryPolicyStore},
    storage::rolling::month_suffix,
    storage::{BatchCache, RollingReportStore, memory::MemoryBackend},
    stream::memory::MemoryOutbound,
};

/// A complete processing stack over in-memory backends, with handles for
/// inspecting what the pipeline did to each of them.
pub struct TestStack {
    pub ctx: PipelineContext,
    pub backend: Arc<MemoryBackend>,
    pub cache: Arc<MemoryFieldCache>,
    pub policies: Arc<MemoryPolicyStore>,
    pub outbound: Arc<MemoryOutbound>,
}

/// Build a stack with the given batch limits.
pub fn test_stack(batch_capacity: usize, batch_window: Duration) -> TestStack {
    let backend = Arc::new(MemoryBackend::new());
    let store = Arc::new(RollingReportStore::new(Box::new(backend.clone()), 6));
    let batch = Arc::new(BatchCache::with_limits(store, batch_capacity, batch_window));

    let cache = Arc::new(MemoryFieldCache::new());
    let policies = Arc::new(MemoryPolicyStore::new());
    let resolver = PolicyResolver::new(cache.clone(), policies.clone());

    let outbound = Arc::new(MemoryOutbound::new());

    TestStack {
        ctx: PipelineContext {
            policy: Arc::new(PolicyEngine::new(resolver)),
            batch,
            emitter: EmitterHandle::spawn(outbound.clone()),
        },
        backend,
        cache,
        policies,
        outbound,
    }
}

/// A healthy report with sensible defaults.
pub fn report(job_id: i64, service_name: &str) -> StateReport {
    StateReport {
        job_id,
        service_name: service_name.to_string(),
        status: state_monitor::status::OK,
        env_type: state_monitor::env_type::PRODUCTION,
        start_time: 1700000000,
        heart_time: 1700000060,
        host: "10.0.0.1".to_string(),
        process_id: 1000 + job_id,
        memory: 5,
        load: 10,
        ..StateReport::default()
    }
}

pub fn report_json(report: &StateReport) -> String {
    serde_json::to_string(report).unwrap()
}

/// Name of the partition rows inserted right now land in.
pub fn current_partition() -> String {
    format!("report_state_{}", month_suffix(Utc::now()))
}
