//! End-to-end policy scenarios: a report enters the pipeline, the policy
//! decides, the alarm goes out, the row lands in storage.

use std::time::Duration;

use state_monitor::policy::resolver::cache_key;
use state_monitor::policy::store::PolicyRow;
use state_monitor::stream::memory::MemoryInbound;
use state_monitor::{AlarmEvent, actors::pipeline::IngestPipeline, cache::FieldCache};

use crate::helpers::{current_partition, report, report_json, test_stack};

#[tokio::test]
async fn test_high_memory_report_alarms_and_persists_flagged() {
    let stack = test_stack(100, Duration::from_secs(90));
    stack.policies.insert(
        1,
        "svc",
        PolicyRow {
            monitor_policy: 1,
            fields: Some(r#"{"memory":"20"}"#.to_string()),
        },
    );

    let (producer, inbound) = MemoryInbound::channel(16);
    let pipeline = IngestPipeline::spawn(Box::new(inbound), stack.ctx.clone(), 2);

    let mut sample = report(1, "svc");
    sample.memory = 25;
    producer.push(report_json(&sample)).await;

    drop(producer);
    pipeline.shutdown().await;
    stack.ctx.batch.flush().await.unwrap();

    // the alarm carries the job, service, and the observed usage
    tokio::time::sleep(Duration::from_millis(50)).await;
    let sent = stack.outbound.sent();
    assert_eq!(sent.len(), 1);
    let event: AlarmEvent = serde_json::from_slice(&sent[0].1).unwrap();
    assert_eq!(event.job_id, 1);
    assert_eq!(event.service_name, "svc");
    assert_eq!(
        event.content,
        "JobID: 1, ServiceName: svc, Msg: memory usage is too high, usage: 25"
    );

    // the persisted row is flagged
    let rows = stack.backend.rows_in(&current_partition());
    assert_eq!(rows.len(), 1);
    assert!(rows[0].is_alarm);
    assert_eq!(rows[0].memory, 25);
}

#[tokio::test]
async fn test_failed_status_alarms_under_the_default_policy() {
    let stack = test_stack(100, Duration::from_secs(90));

    let (producer, inbound) = MemoryInbound::channel(16);
    let pipeline = IngestPipeline::spawn(Box::new(inbound), stack.ctx.clone(), 2);

    let mut sample = report(2, "svc2");
    sample.memory = 5;
    sample.status = state_monitor::status::FAILED;
    producer.push(report_json(&sample)).await;

    drop(producer);
    pipeline.shutdown().await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    let sent = stack.outbound.sent();
    assert_eq!(sent.len(), 1);
    let event: AlarmEvent = serde_json::from_slice(&sent[0].1).unwrap();
    assert_eq!(
        event.content,
        "JobID: 2, ServiceName: svc2, Msg: service status exception"
    );
}

#[tokio::test]
async fn test_terminal_exit_alarms_and_clears_the_cached_policy() {
    let stack = test_stack(100, Duration::from_secs(90));
    stack.policies.insert(
        3,
        "svc3",
        PolicyRow {
            monitor_policy: 1,
            fields: Some(r#"{"exit_code":"2#3"}"#.to_string()),
        },
    );

    let (producer, inbound) = MemoryInbound::channel(16);
    // one worker keeps the two reports strictly ordered
    let pipeline = IngestPipeline::spawn(Box::new(inbound), stack.ctx.clone(), 1);

    // a running report primes the cache first
    producer.push(report_json(&report(3, "svc3"))).await;

    // then the process gets killed
    let mut killed = report(3, "svc3");
    killed.exit_code = state_monitor::exit_code::EXIT_KILLED;
    producer.push(report_json(&killed)).await;

    drop(producer);
    pipeline.shutdown().await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    let sent = stack.outbound.sent();
    assert_eq!(sent.len(), 1);
    let event: AlarmEvent = serde_json::from_slice(&sent[0].1).unwrap();
    assert_eq!(
        event.content,
        "JobID: 3, ServiceName: svc3, Msg: service exit exception"
    );

    // the cached entry is gone: the next resolution must go back to the
    // relational store
    let lookups_before = stack.policies.lookups();
    assert!(stack.cache.fields(&cache_key(3, "svc3")).await.unwrap().is_empty());

    let _ = stack.ctx.policy.check(&report(3, "svc3")).await;
    assert_eq!(stack.policies.lookups(), lookups_before + 1);
}

#[tokio::test]
async fn test_quiet_reports_emit_no_alarms() {
    let stack = test_stack(100, Duration::from_secs(90));

    let (producer, inbound) = MemoryInbound::channel(16);
    let pipeline = IngestPipeline::spawn(Box::new(inbound), stack.ctx.clone(), 2);

    for job_id in 0..5 {
        producer.push(report_json(&report(job_id, "quiet"))).await;
    }

    drop(producer);
    pipeline.shutdown().await;
    stack.ctx.batch.flush().await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(stack.outbound.sent().is_empty());

    let rows = stack.backend.rows_in(&current_partition());
    assert_eq!(rows.len(), 5);
    assert!(rows.iter().all(|row| !row.is_alarm));
}
