//! Pipeline behavior under load, garbage input, and shutdown.

use std::time::Duration;

use state_monitor::actors::pipeline::IngestPipeline;
use state_monitor::stream::memory::MemoryInbound;

use crate::helpers::{current_partition, report, report_json, test_stack};

#[tokio::test]
async fn test_all_messages_flow_through_a_worker_pool() {
    let stack = test_stack(1000, Duration::from_secs(90));

    let (producer, inbound) = MemoryInbound::channel(16);
    let pipeline = IngestPipeline::spawn(Box::new(inbound), stack.ctx.clone(), 4);

    for job_id in 0..50 {
        producer.push(report_json(&report(job_id, "svc"))).await;
    }

    drop(producer);
    pipeline.shutdown().await;
    stack.ctx.batch.flush().await.unwrap();

    let rows = stack.backend.rows_in(&current_partition());
    assert_eq!(rows.len(), 50);

    // processing may reorder across workers, but nothing is lost or doubled
    let mut job_ids: Vec<i64> = rows.iter().map(|row| row.job_id).collect();
    job_ids.sort_unstable();
    assert_eq!(job_ids, (0..50i64).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_offsets_commit_in_receive_order() {
    let stack = test_stack(1000, Duration::from_secs(90));

    let (producer, inbound) = MemoryInbound::channel(16);
    let pipeline = IngestPipeline::spawn(Box::new(inbound), stack.ctx.clone(), 4);

    for job_id in 0..20 {
        producer.push(report_json(&report(job_id, "svc"))).await;
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(producer.committed(), (0..20i64).collect::<Vec<_>>());

    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_garbage_messages_are_committed_and_skipped() {
    let stack = test_stack(1000, Duration::from_secs(90));

    let (producer, inbound) = MemoryInbound::channel(16);
    let pipeline = IngestPipeline::spawn(Box::new(inbound), stack.ctx.clone(), 2);

    producer.push(b"{truncated".as_slice()).await;
    producer.push(report_json(&report(1, "svc"))).await;
    producer.push(b"\xff\xfe not even text".as_slice()).await;

    tokio::time::sleep(Duration::from_millis(100)).await;

    // the malformed payloads are acknowledged, never redelivered
    assert_eq!(producer.committed(), vec![0, 1, 2]);

    pipeline.shutdown().await;
    stack.ctx.batch.flush().await.unwrap();

    let rows = stack.backend.rows_in(&current_partition());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].job_id, 1);
}

#[tokio::test]
async fn test_shutdown_flush_drains_the_buffer() {
    let stack = test_stack(1000, Duration::from_secs(90));

    let (producer, inbound) = MemoryInbound::channel(16);
    let pipeline = IngestPipeline::spawn(Box::new(inbound), stack.ctx.clone(), 2);

    for job_id in 0..3 {
        producer.push(report_json(&report(job_id, "svc"))).await;
    }

    drop(producer);
    pipeline.shutdown().await;

    // neither trigger fired; everything still sits in the buffer
    assert_eq!(stack.ctx.batch.buffered().await, 3);
    assert!(stack.backend.rows_in(&current_partition()).is_empty());

    stack.ctx.batch.flush().await.unwrap();
    assert_eq!(stack.ctx.batch.buffered().await, 0);
    assert_eq!(stack.backend.rows_in(&current_partition()).len(), 3);
}

#[tokio::test]
async fn test_two_pipelines_share_one_batch_buffer() {
    let stack = test_stack(1000, Duration::from_secs(90));

    let (producer_a, inbound_a) = MemoryInbound::channel(16);
    let (producer_b, inbound_b) = MemoryInbound::channel(16);

    let pipeline_a = IngestPipeline::spawn(Box::new(inbound_a), stack.ctx.clone(), 2);
    let pipeline_b = IngestPipeline::spawn(Box::new(inbound_b), stack.ctx.clone(), 2);

    for job_id in 0..10 {
        producer_a.push(report_json(&report(job_id, "svc-a"))).await;
        producer_b.push(report_json(&report(job_id, "svc-b"))).await;
    }

    drop(producer_a);
    drop(producer_b);
    pipeline_a.shutdown().await;
    pipeline_b.shutdown().await;

    // the consolidated buffer saw every report from both subscriptions
    assert_eq!(stack.ctx.batch.buffered().await, 20);
}
