//! Batch buffer behavior under sustained pipeline load.

use std::time::Duration;

use state_monitor::actors::pipeline::IngestPipeline;
use state_monitor::stream::memory::MemoryInbound;

use crate::helpers::{current_partition, report, report_json, test_stack};

#[tokio::test]
async fn test_sustained_load_flushes_in_capacity_sized_batches() {
    let stack = test_stack(10, Duration::from_secs(90));

    let (producer, inbound) = MemoryInbound::channel(16);
    let pipeline = IngestPipeline::spawn(Box::new(inbound), stack.ctx.clone(), 2);

    for job_id in 0..35 {
        producer.push(report_json(&report(job_id, "svc"))).await;
    }

    drop(producer);
    pipeline.shutdown().await;

    // 35 rows at capacity 10: three full flushes, the tail stays buffered
    let backend = &stack.backend;
    let sizes = backend.insert_batch_sizes();
    assert_eq!(sizes, vec![10, 10, 10]);
    assert_eq!(stack.ctx.batch.buffered().await, 5);

    stack.ctx.batch.flush().await.unwrap();
    assert_eq!(backend.rows_in(&current_partition()).len(), 35);
}

#[tokio::test]
async fn test_stale_rows_go_out_on_the_window_trigger() {
    let stack = test_stack(1000, Duration::from_millis(30));

    let (producer, inbound) = MemoryInbound::channel(16);
    let pipeline = IngestPipeline::spawn(Box::new(inbound), stack.ctx.clone(), 2);

    producer.push(report_json(&report(1, "svc"))).await;
    tokio::time::sleep(Duration::from_millis(80)).await;
    producer.push(report_json(&report(2, "svc"))).await;

    tokio::time::sleep(Duration::from_millis(50)).await;

    // the late row triggered a flush carrying both
    assert_eq!(stack.backend.insert_batch_sizes(), vec![2]);
    assert_eq!(stack.ctx.batch.buffered().await, 0);

    drop(producer);
    pipeline.shutdown().await;
}
