//! Ingestion pipeline - drains the inbound stream through a worker pool
//!
//! ## Message lifecycle
//!
//! ```text
//! received → decoded → evaluated → buffered → (alarm emitted)
//! ```
//!
//! The reader task commits every offset at hand-off time, before the
//! message is processed. This is at-least-once consumption with a known
//! loss window: a crash between the commit and the batch flush drops those
//! rows for good — they are neither redelivered nor persisted. The trade
//! is deliberate; commit-after-persist would stall the subscription on
//! every slow flush.
//!
//! Per-message failures (undecodable payload, unresolvable policy, storage
//! trouble) are logged and the worker moves on. The offset is already
//! committed either way, so a poisoned message can never wedge the
//! pipeline.
//!
//! ## Backpressure
//!
//! The hand-off channel is bounded. When workers fall behind, the reader
//! blocks on `send`, which stops the broker receive loop — that is the
//! pipeline's only backpressure mechanism.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use crate::policy::PolicyEngine;
use crate::storage::{BatchCache, ReportRow};
use crate::stream::{InboundMessage, InboundStream, StreamError};
use crate::{AlarmEvent, StateReport};

use super::emitter::EmitterHandle;

/// Capacity of the reader-to-worker hand-off channel.
pub const HANDOFF_CAPACITY: usize = 100;

/// Collaborators shared by every worker of a pipeline.
///
/// Cloning shares the underlying components. Passing the same context into
/// several pipelines deliberately consolidates their writes into one batch
/// buffer.
#[derive(Clone)]
pub struct PipelineContext {
    pub policy: Arc<PolicyEngine>,
    pub batch: Arc<BatchCache>,
    pub emitter: EmitterHandle,
}

/// One inbound stream subscription plus its worker pool.
pub struct IngestPipeline;

impl IngestPipeline {
    /// Spawn the reader and `workers` worker tasks.
    pub fn spawn(
        inbound: Box<dyn InboundStream>,
        ctx: PipelineContext,
        workers: usize,
    ) -> PipelineHandle {
        let (handoff_tx, handoff_rx) = mpsc::channel::<InboundMessage>(HANDOFF_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut tasks = Vec::with_capacity(workers + 1);

        let mut reader_shutdown = shutdown_rx;
        tasks.push(tokio::spawn(async move {
            let mut inbound = inbound;
            debug!("starting pipeline reader");

            loop {
                tokio::select! {
                    _ = reader_shutdown.changed() => break,

                    received = inbound.next_message() => {
                        let message = match received {
                            Ok(message) => message,
                            Err(StreamError::Closed) => {
                                debug!("inbound stream closed");
                                break;
                            }
                            Err(e) => {
                                error!("consumer receiver err: {e}");
                                continue;
                            }
                        };

                        let (topic, partition, offset) =
                            (message.topic.clone(), message.partition, message.offset);

                        if handoff_tx.send(message).await.is_err() {
                            // workers are gone, nothing left to hand off to
                            break;
                        }

                        if let Err(e) = inbound.commit(&topic, partition, offset).await {
                            error!("committing offset failed [T:{topic} P:{partition} O:{offset}]: {e}");
                        }
                    }
                }
            }

            debug!("pipeline reader stopped");
            // dropping handoff_tx lets the workers drain the channel and exit
        }));

        let handoff_rx = Arc::new(tokio::sync::Mutex::new(handoff_rx));
        for id in 0..workers {
            let ctx = ctx.clone();
            let handoff_rx = handoff_rx.clone();

            tasks.push(tokio::spawn(async move {
                debug!("starting pipeline worker {id}");

                loop {
                    let message = { handoff_rx.lock().await.recv().await };
                    let Some(message) = message else {
                        break;
                    };
                    process_message(message, &ctx).await;
                }

                debug!("pipeline worker {id} stopped");
            }));
        }

        PipelineHandle {
            shutdown: shutdown_tx,
            tasks,
        }
    }
}

/// Decode, evaluate, and buffer one message. Every failure path logs and
/// returns; the offset was committed at hand-off.
async fn process_message(message: InboundMessage, ctx: &PipelineContext) {
    let InboundMessage {
        topic,
        partition,
        offset,
        payload,
    } = message;

    let mut report: StateReport = match serde_json::from_slice(&payload) {
        Ok(report) => report,
        Err(e) => {
            error!(
                "json unmarshal failed [T:{topic} P:{partition} O:{offset} M:{}]: {e}",
                String::from_utf8_lossy(&payload)
            );
            return;
        }
    };

    if report.service_name.is_empty() {
        warn!("report without service name [T:{topic} P:{partition} O:{offset}], skipping");
        return;
    }

    if let Some(reason) = ctx.policy.check(&report).await {
        report.is_alarm = true;

        let event = AlarmEvent {
            job_id: report.job_id,
            service_name: report.service_name.clone(),
            heart_time: Utc::now().timestamp(),
            content: format!(
                "JobID: {}, ServiceName: {}, Msg: {}",
                report.job_id, report.service_name, reason
            ),
        };
        ctx.emitter.emit(event).await;
    }

    let row = ReportRow::from_report(&report, Utc::now());
    if let Err(e) = ctx.batch.record(row).await {
        error!("buffering report failed [T:{topic} P:{partition} O:{offset}]: {e}");
        return;
    }

    trace!("consumed report_state msg ok [T:{topic} P:{partition} O:{offset}]");
}

/// Handle joining a spawned pipeline.
pub struct PipelineHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl PipelineHandle {
    /// Signal shutdown and wait until the reader and every worker stopped.
    /// Also resolves on its own once the inbound stream closes.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
    }
}
