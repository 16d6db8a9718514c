//! AlarmEmitter - publishes alarm events onto the outbound stream
//!
//! Emission is fire-and-forget for the pipeline: `emit` enqueues the event
//! and returns. A dedicated sender task serializes events and starts the
//! publish; broker acknowledgements complete asynchronously and are only
//! logged — a failed delivery is not retried or re-queued.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::AlarmEvent;
use crate::stream::{OutboundStream, StreamResult};

use super::messages::EmitterCommand;

/// Capacity of the outbound event channel.
pub const ALARM_CHANNEL_CAPACITY: usize = 100;

/// Key attached to every outbound alarm message.
pub const PRODUCER_KEY: &str = "state_monitor_center";

type Delivery = (AlarmEvent, StreamResult<(i32, i64)>);

/// Actor forwarding alarm events to the outbound stream.
pub struct AlarmEmitter {
    outbound: Arc<dyn OutboundStream>,
    command_rx: mpsc::Receiver<EmitterCommand>,
}

impl AlarmEmitter {
    pub fn new(outbound: Arc<dyn OutboundStream>, command_rx: mpsc::Receiver<EmitterCommand>) -> Self {
        Self {
            outbound,
            command_rx,
        }
    }

    /// Run the actor's main loop
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting alarm emitter");

        let mut in_flight: FuturesUnordered<BoxFuture<'static, Delivery>> =
            FuturesUnordered::new();

        loop {
            tokio::select! {
                maybe = self.command_rx.recv() => match maybe {
                    Some(EmitterCommand::Emit(event)) => self.dispatch(event, &mut in_flight),
                    Some(EmitterCommand::Shutdown) => {
                        debug!("received shutdown command");
                        break;
                    }
                    None => {
                        debug!("command channel closed, shutting down");
                        break;
                    }
                },

                Some(delivery) = in_flight.next(), if !in_flight.is_empty() => {
                    Self::observe(delivery);
                }
            }
        }

        // observe whatever is still in flight before stopping
        while let Some(delivery) = in_flight.next().await {
            Self::observe(delivery);
        }

        debug!("alarm emitter stopped");
    }

    fn dispatch(&self, event: AlarmEvent, in_flight: &mut FuturesUnordered<BoxFuture<'static, Delivery>>) {
        let payload = match serde_json::to_vec(&event) {
            Ok(payload) => payload,
            Err(e) => {
                error!("encoding alarm event failed: {e}");
                return;
            }
        };

        let outbound = self.outbound.clone();
        in_flight.push(Box::pin(async move {
            let result = outbound.publish(PRODUCER_KEY, &payload).await;
            (event, result)
        }));
    }

    fn observe((event, result): Delivery) {
        match result {
            Ok((partition, offset)) => info!(
                "send alarm msg success [{}#{}] partition {partition}, offset {offset}",
                event.job_id, event.service_name
            ),
            Err(e) => warn!(
                "send alarm msg failed [{}#{}]: {e}",
                event.job_id, event.service_name
            ),
        }
    }
}

/// Handle for the AlarmEmitter
#[derive(Clone)]
pub struct EmitterHandle {
    sender: mpsc::Sender<EmitterCommand>,
}

impl EmitterHandle {
    /// Spawn a new alarm emitter
    pub fn spawn(outbound: Arc<dyn OutboundStream>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(ALARM_CHANNEL_CAPACITY);

        let actor = AlarmEmitter::new(outbound, cmd_rx);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Queue one alarm event. Fire-and-forget: the outcome of the delivery
    /// is observed by the emitter itself, not the caller.
    pub async fn emit(&self, event: AlarmEvent) {
        if self.sender.send(EmitterCommand::Emit(event)).await.is_err() {
            warn!("alarm emitter gone, event dropped");
        }
    }

    /// Shut the emitter down after it observed in-flight sends.
    pub async fn shutdown(&self) {
        let _ = self.sender.send(EmitterCommand::Shutdown).await;
    }
}
