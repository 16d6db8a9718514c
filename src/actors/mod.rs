//! Actor-based ingestion system
//!
//! Each actor runs as an independent async task communicating via Tokio
//! channels.
//!
//! ## Architecture Overview
//!
//! ```text
//!  inbound stream ──▶ reader task ──▶ bounded hand-off channel
//!                        │                    │
//!                 commits offset       ┌──────┴──────┐
//!                 at hand-off time     │             │
//!                                  worker-1  ...  worker-N
//!                                      │             │
//!                        decode → evaluate → buffer → (alarm?)
//!                                      │             │
//!                                      └──────┬──────┘
//!                                 ┌───────────┴───────────┐
//!                                 ▼                       ▼
//!                            BatchCache             AlarmEmitter
//!                          (shared buffer)       (sender + ack log)
//!                                 │                       │
//!                                 ▼                       ▼
//!                        monthly partitions        outbound stream
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Hand-off**: the reader pushes raw messages into a bounded mpsc
//!    channel; a full channel blocks the reader and, through it, the
//!    broker receive loop — the pipeline's only backpressure
//! 2. **Commands**: the emitter takes commands over its own mpsc channel
//! 3. **Shutdown**: a watch channel stops the reader; workers observe the
//!    closed hand-off channel and drain out

pub mod emitter;
pub mod messages;
pub mod pipeline;
