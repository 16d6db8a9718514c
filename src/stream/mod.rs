//! Stream broker boundary
//!
//! The pipeline owns a subscription on the inbound stream and the emitter
//! owns production onto the outbound stream. Both sides go through small
//! traits so the Kafka client stays swappable — `kafka` is the production
//! implementation, `memory` backs the test suite with plain channels.

pub mod kafka;
pub mod memory;

use std::fmt;

use async_trait::async_trait;

/// Result type alias for stream operations
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors that can occur during stream operations
#[derive(Debug)]
pub enum StreamError {
    /// Could not reach the broker
    ConnectionFailed(String),

    /// Receiving from the subscription failed
    ReceiveFailed(String),

    /// Acknowledging a consumed message failed
    CommitFailed(String),

    /// Publishing a message failed
    PublishFailed(String),

    /// The stream ended; no further messages will arrive
    Closed,
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::ConnectionFailed(msg) => {
                write!(f, "failed to connect to stream broker: {}", msg)
            }
            StreamError::ReceiveFailed(msg) => write!(f, "receiving message failed: {}", msg),
            StreamError::CommitFailed(msg) => write!(f, "committing offset failed: {}", msg),
            StreamError::PublishFailed(msg) => write!(f, "publishing message failed: {}", msg),
            StreamError::Closed => write!(f, "stream closed"),
        }
    }
}

impl std::error::Error for StreamError {}

/// One raw message taken off the inbound stream.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Vec<u8>,
}

/// Trait for the inbound stream subscription
#[async_trait]
pub trait InboundStream: Send + Sync {
    /// Wait for the next message. `StreamError::Closed` means the
    /// subscription ended for good.
    async fn next_message(&mut self) -> StreamResult<InboundMessage>;

    /// Acknowledge consumption of a message so the broker will not deliver
    /// it again.
    async fn commit(&self, topic: &str, partition: i32, offset: i64) -> StreamResult<()>;
}

/// Trait for the outbound stream producer
#[async_trait]
pub trait OutboundStream: Send + Sync {
    /// Publish one message and wait for the broker acknowledgement.
    /// Returns the (partition, offset) the message landed on.
    async fn publish(&self, key: &str, payload: &[u8]) -> StreamResult<(i32, i64)>;
}
