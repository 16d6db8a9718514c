//! In-memory streams (tests)
//!
//! Channel-backed stand-ins for the broker. The inbound half records which
//! offsets were committed, the outbound half records what was published, so
//! tests can assert on both.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{InboundMessage, InboundStream, OutboundStream, StreamError, StreamResult};

/// Topic name used for fabricated inbound messages.
pub const MEMORY_TOPIC: &str = "report_state";

/// Producer-side handle of an in-memory inbound stream.
pub struct MemoryInboundHandle {
    tx: mpsc::Sender<InboundMessage>,
    commits: Arc<Mutex<Vec<i64>>>,
    next_offset: AtomicI64,
}

impl MemoryInboundHandle {
    /// Queue one payload; returns the offset it was assigned. Dropping the
    /// handle closes the stream.
    pub async fn push(&self, payload: impl Into<Vec<u8>>) -> i64 {
        let offset = self.next_offset.fetch_add(1, Ordering::SeqCst);
        let message = InboundMessage {
            topic: MEMORY_TOPIC.to_string(),
            partition: 0,
            offset,
            payload: payload.into(),
        };
        self.tx.send(message).await.expect("inbound stream gone");
        offset
    }

    /// Offsets committed so far, in commit order.
    pub fn committed(&self) -> Vec<i64> {
        self.commits.lock().unwrap().clone()
    }
}

/// Consumer side of an in-memory inbound stream.
pub struct MemoryInbound {
    rx: mpsc::Receiver<InboundMessage>,
    commits: Arc<Mutex<Vec<i64>>>,
}

impl MemoryInbound {
    /// A connected (producer handle, stream) pair.
    pub fn channel(capacity: usize) -> (MemoryInboundHandle, MemoryInbound) {
        let (tx, rx) = mpsc::channel(capacity);
        let commits = Arc::new(Mutex::new(Vec::new()));

        (
            MemoryInboundHandle {
                tx,
                commits: commits.clone(),
                next_offset: AtomicI64::new(0),
            },
            MemoryInbound { rx, commits },
        )
    }
}

#[async_trait]
impl InboundStream for MemoryInbound {
    async fn next_message(&mut self) -> StreamResult<InboundMessage> {
        self.rx.recv().await.ok_or(StreamError::Closed)
    }

    async fn commit(&self, _topic: &str, _partition: i32, offset: i64) -> StreamResult<()> {
        self.commits.lock().unwrap().push(offset);
        Ok(())
    }
}

/// In-memory outbound stream recording published messages.
#[derive(Default)]
pub struct MemoryOutbound {
    sent: Mutex<Vec<(String, Vec<u8>)>>,
    next_offset: AtomicI64,
}

impl MemoryOutbound {
    pub fn new() -> Self {
        Self::default()
    }

    /// Published (key, payload) pairs in publish order.
    pub fn sent(&self) -> Vec<(String, Vec<u8>)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl OutboundStream for MemoryOutbound {
    async fn publish(&self, key: &str, payload: &[u8]) -> StreamResult<(i32, i64)> {
        let offset = self.next_offset.fetch_add(1, Ordering::SeqCst);
        self.sent
            .lock()
            .unwrap()
            .push((key.to_string(), payload.to_vec()));
        Ok((0, offset))
    }
}
