//! Kafka stream implementation
//!
//! ## Offset handling
//!
//! The consumer runs with automatic commits but manual offset *store*:
//! [`commit`](KafkaInbound::commit) records the offset in the client, which
//! flushes stored offsets to the broker in the background. That keeps the
//! commit call cheap enough to run at hand-off time while still bounding
//! redelivery after a restart.

use async_trait::async_trait;
use rdkafka::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use tracing::{info, instrument};

use super::{InboundMessage, InboundStream, OutboundStream, StreamError, StreamResult};

/// Kafka consumer for the inbound report topics.
pub struct KafkaInbound {
    consumer: StreamConsumer,
}

impl KafkaInbound {
    /// Create a consumer and subscribe. Fails fast on unreachable brokers;
    /// callers treat this as a fatal startup error.
    #[instrument(skip_all)]
    pub fn connect(brokers: &[String], group_id: &str, topics: &[String]) -> StreamResult<Self> {
        info!("subscribing to {topics:?} as group {group_id}");

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers.join(","))
            .set("group.id", group_id)
            .set("auto.offset.reset", "latest")
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .create()
            .map_err(|e| StreamError::ConnectionFailed(e.to_string()))?;

        let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
        consumer
            .subscribe(&topic_refs)
            .map_err(|e| StreamError::ConnectionFailed(e.to_string()))?;

        Ok(Self { consumer })
    }
}

#[async_trait]
impl InboundStream for KafkaInbound {
    async fn next_message(&mut self) -> StreamResult<InboundMessage> {
        let message = self
            .consumer
            .recv()
            .await
            .map_err(|e| StreamError::ReceiveFailed(e.to_string()))?;

        Ok(InboundMessage {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            payload: message.payload().unwrap_or_default().to_vec(),
        })
    }

    async fn commit(&self, topic: &str, partition: i32, offset: i64) -> StreamResult<()> {
        self.consumer
            .store_offset(topic, partition, offset)
            .map_err(|e| StreamError::CommitFailed(e.to_string()))
    }
}

/// Kafka producer for the outbound alarm topic.
pub struct KafkaOutbound {
    producer: FutureProducer,
    topic: String,
}

impl KafkaOutbound {
    #[instrument(skip_all)]
    pub fn connect(brokers: &[String], topic: &str) -> StreamResult<Self> {
        info!("producing alarms onto {topic}");

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers.join(","))
            .set("acks", "all")
            .set("message.timeout.ms", "30000")
            .create()
            .map_err(|e| StreamError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            producer,
            topic: topic.to_string(),
        })
    }
}

#[async_trait]
impl OutboundStream for KafkaOutbound {
    async fn publish(&self, key: &str, payload: &[u8]) -> StreamResult<(i32, i64)> {
        let record = FutureRecord::to(&self.topic).key(key).payload(payload);

        self.producer
            .send(record, Timeout::Never)
            .await
            .map_err(|(e, _)| StreamError::PublishFailed(e.to_string()))
    }
}
