use super::{Delivery, DeliveryTag, SubscriptionChannel};
use crate::error::{PersisterError, Result};
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};
use tracing::{debug, info, warn};

/// Kafka subscription settings
///
/// The broadcast exchange is a topic; the named queue is the consumer group.
/// Consumers sharing a queue split the topic's partitions between them.
#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    /// Kafka broker addresses (comma-separated)
    pub brokers: String,
    /// Topic events are published to
    pub exchange: String,
    /// Consumer group ID
    pub queue: String,
    /// Where a new consumer group starts reading
    pub auto_offset_reset: String,
}

/// Subscription backed by a Kafka consumer group
///
/// Offsets are only committed through [`SubscriptionChannel::acknowledge`];
/// auto-commit is always disabled.
pub struct KafkaSubscription {
    consumer: StreamConsumer,
    config: SubscriptionConfig,
    closed: bool,
}

impl KafkaSubscription {
    pub fn connect(config: SubscriptionConfig) -> Result<Self> {
        info!(
            brokers = %config.brokers,
            exchange = %config.exchange,
            queue = %config.queue,
            "Connecting Kafka subscription"
        );

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.queue)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("session.timeout.ms", "30000")
            .set("enable.partition.eof", "false")
            .create()?;

        consumer.subscribe(&[config.exchange.as_str()])?;

        info!(exchange = %config.exchange, "Subscribed to Kafka topic");

        Ok(Self {
            consumer,
            config,
            closed: false,
        })
    }
}

#[async_trait]
impl SubscriptionChannel for KafkaSubscription {
    async fn next_delivery(&mut self) -> Option<Result<Delivery>> {
        if self.closed {
            return None;
        }

        let message = match self.consumer.recv().await {
            Ok(message) => message,
            Err(e) => return Some(Err(e.into())),
        };

        let payload = match message.payload() {
            Some(payload) => payload.to_vec(),
            None => {
                warn!(
                    topic = message.topic(),
                    offset = message.offset(),
                    "Received Kafka message with no payload"
                );
                Vec::new()
            }
        };

        Some(Ok(Delivery {
            payload,
            tag: DeliveryTag {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
            },
        }))
    }

    async fn acknowledge(&mut self, delivery: &Delivery) -> Result<()> {
        if self.closed {
            return Err(PersisterError::ChannelClosed);
        }

        // Committed offset is the next one to read
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            &delivery.tag.topic,
            delivery.tag.partition,
            Offset::Offset(delivery.tag.offset + 1),
        )?;
        self.consumer.commit(&tpl, CommitMode::Async)?;

        debug!(tag = %delivery.tag, "Offset committed");
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.consumer.unsubscribe();
            self.closed = true;
            info!(queue = %self.config.queue, "Kafka subscription closed");
        }
        Ok(())
    }
}
