//! Subscription channel collaborators
//!
//! A channel hands the consumer one delivery at a time and accepts an explicit
//! acknowledgment for it. When to acknowledge is decided by the consumer loop
//! (see [`crate::consumer::AckMode`]), never by the channel.

mod kafka;
mod memory;

pub use self::kafka::{KafkaSubscription, SubscriptionConfig};
pub use self::memory::{ChannelProbe, InMemoryPublisher, InMemorySubscription};

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;

/// Position of a delivery in its source, used for acknowledgment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryTag {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

impl fmt::Display for DeliveryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]@{}", self.topic, self.partition, self.offset)
    }
}

/// A single delivered message
#[derive(Debug, Clone)]
pub struct Delivery {
    pub payload: Vec<u8>,
    pub tag: DeliveryTag,
}

#[async_trait]
pub trait SubscriptionChannel: Send {
    /// Wait for the next delivery. `None` means the channel has ended.
    async fn next_delivery(&mut self) -> Option<Result<Delivery>>;

    /// Mark a delivery as consumed
    async fn acknowledge(&mut self, delivery: &Delivery) -> Result<()>;

    /// Tear down the subscription. Further deliveries end immediately.
    async fn close(&mut self) -> Result<()>;
}
