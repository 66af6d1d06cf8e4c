//! Customer Persister
//!
//! Subscribes to the broadcast domain event topic and keeps the latest known
//! state of each customer in Redis, keyed by customer id:
//!
//! ```text
//! Kafka topic "event" ──▶ EventConsumer ──▶ CustomerEventHandler ──▶ Redis SET <customer.id> <customer JSON>
//!   (group "redis_listener")      │
//!                                 └── acknowledge (after persist, or on delivery)
//! ```
//!
//! Events without a customer are acknowledged and ignored. Stored records are
//! overwritten on every event (last write wins) and never expire.

pub mod config;
pub mod consumer;
pub mod error;
pub mod event;
pub mod handler;
pub mod stats;
pub mod store;
pub mod subscription;
pub mod telemetry;

pub use config::{Config, LogFormat};
pub use consumer::{AckMode, ConsumerOptions, ConsumerState, EventConsumer, MalformedPolicy};
pub use error::{PersisterError, Result};
pub use event::{decode_event, CustomerId, CustomerRecord, Event};
pub use handler::{CustomerEventHandler, HandlerOutcome};
pub use stats::ConsumerStats;
pub use store::{MemoryRecordStore, RecordStore, RedisRecordStore, SentinelConfig};
pub use subscription::{
    ChannelProbe, Delivery, DeliveryTag, InMemoryPublisher, InMemorySubscription, KafkaSubscription,
    SubscriptionChannel, SubscriptionConfig,
};
