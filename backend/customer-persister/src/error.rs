//! Error types for the customer persister

use thiserror::Error;

/// Errors raised while consuming, decoding or persisting events
#[derive(Error, Debug)]
pub enum PersisterError {
    /// Payload is not valid JSON
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Payload decoded but does not have the shape of an event
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Event carries a customer sub-record that cannot be keyed
    #[error("Invalid customer record: {0}")]
    InvalidCustomer(String),

    /// Redis connection or command error
    #[error("Redis error: {0}")]
    Store(#[from] redis::RedisError),

    /// Store could not be reached or resolved (e.g. no sentinel answered)
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Kafka client error
    #[error("Kafka error: {0}")]
    Subscription(#[from] rdkafka::error::KafkaError),

    /// Channel was used after being closed
    #[error("Subscription channel closed")]
    ChannelClosed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl PersisterError {
    /// Errors caused by the content of a single delivery rather than by the
    /// infrastructure. These are subject to the malformed payload policy.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            PersisterError::Decode(_)
                | PersisterError::InvalidPayload(_)
                | PersisterError::InvalidCustomer(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PersisterError>;
