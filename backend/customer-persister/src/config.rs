//! Configuration for the customer persister
use crate::consumer::{AckMode, ConsumerOptions, MalformedPolicy};
use crate::error::{PersisterError, Result};
use crate::store::{parse_sentinel_endpoints, SentinelConfig};
use crate::subscription::SubscriptionConfig;
use serde::Deserialize;
use std::time::Duration;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Deserialize)]
struct LogSettings {
    #[serde(default)]
    log_format: LogFormat,
}

impl LogFormat {
    /// Read `LOG_FORMAT` on its own so logging can start before the rest of
    /// the configuration is loaded. Unset or unknown values give `Pretty`.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter::<_, LogSettings>(vars)
            .map(|settings| settings.log_format)
            .unwrap_or_default()
    }
}

/// Main configuration struct, loaded from environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Kafka broker addresses
    #[serde(default = "default_kafka_brokers")]
    pub kafka_brokers: String,

    /// Topic domain events are broadcast on
    #[serde(default = "default_event_exchange")]
    pub event_exchange: String,

    /// Consumer group of this persister
    #[serde(default = "default_event_queue")]
    pub event_queue: String,

    /// Kafka `auto.offset.reset` for a new consumer group
    #[serde(default = "default_auto_offset_reset")]
    pub auto_offset_reset: String,

    /// Redis URL of the record store
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Comma separated sentinel endpoints; sentinel is off when unset
    #[serde(default)]
    pub redis_sentinel_endpoints: Option<String>,

    #[serde(default = "default_sentinel_master_name")]
    pub redis_sentinel_master_name: String,

    #[serde(default = "default_sentinel_poll_interval_ms")]
    pub redis_sentinel_poll_interval_ms: u64,

    #[serde(default)]
    pub ack_mode: AckMode,

    #[serde(default)]
    pub malformed_policy: MalformedPolicy,

    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_kafka_brokers() -> String {
    "localhost:9092".to_string()
}

fn default_event_exchange() -> String {
    "event".to_string()
}

fn default_event_queue() -> String {
    "redis_listener".to_string()
}

fn default_auto_offset_reset() -> String {
    "latest".to_string()
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_sentinel_master_name() -> String {
    "mymaster".to_string()
}

fn default_sentinel_poll_interval_ms() -> u64 {
    5000
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let config: Self =
            envy::from_env().map_err(|e| PersisterError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("KAFKA_BROKERS", &self.kafka_brokers),
            ("EVENT_EXCHANGE", &self.event_exchange),
            ("EVENT_QUEUE", &self.event_queue),
            ("REDIS_URL", &self.redis_url),
        ];

        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(PersisterError::Configuration(format!(
                    "{} must not be empty",
                    name
                )));
            }
        }

        if self.sentinel().is_some() && self.redis_sentinel_poll_interval_ms == 0 {
            return Err(PersisterError::Configuration(
                "REDIS_SENTINEL_POLL_INTERVAL_MS must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn subscription(&self) -> SubscriptionConfig {
        SubscriptionConfig {
            brokers: self.kafka_brokers.clone(),
            exchange: self.event_exchange.clone(),
            queue: self.event_queue.clone(),
            auto_offset_reset: self.auto_offset_reset.clone(),
        }
    }

    /// Sentinel settings, if any endpoint is configured
    pub fn sentinel(&self) -> Option<SentinelConfig> {
        let endpoints = parse_sentinel_endpoints(self.redis_sentinel_endpoints.as_deref()?);
        if endpoints.is_empty() {
            return None;
        }

        Some(SentinelConfig::new(
            endpoints,
            self.redis_sentinel_master_name.clone(),
            Duration::from_millis(self.redis_sentinel_poll_interval_ms),
        ))
    }

    pub fn consumer_options(&self) -> ConsumerOptions {
        ConsumerOptions {
            ack_mode: self.ack_mode,
            malformed_policy: self.malformed_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config> {
        let config: Config = envy::from_iter(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )
        .map_err(|e| PersisterError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_defaults() {
        let config = from_pairs(&[]).unwrap();

        assert_eq!(config.kafka_brokers, "localhost:9092");
        assert_eq!(config.event_exchange, "event");
        assert_eq!(config.event_queue, "redis_listener");
        assert_eq!(config.redis_url, "redis://127.0.0.1:6379");
        assert_eq!(config.ack_mode, AckMode::AfterPersist);
        assert_eq!(config.malformed_policy, MalformedPolicy::Skip);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.sentinel().is_none());
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("EVENT_EXCHANGE", "nova.events"),
            ("EVENT_QUEUE", "customer-cache"),
            ("ACK_MODE", "on_delivery"),
            ("MALFORMED_POLICY", "fail"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();

        let subscription = config.subscription();
        assert_eq!(subscription.exchange, "nova.events");
        assert_eq!(subscription.queue, "customer-cache");

        let options = config.consumer_options();
        assert_eq!(options.ack_mode, AckMode::OnDelivery);
        assert_eq!(options.malformed_policy, MalformedPolicy::Fail);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_sentinel_settings() {
        let config = from_pairs(&[
            ("REDIS_SENTINEL_ENDPOINTS", "10.0.0.1:26379,10.0.0.2:26379"),
            ("REDIS_SENTINEL_MASTER_NAME", "customers"),
            ("REDIS_SENTINEL_POLL_INTERVAL_MS", "1000"),
        ])
        .unwrap();

        let sentinel = config.sentinel().expect("sentinel configured");
        assert_eq!(sentinel.endpoints.len(), 2);
        assert_eq!(sentinel.master_name, "customers");
        assert_eq!(sentinel.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_rejects_empty_values() {
        let err = from_pairs(&[("EVENT_QUEUE", " ")]).unwrap_err();
        assert!(err.to_string().contains("EVENT_QUEUE"));

        let err = from_pairs(&[
            ("REDIS_SENTINEL_ENDPOINTS", "10.0.0.1:26379"),
            ("REDIS_SENTINEL_POLL_INTERVAL_MS", "0"),
        ])
        .unwrap_err();
        assert!(matches!(err, PersisterError::Configuration(_)));
    }

    #[test]
    fn test_log_format_read_alone() {
        let vars = |pairs: &[(&str, &str)]| {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Vec<_>>()
        };

        assert_eq!(
            LogFormat::from_vars(vars(&[("LOG_FORMAT", "json"), ("EVENT_QUEUE", " ")])),
            LogFormat::Json
        );
        assert_eq!(LogFormat::from_vars(vars(&[])), LogFormat::Pretty);
        assert_eq!(
            LogFormat::from_vars(vars(&[("LOG_FORMAT", "xml")])),
            LogFormat::Pretty
        );
    }

    #[test]
    fn test_rejects_unknown_ack_mode() {
        assert!(from_pairs(&[("ACK_MODE", "sometimes")]).is_err());
    }
}
