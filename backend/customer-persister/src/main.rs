//! Customer Persister - Main entry point
//!
//! # Modes
//! - `consume` (default): subscribe to domain events and persist customer records
//! - `lookup --customer-id <id>`: print the stored record of one customer

use anyhow::{Context, Result};
use customer_persister::{
    telemetry, Config, EventConsumer, KafkaSubscription, LogFormat, RecordStore, RedisRecordStore,
};
use std::env;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Service run mode
#[derive(Debug, Clone, PartialEq)]
enum RunMode {
    Consume,
    Lookup { customer_id: String },
}

impl RunMode {
    fn from_args() -> Result<Self> {
        let args: Vec<String> = env::args().skip(1).collect();

        let mode = arg_value(&args, "--mode").unwrap_or("consume");
        match mode {
            "consume" => Ok(RunMode::Consume),
            "lookup" => {
                let customer_id = arg_value(&args, "--customer-id")
                    .context("--customer-id is required in lookup mode")?;
                Ok(RunMode::Lookup {
                    customer_id: customer_id.to_string(),
                })
            }
            other => anyhow::bail!("Unknown mode '{}', expected 'consume' or 'lookup'", other),
        }
    }
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init(LogFormat::from_env());

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            return Err(e).context("Failed to load configuration");
        }
    };

    let mode = RunMode::from_args()?;
    info!("Starting Customer Persister in {:?} mode", mode);

    match mode {
        RunMode::Consume => run_consume_mode(config).await,
        RunMode::Lookup { customer_id } => run_lookup_mode(config, &customer_id).await,
    }
}

/// Consume domain events until shutdown
async fn run_consume_mode(config: Config) -> Result<()> {
    let store = RedisRecordStore::connect(&config.redis_url, config.sentinel())
        .await
        .context("Failed to connect to Redis record store")?;

    let subscription = KafkaSubscription::connect(config.subscription())
        .context("Failed to create Kafka subscription")?;

    let consumer = EventConsumer::new(subscription, Arc::new(store), config.consumer_options());

    match consumer.run(shutdown_signal()).await {
        Ok(stats) => {
            info!(
                received = stats.received,
                persisted = stats.persisted,
                skipped = stats.skipped,
                rejected = stats.rejected,
                "Customer Persister shut down"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Customer Persister stopped on error");
            Err(e).context("Event consumer failed")
        }
    }
}

/// Raw key lookup of one stored customer record
async fn run_lookup_mode(config: Config, customer_id: &str) -> Result<()> {
    let store = RedisRecordStore::connect(&config.redis_url, config.sentinel())
        .await
        .context("Failed to connect to Redis record store")?;

    match store.get(customer_id).await? {
        Some(record) => println!("{}", record),
        None => warn!(customer_id = %customer_id, "No record stored for customer"),
    }

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler, waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
