//! Consumption loop
//!
//! ```text
//! Idle ──run()──▶ Consuming ──shutdown / end of channel / fatal error──▶ Stopping ──close()──▶ Terminated
//! ```
//!
//! One delivery is handled to completion before the next is awaited. The
//! shutdown signal is only observed while waiting for a delivery, so an
//! in-progress store write is never interrupted.

use crate::error::{PersisterError, Result};
use crate::handler::{CustomerEventHandler, HandlerOutcome};
use crate::stats::ConsumerStats;
use crate::store::RecordStore;
use crate::subscription::{Delivery, SubscriptionChannel};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// When a delivery is acknowledged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckMode {
    /// After the handler succeeded, or after a malformed delivery was skipped.
    /// A delivery that ends the run stays unacknowledged.
    #[default]
    AfterPersist,
    /// As soon as it is delivered, before handling (at-most-once)
    OnDelivery,
}

/// What to do with deliveries that cannot be decoded or keyed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    /// Log, count and move on
    #[default]
    Skip,
    /// Stop the run with the error
    Fail,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerOptions {
    pub ack_mode: AckMode,
    pub malformed_policy: MalformedPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Idle,
    Consuming,
    Stopping,
    Terminated,
}

/// Drives the receive-decode-persist cycle over an owned channel
pub struct EventConsumer<C, S> {
    channel: C,
    handler: CustomerEventHandler<S>,
    options: ConsumerOptions,
    state: watch::Sender<ConsumerState>,
    stats: ConsumerStats,
}

impl<C, S> EventConsumer<C, S>
where
    C: SubscriptionChannel,
    S: RecordStore,
{
    pub fn new(channel: C, store: Arc<S>, options: ConsumerOptions) -> Self {
        let (state, _) = watch::channel(ConsumerState::Idle);

        Self {
            channel,
            handler: CustomerEventHandler::new(store),
            options,
            state,
            stats: ConsumerStats::default(),
        }
    }

    pub fn state(&self) -> ConsumerState {
        *self.state.borrow()
    }

    /// Follow state transitions, including after `run` has consumed the consumer
    pub fn state_watcher(&self) -> watch::Receiver<ConsumerState> {
        self.state.subscribe()
    }

    /// Consume until `shutdown` resolves, the channel ends, or a fatal error
    ///
    /// The channel is closed on every exit path. Returns the run's counters,
    /// or the error that stopped it.
    pub async fn run<F>(mut self, shutdown: F) -> Result<ConsumerStats>
    where
        F: Future<Output = ()>,
    {
        self.transition(ConsumerState::Consuming);
        info!(
            ack_mode = ?self.options.ack_mode,
            malformed_policy = ?self.options.malformed_policy,
            "Waiting for messages. To exit press CTRL+C"
        );

        let consumed = self.consume(shutdown).await;

        self.transition(ConsumerState::Stopping);
        let closed = self.channel.close().await;
        self.transition(ConsumerState::Terminated);

        info!(
            received = self.stats.received,
            handled = self.stats.handled(),
            persisted = self.stats.persisted,
            skipped = self.stats.skipped,
            rejected = self.stats.rejected,
            failed = self.stats.failed,
            "Consumer stopped"
        );

        if let Err(e) = &closed {
            warn!(error = %e, "Failed to close subscription channel");
        }

        // A consume error takes precedence over a close error
        consumed?;
        closed?;

        Ok(self.stats)
    }

    async fn consume<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let next = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    return Ok(());
                }
                next = self.channel.next_delivery() => next,
            };

            match next {
                Some(Ok(delivery)) => self.process(delivery).await?,
                Some(Err(e)) => {
                    error!(error = %e, "Subscription receive failed");
                    return Err(e);
                }
                None => {
                    warn!("Subscription channel ended");
                    return Ok(());
                }
            }
        }
    }

    async fn process(&mut self, delivery: Delivery) -> Result<()> {
        self.stats.record_received();

        if self.options.ack_mode == AckMode::OnDelivery {
            self.channel.acknowledge(&delivery).await?;
        }

        match self.handler.on_message_delivered(&delivery.payload).await {
            Ok(HandlerOutcome::Persisted { .. }) => self.stats.record_persisted(),
            Ok(HandlerOutcome::Skipped) => self.stats.record_skipped(),
            Err(e) if e.is_malformed() => self.reject(&delivery, e)?,
            Err(e) => {
                self.stats.record_failed();
                error!(tag = %delivery.tag, error = %e, "Failed to persist customer record");
                return Err(e);
            }
        }

        if self.options.ack_mode == AckMode::AfterPersist {
            self.channel.acknowledge(&delivery).await?;
        }

        Ok(())
    }

    fn reject(&mut self, delivery: &Delivery, e: PersisterError) -> Result<()> {
        match self.options.malformed_policy {
            MalformedPolicy::Skip => {
                self.stats.record_rejected();
                warn!(tag = %delivery.tag, error = %e, "Skipping malformed payload");
                Ok(())
            }
            MalformedPolicy::Fail => {
                self.stats.record_failed();
                error!(tag = %delivery.tag, error = %e, "Malformed payload");
                Err(e)
            }
        }
    }

    fn transition(&self, next: ConsumerState) {
        self.state.send_replace(next);
    }
}
