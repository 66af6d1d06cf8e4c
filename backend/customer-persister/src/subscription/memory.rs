use super::{Delivery, DeliveryTag, SubscriptionChannel};
use crate::error::{PersisterError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

const IN_MEMORY_TOPIC: &str = "in-memory";

#[derive(Debug, Default)]
struct ChannelState {
    acknowledged: Mutex<Vec<i64>>,
    closed: AtomicBool,
}

/// Subscription fed from within the process
///
/// Offsets are assigned in publish order starting at 0. The channel ends once
/// every [`InMemoryPublisher`] has been dropped and the backlog is drained.
pub struct InMemorySubscription {
    receiver: mpsc::UnboundedReceiver<Vec<u8>>,
    next_offset: i64,
    state: Arc<ChannelState>,
}

/// Producing side of an [`InMemorySubscription`]
#[derive(Clone)]
pub struct InMemoryPublisher {
    sender: mpsc::UnboundedSender<Vec<u8>>,
    state: Arc<ChannelState>,
}

/// Read-only view of an [`InMemorySubscription`]. Holding one does not keep
/// the channel open.
#[derive(Clone)]
pub struct ChannelProbe {
    state: Arc<ChannelState>,
}

impl InMemorySubscription {
    pub fn new() -> (InMemoryPublisher, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let state = Arc::new(ChannelState::default());

        (
            InMemoryPublisher {
                sender,
                state: state.clone(),
            },
            Self {
                receiver,
                next_offset: 0,
                state,
            },
        )
    }
}

impl InMemoryPublisher {
    /// Queue a payload. Fails once the subscription is closed.
    pub fn publish(&self, payload: impl Into<Vec<u8>>) -> Result<()> {
        self.sender
            .send(payload.into())
            .map_err(|_| PersisterError::ChannelClosed)
    }

    pub fn probe(&self) -> ChannelProbe {
        ChannelProbe {
            state: self.state.clone(),
        }
    }
}

impl ChannelProbe {
    /// Offsets acknowledged so far, in acknowledgment order
    pub fn acknowledged(&self) -> Vec<i64> {
        self.state
            .acknowledged
            .lock()
            .map(|acked| acked.clone())
            .unwrap_or_default()
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubscriptionChannel for InMemorySubscription {
    async fn next_delivery(&mut self) -> Option<Result<Delivery>> {
        if self.state.closed.load(Ordering::SeqCst) {
            return None;
        }

        let payload = self.receiver.recv().await?;
        let offset = self.next_offset;
        self.next_offset += 1;

        Some(Ok(Delivery {
            payload,
            tag: DeliveryTag {
                topic: IN_MEMORY_TOPIC.to_string(),
                partition: 0,
                offset,
            },
        }))
    }

    async fn acknowledge(&mut self, delivery: &Delivery) -> Result<()> {
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(PersisterError::ChannelClosed);
        }

        if let Ok(mut acked) = self.state.acknowledged.lock() {
            acked.push(delivery.tag.offset);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.receiver.close();
        self.state.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
