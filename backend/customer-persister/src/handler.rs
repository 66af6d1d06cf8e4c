//! Per-delivery handling: decode, extract the customer, persist it

use crate::error::Result;
use crate::event::{decode_event, CustomerId};
use crate::store::RecordStore;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of handling one delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Customer record written under its id
    Persisted { customer_id: CustomerId },
    /// Event carried no customer; nothing was written
    Skipped,
}

/// Writes the customer sub-record of each event to the record store
pub struct CustomerEventHandler<S> {
    store: Arc<S>,
}

impl<S: RecordStore> CustomerEventHandler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Handle one raw payload
    ///
    /// Decoding and validation errors are returned without touching the store.
    /// The write is an unconditional overwrite of any existing entry.
    pub async fn on_message_delivered(&self, payload: &[u8]) -> Result<HandlerOutcome> {
        info!(payload = %String::from_utf8_lossy(payload), "Received payload");

        let event = decode_event(payload)?;

        let customer = match event.customer()? {
            Some(customer) => customer,
            None => {
                debug!("Event has no customer, skipping");
                return Ok(HandlerOutcome::Skipped);
            }
        };

        let value = customer.to_store_value()?;
        self.store.set(customer.id().as_str(), &value).await?;

        debug!(customer_id = %customer.id(), "Customer record persisted");

        Ok(HandlerOutcome::Persisted {
            customer_id: customer.id().clone(),
        })
    }
}
