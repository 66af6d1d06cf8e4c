//! Counters for a consumer run

/// Totals accumulated by one [`crate::EventConsumer::run`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub received: u64,
    pub persisted: u64,
    pub skipped: u64,
    /// Malformed deliveries (bad JSON, bad shape, unusable customer)
    pub rejected: u64,
    /// Deliveries that ended the run (store failures, or malformed under the fail policy)
    pub failed: u64,
}

impl ConsumerStats {
    pub fn record_received(&mut self) {
        self.received += 1;
    }

    pub fn record_persisted(&mut self) {
        self.persisted += 1;
    }

    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    pub fn record_rejected(&mut self) {
        self.rejected += 1;
    }

    pub fn record_failed(&mut self) {
        self.failed += 1;
    }

    /// Deliveries that were fully dealt with (written, skipped or rejected)
    pub fn handled(&self) -> u64 {
        self.persisted + self.skipped + self.rejected
    }
}
