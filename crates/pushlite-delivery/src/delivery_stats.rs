//! Delivery and callback counters reported by the gateway status endpoint.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters shared by dispatcher workers and the callback notifier.
#[derive(Debug, Default)]
pub struct PushDeliveryStats {
    delivered: AtomicU64,
    failed: AtomicU64,
    callbacks_delivered: AtomicU64,
    callbacks_failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
/// Public struct `PushDeliveryStatsSnapshot` used across pushlite components.
pub struct PushDeliveryStatsSnapshot {
    pub delivered: u64,
    pub failed: u64,
    pub callbacks_delivered: u64,
    pub callbacks_failed: u64,
}

impl PushDeliveryStatsSnapshot {
    pub fn completed(&self) -> u64 {
        self.delivered.saturating_add(self.failed)
    }

    pub fn callbacks_attempted(&self) -> u64 {
        self.callbacks_delivered.saturating_add(self.callbacks_failed)
    }
}

impl PushDeliveryStats {
    pub fn record_delivery(&self, success: bool) {
        if success {
            self.delivered.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_callback(&self, success: bool) {
        if success {
            self.callbacks_delivered.fetch_add(1, Ordering::Relaxed);
        } else {
            self.callbacks_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> PushDeliveryStatsSnapshot {
        PushDeliveryStatsSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            callbacks_delivered: self.callbacks_delivered.load(Ordering::Relaxed),
            callbacks_failed: self.callbacks_failed.load(Ordering::Relaxed),
        }
    }
}
