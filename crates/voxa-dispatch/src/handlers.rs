//! Per-discriminator multicast subscriber slots.
//!
//! Each discriminator owns one ordered list of callbacks. Slots are created
//! lazily on first subscribe and never removed — unsubscribing empties the
//! list but the slot persists for the process lifetime.
//!
//! Dispatch snapshots the slot under the read lock and then invokes the
//! callbacks outside it, so a concurrent subscribe or unsubscribe can never
//! corrupt an in-progress iteration: every subscriber present for the whole
//! dispatch is invoked exactly once, in subscription order.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, warn};

use voxa_core::errors::HandlerError;
use voxa_core::events::ServerEvent;

/// A subscriber callback.
///
/// A callback that returns `Err` is a "subscriber failure": it is isolated,
/// collected into the [`DispatchOutcome`], and never stops delivery to the
/// remaining subscribers.
pub type Callback = Arc<dyn Fn(&ServerEvent) -> Result<(), HandlerError> + Send + Sync>;

/// Handle identifying one subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Clone)]
struct Entry {
    id: SubscriptionId,
    callback: Callback,
}

/// One subscriber failure observed during a dispatch.
#[derive(Debug)]
pub struct SubscriberFailure {
    /// The failing subscription.
    pub id: SubscriptionId,
    /// The error the callback returned.
    pub error: HandlerError,
}

/// Result of one dispatch call.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// Number of subscribers invoked.
    pub delivered: usize,
    /// Failures collected after all subscribers ran.
    pub failures: Vec<SubscriberFailure>,
}

impl DispatchOutcome {
    /// Whether every invoked subscriber succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Ordered multicast subscriber lists, keyed by discriminator.
pub struct HandlerTable {
    slots: RwLock<HashMap<String, Vec<Entry>>>,
    next_id: AtomicU64,
}

impl HandlerTable {
    /// Create an empty handler table.
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Append a callback to the slot for `discriminator`, creating the slot
    /// if absent. Multiple subscribers per discriminator are allowed.
    pub fn subscribe(&self, discriminator: impl Into<String>, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut slots = self.slots.write();
        slots
            .entry(discriminator.into())
            .or_default()
            .push(Entry { id, callback });
        id
    }

    /// Remove one subscription. Unsubscribing an ID that was never
    /// subscribed (or already removed) is a no-op.
    pub fn unsubscribe(&self, discriminator: &str, id: SubscriptionId) {
        let mut slots = self.slots.write();
        if let Some(entries) = slots.get_mut(discriminator) {
            // The slot itself persists even when emptied.
            entries.retain(|e| e.id != id);
        }
    }

    /// Invoke every current subscriber for `discriminator`, in subscription
    /// order, synchronously on the calling context.
    ///
    /// Dispatch to a discriminator with zero subscribers is legal and
    /// returns an empty outcome.
    pub fn dispatch(&self, discriminator: &str, event: &ServerEvent) -> DispatchOutcome {
        // Snapshot under the read lock; invoke outside it.
        let snapshot: Vec<Entry> = {
            let slots = self.slots.read();
            slots.get(discriminator).cloned().unwrap_or_default()
        };

        let mut outcome = DispatchOutcome::default();
        for entry in snapshot {
            outcome.delivered += 1;
            if let Err(error) = (entry.callback)(event) {
                warn!(
                    event_type = discriminator,
                    subscription = entry.id.0,
                    error = %error,
                    "subscriber failed during dispatch"
                );
                outcome.failures.push(SubscriberFailure {
                    id: entry.id,
                    error,
                });
            }
        }
        debug!(
            event_type = discriminator,
            delivered = outcome.delivered,
            failures = outcome.failures.len(),
            "dispatched event"
        );
        outcome
    }

    /// Number of current subscribers for a discriminator.
    pub fn subscriber_count(&self, discriminator: &str) -> usize {
        self.slots
            .read()
            .get(discriminator)
            .map_or(0, Vec::len)
    }
}

impl Default for HandlerTable {
    fn default() -> Self {
        Self::new()
    }
}
