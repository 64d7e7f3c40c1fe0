//! The process-wide bus.
//!
//! Free functions forwarding to [`global()`], for code that has no bus to
//! pass around. The global bus is created on first use and never shut down.

use super::Bus;
use crate::subscription::{EventHandler, SubscriptionId};
use crate::{DeliveryPolicy, Event, Result};
use std::sync::{Arc, OnceLock};

static GLOBAL: OnceLock<Bus> = OnceLock::new();

/// The process-wide bus
pub fn global() -> &'static Bus {
    GLOBAL.get_or_init(Bus::new)
}

/// Subscribe a handler on the global bus
pub fn subscribe<E, H>(handler: Arc<H>) -> Result<SubscriptionId>
where
    E: Event,
    H: EventHandler<E>,
{
    global().subscribe(handler)
}

/// Subscribe a closure on the global bus
pub fn subscribe_fn<E, F>(f: F) -> Result<SubscriptionId>
where
    E: Event,
    F: Fn(&E) + Send + Sync + 'static,
{
    global().subscribe_fn(f)
}

/// Unsubscribe from the global bus
pub fn unsubscribe<E: Event>(id: SubscriptionId) -> Result<()> {
    global().unsubscribe::<E>(id)
}

/// Publish on the global bus
pub fn publish<E: Event>(event: E, policy: DeliveryPolicy) -> Result<()> {
    global().publish(event, policy)
}

/// Flush deferred events of every type on the global bus
pub fn flush_deferred() -> Result<usize> {
    global().flush_deferred()
}

/// Wait for async deliveries of every type on the global bus
pub fn flush_async() -> Result<usize> {
    global().flush_async()
}
