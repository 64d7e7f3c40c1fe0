//! Scoped subscription handle.

use super::{EventHandler, SubscriptionId};
use crate::dispatcher::Channel;
use crate::{Bus, Event, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// A registration that lasts as long as the handle.
///
/// Creating the handle subscribes the handler; dropping it unsubscribes.
/// The handle shares the handler, it does not own it exclusively: keep your
/// own `Arc` to read the handler's state. It cannot be cloned, since two
/// copies would both try to remove the same registration, but it can be
/// moved freely.
pub struct SubscriptionHandle<E: Event> {
    id: SubscriptionId,
    name: String,
    channel: Arc<Channel<E>>,
    active: bool,
}

impl<E: Event> SubscriptionHandle<E> {
    /// Subscribe `handler` to `E` on `bus` for the lifetime of the handle
    pub fn new<H>(bus: &Bus, handler: Arc<H>) -> Result<Self>
    where
        H: EventHandler<E>,
    {
        let channel = bus.channel::<E>()?;
        Ok(Self::attach(channel, handler))
    }

    /// Subscribe `handler` directly to `channel`
    pub fn attach<H>(channel: Arc<Channel<E>>, handler: Arc<H>) -> Self
    where
        H: EventHandler<E>,
    {
        let name = handler.name().to_string();
        let id = channel.subscribe(handler);

        Self {
            id,
            name,
            channel,
            active: true,
        }
    }

    /// Get the subscription ID
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Get the handler name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unsubscribe now and report the outcome
    pub fn unsubscribe(mut self) -> Result<()> {
        self.active = false;
        self.channel.unsubscribe(self.id)
    }
}

impl<E: Event> Drop for SubscriptionHandle<E> {
    fn drop(&mut self) {
        if !self.active {
            return;
        }

        match self.channel.unsubscribe(self.id) {
            Ok(()) => debug!(subscription_id = %self.id, "Scoped subscription released"),
            Err(e) => warn!(
                subscription_id = %self.id,
                error = %e,
                "Scoped subscription was already removed"
            ),
        }
    }
}

impl<E: Event> fmt::Debug for SubscriptionHandle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("event_type", &E::event_type())
            .finish()
    }
}

impl<E: Event> fmt::Display for SubscriptionHandle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Subscription '{}' ({})", self.name, self.id)
    }
}
