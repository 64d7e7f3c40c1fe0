//! The main Bus implementation.
//!
//! The Bus is the primary interface for publishing and subscribing to events.
//! It resolves the single [`Channel`] of each event type through its
//! [`TypeRegistry`] and keeps every channel in a [`ChannelDirectory`] for
//! bulk flushes.

use crate::dispatcher::{Channel, ChannelStats, Flushable};
use crate::registry::{ChannelDirectory, TypeRegistry};
use crate::subscription::{EventHandler, SubscriptionHandle, SubscriptionId};
use crate::{DeliveryPolicy, Error, Event, Result};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace};

pub mod builder;
pub mod config;
pub mod global;

pub use builder::BusBuilder;
pub use config::BusConfig;
pub use global::global;

struct BusInner {
    config: BusConfig,
    channels: TypeRegistry,
    directory: Arc<ChannelDirectory>,
    is_shut_down: AtomicBool,
}

/// An isolated event bus.
///
/// Each bus owns one channel per event type, created on first use. Clones
/// share the same channels. Use [`global`] for the process-wide bus.
///
/// # Example
///
/// ```rust
/// use typed_bus::{Bus, DeliveryPolicy, Event};
///
/// #[derive(Debug, Clone)]
/// struct Message {
///     text: String,
/// }
///
/// impl Event for Message {}
///
/// # fn main() -> typed_bus::Result<()> {
/// let bus = Bus::new();
/// let id = bus.subscribe_fn(|m: &Message| println!("received {}", m.text))?;
///
/// bus.publish(Message { text: "hello".into() }, DeliveryPolicy::Immediate)?;
/// bus.publish(Message { text: "later".into() }, DeliveryPolicy::Deferred)?;
/// bus.flush_deferred()?;
///
/// bus.unsubscribe::<Message>(id)?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Bus {
    inner: Arc<BusInner>,
}

impl Bus {
    /// Create a bus with the default configuration
    pub fn new() -> Self {
        Self::from_config(BusConfig::default())
    }

    /// Create a new Bus builder
    pub fn builder() -> BusBuilder {
        BusBuilder::new()
    }

    pub(crate) fn from_config(config: BusConfig) -> Self {
        Self {
            inner: Arc::new(BusInner {
                config,
                channels: TypeRegistry::new(),
                directory: Arc::new(ChannelDirectory::new()),
                is_shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// The configuration the bus was built with
    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }

    /// The channel for `E`, creating it on first access
    pub fn channel<E: Event>(&self) -> Result<Arc<Channel<E>>> {
        if let Some(channel) = self.inner.channels.get::<Channel<E>>() {
            return Ok(channel);
        }

        self.ensure_running()?;

        let channel = self.inner.channels.get_or_try_init(|| {
            self.ensure_running()?;
            debug!(event_type = E::event_type(), "Creating channel");
            Channel::registered(self.inner.config.channel.clone(), &self.inner.directory)
        })?;

        // A shutdown that raced the registration may have missed this channel.
        if self.is_shut_down() {
            Flushable::shutdown(channel.as_ref())?;
            return Err(Error::PoolShutDown);
        }
        Ok(channel)
    }

    /// Subscribe a handler to events of type `E`
    pub fn subscribe<E, H>(&self, handler: Arc<H>) -> Result<SubscriptionId>
    where
        E: Event,
        H: EventHandler<E>,
    {
        self.ensure_running()?;
        Ok(self.channel::<E>()?.subscribe(handler))
    }

    /// Subscribe a closure to events of type `E`
    pub fn subscribe_fn<E, F>(&self, f: F) -> Result<SubscriptionId>
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.subscribe::<E, F>(Arc::new(f))
    }

    /// Subscribe a handler for as long as the returned handle lives
    pub fn subscribe_scoped<E, H>(&self, handler: Arc<H>) -> Result<SubscriptionHandle<E>>
    where
        E: Event,
        H: EventHandler<E>,
    {
        self.ensure_running()?;
        SubscriptionHandle::new(self, handler)
    }

    /// Remove the subscription `id` from the channel of `E`.
    ///
    /// # Errors
    ///
    /// [`Error::HandlerNotFound`] when `id` is not subscribed to `E`.
    pub fn unsubscribe<E: Event>(&self, id: SubscriptionId) -> Result<()> {
        match self.inner.channels.get::<Channel<E>>() {
            Some(channel) => channel.unsubscribe(id),
            None => Err(Error::HandlerNotFound { id }),
        }
    }

    /// Publish an event under the given delivery policy
    pub fn publish<E: Event>(&self, event: E, policy: DeliveryPolicy) -> Result<()> {
        self.ensure_running()?;
        trace!(event_type = E::event_type(), %policy, "Publishing event");

        let channel = self.channel::<E>()?;
        match policy {
            DeliveryPolicy::Immediate => channel.publish_immediate(&event),
            DeliveryPolicy::Deferred => channel.publish_deferred(event),
            DeliveryPolicy::Async => channel.publish_async(event),
        }
    }

    /// Deliver the buffered deferred events of every event type.
    ///
    /// Every channel is flushed even when one fails. Returns the number of
    /// events drained.
    pub fn flush_deferred(&self) -> Result<usize> {
        self.inner.directory.flush_all_deferred()
    }

    /// Wait for the outstanding async deliveries of every event type.
    ///
    /// Do not call this from an async handler. The handler's own channel
    /// refuses with [`Error::Internal`], and waiting on another channel whose
    /// handlers in turn wait on this one deadlocks.
    pub fn flush_async(&self) -> Result<usize> {
        self.inner.directory.flush_all_async()
    }

    /// Get statistics about the bus
    pub fn stats(&self) -> BusStats {
        BusStats {
            channels: self.inner.directory.stats(),
        }
    }

    /// Check if the bus was shut down
    pub fn is_shut_down(&self) -> bool {
        self.inner.is_shut_down.load(Ordering::Acquire)
    }

    /// Shut the bus down.
    ///
    /// Flushes deferred events when configured to, then drains async work
    /// and stops every channel's workers. Later subscribes and publishes
    /// fail with [`Error::PoolShutDown`]. Calling it again does nothing.
    pub fn shutdown(&self) -> Result<()> {
        if self.inner.is_shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        info!("Shutting down Bus");

        let flushed = if self.inner.config.flush_on_shutdown {
            self.flush_deferred().map(|_| ())
        } else {
            Ok(())
        };
        let stopped = self.inner.directory.shutdown_all();

        info!("Bus shutdown complete");
        flushed.and(stopped)
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_shut_down() {
            return Err(Error::PoolShutDown);
        }
        Ok(())
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("config", &self.inner.config)
            .field("channels", &self.inner.directory)
            .field("is_shut_down", &self.is_shut_down())
            .finish()
    }
}

/// Statistics about the bus
#[derive(Debug, Clone, Default)]
pub struct BusStats {
    /// Per-channel statistics, in channel creation order
    pub channels: Vec<ChannelStats>,
}

impl BusStats {
    /// Total number of subscriptions across all event types
    pub fn total_subscriptions(&self) -> usize {
        self.channels.iter().map(|c| c.subscribers).sum()
    }

    /// Total number of events published across all event types
    pub fn total_published(&self) -> u64 {
        self.channels.iter().map(|c| c.published()).sum()
    }
}

impl fmt::Display for BusStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bus Stats: {} subscriptions, {} event types, {} events published",
            self.total_subscriptions(),
            self.channels.len(),
            self.total_published()
        )
    }
}
