//! The per-event-type channel.
//!
//! Every delivery path follows the same protocol: copy the subscriber list
//! while holding the lock, release it, then call the handlers on the copy.
//! Handlers may therefore subscribe, unsubscribe or publish from inside
//! their own invocation. A handler added during a delivery misses the event
//! in flight; a handler removed during a delivery may still receive it.

use super::{ChannelConfig, ChannelStats, CompletionHandle, Flushable, OverflowPolicy, WorkerPool};
use crate::buffer::RingBuffer;
use crate::registry::{ChannelDirectory, ChannelId};
use crate::subscription::{EventHandler, SubscriptionId};
use crate::{Error, Event, Result};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, trace, warn};

struct Subscriber<E: Event> {
    id: SubscriptionId,
    handler: Arc<dyn EventHandler<E>>,
}

impl<E: Event> Clone for Subscriber<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            handler: Arc::clone(&self.handler),
        }
    }
}

type SubscriberList<E> = Mutex<Vec<Subscriber<E>>>;

#[derive(Default)]
struct Counters {
    published_immediate: AtomicU64,
    published_deferred: AtomicU64,
    published_async: AtomicU64,
    deliveries: AtomicU64,
}

struct Registration {
    directory: Weak<ChannelDirectory>,
    id: ChannelId,
}

/// Subscriber registry and delivery engine for one event type.
pub struct Channel<E: Event> {
    config: ChannelConfig,
    subscribers: Arc<SubscriberList<E>>,
    deferred: Mutex<RingBuffer<E>>,
    pending_async: Mutex<RingBuffer<CompletionHandle<Result<()>>>>,
    pool: WorkerPool,
    counters: Arc<Counters>,
    registration: Option<Registration>,
}

impl<E: Event> Channel<E> {
    /// Create a standalone channel that no directory knows about.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfiguration`] for a rejected configuration, or the
    /// worker pool's startup error.
    pub fn new(config: ChannelConfig) -> Result<Arc<Self>> {
        Self::build(config, None)
    }

    /// Create a channel registered with `directory`. It deregisters itself
    /// when dropped.
    pub fn registered(config: ChannelConfig, directory: &Arc<ChannelDirectory>) -> Result<Arc<Self>> {
        Self::build(config, Some(directory))
    }

    fn build(config: ChannelConfig, directory: Option<&Arc<ChannelDirectory>>) -> Result<Arc<Self>> {
        config.validate()?;

        let deferred = RingBuffer::new(config.deferred_capacity)?;
        let pending_async = RingBuffer::new(config.async_capacity)?;
        let pool = WorkerPool::new(config.worker_config())?;

        let channel = Arc::new_cyclic(|weak: &Weak<Self>| {
            let registration = directory.map(|directory| {
                let flushable: Weak<dyn Flushable> = weak.clone();
                Registration {
                    directory: Arc::downgrade(directory),
                    id: directory.register(E::event_type(), flushable),
                }
            });

            Self {
                config,
                subscribers: Arc::new(Mutex::new(Vec::new())),
                deferred: Mutex::new(deferred),
                pending_async: Mutex::new(pending_async),
                pool,
                counters: Arc::new(Counters::default()),
                registration,
            }
        });

        debug!(event_type = E::event_type(), "Channel created");
        Ok(channel)
    }

    /// Append a subscriber. The same handler may be subscribed repeatedly;
    /// each call creates a distinct registration.
    pub fn subscribe(&self, handler: Arc<dyn EventHandler<E>>) -> SubscriptionId {
        let id = SubscriptionId::new();

        trace!(
            subscription_id = %id,
            event_type = E::event_type(),
            handler = handler.name(),
            "Subscribing handler"
        );

        self.subscribers.lock().push(Subscriber { id, handler });
        id
    }

    /// Remove the registration identified by `id`.
    ///
    /// # Errors
    ///
    /// [`Error::HandlerNotFound`] when no registration matches.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        let mut subscribers = self.subscribers.lock();
        let position = subscribers
            .iter()
            .position(|s| s.id == id)
            .ok_or(Error::HandlerNotFound { id })?;
        subscribers.remove(position);
        drop(subscribers);

        trace!(subscription_id = %id, event_type = E::event_type(), "Handler unsubscribed");
        Ok(())
    }

    /// Deliver `event` to every current subscriber on the calling thread.
    ///
    /// # Errors
    ///
    /// The first handler error; the subscribers after it are skipped.
    pub fn publish_immediate(&self, event: &E) -> Result<()> {
        self.counters.published_immediate.fetch_add(1, Ordering::Relaxed);
        let subscribers = snapshot(&self.subscribers);
        deliver(&subscribers, event, &self.counters)
    }

    /// Buffer `event` until the next deferred flush.
    ///
    /// # Errors
    ///
    /// [`Error::Overflow`] when the buffer is full under
    /// [`OverflowPolicy::Reject`]. Under [`OverflowPolicy::FlushWhenFull`]
    /// the buffer is flushed first and any handler error from that flush is
    /// returned instead.
    pub fn publish_deferred(&self, event: E) -> Result<()> {
        let mut deferred = self.deferred.lock();

        if deferred.is_full() && self.config.overflow == OverflowPolicy::FlushWhenFull {
            drop(deferred);
            debug!(event_type = E::event_type(), "Deferred buffer full, flushing");
            self.flush_deferred()?;
            deferred = self.deferred.lock();
        }

        deferred.push(event).inspect_err(|_| {
            warn!(event_type = E::event_type(), "Deferred buffer full, event rejected");
        })?;
        self.counters.published_deferred.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Deliver every buffered event, oldest first, to every subscriber.
    ///
    /// Delivery is event-major: all subscribers see one event before any
    /// sees the next. Returns the number of events drained.
    ///
    /// # Errors
    ///
    /// The first handler error. Drained events not yet delivered are lost.
    pub fn flush_deferred(&self) -> Result<usize> {
        let (events, subscribers) = {
            let mut deferred = self.deferred.lock();
            let events: Vec<E> = deferred.drain().collect();
            (events, snapshot(&self.subscribers))
        };

        if events.is_empty() {
            return Ok(0);
        }

        trace!(
            event_type = E::event_type(),
            events = events.len(),
            subscribers = subscribers.len(),
            "Flushing deferred events"
        );

        for event in &events {
            deliver(&subscribers, event, &self.counters)?;
        }
        Ok(events.len())
    }

    /// Deliver `event` on the channel's worker pool.
    ///
    /// The subscriber list is copied on the worker when the task starts.
    /// The outcome is kept until [`flush_async`](Self::flush_async).
    ///
    /// # Errors
    ///
    /// [`Error::Overflow`] when too many deliveries await a flush,
    /// [`Error::PoolShutDown`] after [`shutdown`](Flushable::shutdown).
    /// A handler running on this channel's worker never flushes; it gets
    /// [`Error::Overflow`] even under [`OverflowPolicy::FlushWhenFull`].
    pub fn publish_async(&self, event: E) -> Result<()> {
        let mut pending = self.pending_async.lock();

        if pending.is_full()
            && self.config.overflow == OverflowPolicy::FlushWhenFull
            && !self.pool.is_worker_thread()
        {
            drop(pending);
            debug!(event_type = E::event_type(), "Async backlog full, flushing");
            self.flush_async()?;
            pending = self.pending_async.lock();
        }

        if pending.is_full() {
            warn!(event_type = E::event_type(), "Async backlog full, event rejected");
            return Err(Error::Overflow {
                capacity: pending.capacity(),
            });
        }

        let subscribers = Arc::clone(&self.subscribers);
        let counters = Arc::clone(&self.counters);
        let handle = self.pool.submit(move || {
            let subscribers = snapshot(&subscribers);
            deliver(&subscribers, &event, &counters)
        })?;

        pending.push(handle)?;
        self.counters.published_async.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Wait for every outstanding async delivery, oldest first.
    ///
    /// Every handle is joined even when an earlier one failed. Returns the
    /// number of deliveries joined.
    ///
    /// # Errors
    ///
    /// The first failure encountered, after all handles were joined.
    /// [`Error::Internal`] without touching the backlog when called from
    /// this channel's own worker, which would otherwise wait on itself.
    pub fn flush_async(&self) -> Result<usize> {
        if self.pool.is_worker_thread() {
            warn!(event_type = E::event_type(), "flush_async called from the channel's own worker");
            return Err(Error::internal("flush_async called from the channel's own worker"));
        }

        let handles: Vec<_> = self.pending_async.lock().drain().collect();
        let joined = handles.len();
        let mut first_error = None;

        for handle in handles {
            if let Err(e) = handle.join().and_then(|delivery| delivery) {
                error!(event_type = E::event_type(), error = %e, "Async delivery failed");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(joined),
        }
    }

    /// Current number of subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Events waiting for a deferred flush
    pub fn pending_deferred(&self) -> usize {
        self.deferred.lock().len()
    }

    /// Async deliveries waiting for an async flush
    pub fn pending_async(&self) -> usize {
        self.pending_async.lock().len()
    }

    /// The configuration the channel was built with
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }
}

impl<E: Event> Flushable for Channel<E> {
    fn event_type(&self) -> &'static str {
        E::event_type()
    }

    fn flush_deferred(&self) -> Result<usize> {
        Channel::flush_deferred(self)
    }

    fn flush_async(&self) -> Result<usize> {
        Channel::flush_async(self)
    }

    fn shutdown(&self) -> Result<()> {
        let drained = Channel::flush_async(self);
        self.pool.shutdown();
        drained.map(|_| ())
    }

    fn stats(&self) -> ChannelStats {
        ChannelStats {
            event_type: E::event_type(),
            subscribers: self.subscriber_count(),
            pending_deferred: self.pending_deferred(),
            pending_async: self.pending_async(),
            published_immediate: self.counters.published_immediate.load(Ordering::Relaxed),
            published_deferred: self.counters.published_deferred.load(Ordering::Relaxed),
            published_async: self.counters.published_async.load(Ordering::Relaxed),
            deliveries: self.counters.deliveries.load(Ordering::Relaxed),
        }
    }
}

impl<E: Event> Drop for Channel<E> {
    fn drop(&mut self) {
        if let Some(registration) = &self.registration {
            if let Some(directory) = registration.directory.upgrade() {
                directory.deregister(registration.id);
            }
        }
    }
}

impl<E: Event> fmt::Debug for Channel<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("event_type", &E::event_type())
            .field("subscribers", &self.subscriber_count())
            .field("pending_deferred", &self.pending_deferred())
            .field("pending_async", &self.pending_async())
            .finish()
    }
}

fn snapshot<E: Event>(subscribers: &SubscriberList<E>) -> Vec<Subscriber<E>> {
    subscribers.lock().clone()
}

fn deliver<E: Event>(subscribers: &[Subscriber<E>], event: &E, counters: &Counters) -> Result<()> {
    for subscriber in subscribers {
        subscriber.handler.handle(event).inspect_err(|e| {
            warn!(
                subscription_id = %subscriber.id,
                handler = subscriber.handler.name(),
                error = %e,
                "Handler failed, remaining deliveries skipped"
            );
        })?;
        counters.deliveries.fetch_add(1, Ordering::Relaxed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::FunctionHandler;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Clone, PartialEq)]
    struct Message {
        text: String,
    }

    impl Event for Message {}

    fn message(text: &str) -> Message {
        Message {
            text: text.to_string(),
        }
    }

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(log: &Log, tag: &'static str) -> Arc<dyn EventHandler<Message>> {
        let log = Arc::clone(log);
        Arc::new(move |m: &Message| log.lock().push(format!("{tag}:{}", m.text)))
    }

    fn channel(config: ChannelConfig) -> Arc<Channel<Message>> {
        Channel::new(config).unwrap()
    }

    #[test]
    fn test_immediate_delivery_in_subscription_order() {
        let channel = channel(ChannelConfig::default());
        let log = Log::default();

        for tag in ["a", "b", "c"] {
            channel.subscribe(recorder(&log, tag));
        }
        channel.publish_immediate(&message("x")).unwrap();

        assert_eq!(*log.lock(), vec!["a:x", "b:x", "c:x"]);
        assert_eq!(channel.stats().deliveries, 3);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let channel = channel(ChannelConfig::default());
        channel.publish_immediate(&message("nobody")).unwrap();
        channel.publish_deferred(message("nobody")).unwrap();
        assert_eq!(channel.flush_deferred().unwrap(), 1);
    }

    #[test]
    fn test_unsubscribe_unknown_id() {
        let channel = channel(ChannelConfig::default());
        let id = SubscriptionId::new();
        assert_eq!(
            channel.unsubscribe(id).unwrap_err(),
            Error::HandlerNotFound { id }
        );
    }

    #[test]
    fn test_same_handler_twice_removed_once() {
        let channel = channel(ChannelConfig::default());
        let log = Log::default();
        let handler = recorder(&log, "h");

        let first = channel.subscribe(Arc::clone(&handler));
        channel.subscribe(handler);
        channel.unsubscribe(first).unwrap();

        channel.publish_immediate(&message("still here")).unwrap();
        assert_eq!(*log.lock(), vec!["h:still here"]);
        assert_eq!(channel.subscriber_count(), 1);
    }

    #[test]
    fn test_deferred_waits_for_flush() {
        let channel = channel(ChannelConfig::default());
        let log = Log::default();
        channel.subscribe(recorder(&log, "a"));
        channel.subscribe(recorder(&log, "b"));

        channel.publish_deferred(message("1")).unwrap();
        channel.publish_deferred(message("2")).unwrap();
        assert!(log.lock().is_empty());
        assert_eq!(channel.pending_deferred(), 2);

        assert_eq!(channel.flush_deferred().unwrap(), 2);
        assert_eq!(*log.lock(), vec!["a:1", "b:1", "a:2", "b:2"]);
        assert_eq!(channel.pending_deferred(), 0);
        assert_eq!(channel.flush_deferred().unwrap(), 0);
    }

    #[test]
    fn test_deferred_overflow_rejects() {
        let channel = channel(ChannelConfig::new().deferred_capacity(2));
        let log = Log::default();
        channel.subscribe(recorder(&log, "h"));

        channel.publish_deferred(message("1")).unwrap();
        channel.publish_deferred(message("2")).unwrap();
        assert_eq!(
            channel.publish_deferred(message("3")).unwrap_err(),
            Error::Overflow { capacity: 2 }
        );

        channel.flush_deferred().unwrap();
        assert_eq!(*log.lock(), vec!["h:1", "h:2"]);
    }

    #[test]
    fn test_deferred_flush_when_full() {
        let channel = channel(
            ChannelConfig::new()
                .deferred_capacity(2)
                .overflow(OverflowPolicy::FlushWhenFull),
        );
        let log = Log::default();
        channel.subscribe(recorder(&log, "h"));

        for text in ["1", "2", "3"] {
            channel.publish_deferred(message(text)).unwrap();
        }
        assert_eq!(*log.lock(), vec!["h:1", "h:2"]);
        assert_eq!(channel.pending_deferred(), 1);
    }

    #[test]
    fn test_async_delivery_and_flush() {
        let channel = channel(ChannelConfig::default());
        let log = Log::default();
        channel.subscribe(recorder(&log, "h"));

        for i in 0..100 {
            channel.publish_async(message(&i.to_string())).unwrap();
        }
        assert_eq!(channel.flush_async().unwrap(), 100);

        let expected: Vec<_> = (0..100).map(|i| format!("h:{i}")).collect();
        assert_eq!(*log.lock(), expected);
        assert_eq!(channel.pending_async(), 0);
    }

    #[test]
    fn test_async_overflow_rejects() {
        let channel = channel(ChannelConfig::new().async_capacity(1));
        channel.publish_async(message("1")).unwrap();
        assert!(channel.publish_async(message("2")).unwrap_err().is_overflow());
        assert_eq!(channel.flush_async().unwrap(), 1);
        channel.publish_async(message("3")).unwrap();
        assert_eq!(channel.flush_async().unwrap(), 1);
    }

    #[test]
    fn test_async_flush_when_full() {
        let channel = channel(
            ChannelConfig::new()
                .async_capacity(2)
                .overflow(OverflowPolicy::FlushWhenFull),
        );
        let log = Log::default();
        channel.subscribe(recorder(&log, "h"));

        for text in ["1", "2", "3"] {
            channel.publish_async(message(text)).unwrap();
        }
        assert_eq!(channel.pending_async(), 1);
        assert_eq!(channel.flush_async().unwrap(), 1);
        assert_eq!(*log.lock(), vec!["h:1", "h:2", "h:3"]);
    }

    #[test]
    fn test_async_republish_on_full_backlog_is_rejected_not_flushed() {
        let channel = channel(
            ChannelConfig::new()
                .async_capacity(1)
                .overflow(OverflowPolicy::FlushWhenFull),
        );
        let log = Log::default();
        let (tx, rx) = std::sync::mpsc::channel();
        let tx = Mutex::new(tx);

        let republisher = {
            let channel = Arc::downgrade(&channel);
            let log = Arc::clone(&log);
            move |m: &Message| {
                log.lock().push(m.text.clone());
                if m.text == "outer" {
                    if let Some(channel) = channel.upgrade() {
                        let _ = tx.lock().send(channel.publish_async(message("inner")));
                    }
                }
            }
        };
        channel.subscribe(Arc::new(republisher));

        channel.publish_async(message("outer")).unwrap();
        let republished = rx.recv().unwrap();
        assert_eq!(republished.unwrap_err(), Error::Overflow { capacity: 1 });

        // The outer delivery is still pending and is joined exactly once.
        assert_eq!(channel.flush_async().unwrap(), 1);
        channel.publish_async(message("after")).unwrap();
        assert_eq!(channel.flush_async().unwrap(), 1);
        assert_eq!(*log.lock(), vec!["outer", "after"]);
    }

    #[test]
    fn test_flush_async_from_own_worker_is_refused() {
        let channel = channel(ChannelConfig::default());
        let (tx, rx) = std::sync::mpsc::channel();
        let tx = Mutex::new(tx);

        let flusher = {
            let channel = Arc::downgrade(&channel);
            move |_: &Message| {
                if let Some(channel) = channel.upgrade() {
                    let _ = tx.lock().send(channel.flush_async());
                }
            }
        };
        channel.subscribe(Arc::new(flusher));

        channel.publish_async(message("x")).unwrap();
        assert!(matches!(rx.recv().unwrap(), Err(Error::Internal(_))));
        assert_eq!(channel.flush_async().unwrap(), 1);
    }

    #[test]
    fn test_async_failures_surface_after_draining() {
        let channel = channel(ChannelConfig::default());
        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&delivered);

        channel.subscribe(Arc::new(FunctionHandler::new(move |m: &Message| {
            if m.text == "bad" {
                return Err(Error::handler("bad message"));
            }
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })));

        channel.publish_async(message("ok-1")).unwrap();
        channel.publish_async(message("bad")).unwrap();
        channel.publish_async(message("ok-2")).unwrap();

        assert_eq!(
            channel.flush_async().unwrap_err(),
            Error::handler("bad message")
        );
        assert_eq!(delivered.load(Ordering::SeqCst), 2);
        assert_eq!(channel.pending_async(), 0);
    }

    #[test]
    fn test_async_panic_surfaces_as_task_failure() {
        let channel = channel(ChannelConfig::default());
        channel.subscribe(Arc::new(|_: &Message| panic!("handler exploded")));

        channel.publish_async(message("boom")).unwrap();
        assert_eq!(
            channel.flush_async().unwrap_err(),
            Error::TaskPanicked("handler exploded".to_string())
        );

        // The worker is still alive.
        channel.publish_async(message("again")).unwrap();
        assert!(channel.flush_async().is_err());
    }

    #[test]
    fn test_sync_failure_aborts_remaining_handlers() {
        let channel = channel(ChannelConfig::default());
        let log = Log::default();

        channel.subscribe(recorder(&log, "first"));
        channel.subscribe(Arc::new(FunctionHandler::new(|_: &Message| {
            Err(Error::handler("stop"))
        })));
        channel.subscribe(recorder(&log, "third"));

        assert_eq!(
            channel.publish_immediate(&message("x")).unwrap_err(),
            Error::handler("stop")
        );
        assert_eq!(*log.lock(), vec!["first:x"]);
    }

    #[test]
    fn test_handler_can_unsubscribe_itself_during_delivery() {
        let channel = channel(ChannelConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::default();

        let handler = {
            let channel = Arc::downgrade(&channel);
            let calls = Arc::clone(&calls);
            let slot = Arc::clone(&slot);
            move |_: &Message| {
                calls.fetch_add(1, Ordering::SeqCst);
                if let (Some(channel), Some(id)) = (channel.upgrade(), slot.lock().take()) {
                    channel.unsubscribe(id).unwrap();
                }
            }
        };

        let id = channel.subscribe(Arc::new(handler));
        *slot.lock() = Some(id);

        channel.publish_immediate(&message("1")).unwrap();
        channel.publish_immediate(&message("2")).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn test_subscriber_added_during_delivery_misses_event_in_flight() {
        let channel = channel(ChannelConfig::default());
        let log = Log::default();

        let adder = {
            let channel = Arc::downgrade(&channel);
            let log = Arc::clone(&log);
            let added = AtomicUsize::new(0);
            move |_: &Message| {
                if added.fetch_add(1, Ordering::SeqCst) == 0 {
                    if let Some(channel) = channel.upgrade() {
                        channel.subscribe(recorder(&log, "late"));
                    }
                }
            }
        };
        channel.subscribe(Arc::new(adder));

        channel.publish_immediate(&message("1")).unwrap();
        assert!(log.lock().is_empty());

        channel.publish_immediate(&message("2")).unwrap();
        assert_eq!(*log.lock(), vec!["late:2"]);
    }

    #[test]
    fn test_handler_can_publish_during_delivery() {
        let channel = channel(ChannelConfig::default());
        let log = Log::default();

        let republisher = {
            let channel = Arc::downgrade(&channel);
            move |m: &Message| {
                if m.text == "outer" {
                    if let Some(channel) = channel.upgrade() {
                        channel.publish_immediate(&message("inner")).unwrap();
                        channel.publish_deferred(message("later")).unwrap();
                    }
                }
            }
        };
        channel.subscribe(Arc::new(republisher));
        channel.subscribe(recorder(&log, "r"));

        channel.publish_immediate(&message("outer")).unwrap();
        assert_eq!(*log.lock(), vec!["r:inner", "r:outer"]);

        channel.flush_deferred().unwrap();
        assert_eq!(*log.lock(), vec!["r:inner", "r:outer", "r:later"]);
    }

    #[test]
    fn test_concurrent_publishers() {
        let channel = channel(ChannelConfig::new().deferred_capacity(4096));
        let received = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&received);
        channel.subscribe(Arc::new(move |_: &Message| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let threads: Vec<_> = (0..4)
            .map(|t| {
                let channel = Arc::clone(&channel);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        let event = message(&format!("{t}-{i}"));
                        channel.publish_immediate(&event).unwrap();
                        channel.publish_deferred(event).unwrap();
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(received.load(Ordering::SeqCst), 1000);
        assert_eq!(channel.flush_deferred().unwrap(), 1000);
        assert_eq!(received.load(Ordering::SeqCst), 2000);
    }

    #[test]
    fn test_shutdown_rejects_async() {
        let channel = channel(ChannelConfig::default());
        channel.publish_async(message("before")).unwrap();
        Flushable::shutdown(&*channel).unwrap();

        assert_eq!(
            channel.publish_async(message("after")).unwrap_err(),
            Error::PoolShutDown
        );
        channel.publish_immediate(&message("still fine")).unwrap();
    }

    #[test]
    fn test_registered_channel_deregisters_on_drop() {
        let directory = Arc::new(ChannelDirectory::new());
        let channel = Channel::<Message>::registered(ChannelConfig::default(), &directory).unwrap();
        assert_eq!(directory.len(), 1);

        drop(channel);
        assert_eq!(directory.len(), 0);
    }
}
