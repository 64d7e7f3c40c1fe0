//! Type-erased directory of live channels.

use crate::dispatcher::{ChannelStats, Flushable};
use crate::Result;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, trace};

/// Identifies one registration in a [`ChannelDirectory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel-{}", self.0)
    }
}

struct Entry {
    id: ChannelId,
    event_type: &'static str,
    channel: Weak<dyn Flushable>,
}

/// Every live channel, in creation order.
///
/// The directory holds weak references only: a channel's lifetime is owned
/// elsewhere and it removes itself here when dropped. Bulk operations work
/// on a snapshot, so channels may be created or dropped while a flush is
/// running.
#[derive(Default)]
pub struct ChannelDirectory {
    channels: Mutex<Vec<Entry>>,
    next_id: AtomicU64,
}

impl ChannelDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel and return its registration ID
    pub fn register(&self, event_type: &'static str, channel: Weak<dyn Flushable>) -> ChannelId {
        let id = ChannelId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.channels.lock().push(Entry {
            id,
            event_type,
            channel,
        });

        trace!(channel_id = %id, event_type, "Channel registered");
        id
    }

    /// Remove a registration. Unknown IDs are ignored.
    pub fn deregister(&self, id: ChannelId) {
        let mut channels = self.channels.lock();
        if let Some(position) = channels.iter().position(|e| e.id == id) {
            let entry = channels.remove(position);
            trace!(channel_id = %id, event_type = entry.event_type, "Channel deregistered");
        }
    }

    /// Strong references to every channel still alive
    pub fn snapshot(&self) -> Vec<Arc<dyn Flushable>> {
        self.channels
            .lock()
            .iter()
            .filter_map(|e| e.channel.upgrade())
            .collect()
    }

    /// Flush the deferred buffer of every channel.
    ///
    /// A failing channel does not stop the others. Returns the total number
    /// of events drained.
    ///
    /// # Errors
    ///
    /// The first channel error, after all channels were flushed.
    pub fn flush_all_deferred(&self) -> Result<usize> {
        self.for_each("deferred flush", |channel| channel.flush_deferred())
    }

    /// Wait for the async deliveries of every channel.
    ///
    /// # Errors
    ///
    /// The first channel error, after all channels were flushed.
    pub fn flush_all_async(&self) -> Result<usize> {
        self.for_each("async flush", |channel| channel.flush_async())
    }

    /// Drain and stop every channel's worker pool
    pub fn shutdown_all(&self) -> Result<()> {
        self.for_each("shutdown", |channel| channel.shutdown().map(|_| 0))
            .map(|_| ())
    }

    /// Statistics for every live channel
    pub fn stats(&self) -> Vec<ChannelStats> {
        self.snapshot().iter().map(|c| c.stats()).collect()
    }

    /// Number of live registrations
    pub fn len(&self) -> usize {
        self.channels.lock().len()
    }

    /// Whether no channel is registered
    pub fn is_empty(&self) -> bool {
        self.channels.lock().is_empty()
    }

    fn for_each<F>(&self, operation: &'static str, mut f: F) -> Result<usize>
    where
        F: FnMut(&dyn Flushable) -> Result<usize>,
    {
        let channels = self.snapshot();
        let mut total = 0;
        let mut first_error = None;

        for channel in &channels {
            match f(channel.as_ref()) {
                Ok(count) => total += count,
                Err(e) => {
                    error!(
                        event_type = channel.event_type(),
                        operation,
                        error = %e,
                        "Channel operation failed"
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        debug!(operation, channels = channels.len(), total, "Directory operation complete");
        match first_error {
            Some(e) => Err(e),
            None => Ok(total),
        }
    }
}

impl fmt::Debug for ChannelDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channels = self.channels.lock();
        f.debug_struct("ChannelDirectory")
            .field(
                "channels",
                &channels.iter().map(|e| e.event_type).collect::<Vec<_>>(),
            )
            .finish()
    }
}
