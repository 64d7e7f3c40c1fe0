//! Per-event-type dispatch.
//!
//! A [`Channel`] owns the subscriber list of one event type and implements
//! the three delivery policies. Asynchronous delivery runs on the channel's
//! own [`WorkerPool`].

use crate::buffer::DEFAULT_CAPACITY;
use crate::{Error, Result};
use std::fmt;

pub mod channel;
pub mod worker;

pub use channel::Channel;
pub use worker::{CompletionHandle, WorkerConfig, WorkerPool};

/// Type-erased view of a channel, used to flush every event type at once.
pub trait Flushable: Send + Sync {
    /// Name of the event type carried by the channel
    fn event_type(&self) -> &'static str;

    /// Deliver every buffered deferred event
    fn flush_deferred(&self) -> Result<usize>;

    /// Wait for every outstanding async delivery
    fn flush_async(&self) -> Result<usize>;

    /// Drain async work and stop the channel's worker pool
    fn shutdown(&self) -> Result<()>;

    /// Point-in-time statistics
    fn stats(&self) -> ChannelStats;
}

/// What a channel does when a bounded buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Fail the publish with [`Error::Overflow`]
    #[default]
    Reject,
    /// Flush the full buffer first, then buffer the new event
    FlushWhenFull,
}

/// Configuration for channels
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Capacity of the deferred event buffer
    pub deferred_capacity: usize,

    /// Maximum number of async deliveries awaiting `flush_async`
    pub async_capacity: usize,

    /// Worker threads per channel. More than one loses execution ordering.
    pub async_workers: usize,

    /// Behaviour when either buffer is full
    pub overflow: OverflowPolicy,

    /// Thread name prefix for the channel's workers
    pub worker_name_prefix: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            deferred_capacity: DEFAULT_CAPACITY,
            async_capacity: DEFAULT_CAPACITY,
            async_workers: 1,
            overflow: OverflowPolicy::Reject,
            worker_name_prefix: "bus-async".to_string(),
        }
    }
}

impl ChannelConfig {
    /// Create a new channel configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the deferred buffer capacity
    pub fn deferred_capacity(mut self, capacity: usize) -> Self {
        self.deferred_capacity = capacity;
        self
    }

    /// Set the pending async capacity
    pub fn async_capacity(mut self, capacity: usize) -> Self {
        self.async_capacity = capacity;
        self
    }

    /// Set the number of async workers per channel
    pub fn async_workers(mut self, workers: usize) -> Self {
        self.async_workers = workers;
        self
    }

    /// Set the overflow policy
    pub fn overflow(mut self, policy: OverflowPolicy) -> Self {
        self.overflow = policy;
        self
    }

    /// Set the worker thread name prefix
    pub fn worker_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.worker_name_prefix = prefix.into();
        self
    }

    /// Check every capacity and worker count
    pub fn validate(&self) -> Result<()> {
        if self.deferred_capacity == 0 {
            return Err(Error::config("deferred_capacity must be at least 1"));
        }
        if self.async_capacity == 0 {
            return Err(Error::config("async_capacity must be at least 1"));
        }
        self.worker_config().validate()
    }

    pub(crate) fn worker_config(&self) -> WorkerConfig {
        WorkerConfig::new()
            .num_workers(self.async_workers)
            .name_prefix(self.worker_name_prefix.clone())
    }
}

/// Statistics for one channel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Event type name
    pub event_type: &'static str,

    /// Current number of subscriptions
    pub subscribers: usize,

    /// Events waiting for a deferred flush
    pub pending_deferred: usize,

    /// Async deliveries waiting for an async flush
    pub pending_async: usize,

    /// Events published with the immediate policy
    pub published_immediate: u64,

    /// Events accepted into the deferred buffer
    pub published_deferred: u64,

    /// Events submitted for async delivery
    pub published_async: u64,

    /// Successful handler invocations across all policies
    pub deliveries: u64,
}

impl ChannelStats {
    /// Total events accepted under any policy
    pub fn published(&self) -> u64 {
        self.published_immediate + self.published_deferred + self.published_async
    }
}

impl fmt::Display for ChannelStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} subscribers, {} published, {} deliveries, {} deferred pending, {} async pending",
            self.event_type,
            self.subscribers,
            self.published(),
            self.deliveries,
            self.pending_deferred,
            self.pending_async
        )
    }
}
