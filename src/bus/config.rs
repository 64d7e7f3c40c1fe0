//! Configuration for the event bus.

use crate::dispatcher::{ChannelConfig, OverflowPolicy};
use crate::Result;

/// Configuration for the event bus
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Configuration applied to every channel the bus creates
    pub channel: ChannelConfig,

    /// Deliver buffered deferred events during shutdown
    pub flush_on_shutdown: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::default(),
            flush_on_shutdown: true,
        }
    }
}

impl BusConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver or discard buffered deferred events on shutdown
    pub fn flush_on_shutdown(mut self, flush: bool) -> Self {
        self.flush_on_shutdown = flush;
        self
    }

    /// Configure channels
    pub fn channel_config<F>(mut self, f: F) -> Self
    where
        F: FnOnce(ChannelConfig) -> ChannelConfig,
    {
        self.channel = f(self.channel);
        self
    }

    /// Check the channel configuration
    pub fn validate(&self) -> Result<()> {
        self.channel.validate()
    }
}

/// Preset configurations for common use cases
impl BusConfig {
    /// Configuration for high-throughput scenarios
    pub fn high_throughput() -> Self {
        Self::default().channel_config(|c| {
            c.deferred_capacity(16_384)
                .async_capacity(16_384)
                .overflow(OverflowPolicy::FlushWhenFull)
        })
    }

    /// Configuration for testing
    pub fn test() -> Self {
        Self::default().channel_config(|c| {
            c.deferred_capacity(64)
                .async_capacity(64)
                .worker_name_prefix("test-bus")
        })
    }
}
