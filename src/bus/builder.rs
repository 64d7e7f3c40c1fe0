//! Builder pattern for constructing Bus instances.

use crate::bus::config::BusConfig;
use crate::{Bus, Result};
use tracing::info;

/// Builder for creating [`Bus`] instances
#[derive(Debug, Clone, Default)]
pub struct BusBuilder {
    config: BusConfig,
}

impl BusBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom configuration
    pub fn config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    /// Configure the bus
    pub fn configure<F>(mut self, f: F) -> Self
    where
        F: FnOnce(BusConfig) -> BusConfig,
    {
        self.config = f(self.config);
        self
    }

    /// Build with high-throughput configuration
    pub fn high_throughput(self) -> Self {
        self.config(BusConfig::high_throughput())
    }

    /// Build the bus.
    ///
    /// Channels are created lazily, so an invalid channel configuration is
    /// reported here rather than on first publish.
    pub fn build(self) -> Result<Bus> {
        self.config.validate()?;
        info!(
            deferred_capacity = self.config.channel.deferred_capacity,
            async_workers = self.config.channel.async_workers,
            "Building Bus"
        );
        Ok(Bus::from_config(self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_builder_default() {
        let bus = BusBuilder::new().build().unwrap();
        assert!(!bus.is_shut_down());
        assert_eq!(bus.config().channel.deferred_capacity, 1024);
    }

    #[test]
    fn test_builder_configurations() {
        let bus = BusBuilder::new().high_throughput().build().unwrap();
        assert_eq!(bus.config().channel.deferred_capacity, 16_384);

        let bus = BusBuilder::new()
            .configure(|c| c.flush_on_shutdown(false))
            .build()
            .unwrap();
        assert!(!bus.config().flush_on_shutdown);
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = BusBuilder::new()
            .configure(|c| c.channel_config(|ch| ch.deferred_capacity(0)))
            .build();
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }
}
