//! # typed-bus
//!
//! A type-safe, in-process publish/subscribe event bus.
//!
//! ## Features
//!
//! - **Type-safe** channels: one per event type, resolved by the type itself
//! - **Three delivery policies**: immediate, deferred until flushed, or on a
//!   worker pool
//! - **Re-entrant** handlers that may subscribe, unsubscribe and publish
//! - **Bounded** buffers with explicit overflow behaviour
//! - **Thread-safe** by default, with no async runtime required
//!
//! ## Quick Example
//!
//! ```rust
//! use typed_bus::{Bus, DeliveryPolicy, Event};
//!
//! #[derive(Debug, Clone)]
//! struct UserRegistered {
//!     user_id: u64,
//!     email: String,
//! }
//!
//! impl Event for UserRegistered {}
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bus = Bus::new();
//!
//!     // Subscribe to events
//!     let id = bus.subscribe_fn(|event: &UserRegistered| {
//!         println!("New user registered: {}", event.email);
//!     })?;
//!
//!     // Deliver now, on this thread
//!     bus.publish(
//!         UserRegistered { user_id: 123, email: "user@example.com".to_string() },
//!         DeliveryPolicy::Immediate,
//!     )?;
//!
//!     // Deliver on the channel's worker and wait for it
//!     bus.publish(
//!         UserRegistered { user_id: 124, email: "other@example.com".to_string() },
//!         DeliveryPolicy::Async,
//!     )?;
//!     bus.flush_async()?;
//!
//!     // Unsubscribe when done
//!     bus.unsubscribe::<UserRegistered>(id)?;
//!     bus.shutdown()?;
//!
//!     Ok(())
//! }
//! ```

#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    unreachable_pub
)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Bounded FIFO storage
pub mod buffer;

/// Core event system traits and types
pub mod event;

/// Error types and result aliases
pub mod error;

/// Per-type singletons and the channel directory
pub mod registry;

/// Subscription management for event handlers
pub mod subscription;

/// Channels and the worker pool
pub mod dispatcher;

/// The main event bus implementation
pub mod bus;

// Re-export commonly used types
pub use bus::global::{flush_async, flush_deferred, publish, subscribe, subscribe_fn, unsubscribe};
pub use bus::{global, Bus, BusBuilder, BusConfig, BusStats};
pub use dispatcher::{Channel, ChannelConfig, CompletionHandle, OverflowPolicy, WorkerPool};
pub use error::{Error, Result};
pub use event::{DeliveryPolicy, Event};
pub use subscription::{EventHandler, SubscriptionHandle, SubscriptionId};

/// Prelude module for convenient imports
///
/// # Example
/// ```rust
/// use typed_bus::prelude::*;
/// ```
pub mod prelude {
    pub use crate::bus::{Bus, BusBuilder, BusConfig};
    pub use crate::error::{Error, Result};
    pub use crate::event::{DeliveryPolicy, Event};
    pub use crate::subscription::{EventHandler, FunctionHandler, SubscriptionHandle, SubscriptionId};
}
