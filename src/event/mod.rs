//! Core event system traits and types.
//!
//! This module defines the `Event` trait that every published type
//! implements and the `DeliveryPolicy` that selects how a publish is
//! carried out.

use std::any::TypeId;
use std::fmt::{self, Debug};

/// Core trait that all events must implement.
///
/// Identity in the bus is the Rust type of the event, never its contents:
/// every distinct type gets its own channel and its own subscriber list.
/// Events are cloned into the deferred buffer and moved onto worker
/// threads, hence the `Clone + Send + Sync + 'static` bounds.
///
/// # Example
///
/// ```rust
/// use typed_bus::Event;
///
/// #[derive(Debug, Clone)]
/// struct UserRegistered {
///     user_id: u64,
///     email: String,
/// }
///
/// impl Event for UserRegistered {}
/// ```
pub trait Event: Send + Sync + Clone + Debug + 'static {
    /// Returns the type name of this event.
    ///
    /// Used for logging only. Defaults to the full Rust type path.
    fn event_type() -> &'static str
    where
        Self: Sized,
    {
        std::any::type_name::<Self>()
    }

    /// Get the TypeId for this event type.
    fn type_id() -> TypeId
    where
        Self: Sized,
    {
        TypeId::of::<Self>()
    }
}

/// How a published event reaches its subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeliveryPolicy {
    /// Delivered synchronously on the publishing thread before `publish`
    /// returns.
    #[default]
    Immediate,
    /// Buffered until the channel (or the whole bus) is flushed.
    Deferred,
    /// Delivered on the channel's worker pool; observed through
    /// `flush_async`.
    Async,
}

impl fmt::Display for DeliveryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeliveryPolicy::Immediate => "immediate",
            DeliveryPolicy::Deferred => "deferred",
            DeliveryPolicy::Async => "async",
        };
        f.write_str(name)
    }
}
