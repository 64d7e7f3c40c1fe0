//! Subscription management for event handlers.
//!
//! A subscription is identified by an opaque [`SubscriptionId`] token handed
//! out by the channel. Unsubscribing requires that token, so the same handler
//! object can be registered several times and each registration is removed
//! independently.

use std::fmt;
use uuid::Uuid;

pub mod handle;
pub mod handler;

pub use handle::SubscriptionHandle;
pub use handler::{EventHandler, FunctionHandler, IsolatedHandler};

/// Opaque token identifying one registration in one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

impl From<Uuid> for SubscriptionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}
