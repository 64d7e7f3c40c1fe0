//! Error types for the typed-bus library.

use crate::subscription::SubscriptionId;
use thiserror::Error;

/// Type alias for Results in this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for typed-bus
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A bounded buffer is already at capacity
    #[error("Buffer overflow: capacity of {capacity} reached")]
    Overflow { capacity: usize },

    /// Pop from an empty buffer
    #[error("Buffer underflow: buffer is empty")]
    Underflow,

    /// Unsubscribe of a subscription the channel does not know
    #[error("Handler not found: {id}")]
    HandlerNotFound { id: SubscriptionId },

    /// Configuration rejected at construction time
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Worker pool no longer accepts tasks
    #[error("Worker pool is shut down")]
    PoolShutDown,

    /// Event handler error
    #[error("Handler error: {0}")]
    HandlerError(String),

    /// A pooled task panicked
    #[error("Task panicked: {0}")]
    TaskPanicked(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// Create a new handler error
    pub fn handler(msg: impl Into<String>) -> Self {
        Error::HandlerError(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::InvalidConfiguration(msg.into())
    }

    /// Check if this error indicates the worker pool is shutting down
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Error::PoolShutDown)
    }

    /// Check if this is a buffer capacity error
    pub fn is_overflow(&self) -> bool {
        matches!(self, Error::Overflow { .. })
    }

    /// Check if this error was raised by a handler, either by returning an
    /// error or by panicking on a worker thread
    pub fn is_handler_failure(&self) -> bool {
        matches!(self, Error::HandlerError(_) | Error::TaskPanicked(_))
    }
}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
