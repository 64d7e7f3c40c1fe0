//! Event handler traits and implementations.

use crate::{Error, Event, Result};
use std::fmt;
use std::marker::PhantomData;

/// Trait for objects that receive events of type `E`.
///
/// Any `Fn(&E)` closure is a handler. Implement the trait directly for
/// stateful handler objects or handlers that can fail.
///
/// A handler returning `Err` on the immediate or deferred path stops that
/// delivery pass: subscribers after it do not see the event and the error
/// is returned to the publisher. Wrap the handler in [`IsolatedHandler`] to
/// keep one failure from affecting the others.
pub trait EventHandler<E: Event>: Send + Sync + 'static {
    /// Process one event
    fn handle(&self, event: &E) -> Result<()>;

    /// Get the handler name for debugging
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<E, F> EventHandler<E> for F
where
    E: Event,
    F: Fn(&E) + Send + Sync + 'static,
{
    fn handle(&self, event: &E) -> Result<()> {
        self(event);
        Ok(())
    }
}

/// A fallible closure handler with a custom name.
pub struct FunctionHandler<E, F>
where
    E: Event,
    F: Fn(&E) -> Result<()> + Send + Sync + 'static,
{
    function: F,
    name: String,
    _phantom: PhantomData<fn(&E)>,
}

impl<E, F> FunctionHandler<E, F>
where
    E: Event,
    F: Fn(&E) -> Result<()> + Send + Sync + 'static,
{
    /// Create a new function handler
    pub fn new(function: F) -> Self {
        Self::with_name(function, format!("FunctionHandler<{}>", E::event_type()))
    }

    /// Create a new function handler with a custom name
    pub fn with_name(function: F, name: impl Into<String>) -> Self {
        Self {
            function,
            name: name.into(),
            _phantom: PhantomData,
        }
    }
}

impl<E, F> EventHandler<E> for FunctionHandler<E, F>
where
    E: Event,
    F: Fn(&E) -> Result<()> + Send + Sync + 'static,
{
    fn handle(&self, event: &E) -> Result<()> {
        (self.function)(event)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<E, F> fmt::Debug for FunctionHandler<E, F>
where
    E: Event,
    F: Fn(&E) -> Result<()> + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionHandler")
            .field("name", &self.name)
            .finish()
    }
}

/// A handler that reports its inner handler's errors to a callback and
/// always succeeds, so later subscribers still receive the event.
pub struct IsolatedHandler<E, H>
where
    E: Event,
    H: EventHandler<E>,
{
    inner: H,
    on_error: Box<dyn Fn(&str, Error) + Send + Sync>,
    _phantom: PhantomData<fn(&E)>,
}

impl<E, H> IsolatedHandler<E, H>
where
    E: Event,
    H: EventHandler<E>,
{
    /// Wrap `inner`, sending its failures to `on_error` together with the
    /// handler name
    pub fn new<C>(inner: H, on_error: C) -> Self
    where
        C: Fn(&str, Error) + Send + Sync + 'static,
    {
        Self {
            inner,
            on_error: Box::new(on_error),
            _phantom: PhantomData,
        }
    }

    /// Wrap `inner`, logging its failures with `tracing`
    pub fn logged(inner: H) -> Self {
        Self::new(inner, |name, error| {
            tracing::error!(handler = name, error = %error, "Handler failed");
        })
    }
}

impl<E, H> EventHandler<E> for IsolatedHandler<E, H>
where
    E: Event,
    H: EventHandler<E>,
{
    fn handle(&self, event: &E) -> Result<()> {
        if let Err(e) = self.inner.handle(event) {
            (self.on_error)(self.inner.name(), e);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

impl<E, H> fmt::Debug for IsolatedHandler<E, H>
where
    E: Event,
    H: EventHandler<E>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IsolatedHandler")
            .field("inner", &self.inner.name())
            .finish()
    }
}
