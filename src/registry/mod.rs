//! Per-type singletons and the directory of live channels.
//!
//! [`TypeRegistry`] maps a Rust type to exactly one shared instance of it,
//! created lazily on first use. The bus stores one `Channel<E>` per event
//! type there. [`ChannelDirectory`] keeps weak, type-erased references to
//! those channels so they can be flushed together.

use crate::{Error, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

mod directory;
pub use directory::{ChannelDirectory, ChannelId};

type Instance = Arc<dyn Any + Send + Sync>;

/// A thread-safe map from type to its single shared instance.
///
/// Concurrent first accesses for the same type construct the instance once;
/// every caller receives the same `Arc`.
#[derive(Default)]
pub struct TypeRegistry {
    entries: DashMap<TypeId, Instance>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The instance for `T`, if one was created
    pub fn get<T>(&self) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let instance = self.entries.get(&TypeId::of::<T>())?;
        Arc::clone(instance.value()).downcast::<T>().ok()
    }

    /// The instance for `T`, running `init` to create it on first access.
    ///
    /// `init` runs at most once per type while the entry is locked. It must
    /// not access this registry, or it deadlocks. A failed `init` leaves no
    /// entry behind, so the next call tries again.
    pub fn get_or_try_init<T, F>(&self, init: F) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Result<Arc<T>>,
    {
        let instance = match self.entries.entry(TypeId::of::<T>()) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                trace!(type_name = std::any::type_name::<T>(), "Creating singleton");
                let instance: Instance = init()?;
                Arc::clone(entry.insert(instance).value())
            }
        };

        instance.downcast::<T>().map_err(|_| {
            Error::internal(format!(
                "registry entry for {} holds another type",
                std::any::type_name::<T>()
            ))
        })
    }

    /// Infallible form of [`get_or_try_init`](Self::get_or_try_init)
    pub fn get_or_init<T, F>(&self, init: F) -> Arc<T>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        match self.get_or_try_init(|| Ok(Arc::new(init()))) {
            Ok(instance) => instance,
            Err(_) => unreachable!("entries are keyed by their own TypeId"),
        }
    }

    /// Whether an instance for `T` exists
    pub fn contains<T: Any>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    /// Number of instances
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry holds no instances
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("entries", &self.entries.len())
            .finish()
    }
}
