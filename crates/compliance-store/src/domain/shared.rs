//! # Shared Data Registry
//!
//! Named values shared between components. Keys are typed: a
//! [`SharedKey<T>`] only ever reads or writes a `T`, and binding a name to
//! a second type is rejected.

use super::errors::StoreError;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Typed name of a shared value.
pub struct SharedKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SharedKey<T> {
    /// Key with the given name.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// Key name.
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for SharedKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SharedKey<T> {}

impl<T> fmt::Debug for SharedKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedKey<{}>({})", std::any::type_name::<T>(), self.name)
    }
}

struct Slot {
    type_id: TypeId,
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

/// Type-checked name/value registry.
#[derive(Default)]
pub struct SharedRegistry {
    slots: HashMap<&'static str, Slot>,
}

impl SharedRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` under `key`, replacing a previous value of the same type.
    pub fn set<T>(&mut self, key: &SharedKey<T>, value: T) -> Result<(), StoreError>
    where
        T: Send + Sync + 'static,
    {
        if let Some(existing) = self.slots.get(key.name) {
            if existing.type_id != TypeId::of::<T>() {
                return Err(StoreError::SharedDataTypeMismatch {
                    key: key.name.to_string(),
                    existing: existing.type_name,
                });
            }
        }
        self.slots.insert(
            key.name,
            Slot {
                type_id: TypeId::of::<T>(),
                type_name: std::any::type_name::<T>(),
                value: Arc::new(value),
            },
        );
        Ok(())
    }

    /// Value bound under `key`, if it holds a `T`.
    pub fn get<T>(&self, key: &SharedKey<T>) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.slots
            .get(key.name)
            .and_then(|slot| slot.value.downcast_ref::<T>())
            .cloned()
    }

    /// Unbind `key`, returning its value if it held a `T`.
    ///
    /// A name bound to another type is left in place.
    pub fn remove<T>(&mut self, key: &SharedKey<T>) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let matches = self
            .slots
            .get(key.name)
            .is_some_and(|slot| slot.type_id == TypeId::of::<T>());
        if !matches {
            return None;
        }
        let slot = self.slots.remove(key.name)?;
        slot.value.downcast_ref::<T>().cloned()
    }

    /// Whether `name` is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Bound names.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.slots.keys().copied()
    }

    /// Number of bound names.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Unbind everything.
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

impl fmt::Debug for SharedRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.slots.iter().map(|(k, s)| (k, s.type_name)))
            .finish()
    }
}
