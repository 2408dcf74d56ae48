//! Per-request state that travels with a request but never reaches the wire.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// String knobs set by callers for plugins (`cache.revalidate`,
/// `redirect.disable`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    values: BTreeMap<String, String>,
}

impl Params {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, key: &str) -> Option<&str> { self.values.get(key).map(String::as_str) }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> { self.values.remove(key) }

    pub fn contains(&self, key: &str) -> bool { self.values.contains_key(key) }

    /// Parses the value of `key`; unparsable values read as absent.
    pub fn parse<T: FromStr>(&self, key: &str) -> Option<T> { self.get(key).and_then(|v| v.trim().parse().ok()) }

    /// `true`, `1`, `yes` and `on` are set; anything else is not.
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| {
            matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "true" | "1" | "yes" | "on"
            )
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

trait Slot: Any + Send + Sync {
    fn clone_slot(&self) -> Box<dyn Slot>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any + Clone + Send + Sync> Slot for T {
    fn clone_slot(&self) -> Box<dyn Slot> { Box::new(self.clone()) }

    fn as_any(&self) -> &dyn Any { self }

    fn as_any_mut(&mut self) -> &mut dyn Any { self }

    fn into_any(self: Box<Self>) -> Box<dyn Any> { self }
}

/// Typed plugin state keyed by type, one value per type.
#[derive(Default)]
pub struct Extensions {
    slots: HashMap<TypeId, Box<dyn Slot>>,
}

impl Extensions {
    pub fn new() -> Self { Self::default() }

    pub fn insert<T: Any + Clone + Send + Sync>(&mut self, value: T) -> Option<T> {
        let previous = self.remove::<T>();
        self.slots.insert(TypeId::of::<T>(), Box::new(value));
        previous
    }

    pub fn get<T: Any>(&self) -> Option<&T> {
        self.slots
            .get(&TypeId::of::<T>())
            .and_then(|slot| (**slot).as_any().downcast_ref())
    }

    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.slots
            .get_mut(&TypeId::of::<T>())
            .and_then(|slot| (**slot).as_any_mut().downcast_mut())
    }

    /// Value of type `T`, inserting `T::default()` first when missing.
    pub fn get_or_default<T: Any + Clone + Default + Send + Sync>(&mut self) -> &mut T {
        if !self.contains::<T>() {
            self.slots.insert(TypeId::of::<T>(), Box::new(T::default()));
        }
        match self.get_mut::<T>() {
            Some(value) => value,
            None => unreachable!("slot inserted above"),
        }
    }

    pub fn remove<T: Any>(&mut self) -> Option<T> {
        let slot = self.slots.remove(&TypeId::of::<T>())?;
        slot.into_any().downcast().ok().map(|boxed| *boxed)
    }

    pub fn contains<T: Any>(&self) -> bool { self.slots.contains_key(&TypeId::of::<T>()) }

    pub fn len(&self) -> usize { self.slots.len() }

    pub fn is_empty(&self) -> bool { self.slots.is_empty() }

    pub fn clear(&mut self) { self.slots.clear(); }
}

impl Clone for Extensions {
    fn clone(&self) -> Self {
        Self {
            slots: self
                .slots
                .iter()
                .map(|(id, slot)| (*id, (**slot).clone_slot()))
                .collect(),
        }
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.slots.len())
            .finish()
    }
}
