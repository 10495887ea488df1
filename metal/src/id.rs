//! Typed identifiers.

use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::marker::PhantomData;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::component::Component;
use crate::net::Net;

/// A numeric identifier for items of type `T`.
///
/// Zero is never allocated.
pub struct Id<T>(u64, PhantomData<fn() -> T>);

/// The ID of a component in a design.
pub type ComponentId = Id<Component>;

/// The ID of a net in a design.
///
/// Net 0 marks an unconnected pin.
pub type NetId = Id<Net>;

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq(&other.0)
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl<T> Debug for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Id({})", self.0)
    }
}

impl<T> Display for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<T> Default for Id<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Id<T> {
    /// The zero ID, which never names an allocated item.
    pub const fn new() -> Self {
        Self(0, PhantomData)
    }

    /// Creates an ID from a raw value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw, PhantomData)
    }

    /// The raw numeric value.
    #[inline]
    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// Returns `true` for the zero ID.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Allocates the next ID, storing it in `self` as the latest allocation.
    pub(crate) fn alloc(&mut self) -> Self {
        *self = Self(self.0 + 1, PhantomData);
        *self
    }
}

impl NetId {
    /// The net ID of an unconnected pin.
    pub const UNCONNECTED: NetId = NetId::new();
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u64::deserialize(deserializer).map(Self::from_raw)
    }
}
