//! Opaque object identity used as keys into the dependency graph.

use std::fmt;

use derive_more::{From, Into};

/// An opaque, pointer-sized handle identifying a tracked object.
///
/// The engine never dereferences an [`Address`]; it is compared only for
/// bit-identity and ordered only by those bits. Callers derive it from the
/// pointer identity of whatever they are wrapping ([`Address::of`]), or from
/// any other value that stays unique and stable for the object's lifetime
/// ([`Address::from_raw`]).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, From, Into)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Address(usize);

impl Address {
    /// Build an address from the pointer identity of `value`.
    ///
    /// Two addresses built from the same underlying allocation compare equal
    /// for as long as that allocation does not move.
    pub fn of<T>(value: &T) -> Self {
        Self(value as *const T as usize)
    }

    /// Build an address from an already pointer-sized, caller-assigned handle.
    ///
    /// Use this when the tracked entity has no single fixed address of its
    /// own (for example, a handle into an arena), but the handle itself is
    /// unique and stable for the entity's lifetime.
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// The raw pointer-sized value backing this address.
    pub fn raw(self) -> usize {
        self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({:#x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_value_same_address() {
        let x = 42u32;
        assert_eq!(Address::of(&x), Address::of(&x));
    }

    #[test]
    fn different_values_different_addresses() {
        let x = 1u32;
        let y = 2u32;
        assert_ne!(Address::of(&x), Address::of(&y));
    }

    #[test]
    fn ordering_matches_raw_bits() {
        let a = Address::from_raw(10);
        let b = Address::from_raw(20);
        assert!(a < b);
        assert_eq!(a.raw(), 10);
    }
}
