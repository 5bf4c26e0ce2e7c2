//! A one-way, serializable snapshot of the engine's internal state.
//!
//! Exists for debugging and test fixtures, not persistence: there is no
//! corresponding "load a snapshot back into the engine" operation, since the
//! engine's state is derived entirely from the dependency edges its callers
//! have reported, and replaying a snapshot would require resurrecting
//! addresses that may no longer correspond to anything.

use crate::Address;

pub use crate::registry::snapshot;

/// A full capture of the registry at the moment [`snapshot`] was called.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Snapshot {
    /// Every currently registered address, in arbitrary order.
    pub objects: Vec<ObjectSnapshot>,
}

/// One registered address and its outgoing dependencies.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ObjectSnapshot {
    /// The address this record describes.
    pub address: Address,
    /// Whether the address is currently valid.
    pub valid: bool,
    /// Every dependency this address has on another registered address.
    pub outgoing: Vec<EdgeSnapshot>,
}

/// One outgoing dependency edge.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EdgeSnapshot {
    /// The address depended upon.
    pub target: Address,
    /// `true` for a content dependency, `false` for an existence dependency.
    pub content: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_registered_edges() {
        crate::__reset_for_tests();
        let a = Address::from_raw(1);
        let b = Address::from_raw(2);
        crate::add_content_dependency(a, b);

        let snap = snapshot().expect("registry must be available in a test thread");
        let a_record = snap.objects.iter().find(|o| o.address == a).unwrap();
        assert!(a_record.valid);
        assert_eq!(a_record.outgoing.len(), 1);
        assert_eq!(a_record.outgoing[0].target, b);
        assert!(a_record.outgoing[0].content);
    }
}
