//! The intrusive edge record shared by the splay tree and the incoming lists.

use slotmap::new_key_type;

use crate::{kind::Kind, Address};

new_key_type! {
    /// Arena key for a single dependency edge.
    ///
    /// A `DepId` is simultaneously a node of its source's outgoing splay tree
    /// and of its target's incoming list for [`Kind`] -- the two structures
    /// share the same backing record rather than each owning a copy.
    pub(crate) struct DepId;
}

/// A directed dependency edge: `source` depends on `target` with strength
/// `kind`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Dependency {
    pub(crate) source: Address,
    pub(crate) target: Address,
    pub(crate) kind: Kind,

    /// Splay tree links, within `source`'s outgoing tree, keyed by `target`.
    pub(crate) parent: Option<DepId>,
    pub(crate) left: Option<DepId>,
    pub(crate) right: Option<DepId>,

    /// Doubly linked list links, within `target`'s incoming list for `kind`.
    pub(crate) prev: Option<DepId>,
    pub(crate) next: Option<DepId>,
}

impl Dependency {
    pub(crate) fn new(source: Address, target: Address, kind: Kind) -> Self {
        Self {
            source,
            target,
            kind,
            parent: None,
            left: None,
            right: None,
            prev: None,
            next: None,
        }
    }
}
