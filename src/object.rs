//! Per-registered-address state.

use crate::dependency::DepId;

/// Bookkeeping the registry keeps for one registered [`crate::Address`].
///
/// Holds the validity flag plus the roots of the three intrusive structures
/// edges touching this address participate in: the outgoing splay tree, and
/// the two incoming lists (one per [`crate::kind::Kind`]).
#[derive(Debug, Clone, Copy)]
pub(crate) struct Object {
    pub(crate) valid: bool,
    pub(crate) outgoing: Option<DepId>,
    pub(crate) incoming_exist: Option<DepId>,
    pub(crate) incoming_content: Option<DepId>,
}

impl Object {
    /// A freshly registered object: valid, with no edges yet.
    pub(crate) fn new() -> Self {
        Self {
            valid: true,
            outgoing: None,
            incoming_exist: None,
            incoming_content: None,
        }
    }
}
