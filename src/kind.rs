//! The existence/content dependency lattice.

/// The strength of a dependency edge.
///
/// Ordered so that `Existence < Content`: content subsumes existence (see
/// [`crate::add_content_dependency`]). Upgrading an edge from existence to
/// content is permitted; downgrading is not and is never attempted by the
/// engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Kind {
    /// The source becomes invalid when the target is destroyed.
    Existence,
    /// The source becomes invalid when the target is destroyed *or modified*.
    Content,
}
