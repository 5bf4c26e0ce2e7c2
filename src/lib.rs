#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

mod address;
mod dependency;
mod kind;
mod list;
mod object;
mod registry;
mod splay;
mod violation;

#[cfg(feature = "petgraph")]
pub mod petgraph;
#[cfg(feature = "serde")]
pub mod snapshot;

pub use address::Address;
pub use registry::{
    add_content_dependency, add_dependency, mark_destroyed, mark_modified, propagate_content,
    propagate_invalid, reset, validate,
};
pub use violation::{
    assert_spatial, restore_default_spatial_handler, restore_default_violation_handler,
    set_spatial_handler, set_violation_handler, Violation,
};

/// Reset the engine to a pristine state for test isolation: an empty
/// registry and the default violation/spatial handlers.
///
/// `cargo test`'s default runner reuses OS threads across `#[test]`
/// functions, and the engine's state lives in a thread-local singleton, so
/// without this a test can observe whatever a previous test left behind on
/// the same thread. Call this first in every test that touches the engine.
#[doc(hidden)]
pub fn __reset_for_tests() {
    registry::__reset_for_tests();
}
