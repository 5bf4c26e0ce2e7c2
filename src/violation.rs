//! Violation reporting: the replaceable hooks invoked when a temporal or
//! spatial memory-safety check fails.
//!
//! Default behavior for both hooks is to log a diagnostic and abort the
//! process -- the same "terminate on first violation" contract a debug
//! assertion would give you. Tests replace the hook with one that records
//! instead, so that the triggering operation's "continue execution as if the
//! handler weren't installed" behavior can be observed.

use std::cell::RefCell;

use thiserror::Error;

use crate::Address;

/// A diagnostic describing a detected memory-safety violation.
///
/// Never returned through a `Result` -- violations are reported to a handler,
/// not propagated as recoverable errors (see the crate's error handling
/// design). Exists so the default handlers, and any custom handler that wants
/// one, have a ready-made [`std::error::Error`] / [`std::fmt::Display`] to
/// build a report around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Violation {
    /// `validate` was called on an object whose validity flag is false.
    #[error("temporal memory-safety violation: {0:?} was validated after becoming invalid")]
    Temporal(Address),
    /// `assert_spatial` was called with a false condition.
    #[error("spatial memory-safety violation: bounds check failed")]
    Spatial,
}

type ViolationHandler = Box<dyn FnMut(Address)>;
type SpatialHandler = Box<dyn FnMut()>;

fn default_violation_handler(addr: Address) {
    let violation = Violation::Temporal(addr);
    tracing::error!(?addr, "{violation}");
    eprintln!("{violation}");
    std::process::abort();
}

fn default_spatial_handler() {
    tracing::error!("{}", Violation::Spatial);
    eprintln!("{}", Violation::Spatial);
    std::process::abort();
}

thread_local! {
    static VIOLATION_HANDLER: RefCell<ViolationHandler> =
        RefCell::new(Box::new(default_violation_handler));
    static SPATIAL_HANDLER: RefCell<SpatialHandler> =
        RefCell::new(Box::new(default_spatial_handler));
}

/// Install a new handler for temporal violations, invoked by [`crate::validate`]
/// whenever it finds the validated address invalid.
///
/// The handler receives the offending [`Address`]. If the handler returns
/// (rather than unwinding or terminating the process), the call to `validate`
/// simply returns too -- the check is not retried and no state changes.
pub fn set_violation_handler(handler: impl FnMut(Address) + 'static) {
    let _ = VIOLATION_HANDLER.try_with(|cell| {
        *cell.borrow_mut() = Box::new(handler);
    });
}

/// Restore the default violation handler (log a diagnostic, abort).
pub fn restore_default_violation_handler() {
    let _ = VIOLATION_HANDLER.try_with(|cell| {
        *cell.borrow_mut() = Box::new(default_violation_handler);
    });
}

pub(crate) fn invoke_violation_handler(addr: Address) {
    let _ = VIOLATION_HANDLER.try_with(|cell| {
        (cell.borrow_mut())(addr);
    });
}

/// Install a new handler for spatial violations, invoked by [`crate::assert_spatial`].
pub fn set_spatial_handler(handler: impl FnMut() + 'static) {
    let _ = SPATIAL_HANDLER.try_with(|cell| {
        *cell.borrow_mut() = Box::new(handler);
    });
}

/// Restore the default spatial-violation handler (log a diagnostic, abort).
pub fn restore_default_spatial_handler() {
    let _ = SPATIAL_HANDLER.try_with(|cell| {
        *cell.borrow_mut() = Box::new(default_spatial_handler);
    });
}

/// Assert a spatial (bounds) condition, invoking the spatial-violation handler
/// if it does not hold.
///
/// This is the entirety of the engine's spatial-safety surface: a thin
/// trigger for a caller-supplied bounds check, with no address of its own to
/// report (unlike [`crate::validate`], which always has one).
pub fn assert_spatial(condition: bool) {
    if !condition {
        let _ = SPATIAL_HANDLER.try_with(|cell| {
            (cell.borrow_mut())();
        });
    }
}

#[doc(hidden)]
pub fn __reset_handlers_for_tests() {
    restore_default_violation_handler();
    restore_default_spatial_handler();
}
