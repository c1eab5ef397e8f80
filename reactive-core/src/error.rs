//! Errors for the handful of call sites that can meaningfully fail.
//!
//! Most engine misuse is handled per §7 of SPEC_FULL.md by returning a
//! type-appropriate success-looking value plus a `tracing::warn!`, not a
//! `Result`. `ReactiveError` exists for the remaining cases where that
//! convention doesn't fit a sensible return type.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReactiveError {
    /// `computed_with` created a read-only computed but `.set()` was called.
    #[error("computed has no setter configured")]
    ComputedHasNoSetter,
}
