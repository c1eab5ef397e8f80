//! Identity types used throughout the engine.
//!
//! Every raw target and every effect gets a small `Copy` identifier so that
//! the dependency registries can be keyed without borrowing the value
//! itself. Raw identity is the pointer of the `Rc<RefCell<T>>` anchor, which
//! is stable for the lifetime of the allocation and free to recompute.

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a raw target, derived from the address of its `Rc` anchor.
///
/// Two `Raw<T>` handles produced by cloning the same `Rc` report the same
/// `RawId`; a `Raw<T>` produced by a fresh allocation never collides with a
/// still-alive earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawId(pub(crate) usize);

impl RawId {
    pub(crate) fn of<T>(rc: &Rc<std::cell::RefCell<T>>) -> Self {
        Self(Rc::as_ptr(rc) as *const () as usize)
    }
}

/// Unique identifier for an effect (and, by convention, for the
/// `ReactiveEffect` that backs a computed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}
