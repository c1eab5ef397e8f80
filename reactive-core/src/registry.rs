//! Raw↔Observed registry: per-shape weak maps from raw identity to the
//! live data behind it, plus the two opt-out sets.
//!
//! Grounded in `lattice_core::reactive::runtime::Runtime`'s
//! `REGISTRY: OnceLock<RwLock<HashMap<SubscriberId, Weak<dyn Reactive>>>>` —
//! same shape (identity key, weak value, register/resolve/unregister), but
//! generalized from one global singleton into a reusable struct so each
//! observable shape (`Dict`, `List`, `MapC`, `SetC`) gets its own instance
//! instead of one registry trying to hold four unrelated concrete types
//! behind `dyn Reactive`. And because the values held here are
//! `Rc<RefCell<T>>`-backed, each shape's instance lives in `thread_local!`
//! storage rather than behind `OnceLock`, for the reason given in §5 of
//! SPEC_FULL.md: a `static` must be `Sync`, and `Rc`/`Weak` never are.
//!
//! The two opt-out sets (`mark_readonly`/`mark_non_reactive`) hold nothing
//! but `RawId`s, so they need no thread affinity and stay true global
//! statics, same as the teacher's counters.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::OnceLock;

use dashmap::DashSet;
use indexmap::IndexMap;

use crate::ids::RawId;

/// The anchor for a raw, application-owned container value: an `Rc<RefCell<T>>`
/// whose pointer value is the identity used throughout the registries (§3).
/// Every observable shape wraps one of these.
pub struct Raw<T> {
    inner: Rc<RefCell<T>>,
}

impl<T> Raw<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(value)),
        }
    }

    pub fn id(&self) -> RawId {
        RawId::of(&self.inner)
    }

    pub fn borrow(&self) -> std::cell::Ref<'_, T> {
        self.inner.borrow()
    }

    pub fn borrow_mut(&self) -> std::cell::RefMut<'_, T> {
        self.inner.borrow_mut()
    }

    pub(crate) fn rc(&self) -> &Rc<RefCell<T>> {
        &self.inner
    }

    pub(crate) fn from_rc(inner: Rc<RefCell<T>>) -> Self {
        Self { inner }
    }
}

impl<T> Clone for Raw<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Raw<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Raw").field("id", &self.id()).finish()
    }
}

/// A weak-identity cache of live `Raw<T>` data, indexed by pointer identity.
/// One instance per observable shape, held in that shape module's own
/// `thread_local!`.
pub(crate) struct ShapeRegistry<T> {
    entries: RefCell<IndexMap<RawId, Weak<RefCell<T>>>>,
}

impl<T> ShapeRegistry<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: RefCell::new(IndexMap::new()),
        }
    }

    /// Register `raw`, replacing any stale (dropped) entry under the same
    /// id. Called whenever a shape wrapper is constructed over a `Raw<T>`,
    /// so later recursive-wrap-on-read (§4.2) can resolve the identity back
    /// into live data.
    pub(crate) fn register(&self, raw: &Raw<T>) {
        self.entries
            .borrow_mut()
            .insert(raw.id(), Rc::downgrade(raw.rc()));
    }

    /// Resolve `id` back into live data, if it hasn't been reclaimed.
    pub(crate) fn resolve(&self, id: RawId) -> Option<Raw<T>> {
        self.entries
            .borrow()
            .get(&id)
            .and_then(Weak::upgrade)
            .map(Raw::from_rc)
    }

    /// Evict the entry for `id` outright. Used by `dispose`.
    pub(crate) fn evict(&self, id: RawId) {
        self.entries.borrow_mut().shift_remove(&id);
    }

    /// Drop every entry whose `Rc` has already been reclaimed. Not required
    /// for correctness (`resolve` already treats a dead entry as absent) but
    /// keeps long-lived registries from accumulating dead weak pointers.
    pub(crate) fn sweep(&self) {
        self.entries.borrow_mut().retain(|_, w| w.strong_count() > 0);
    }
}

static EXPLICITLY_READONLY: OnceLock<DashSet<RawId>> = OnceLock::new();
static EXPLICITLY_NONREACTIVE: OnceLock<DashSet<RawId>> = OnceLock::new();

fn explicitly_readonly() -> &'static DashSet<RawId> {
    EXPLICITLY_READONLY.get_or_init(DashSet::new)
}

fn explicitly_non_reactive() -> &'static DashSet<RawId> {
    EXPLICITLY_NONREACTIVE.get_or_init(DashSet::new)
}

pub(crate) fn mark_readonly(id: RawId) {
    explicitly_readonly().insert(id);
}

pub(crate) fn mark_non_reactive(id: RawId) {
    explicitly_non_reactive().insert(id);
}

pub(crate) fn is_marked_readonly(id: RawId) -> bool {
    explicitly_readonly().contains(&id)
}

pub(crate) fn is_marked_non_reactive(id: RawId) -> bool {
    explicitly_non_reactive().contains(&id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_returns_none_once_strong_handle_is_dropped() {
        let reg = ShapeRegistry::<i32>::new();
        let id;
        {
            let raw = Raw::new(5);
            id = raw.id();
            reg.register(&raw);
            assert!(reg.resolve(id).is_some());
        }
        assert!(reg.resolve(id).is_none());
    }

    #[test]
    fn evict_removes_entry_immediately() {
        let reg = ShapeRegistry::<i32>::new();
        let raw = Raw::new(1);
        reg.register(&raw);
        reg.evict(raw.id());
        assert!(reg.resolve(raw.id()).is_none());
    }

    #[test]
    fn opt_out_marks_round_trip() {
        let id = RawId(99);
        assert!(!is_marked_readonly(id));
        mark_readonly(id);
        assert!(is_marked_readonly(id));

        assert!(!is_marked_non_reactive(id));
        mark_non_reactive(id);
        assert!(is_marked_non_reactive(id));
    }
}
