//! Dependency registry: `target -> key -> Dep`, plus the reverse
//! `effect -> deps` bookkeeping lives on the effect itself (see
//! [`crate::effect`]).
//!
//! This is the Rust analogue of `lattice_core::reactive::runtime`'s global
//! registries, generalized from "one dep-set per signal" to "one dep-set per
//! (target, key) pair". `Dep` holds `Rc`s, so — unlike the lineage repo's
//! `Arc<RwLock<HashMap<..>>>` statics — this table cannot live behind a true
//! `static`: a `static` must be `Sync`, and anything reachable through `Rc`
//! never is. It lives in thread-local storage instead (see §5 of
//! SPEC_FULL.md), with `IndexMap`/`IndexSet` in place of `HashMap`/`HashSet`
//! so iteration order — and therefore effect re-run order — is
//! deterministic.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use crate::dynvalue::DynValue;
use crate::ids::{EffectId, RawId};

/// The key-space a dep-set is indexed by. Different observable shapes use
/// different sentinel members for "the whole shape was observed".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A named field of a plain object.
    Prop(Rc<str>),
    /// A numeric index into an ordered sequence.
    Index(usize),
    /// Shape sentinel for ordered sequences: `add`/`delete` trigger these.
    Length,
    /// Shape sentinel for every other container: iteration, key
    /// enumeration, or `size()` track this key.
    Iterate,
    /// An entry key inside a key-value or set-like container.
    Entry(DynValue),
    /// The single slot of a `Ref`.
    RefSlot,
}

/// A dep-set: the effects that have read a particular `(target, key)` pair.
///
/// Backed by an `IndexSet` (not `HashSet`) so re-run order within one
/// `trigger` call follows insertion order, as required by §5.
pub type Dep = Rc<RefCell<IndexSet<EffectId>>>;

fn new_dep() -> Dep {
    Rc::new(RefCell::new(IndexSet::new()))
}

type KeyMap = RefCell<IndexMap<Key, Dep>>;

thread_local! {
    static TARGET_MAP: RefCell<IndexMap<RawId, KeyMap>> = RefCell::new(IndexMap::new());
}

/// Fetch (allocating lazily) the dep-set for `(target, key)`.
pub(crate) fn dep_for(target: RawId, key: Key) -> Dep {
    TARGET_MAP.with(|map| {
        let mut map = map.borrow_mut();
        let keymap = map.entry(target).or_insert_with(|| RefCell::new(IndexMap::new()));
        let mut keymap = keymap.borrow_mut();
        keymap.entry(key).or_insert_with(new_dep).clone()
    })
}

/// Fetch the dep-set for `(target, key)` without allocating it.
pub(crate) fn existing_dep_for(target: RawId, key: &Key) -> Option<Dep> {
    TARGET_MAP.with(|map| {
        let map = map.borrow();
        let keymap = map.get(&target)?;
        let keymap = keymap.borrow();
        keymap.get(key).cloned()
    })
}

/// All dep-sets registered for `target`, used by `Op::Clear`.
pub(crate) fn all_deps_for(target: RawId) -> Vec<Dep> {
    TARGET_MAP.with(|map| {
        let map = map.borrow();
        match map.get(&target) {
            Some(keymap) => keymap.borrow().values().cloned().collect(),
            None => Vec::new(),
        }
    })
}

/// Drop every dep-set recorded for `target`. Used by `dispose`.
pub(crate) fn clear_target(target: RawId) {
    TARGET_MAP.with(|map| {
        map.borrow_mut().shift_remove(&target);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dep_for_is_memoized_per_key() {
        let id = RawId(1);
        let a = dep_for(id, Key::Prop(Rc::from("x")));
        let b = dep_for(id, Key::Prop(Rc::from("x")));
        assert!(Rc::ptr_eq(&a, &b));
        clear_target(id);
    }

    #[test]
    fn different_keys_get_different_deps() {
        let id = RawId(2);
        let a = dep_for(id, Key::Prop(Rc::from("x")));
        let b = dep_for(id, Key::Prop(Rc::from("y")));
        assert!(!Rc::ptr_eq(&a, &b));
        clear_target(id);
    }

    #[test]
    fn existing_dep_for_does_not_allocate() {
        let id = RawId(3);
        assert!(existing_dep_for(id, &Key::Iterate).is_none());
        let _ = dep_for(id, Key::Iterate);
        assert!(existing_dep_for(id, &Key::Iterate).is_some());
        clear_target(id);
    }
}
