//! `Ref`: a single-slot reactive cell (§4.6), plus `to_refs` projection.
//!
//! Grounded in `lattice_core::reactive::signal::Signal<T>` narrowed from "a
//! typed slot with a subscriber set" down to "a slot with exactly one
//! tracked key" (`Key::RefSlot`) — the smallest possible observable shape,
//! which is exactly what a ref is relative to `Dict`/`List`/`MapC`/`SetC`.

use crate::dep::Key;
use crate::dynvalue::DynValue;
use crate::effect::{diag_extra, track, trigger};
use crate::ids::RawId;
use crate::object::Dict;
use crate::ops::Op;
use crate::registry::{Raw, ShapeRegistry};
use crate::value::{resolve_reactive, Value};

struct RefData {
    value: DynValue,
}

thread_local! {
    static REGISTRY: ShapeRegistry<RefData> = ShapeRegistry::new();
}

#[derive(Clone)]
pub struct Ref(Raw<RefData>);

impl Ref {
    /// Wrap `value` in a ref cell. Compound values are stored as-is — they
    /// already went through `reactive()`/`readonly()` to become a
    /// `DynValue::Compound` in the first place, so there's nothing further
    /// to convert; only scalars can arrive unwrapped, and those are simply
    /// stored (§4.6).
    pub fn new(value: DynValue) -> Self {
        let raw = Raw::new(RefData { value });
        REGISTRY.with(|r| r.register(&raw));
        Ref(raw)
    }

    pub fn id(&self) -> RawId {
        self.0.id()
    }

    pub fn get(&self) -> Value {
        track(self.0.id(), Op::Get, Key::RefSlot);
        resolve_reactive(self.0.borrow().value.clone())
    }

    pub fn set(&self, value: DynValue) {
        let raw_id = self.0.id();
        let existing = self.0.borrow().value.clone();
        if existing == value {
            return;
        }
        self.0.borrow_mut().value = value.clone();
        trigger(
            raw_id,
            Op::Set,
            &[Key::RefSlot],
            diag_extra(Some(existing), Some(value)),
        );
    }

    pub fn as_dynvalue(&self) -> DynValue {
        DynValue::Ref(self.0.id())
    }
}

pub fn is_ref(value: &DynValue) -> bool {
    value.is_ref()
}

pub(crate) fn get_by_id(id: RawId) -> Value {
    track(id, Op::Get, Key::RefSlot);
    REGISTRY
        .with(|r| r.resolve(id))
        .map(|raw| resolve_reactive(raw.borrow().value.clone()))
        .unwrap_or(Value::Null)
}

pub(crate) fn set_by_id(id: RawId, value: DynValue) {
    if let Some(raw) = REGISTRY.with(|r| r.resolve(id)) {
        Ref(raw).set(value);
    }
}

pub(crate) fn dispose(id: RawId) {
    REGISTRY.with(|r| r.evict(id));
    crate::dep::clear_target(id);
}

/// A ref-shaped wrapper reading/writing through one key of a `Dict`,
/// without establishing any tracking dependency of its own — the
/// underlying `Dict::get`/`set` already tracks and triggers (§4.6).
#[derive(Clone)]
pub struct ProxyRef {
    dict: Dict,
    key: std::rc::Rc<str>,
}

impl ProxyRef {
    pub fn get(&self) -> Value {
        self.dict.get(&self.key)
    }

    pub fn set(&self, value: DynValue) {
        self.dict.set(&self.key, value);
    }
}

/// Return a sibling mapping of `dict` whose entries are `ProxyRef`s, one
/// per current key.
pub fn to_refs(dict: &Dict) -> Vec<(std::rc::Rc<str>, ProxyRef)> {
    dict.keys()
        .into_iter()
        .map(|key| {
            let proxy = ProxyRef {
                dict: dict.clone(),
                key: key.clone(),
            };
            (key, proxy)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::Effect;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn get_tracks_and_set_triggers() {
        let r = Ref::new(DynValue::Int(0));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen2 = seen.clone();
        let r2 = r.clone();
        let _e = Effect::new(move || {
            if let Value::Int(n) = r2.get() {
                seen2.borrow_mut().push(n);
            }
        });
        assert_eq!(&*seen.borrow(), &[0]);
        r.set(DynValue::Int(5));
        assert_eq!(&*seen.borrow(), &[0, 5]);
    }

    #[test]
    fn unchanged_set_does_not_retrigger() {
        let r = Ref::new(DynValue::Int(1));
        let runs = Rc::new(RefCell::new(0));
        let runs2 = runs.clone();
        let r2 = r.clone();
        let _e = Effect::new(move || {
            let _ = r2.get();
            *runs2.borrow_mut() += 1;
        });
        r.set(DynValue::Int(1));
        assert_eq!(*runs.borrow(), 1);
    }

    #[test]
    fn to_refs_reads_and_writes_through_dict() {
        let dict = Dict::new();
        dict.set("a", DynValue::Int(1));
        let refs = to_refs(&dict);
        let (_, a_ref) = refs.into_iter().find(|(k, _)| &**k == "a").unwrap();
        assert!(matches!(a_ref.get(), Value::Int(1)));
        a_ref.set(DynValue::Int(2));
        assert!(matches!(dict.get("a"), Value::Int(2)));
    }
}
