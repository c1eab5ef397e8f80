//! `Dict`: the "plain object" observable shape — named fields, base
//! interceptors (§4.2).
//!
//! Grounded in `lattice_core::reactive::signal::Signal::get`/`set` (track on
//! read, compare-then-trigger on write) generalized from one typed slot to a
//! name-keyed table, and in `Runtime`'s register/resolve pattern (see
//! [`crate::registry`]) for the weak identity cache backing recursive
//! wrapping on read.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::dep::Key;
use crate::dynvalue::{DynValue, Shape};
use crate::effect::{diag_extra, track, trigger};
use crate::ids::RawId;
use crate::ops::Op;
use crate::readonly_lock;
use crate::registry::{Raw, ShapeRegistry};
use crate::value::{resolve_reactive, resolve_readonly, Value};

#[derive(Debug, Default)]
pub struct DictData {
    fields: IndexMap<Rc<str>, DynValue>,
}

impl DictData {
    pub fn new() -> Self {
        Self::default()
    }
}

thread_local! {
    static REGISTRY: ShapeRegistry<DictData> = ShapeRegistry::new();
}

/// A mutable reactive view over a `DictData`.
#[derive(Clone)]
pub struct Dict(Raw<DictData>);

/// A readonly view over the same `DictData`, gated by the process-wide
/// readonly lock (§4.3).
#[derive(Clone)]
pub struct ReadonlyDict(Raw<DictData>);

impl Dict {
    pub fn new() -> Self {
        Dict::wrap(Raw::new(DictData::new()))
    }

    pub fn wrap(raw: Raw<DictData>) -> Self {
        REGISTRY.with(|r| r.register(&raw));
        Dict(raw)
    }

    pub fn id(&self) -> RawId {
        self.0.id()
    }

    pub fn to_raw(&self) -> Raw<DictData> {
        self.0.clone()
    }

    pub fn readonly(&self) -> ReadonlyDict {
        ReadonlyDict::wrap(self.0.clone())
    }

    pub fn get(&self, key: &str) -> Value {
        track(self.0.id(), Op::Get, Key::Prop(Rc::from(key)));
        let stored = self.0.borrow().fields.get(key).cloned();
        match stored {
            Some(DynValue::Ref(id)) => crate::ref_cell::get_by_id(id),
            Some(other) => resolve_reactive(other),
            None => Value::Null,
        }
    }

    pub fn has(&self, key: &str) -> bool {
        track(self.0.id(), Op::Has, Key::Prop(Rc::from(key)));
        self.0.borrow().fields.contains_key(key)
    }

    pub fn keys(&self) -> Vec<Rc<str>> {
        track(self.0.id(), Op::Iterate, Key::Iterate);
        self.0.borrow().fields.keys().cloned().collect()
    }

    /// Write `key = value`. If the existing slot holds a `Ref`, the write
    /// forwards into the ref's slot instead of replacing it (§4.2, "Ref
    /// forward on write").
    pub fn set(&self, key: &str, value: DynValue) {
        let raw_id = self.0.id();
        let existing = self.0.borrow().fields.get(key).cloned();

        if let Some(DynValue::Ref(ref_id)) = existing {
            if !matches!(value, DynValue::Ref(_)) {
                crate::ref_cell::set_by_id(ref_id, value);
                return;
            }
        }

        let key_rc: Rc<str> = Rc::from(key);
        let is_new = existing.is_none();
        let changed = existing.as_ref() != Some(&value);

        if !is_new && !changed {
            return;
        }

        {
            let mut data = self.0.borrow_mut();
            data.fields.insert(key_rc.clone(), value.clone());
        }

        if is_new {
            trigger(
                raw_id,
                Op::Add,
                &[Key::Prop(key_rc), Key::Iterate],
                diag_extra(None, Some(value)),
            );
        } else {
            trigger(
                raw_id,
                Op::Set,
                &[Key::Prop(key_rc)],
                diag_extra(existing, Some(value)),
            );
        }
    }

    pub fn delete(&self, key: &str) -> bool {
        let raw_id = self.0.id();
        let key_rc: Rc<str> = Rc::from(key);
        let removed = self.0.borrow_mut().fields.shift_remove(key);
        match removed {
            Some(old) => {
                trigger(
                    raw_id,
                    Op::Delete,
                    &[Key::Prop(key_rc), Key::Iterate],
                    diag_extra(Some(old), None),
                );
                true
            }
            None => false,
        }
    }

    pub(crate) fn as_dynvalue(&self) -> DynValue {
        DynValue::Compound(self.0.id(), Shape::Dict)
    }
}

impl Default for Dict {
    fn default() -> Self {
        Dict::new()
    }
}

impl ReadonlyDict {
    pub fn wrap(raw: Raw<DictData>) -> Self {
        REGISTRY.with(|r| r.register(&raw));
        ReadonlyDict(raw)
    }

    pub fn id(&self) -> RawId {
        self.0.id()
    }

    pub fn to_raw(&self) -> Raw<DictData> {
        self.0.clone()
    }

    pub fn get(&self, key: &str) -> Value {
        track(self.0.id(), Op::Get, Key::Prop(Rc::from(key)));
        let stored = self.0.borrow().fields.get(key).cloned();
        match stored {
            Some(DynValue::Ref(id)) => crate::ref_cell::get_by_id(id),
            Some(other) => resolve_readonly(other),
            None => Value::Null,
        }
    }

    pub fn has(&self, key: &str) -> bool {
        track(self.0.id(), Op::Has, Key::Prop(Rc::from(key)));
        self.0.borrow().fields.contains_key(key)
    }

    pub fn keys(&self) -> Vec<Rc<str>> {
        track(self.0.id(), Op::Iterate, Key::Iterate);
        self.0.borrow().fields.keys().cloned().collect()
    }

    /// Attempt to write through the readonly view. A no-op-plus-warning
    /// when the lock is engaged; otherwise forwarded to the mutable path.
    pub fn set(&self, key: &str, value: DynValue) {
        if readonly_lock::is_engaged() {
            tracing::warn!(key, "set on readonly target while lock is engaged, ignoring");
            return;
        }
        Dict(self.0.clone()).set(key, value);
    }

    pub fn delete(&self, key: &str) -> bool {
        if readonly_lock::is_engaged() {
            tracing::warn!(key, "delete on readonly target while lock is engaged, ignoring");
            return false;
        }
        Dict(self.0.clone()).delete(key)
    }
}

pub(crate) fn resolve_reactive(id: RawId) -> Option<Dict> {
    REGISTRY.with(|r| r.resolve(id)).map(Dict::wrap)
}

pub(crate) fn resolve_readonly(id: RawId) -> Option<ReadonlyDict> {
    REGISTRY.with(|r| r.resolve(id)).map(ReadonlyDict::wrap)
}

pub(crate) fn dispose(id: RawId) {
    REGISTRY.with(|r| r.evict(id));
    crate::dep::clear_target(id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::Effect;
    use std::cell::RefCell;
    use std::rc::Rc as StdRc;

    #[test]
    fn get_and_set_track_and_trigger() {
        let dict = Dict::new();
        dict.set("count", DynValue::Int(0));

        let seen = StdRc::new(RefCell::new(Vec::new()));
        let seen2 = seen.clone();
        let d = dict.clone();
        let _e = Effect::new(move || {
            if let Value::Int(n) = d.get("count") {
                seen2.borrow_mut().push(n);
            }
        });
        assert_eq!(&*seen.borrow(), &[0]);

        dict.set("count", DynValue::Int(1));
        assert_eq!(&*seen.borrow(), &[0, 1]);
    }

    #[test]
    fn stop_prevents_further_reruns() {
        let dict = Dict::new();
        dict.set("count", DynValue::Int(0));
        let seen = StdRc::new(RefCell::new(0));
        let seen2 = seen.clone();
        let d = dict.clone();
        let e = Effect::new(move || {
            let _ = d.get("count");
            *seen2.borrow_mut() += 1;
        });
        e.stop();
        dict.set("count", DynValue::Int(2));
        assert_eq!(*seen.borrow(), 1);
    }

    #[test]
    fn new_key_triggers_iterate_observers() {
        let dict = Dict::new();
        let seen = StdRc::new(RefCell::new(0));
        let seen2 = seen.clone();
        let d = dict.clone();
        let _e = Effect::new(move || {
            let _ = d.keys();
            *seen2.borrow_mut() += 1;
        });
        assert_eq!(*seen.borrow(), 1);
        dict.set("brand_new", DynValue::Bool(true));
        assert_eq!(*seen.borrow(), 2);
    }

    #[test]
    fn delete_missing_key_does_not_trigger() {
        let dict = Dict::new();
        assert!(!dict.delete("nope"));
    }

    #[test]
    fn readonly_write_is_noop_while_lock_engaged() {
        let dict = Dict::new();
        dict.set("x", DynValue::Int(1));
        let ro = dict.readonly();

        readonly_lock::engage();
        ro.set("x", DynValue::Int(2));
        assert!(matches!(dict.get("x"), Value::Int(1)));
        readonly_lock::disengage();

        ro.set("x", DynValue::Int(3));
        assert!(matches!(dict.get("x"), Value::Int(3)));
    }

    #[test]
    fn ref_write_forwards_into_slot() {
        let dict = Dict::new();
        let r = crate::ref_cell::Ref::new(DynValue::Int(1));
        dict.set("slot", r.as_dynvalue());

        dict.set("slot", DynValue::Int(9));
        assert!(matches!(r.get(), Value::Int(9)));
        // the outer key still holds the ref, not a plain int
        assert!(matches!(dict.get("slot"), Value::Int(9)));
    }
}
