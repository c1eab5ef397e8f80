//! `MapC`/`SetC`: the key-value and set-like observable shapes (§4.3).
//!
//! Unlike `Dict`/`List`, these don't intercept arbitrary member access —
//! there's no field syntax to hook in the first place, only method calls —
//! so the instrumented methods below simply ARE the public API (Design
//! Notes, §9: "Collection methods are not interceptable generically").
//! Grounded the same way as [`crate::object`]: `Signal::get`/`set`'s
//! track-then-read / compare-then-trigger shape, generalized to an entry
//! table instead of one slot.

use indexmap::{IndexMap, IndexSet};

use crate::dep::Key;
use crate::dynvalue::{DynValue, Shape};
use crate::effect::{diag_extra, track, trigger};
use crate::ids::RawId;
use crate::ops::Op;
use crate::readonly_lock;
use crate::registry::{Raw, ShapeRegistry};
use crate::value::{resolve_reactive, resolve_readonly, Value};

#[derive(Debug, Default)]
pub struct MapData {
    entries: IndexMap<DynValue, DynValue>,
}

#[derive(Debug, Default)]
pub struct SetData {
    entries: IndexSet<DynValue>,
}

thread_local! {
    static MAP_REGISTRY: ShapeRegistry<MapData> = ShapeRegistry::new();
    static SET_REGISTRY: ShapeRegistry<SetData> = ShapeRegistry::new();
}

#[derive(Clone)]
pub struct MapC(Raw<MapData>);

#[derive(Clone)]
pub struct ReadonlyMapC(Raw<MapData>);

#[derive(Clone)]
pub struct SetC(Raw<SetData>);

#[derive(Clone)]
pub struct ReadonlySetC(Raw<SetData>);

impl MapC {
    pub fn new() -> Self {
        MapC::wrap(Raw::new(MapData::default()))
    }

    pub fn wrap(raw: Raw<MapData>) -> Self {
        MAP_REGISTRY.with(|r| r.register(&raw));
        MapC(raw)
    }

    pub fn id(&self) -> RawId {
        self.0.id()
    }

    pub fn readonly(&self) -> ReadonlyMapC {
        ReadonlyMapC::wrap(self.0.clone())
    }

    pub fn get(&self, key: &DynValue) -> Value {
        track(self.0.id(), Op::Get, Key::Entry(key.clone()));
        let stored = self.0.borrow().entries.get(key).cloned();
        stored.map(resolve_reactive).unwrap_or(Value::Null)
    }

    pub fn has(&self, key: &DynValue) -> bool {
        track(self.0.id(), Op::Has, Key::Entry(key.clone()));
        self.0.borrow().entries.contains_key(key)
    }

    pub fn size(&self) -> usize {
        track(self.0.id(), Op::Iterate, Key::Iterate);
        self.0.borrow().entries.len()
    }

    pub fn set(&self, key: DynValue, value: DynValue) {
        let raw_id = self.0.id();
        let existing = self.0.borrow().entries.get(&key).cloned();
        let is_new = existing.is_none();
        if !is_new && existing.as_ref() == Some(&value) {
            return;
        }
        self.0.borrow_mut().entries.insert(key.clone(), value.clone());
        if is_new {
            trigger(
                raw_id,
                Op::Add,
                &[Key::Entry(key), Key::Iterate],
                diag_extra(None, Some(value)),
            );
        } else {
            trigger(raw_id, Op::Set, &[Key::Entry(key)], diag_extra(existing, Some(value)));
        }
    }

    pub fn delete(&self, key: &DynValue) -> bool {
        let raw_id = self.0.id();
        let removed = self.0.borrow_mut().entries.shift_remove(key);
        match removed {
            Some(old) => {
                trigger(
                    raw_id,
                    Op::Delete,
                    &[Key::Entry(key.clone()), Key::Iterate],
                    diag_extra(Some(old), None),
                );
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        let raw_id = self.0.id();
        let was_empty = self.0.borrow().entries.is_empty();
        if was_empty {
            return;
        }
        self.0.borrow_mut().entries.clear();
        trigger(raw_id, Op::Clear, &[], diag_extra(None, None));
    }

    pub fn keys(&self) -> Vec<Value> {
        track(self.0.id(), Op::Iterate, Key::Iterate);
        self.0
            .borrow()
            .entries
            .keys()
            .cloned()
            .map(resolve_reactive)
            .collect()
    }

    pub fn values(&self) -> Vec<Value> {
        track(self.0.id(), Op::Iterate, Key::Iterate);
        self.0
            .borrow()
            .entries
            .values()
            .cloned()
            .map(resolve_reactive)
            .collect()
    }

    pub fn entries(&self) -> Vec<(Value, Value)> {
        track(self.0.id(), Op::Iterate, Key::Iterate);
        self.0
            .borrow()
            .entries
            .iter()
            .map(|(k, v)| (resolve_reactive(k.clone()), resolve_reactive(v.clone())))
            .collect()
    }

    pub fn for_each(&self, mut cb: impl FnMut(Value, Value)) {
        for (k, v) in self.entries() {
            cb(v, k);
        }
    }

    pub(crate) fn as_dynvalue(&self) -> DynValue {
        DynValue::Compound(self.0.id(), Shape::Map)
    }
}

impl Default for MapC {
    fn default() -> Self {
        MapC::new()
    }
}

impl ReadonlyMapC {
    pub fn wrap(raw: Raw<MapData>) -> Self {
        MAP_REGISTRY.with(|r| r.register(&raw));
        ReadonlyMapC(raw)
    }

    pub fn id(&self) -> RawId {
        self.0.id()
    }

    pub fn get(&self, key: &DynValue) -> Value {
        track(self.0.id(), Op::Get, Key::Entry(key.clone()));
        let stored = self.0.borrow().entries.get(key).cloned();
        stored.map(resolve_readonly).unwrap_or(Value::Null)
    }

    pub fn has(&self, key: &DynValue) -> bool {
        track(self.0.id(), Op::Has, Key::Entry(key.clone()));
        self.0.borrow().entries.contains_key(key)
    }

    pub fn size(&self) -> usize {
        track(self.0.id(), Op::Iterate, Key::Iterate);
        self.0.borrow().entries.len()
    }

    pub fn set(&self, key: DynValue, value: DynValue) {
        if readonly_lock::is_engaged() {
            tracing::warn!("set on readonly map while lock is engaged, ignoring");
            return;
        }
        MapC(self.0.clone()).set(key, value);
    }

    pub fn delete(&self, key: &DynValue) -> bool {
        if readonly_lock::is_engaged() {
            tracing::warn!("delete on readonly map while lock is engaged, ignoring");
            return false;
        }
        MapC(self.0.clone()).delete(key)
    }
}

impl SetC {
    pub fn new() -> Self {
        SetC::wrap(Raw::new(SetData::default()))
    }

    pub fn wrap(raw: Raw<SetData>) -> Self {
        SET_REGISTRY.with(|r| r.register(&raw));
        SetC(raw)
    }

    pub fn id(&self) -> RawId {
        self.0.id()
    }

    pub fn readonly(&self) -> ReadonlySetC {
        ReadonlySetC::wrap(self.0.clone())
    }

    pub fn has(&self, value: &DynValue) -> bool {
        track(self.0.id(), Op::Has, Key::Entry(value.clone()));
        self.0.borrow().entries.contains(value)
    }

    pub fn size(&self) -> usize {
        track(self.0.id(), Op::Iterate, Key::Iterate);
        self.0.borrow().entries.len()
    }

    /// Insert `value`, triggering `Add` only if it wasn't already present.
    pub fn add(&self, value: DynValue) {
        let raw_id = self.0.id();
        let was_new = self.0.borrow_mut().entries.insert(value.clone());
        if was_new {
            trigger(
                raw_id,
                Op::Add,
                &[Key::Entry(value.clone()), Key::Iterate],
                diag_extra(None, Some(value)),
            );
        }
    }

    pub fn delete(&self, value: &DynValue) -> bool {
        let raw_id = self.0.id();
        let removed = self.0.borrow_mut().entries.shift_remove(value);
        if removed {
            trigger(
                raw_id,
                Op::Delete,
                &[Key::Entry(value.clone()), Key::Iterate],
                diag_extra(Some(value.clone()), None),
            );
        }
        removed
    }

    pub fn clear(&self) {
        let raw_id = self.0.id();
        let was_empty = self.0.borrow().entries.is_empty();
        if was_empty {
            return;
        }
        self.0.borrow_mut().entries.clear();
        trigger(raw_id, Op::Clear, &[], diag_extra(None, None));
    }

    pub fn values(&self) -> Vec<Value> {
        track(self.0.id(), Op::Iterate, Key::Iterate);
        self.0
            .borrow()
            .entries
            .iter()
            .cloned()
            .map(resolve_reactive)
            .collect()
    }

    pub fn for_each(&self, mut cb: impl FnMut(Value, Value)) {
        for v in self.values() {
            cb(v.clone(), v);
        }
    }

    pub(crate) fn as_dynvalue(&self) -> DynValue {
        DynValue::Compound(self.0.id(), Shape::Set)
    }
}

impl Default for SetC {
    fn default() -> Self {
        SetC::new()
    }
}

impl ReadonlySetC {
    pub fn wrap(raw: Raw<SetData>) -> Self {
        SET_REGISTRY.with(|r| r.register(&raw));
        ReadonlySetC(raw)
    }

    pub fn id(&self) -> RawId {
        self.0.id()
    }

    pub fn has(&self, value: &DynValue) -> bool {
        track(self.0.id(), Op::Has, Key::Entry(value.clone()));
        self.0.borrow().entries.contains(value)
    }

    pub fn size(&self) -> usize {
        track(self.0.id(), Op::Iterate, Key::Iterate);
        self.0.borrow().entries.len()
    }

    pub fn add(&self, value: DynValue) {
        if readonly_lock::is_engaged() {
            tracing::warn!("add on readonly set while lock is engaged, ignoring");
            return;
        }
        SetC(self.0.clone()).add(value);
    }

    pub fn delete(&self, value: &DynValue) -> bool {
        if readonly_lock::is_engaged() {
            tracing::warn!("delete on readonly set while lock is engaged, ignoring");
            return false;
        }
        SetC(self.0.clone()).delete(value)
    }
}

pub(crate) fn resolve_map_reactive(id: RawId) -> Option<MapC> {
    MAP_REGISTRY.with(|r| r.resolve(id)).map(MapC::wrap)
}

pub(crate) fn resolve_map_readonly(id: RawId) -> Option<ReadonlyMapC> {
    MAP_REGISTRY.with(|r| r.resolve(id)).map(ReadonlyMapC::wrap)
}

pub(crate) fn resolve_set_reactive(id: RawId) -> Option<SetC> {
    SET_REGISTRY.with(|r| r.resolve(id)).map(SetC::wrap)
}

pub(crate) fn resolve_set_readonly(id: RawId) -> Option<ReadonlySetC> {
    SET_REGISTRY.with(|r| r.resolve(id)).map(ReadonlySetC::wrap)
}

pub(crate) fn dispose_map(id: RawId) {
    MAP_REGISTRY.with(|r| r.evict(id));
    crate::dep::clear_target(id);
}

pub(crate) fn dispose_set(id: RawId) {
    SET_REGISTRY.with(|r| r.evict(id));
    crate::dep::clear_target(id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::Effect;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn size_tracks_and_add_delete_clear_trigger_it() {
        let set = SetC::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen2 = seen.clone();
        let s = set.clone();
        let _e = Effect::new(move || {
            seen2.borrow_mut().push(s.size());
        });
        assert_eq!(&*seen.borrow(), &[0]);

        set.add(DynValue::Int(1));
        assert_eq!(&*seen.borrow(), &[0, 1]);

        // adding the same value again must not retrigger
        set.add(DynValue::Int(1));
        assert_eq!(&*seen.borrow(), &[0, 1]);

        set.delete(&DynValue::Int(1));
        assert_eq!(&*seen.borrow(), &[0, 1, 0]);

        set.add(DynValue::Int(2));
        set.add(DynValue::Int(3));
        assert_eq!(&*seen.borrow(), &[0, 1, 0, 1, 2]);

        set.clear();
        assert_eq!(&*seen.borrow(), &[0, 1, 0, 1, 2, 0]);
    }

    #[test]
    fn map_set_triggers_add_then_set_on_change() {
        let map = MapC::new();
        let runs = Rc::new(RefCell::new(0));
        let runs2 = runs.clone();
        let m = map.clone();
        let key = DynValue::from("k");
        let key2 = key.clone();
        let _e = Effect::new(move || {
            let _ = m.get(&key2);
            *runs2.borrow_mut() += 1;
        });
        assert_eq!(*runs.borrow(), 1);

        map.set(key.clone(), DynValue::Int(1));
        assert_eq!(*runs.borrow(), 2);

        map.set(key.clone(), DynValue::Int(1));
        assert_eq!(*runs.borrow(), 2, "unchanged value must not retrigger");

        map.set(key, DynValue::Int(2));
        assert_eq!(*runs.borrow(), 3);
    }

    #[test]
    fn readonly_map_set_forwards_when_lock_disengaged() {
        let map = MapC::new();
        let ro = map.readonly();
        readonly_lock::disengage();
        ro.set(DynValue::from("a"), DynValue::Int(1));
        assert!(matches!(map.get(&DynValue::from("a")), Value::Int(1)));
    }
}
