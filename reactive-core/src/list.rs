//! `List`: the "ordered sequence" observable shape. Mirrors [`crate::object`]
//! but keys off numeric index, and uses `Key::Length` (not `Key::Iterate`)
//! as the shape sentinel, so that `push`/`remove` wake up both length
//! observers and iteration observers (§4.2).

use crate::dep::Key;
use crate::dynvalue::{DynValue, Shape};
use crate::effect::{diag_extra, track, trigger};
use crate::ids::RawId;
use crate::ops::Op;
use crate::readonly_lock;
use crate::registry::{Raw, ShapeRegistry};
use crate::value::{resolve_reactive, resolve_readonly, Value};

#[derive(Debug, Default)]
pub struct ListData {
    items: Vec<DynValue>,
}

impl ListData {
    pub fn new() -> Self {
        Self::default()
    }
}

thread_local! {
    static REGISTRY: ShapeRegistry<ListData> = ShapeRegistry::new();
}

#[derive(Clone)]
pub struct List(Raw<ListData>);

#[derive(Clone)]
pub struct ReadonlyList(Raw<ListData>);

impl List {
    pub fn new() -> Self {
        List::wrap(Raw::new(ListData::new()))
    }

    pub fn wrap(raw: Raw<ListData>) -> Self {
        REGISTRY.with(|r| r.register(&raw));
        List(raw)
    }

    pub fn id(&self) -> RawId {
        self.0.id()
    }

    pub fn to_raw(&self) -> Raw<ListData> {
        self.0.clone()
    }

    pub fn readonly(&self) -> ReadonlyList {
        ReadonlyList::wrap(self.0.clone())
    }

    pub fn len(&self) -> usize {
        track(self.0.id(), Op::Iterate, Key::Length);
        self.0.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has(&self, index: usize) -> bool {
        track(self.0.id(), Op::Has, Key::Index(index));
        index < self.0.borrow().items.len()
    }

    pub fn get(&self, index: usize) -> Value {
        track(self.0.id(), Op::Get, Key::Index(index));
        let stored = self.0.borrow().items.get(index).cloned();
        match stored {
            Some(DynValue::Ref(id)) => crate::ref_cell::get_by_id(id),
            Some(other) => resolve_reactive(other),
            None => Value::Null,
        }
    }

    /// Append a value, triggering `Add` on the new index plus the length
    /// sentinel.
    pub fn push(&self, value: DynValue) {
        let raw_id = self.0.id();
        let index = {
            let mut data = self.0.borrow_mut();
            let index = data.items.len();
            data.items.push(value.clone());
            index
        };
        trigger(
            raw_id,
            Op::Add,
            &[Key::Index(index), Key::Length],
            diag_extra(None, Some(value)),
        );
    }

    /// Write `list[index] = value`. Writing at `len()` is equivalent to
    /// `push`; writing beyond that is a no-op (the list has no holes).
    pub fn set(&self, index: usize, value: DynValue) {
        let raw_id = self.0.id();
        let len = self.0.borrow().items.len();

        if index == len {
            self.push(value);
            return;
        }
        if index > len {
            tracing::warn!(index, len, "list set index out of bounds, ignoring");
            return;
        }

        if let Some(DynValue::Ref(ref_id)) = self.0.borrow().items.get(index).cloned() {
            if !matches!(value, DynValue::Ref(_)) {
                crate::ref_cell::set_by_id(ref_id, value);
                return;
            }
        }

        let existing = self.0.borrow().items[index].clone();
        if existing == value {
            return;
        }
        self.0.borrow_mut().items[index] = value.clone();
        trigger(
            raw_id,
            Op::Set,
            &[Key::Index(index)],
            diag_extra(Some(existing), Some(value)),
        );
    }

    /// Remove the element at `index`, shifting later elements down.
    pub fn remove(&self, index: usize) -> Option<DynValue> {
        let raw_id = self.0.id();
        let len = self.0.borrow().items.len();
        if index >= len {
            return None;
        }
        let removed = self.0.borrow_mut().items.remove(index);
        trigger(
            raw_id,
            Op::Delete,
            &[Key::Index(index), Key::Length],
            diag_extra(Some(removed.clone()), None),
        );
        Some(removed)
    }

    pub fn clear(&self) {
        let raw_id = self.0.id();
        let was_empty = self.0.borrow().items.is_empty();
        if was_empty {
            return;
        }
        self.0.borrow_mut().items.clear();
        trigger(raw_id, Op::Clear, &[], diag_extra(None, None));
    }

    pub(crate) fn as_dynvalue(&self) -> DynValue {
        DynValue::Compound(self.0.id(), Shape::List)
    }
}

impl Default for List {
    fn default() -> Self {
        List::new()
    }
}

impl ReadonlyList {
    pub fn wrap(raw: Raw<ListData>) -> Self {
        REGISTRY.with(|r| r.register(&raw));
        ReadonlyList(raw)
    }

    pub fn id(&self) -> RawId {
        self.0.id()
    }

    pub fn len(&self) -> usize {
        track(self.0.id(), Op::Iterate, Key::Length);
        self.0.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Value {
        track(self.0.id(), Op::Get, Key::Index(index));
        let stored = self.0.borrow().items.get(index).cloned();
        match stored {
            Some(DynValue::Ref(id)) => crate::ref_cell::get_by_id(id),
            Some(other) => resolve_readonly(other),
            None => Value::Null,
        }
    }

    pub fn push(&self, value: DynValue) {
        if readonly_lock::is_engaged() {
            tracing::warn!("push on readonly target while lock is engaged, ignoring");
            return;
        }
        List(self.0.clone()).push(value);
    }

    pub fn remove(&self, index: usize) -> Option<DynValue> {
        if readonly_lock::is_engaged() {
            tracing::warn!(index, "remove on readonly target while lock is engaged, ignoring");
            return None;
        }
        List(self.0.clone()).remove(index)
    }
}

pub(crate) fn resolve_reactive(id: RawId) -> Option<List> {
    REGISTRY.with(|r| r.resolve(id)).map(List::wrap)
}

pub(crate) fn resolve_readonly(id: RawId) -> Option<ReadonlyList> {
    REGISTRY.with(|r| r.resolve(id)).map(ReadonlyList::wrap)
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
    use std::rc::Rc;

    #[test]
    fn push_triggers_length_observers() {
        let list = List::new();
        let seen = Rc::new(RefCell::new(0));
        let seen2 = seen.clone();
        let l = list.clone();
        let _e = Effect::new(move || {
            *seen2.borrow_mut() = l.len();
        });
        assert_eq!(*seen.borrow(), 0);
        list.push(DynValue::Int(1));
        assert_eq!(*seen.borrow(), 1);
    }

    #[test]
    fn set_in_bounds_triggers_index_observer_only_when_changed() {
        let list = List::new();
        list.push(DynValue::Int(1));
        let runs = Rc::new(RefCell::new(0));
        let runs2 = runs.clone();
        let l = list.clone();
        let _e = Effect::new(move || {
            let _ = l.get(0);
            *runs2.borrow_mut() += 1;
        });
        assert_eq!(*runs.borrow(), 1);
        list.set(0, DynValue::Int(1));
        assert_eq!(*runs.borrow(), 1, "unchanged value must not retrigger");
        list.set(0, DynValue::Int(2));
        assert_eq!(*runs.borrow(), 2);
    }

    #[test]
    fn remove_shifts_and_triggers_length() {
        let list = List::new();
        list.push(DynValue::Int(1));
        list.push(DynValue::Int(2));
        let removed = list.remove(0);
        assert!(matches!(removed, Some(DynValue::Int(1))));
        assert!(matches!(list.get(0), Value::Int(2)));
    }
}
