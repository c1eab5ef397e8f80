//! `Value`: what a read through an observable shape hands back to the
//! caller, as opposed to [`crate::dynvalue::DynValue`], which is what gets
//! stored internally.
//!
//! Vue's Proxy `get` trap can return another Proxy transparently because
//! JS has no static types to satisfy; a Rust caller needs something it can
//! actually call `.get()`/`.set()` on next. `Value` is that something: a
//! plain scalar, or one of the four observable shapes already resolved to
//! the mode (reactive or readonly) its parent read happened through, or an
//! already ref-unwrapped inner value (§4.2, "Ref unwrap on read").

use crate::collections::{MapC, ReadonlyMapC, ReadonlySetC, SetC};
use crate::dynvalue::{DynValue, Shape};
use crate::list::{List, ReadonlyList};
use crate::object::{Dict, ReadonlyDict};

#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(std::rc::Rc<str>),
    Dict(Dict),
    ReadonlyDict(ReadonlyDict),
    List(List),
    ReadonlyList(ReadonlyList),
    Map(MapC),
    ReadonlyMap(ReadonlyMapC),
    Set(SetC),
    ReadonlySet(ReadonlySetC),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Resolve a stored `DynValue` into a caller-usable `Value`, wrapping
/// compound children as reactive (mutable) views. Scalars pass through
/// unchanged; this does NOT perform ref-unwrapping — callers that store
/// refs (currently only `Dict`/`List`) handle that themselves since only
/// they can distinguish "a ref lives here" from "a ref is the value".
pub(crate) fn resolve_reactive(raw: DynValue) -> Value {
    match raw {
        DynValue::Null => Value::Null,
        DynValue::Bool(b) => Value::Bool(b),
        DynValue::Int(i) => Value::Int(i),
        DynValue::Float(bits) => Value::Float(f64::from_bits(bits)),
        DynValue::Str(s) => Value::Str(s),
        DynValue::Compound(id, Shape::Dict) => crate::object::resolve_reactive(id)
            .map(Value::Dict)
            .unwrap_or(Value::Null),
        DynValue::Compound(id, Shape::List) => crate::list::resolve_reactive(id)
            .map(Value::List)
            .unwrap_or(Value::Null),
        DynValue::Compound(id, Shape::Map) => crate::collections::resolve_map_reactive(id)
            .map(Value::Map)
            .unwrap_or(Value::Null),
        DynValue::Compound(id, Shape::Set) => crate::collections::resolve_set_reactive(id)
            .map(Value::Set)
            .unwrap_or(Value::Null),
        DynValue::Ref(id) => crate::ref_cell::get_by_id(id),
    }
}

/// Same as [`resolve_reactive`] but wraps compound children readonly,
/// for reads that happened through a readonly view (readonly is deep).
pub(crate) fn resolve_readonly(raw: DynValue) -> Value {
    match raw {
        DynValue::Compound(id, Shape::Dict) => crate::object::resolve_readonly(id)
            .map(Value::ReadonlyDict)
            .unwrap_or(Value::Null),
        DynValue::Compound(id, Shape::List) => crate::list::resolve_readonly(id)
            .map(Value::ReadonlyList)
            .unwrap_or(Value::Null),
        DynValue::Compound(id, Shape::Map) => crate::collections::resolve_map_readonly(id)
            .map(Value::ReadonlyMap)
            .unwrap_or(Value::Null),
        DynValue::Compound(id, Shape::Set) => crate::collections::resolve_set_readonly(id)
            .map(Value::ReadonlySet)
            .unwrap_or(Value::Null),
        other => resolve_reactive(other),
    }
}
