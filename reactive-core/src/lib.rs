//! reactive-core
//!
//! A fine-grained reactivity engine: transparent observation of plain
//! objects, ordered sequences, and key-value/set-like containers, a
//! dependency registry between data cells and effects, an effect runtime
//! with an active-effect stack and pluggable scheduling, and a lazy
//! computed protocol with correct invalidation ordering against ordinary
//! effects.
//!
//! # Architecture
//!
//! - `ids`: identity types (`RawId`, `EffectId`).
//! - `dynvalue`: the compact, hashable, stored representation of a value.
//! - `value`: the richer, caller-facing representation a read resolves to.
//! - `dep`: the `target -> key -> dep-set` registry.
//! - `effect`: the active-effect stack, `track`/`trigger`, run protocol.
//! - `computed`: lazy derived cells built atop `effect`.
//! - `object`/`list`/`collections`/`ref_cell`: the four observable shapes.
//! - `registry`: the per-shape weak-identity cache and opt-out sets.
//! - `readonly_lock`: the process-wide readonly gate.
//! - `config`/`error`: ambient configuration and the narrow error type.
//!
//! # Example
//!
//! ```rust,ignore
//! use reactive_core::object::Dict;
//! use reactive_core::effect::Effect;
//! use reactive_core::dynvalue::DynValue;
//! use reactive_core::value::Value;
//!
//! let state = Dict::new();
//! state.set("count", DynValue::Int(0));
//!
//! let watched = state.clone();
//! Effect::new(move || {
//!     if let Value::Int(n) = watched.get("count") {
//!         println!("count: {n}");
//!     }
//! });
//!
//! state.set("count", DynValue::Int(1)); // effect re-runs, prints "count: 1"
//! ```

pub mod collections;
pub mod computed;
pub mod config;
pub mod dep;
pub mod dynvalue;
pub mod effect;
pub mod error;
pub mod ids;
pub mod list;
pub mod object;
pub mod ops;
pub mod readonly_lock;
pub mod ref_cell;
pub mod registry;
pub mod value;

use ids::RawId;
use value::Value;

/// Identity of whatever `value` wraps, if it wraps anything — scalars have
/// no identity to opt in or out with.
fn id_of(value: &Value) -> Option<RawId> {
    match value {
        Value::Dict(d) => Some(d.id()),
        Value::ReadonlyDict(d) => Some(d.id()),
        Value::List(l) => Some(l.id()),
        Value::ReadonlyList(l) => Some(l.id()),
        Value::Map(m) => Some(m.id()),
        Value::ReadonlyMap(m) => Some(m.id()),
        Value::Set(s) => Some(s.id()),
        Value::ReadonlySet(s) => Some(s.id()),
        _ => None,
    }
}

/// `reactive(target)`: return `target` itself if it's already a readonly
/// proxy; `readonly(target)` if the user pre-marked it readonly; `target`
/// unchanged if it's already a mutable proxy, or not an observable shape at
/// all (§4.1).
pub fn reactive(value: Value) -> Value {
    match &value {
        Value::ReadonlyDict(_)
        | Value::ReadonlyList(_)
        | Value::ReadonlyMap(_)
        | Value::ReadonlySet(_) => value,
        Value::Dict(_) | Value::List(_) | Value::Map(_) | Value::Set(_) => {
            match id_of(&value) {
                Some(id) if registry::is_marked_readonly(id) => readonly(value),
                _ => value,
            }
        }
        _ => {
            if config::dev_diagnostics() {
                tracing::warn!("reactive() called on a non-observable value, returning unchanged");
            }
            value
        }
    }
}

/// `readonly(target)`: symmetric to `reactive`, but resolves an
/// already-mutable proxy back to its raw identity first so both views
/// share the same underlying target.
pub fn readonly(value: Value) -> Value {
    match value {
        Value::Dict(d) => Value::ReadonlyDict(d.readonly()),
        Value::List(l) => Value::ReadonlyList(l.readonly()),
        Value::Map(m) => Value::ReadonlyMap(m.readonly()),
        Value::Set(s) => Value::ReadonlySet(s.readonly()),
        already_readonly @ (Value::ReadonlyDict(_)
        | Value::ReadonlyList(_)
        | Value::ReadonlyMap(_)
        | Value::ReadonlySet(_)) => already_readonly,
        other => {
            if config::dev_diagnostics() {
                tracing::warn!("readonly() called on a non-observable value, returning unchanged");
            }
            other
        }
    }
}

pub fn is_reactive(value: &Value) -> bool {
    matches!(
        value,
        Value::Dict(_) | Value::List(_) | Value::Map(_) | Value::Set(_)
    )
}

pub fn is_readonly(value: &Value) -> bool {
    matches!(
        value,
        Value::ReadonlyDict(_) | Value::ReadonlyList(_) | Value::ReadonlyMap(_) | Value::ReadonlySet(_)
    )
}

/// `to_raw(x)`: the raw identity behind `x`. Since this port represents a
/// raw target and its observed views as the same underlying identity
/// (§3, Ownership) rather than distinct handle types, this is the identity
/// function for every `Value` — there is no separate "unwrapped" handle to
/// return (see DESIGN.md).
pub fn to_raw(value: Value) -> Value {
    value
}

/// `mark_readonly(x)`: opt `x` into always resolving to a readonly view on
/// future `reactive()` calls. Returns `x` unchanged.
pub fn mark_readonly(value: Value) -> Value {
    if let Some(id) = id_of(&value) {
        registry::mark_readonly(id);
    }
    value
}

/// `mark_non_reactive(x)`: opt `x` out of observation entirely. Returns `x`
/// unchanged. The opt-out is enforced at the single choke point every shape
/// routes through — `effect::track`/`effect::trigger` both check
/// `registry::is_marked_non_reactive` first and no-op for a marked identity
/// — so reads and writes through `x`, whether reached directly or as a
/// nested child of another container, never record or fire a dependency.
pub fn mark_non_reactive(value: Value) -> Value {
    if let Some(id) = id_of(&value) {
        registry::mark_non_reactive(id);
    }
    value
}

/// Evict every registry entry for `value`'s identity: its shape-registry
/// slot and every dep-set recorded in `target_map`. A no-op for scalars.
pub fn dispose(value: &Value) {
    match value {
        Value::Dict(d) => object::dispose(d.id()),
        Value::ReadonlyDict(d) => object::dispose(d.id()),
        Value::List(l) => list::dispose(l.id()),
        Value::ReadonlyList(l) => list::dispose(l.id()),
        Value::Map(m) => collections::dispose_map(m.id()),
        Value::ReadonlyMap(m) => collections::dispose_map(m.id()),
        Value::Set(s) => collections::dispose_set(s.id()),
        Value::ReadonlySet(s) => collections::dispose_set(s.id()),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynvalue::DynValue;
    use crate::object::Dict;

    #[test]
    fn reactive_is_idempotent_on_identity() {
        let dict = Dict::new();
        let id_before = dict.id();
        let wrapped = reactive(Value::Dict(dict));
        assert_eq!(id_of(&wrapped), Some(id_before));
        assert!(is_reactive(&wrapped));
    }

    #[test]
    fn readonly_then_reactive_stays_readonly_once_marked() {
        let dict = Dict::new();
        dict.set("x", DynValue::Int(1));
        let marked = mark_readonly(Value::Dict(dict));
        let resolved = reactive(marked);
        assert!(is_readonly(&resolved));
    }

    #[test]
    fn mark_non_reactive_does_not_panic_on_scalar() {
        let v = mark_non_reactive(Value::Int(3));
        assert!(matches!(v, Value::Int(3)));
    }

    #[test]
    fn dispose_evicts_dep_entries() {
        let dict = Dict::new();
        dict.set("x", DynValue::Int(1));
        let id = dict.id();
        assert!(dep::existing_dep_for(id, &dep::Key::Prop(std::rc::Rc::from("x"))).is_some());
        dispose(&Value::Dict(dict));
        assert!(dep::existing_dep_for(id, &dep::Key::Prop(std::rc::Rc::from("x"))).is_none());
    }
}
