//! `Computed<T>`: a lazy, self-invalidating derived value built atop an
//! effect (§4.5).
//!
//! Grounded in `lattice_core::reactive::memo::Memo<T>` — same "lazy,
//! dirty-flagged, recompute on next read" shape — but the teacher's
//! three-state `MemoState` (`Clean`/`MaybeDirty`/`Dirty`) collapses to a
//! plain `bool` here: the teacher's `MaybeDirty` exists to let a memo defer
//! checking whether its inputs *actually* changed, but this engine has no
//! equivalent of that check (a dep firing always means the read changed),
//! so the extra state has no work to do. And unlike `Memo<T>`, which
//! tracks its own dependents directly, this computed's invalidation is
//! driven entirely by the effect runtime's scheduler hook — it does not
//! maintain a dependents list of its own.

use std::cell::{Cell, RefCell};

use crate::effect::{bridge_into_current, current_effect, Effect, EffectOptions};
use crate::error::ReactiveError;

/// A read-only derived cell. Clone shares the same backing effect and
/// cached value, same as the teacher's `Memo<T>`.
#[derive(Clone)]
pub struct Computed<T: Clone + 'static> {
    inner: std::rc::Rc<ComputedInner<T>>,
}

struct ComputedInner<T> {
    value: RefCell<Option<T>>,
    dirty: Cell<bool>,
    effect: RefCell<Option<Effect>>,
    setter: Option<Box<dyn Fn(T)>>,
}

impl<T: Clone + 'static> Computed<T> {
    /// A read-only computed. `getter` re-runs whenever a dependency it read
    /// on its last run has since changed.
    pub fn new(getter: impl Fn() -> T + 'static) -> Self {
        Self::build(getter, None)
    }

    /// A writable computed: `set_value` routes through `setter` instead of
    /// warning.
    pub fn new_with(getter: impl Fn() -> T + 'static, setter: impl Fn(T) + 'static) -> Self {
        Self::build(getter, Some(Box::new(setter)))
    }

    fn build(getter: impl Fn() -> T + 'static, setter: Option<Box<dyn Fn(T)>>) -> Self {
        let inner = std::rc::Rc::new(ComputedInner {
            value: RefCell::new(None),
            dirty: Cell::new(true),
            effect: RefCell::new(None),
            setter,
        });

        let inner_for_run = inner.clone();
        let inner_for_scheduler = inner.clone();

        let run_fn = move || {
            let computed = getter();
            *inner_for_run.value.borrow_mut() = Some(computed);
        };

        let effect = Effect::with_options(
            run_fn,
            EffectOptions::new()
                .lazy()
                .computed()
                .scheduler(move |_effect| {
                    inner_for_scheduler.dirty.set(true);
                }),
        );

        *inner.effect.borrow_mut() = Some(effect);
        Computed { inner }
    }

    /// Current value, forcing recomputation first if dirty. Bridge-tracks
    /// the backing effect's deps onto whichever effect is currently
    /// reading (§4.5) so chained computeds invalidate correctly.
    pub fn value(&self) -> T {
        if self.inner.dirty.get() {
            let effect = self
                .inner
                .effect
                .borrow()
                .clone()
                .expect("computed effect initialized in build()");
            effect.run();
            self.inner.dirty.set(false);
        }

        if current_effect().is_some() {
            let effect = self.inner.effect.borrow().clone();
            if let Some(effect) = effect {
                for dep in effect.deps() {
                    bridge_into_current(&dep);
                }
            }
        }

        self.inner
            .value
            .borrow()
            .clone()
            .expect("value is populated once dirty is cleared")
    }

    pub fn set_value(&self, v: T) -> Result<(), ReactiveError> {
        match &self.inner.setter {
            Some(setter) => {
                setter(v);
                Ok(())
            }
            None => {
                tracing::warn!("set on read-only computed, ignoring");
                Err(ReactiveError::ComputedHasNoSetter)
            }
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }
}
