//! The effect runtime: active-effect stack, track/trigger engine,
//! re-entrancy protection, and pause/resume.
//!
//! Grounded in `lattice_core::reactive::effect::Effect` (run-on-creation,
//! dispose/stop, dependency clearing before re-run) and
//! `lattice_core::reactive::context::ReactiveContext` (the stack-of-current-
//! computation, RAII pop-on-drop). Generalized per §4.4 of SPEC_FULL.md:
//! the stack lives in thread-local storage (Rc can't cross threads), re-runs
//! are partitioned computed-first, and a user-supplied `scheduler` can
//! intercept re-execution instead of running inline.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use indexmap::IndexSet;
use smallvec::SmallVec;

use crate::config;
use crate::dep::{self, Dep, Key};
use crate::dynvalue::DynValue;
use crate::ids::{EffectId, RawId};
use crate::ops::Op;
use crate::registry::is_marked_non_reactive;

/// Payload delivered to `on_track` when a new dependency link is recorded.
#[derive(Debug, Clone)]
pub struct TrackInfo {
    pub effect: EffectId,
    pub target: RawId,
    pub op: Op,
    pub key: Key,
}

/// Payload delivered to `on_trigger` when an effect is fired.
#[derive(Debug, Clone)]
pub struct TriggerInfo {
    pub effect: EffectId,
    pub target: RawId,
    pub op: Op,
    pub key: Key,
    pub old_value: Option<DynValue>,
    pub new_value: Option<DynValue>,
}

/// Extra dev-diagnostics payload a caller of `trigger` may supply; merged
/// into the `TriggerInfo` delivered to every effect the trigger fires.
#[derive(Debug, Clone, Default)]
pub struct TriggerExtra {
    pub old_value: Option<DynValue>,
    pub new_value: Option<DynValue>,
}

type Scheduler = Box<dyn Fn(&Effect)>;
type OnTrack = Box<dyn Fn(&TrackInfo)>;
type OnTrigger = Box<dyn Fn(&TriggerInfo)>;
type OnStop = Box<dyn Fn()>;

/// Options controlling how an [`Effect`] behaves. Build with
/// [`EffectOptions::new`] and the `with_*` setters.
#[derive(Default)]
pub struct EffectOptions {
    pub(crate) lazy: bool,
    pub(crate) computed: bool,
    pub(crate) scheduler: Option<Scheduler>,
    pub(crate) on_track: Option<OnTrack>,
    pub(crate) on_trigger: Option<OnTrigger>,
    pub(crate) on_stop: Option<OnStop>,
}

impl EffectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppress the first, implicit run.
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// Mark this effect as a computed's backing effect: fired before
    /// ordinary effects on every trigger (§4.4).
    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn scheduler(mut self, f: impl Fn(&Effect) + 'static) -> Self {
        self.scheduler = Some(Box::new(f));
        self
    }

    pub fn on_track(mut self, f: impl Fn(&TrackInfo) + 'static) -> Self {
        self.on_track = Some(Box::new(f));
        self
    }

    pub fn on_trigger(mut self, f: impl Fn(&TriggerInfo) + 'static) -> Self {
        self.on_trigger = Some(Box::new(f));
        self
    }

    pub fn on_stop(mut self, f: impl Fn() + 'static) -> Self {
        self.on_stop = Some(Box::new(f));
        self
    }
}

pub(crate) struct EffectInner {
    id: EffectId,
    raw_fn: RefCell<Box<dyn FnMut()>>,
    active: Cell<bool>,
    computed: bool,
    scheduler: Option<Scheduler>,
    on_track: Option<OnTrack>,
    on_trigger: Option<OnTrigger>,
    on_stop: Option<OnStop>,
    /// Most effects read a handful of cells, so an inline buffer avoids a
    /// heap allocation for the common case.
    deps: RefCell<SmallVec<[Dep; 4]>>,
}

impl EffectInner {
    fn clear_deps(&self, id: EffectId) {
        for dep in self.deps.borrow_mut().drain(..) {
            dep.borrow_mut().shift_remove(&id);
        }
    }
}

thread_local! {
    static ACTIVE_STACK: RefCell<Vec<Rc<EffectInner>>> = RefCell::new(Vec::new());
    static SHOULD_TRACK: Cell<bool> = Cell::new(true);
    static EFFECT_REGISTRY: RefCell<HashMap<EffectId, Weak<EffectInner>>> = RefCell::new(HashMap::new());
}

fn register(id: EffectId, inner: &Rc<EffectInner>) {
    EFFECT_REGISTRY.with(|r| {
        r.borrow_mut().insert(id, Rc::downgrade(inner));
    });
}

fn lookup(id: EffectId) -> Option<Rc<EffectInner>> {
    EFFECT_REGISTRY.with(|r| r.borrow().get(&id).and_then(Weak::upgrade))
}

/// A handle to a reactive effect. Cloning shares the same underlying
/// computation (same id, same deps, same active flag) — exactly like
/// `lattice_core::reactive::effect::Effect`'s `Clone` impl.
#[derive(Clone)]
pub struct Effect(pub(crate) Rc<EffectInner>);

impl Effect {
    /// Create and immediately run an effect.
    pub fn new(f: impl FnMut() + 'static) -> Self {
        Self::with_options(f, EffectOptions::new())
    }

    /// Create an effect with full control over scheduling and dev hooks.
    pub fn with_options(f: impl FnMut() + 'static, opts: EffectOptions) -> Self {
        let id = EffectId::new();
        let inner = Rc::new(EffectInner {
            id,
            raw_fn: RefCell::new(Box::new(f)),
            active: Cell::new(true),
            computed: opts.computed,
            scheduler: opts.scheduler,
            on_track: opts.on_track,
            on_trigger: opts.on_trigger,
            on_stop: opts.on_stop,
            deps: RefCell::new(SmallVec::new()),
        });
        register(id, &inner);
        let effect = Effect(inner);
        if !opts.lazy {
            effect.run();
        }
        effect
    }

    pub fn id(&self) -> EffectId {
        self.0.id
    }

    pub fn is_active(&self) -> bool {
        self.0.active.get()
    }

    pub(crate) fn is_computed(&self) -> bool {
        self.0.computed
    }

    /// Snapshot of the dep-sets this effect is currently registered in.
    /// Used by [`crate::computed`] for bridge-tracking (§4.5).
    pub(crate) fn deps(&self) -> Vec<Dep> {
        self.0.deps.borrow().to_vec()
    }

    /// Re-run the effect's function, establishing a fresh dependency set.
    ///
    /// Implements the run protocol of §4.4: inactive effects and re-entrant
    /// self-calls are untracked pass-throughs; everything else clears old
    /// deps, pushes onto the active stack, runs, and pops even on panic.
    pub fn run(&self) {
        let inner = &self.0;
        if !inner.active.get() {
            (inner.raw_fn.borrow_mut())();
            return;
        }

        let already_running =
            ACTIVE_STACK.with(|s| s.borrow().iter().any(|e| Rc::ptr_eq(e, inner)));
        if already_running {
            (inner.raw_fn.borrow_mut())();
            return;
        }

        inner.clear_deps(inner.id);
        ACTIVE_STACK.with(|s| s.borrow_mut().push(inner.clone()));
        let _guard = PopGuard;
        (inner.raw_fn.borrow_mut())();
    }

    /// Stop the effect: remove it from every dep it's in, mark inactive,
    /// and invoke `on_stop`. Further direct `run()` calls become untracked
    /// pass-throughs of the raw function.
    pub fn stop(&self) {
        let inner = &self.0;
        if inner.active.get() {
            inner.clear_deps(inner.id);
            inner.active.set(false);
            if let Some(hook) = &inner.on_stop {
                hook();
            }
        }
    }
}

/// RAII guard that pops the active-effect stack on drop, including during
/// unwind, so a panicking effect body never leaves the stack corrupted.
struct PopGuard;

impl Drop for PopGuard {
    fn drop(&mut self) {
        ACTIVE_STACK.with(|s| {
            s.borrow_mut().pop();
        });
    }
}

/// The effect currently collecting reads, if any.
pub(crate) fn current_effect() -> Option<Rc<EffectInner>> {
    ACTIVE_STACK.with(|s| s.borrow().last().cloned())
}

/// Attach `dep` to whichever effect is currently reading, without going
/// through `dep::dep_for` (the dep is already known) or firing `on_track` —
/// this is the bridge step of §4.5, not an ordinary tracked read.
pub(crate) fn bridge_into_current(dep: &Dep) {
    let Some(reader) = current_effect() else {
        return;
    };
    let newly = !dep.borrow().contains(&reader.id);
    if newly {
        dep.borrow_mut().insert(reader.id);
        reader.deps.borrow_mut().push(dep.clone());
    }
}

/// Whether a reactive context is active and tracking is not paused.
pub fn is_tracking() -> bool {
    SHOULD_TRACK.with(Cell::get) && current_effect().is_some()
}

/// Build a `TriggerExtra` payload, but only when dev-diagnostics are
/// active — old/new value snapshots are a debug-only cost (§10.3).
pub(crate) fn diag_extra(old: Option<DynValue>, new: Option<DynValue>) -> Option<TriggerExtra> {
    if config::dev_diagnostics() {
        Some(TriggerExtra {
            old_value: old,
            new_value: new,
        })
    } else {
        None
    }
}

/// Suspend dependency collection. Triggers are unaffected.
pub fn pause_tracking() {
    SHOULD_TRACK.with(|c| c.set(false));
}

/// Resume dependency collection.
pub fn resume_tracking() {
    SHOULD_TRACK.with(|c| c.set(true));
}

/// Record that the currently-running effect read `(target, key)`.
pub(crate) fn track(target: RawId, op: Op, key: Key) {
    if !SHOULD_TRACK.with(Cell::get) {
        return;
    }
    if is_marked_non_reactive(target) {
        return;
    }
    let Some(effect) = current_effect() else {
        return;
    };
    let dep = dep::dep_for(target, key.clone());
    let newly = !dep.borrow().contains(&effect.id);
    if newly {
        dep.borrow_mut().insert(effect.id);
        effect.deps.borrow_mut().push(dep.clone());
    }
    if newly && config::dev_diagnostics() {
        tracing::trace!(?target, ?op, ?key, effect = ?effect.id, "track");
        if let Some(hook) = &effect.on_track {
            hook(&TrackInfo {
                effect: effect.id,
                target,
                op,
                key,
            });
        }
    }
}

/// Fire every effect depending on `(target, one-of-keys)`, computed effects
/// first, per §4.4. `op == Op::Clear` ignores `keys` and fires every dep-set
/// recorded for `target`.
pub(crate) fn trigger(target: RawId, op: Op, keys: &[Key], extra: Option<TriggerExtra>) {
    if is_marked_non_reactive(target) {
        return;
    }
    let dep_sets: Vec<Dep> = if matches!(op, Op::Clear) {
        dep::all_deps_for(target)
    } else {
        keys.iter()
            .filter_map(|k| dep::existing_dep_for(target, k))
            .collect()
    };

    if dep_sets.is_empty() {
        return;
    }

    if config::dev_diagnostics() {
        tracing::debug!(?target, ?op, dep_sets = dep_sets.len(), "trigger");
    }

    let mut computed_runners: IndexSet<EffectId> = IndexSet::new();
    let mut ordinary: IndexSet<EffectId> = IndexSet::new();

    for dep in &dep_sets {
        for id in dep.borrow().iter() {
            let Some(inner) = lookup(*id) else { continue };
            if inner.computed {
                computed_runners.insert(*id);
            } else {
                ordinary.insert(*id);
            }
        }
    }

    let key_for_hook = keys.first().cloned().unwrap_or(Key::Iterate);
    let fire = |id: EffectId| {
        let Some(inner) = lookup(id) else { return };
        let effect = Effect(inner.clone());
        if config::dev_diagnostics() {
            tracing::trace!(effect = ?id, computed = inner.computed, "fire");
            if let Some(hook) = &inner.on_trigger {
                hook(&TriggerInfo {
                    effect: id,
                    target,
                    op,
                    key: key_for_hook.clone(),
                    old_value: extra.as_ref().and_then(|e| e.old_value.clone()),
                    new_value: extra.as_ref().and_then(|e| e.new_value.clone()),
                });
            }
        }
        match &inner.scheduler {
            Some(scheduler) => scheduler(&effect),
            None => effect.run(),
        }
    };

    for id in computed_runners {
        fire(id);
    }
    for id in ordinary {
        fire(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;
    use std::rc::Rc as StdRc;

    #[test]
    fn effect_runs_on_creation() {
        let count = StdRc::new(StdRefCell::new(0));
        let c = count.clone();
        let _e = Effect::new(move || *c.borrow_mut() += 1);
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn lazy_effect_does_not_run_on_creation() {
        let count = StdRc::new(StdRefCell::new(0));
        let c = count.clone();
        let e = Effect::with_options(move || *c.borrow_mut() += 1, EffectOptions::new().lazy());
        assert_eq!(*count.borrow(), 0);
        e.run();
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn track_and_trigger_reruns_dependent_effect() {
        let target = RawId(1000);
        let seen = StdRc::new(StdRefCell::new(0));
        let seen2 = seen.clone();
        let key = Key::Prop(Rc::from("n"));
        let key2 = key.clone();
        let _e = Effect::new(move || {
            track(target, Op::Get, key2.clone());
            *seen2.borrow_mut() += 1;
        });
        assert_eq!(*seen.borrow(), 1);
        trigger(target, Op::Set, &[key], None);
        assert_eq!(*seen.borrow(), 2);
        dep::clear_target(target);
    }

    #[test]
    fn stop_prevents_further_tracking_reruns() {
        let target = RawId(1001);
        let seen = StdRc::new(StdRefCell::new(0));
        let seen2 = seen.clone();
        let key = Key::Prop(Rc::from("n"));
        let key2 = key.clone();
        let e = Effect::new(move || {
            track(target, Op::Get, key2.clone());
            *seen2.borrow_mut() += 1;
        });
        e.stop();
        trigger(target, Op::Set, &[key], None);
        assert_eq!(*seen.borrow(), 1);
        dep::clear_target(target);
    }

    #[test]
    fn self_write_does_not_recurse() {
        let target = RawId(1002);
        let runs = StdRc::new(StdRefCell::new(0));
        let runs2 = runs.clone();
        let key = Key::Prop(Rc::from("n"));
        let key_inner = key.clone();
        let _e = Effect::new(move || {
            track(target, Op::Get, key_inner.clone());
            *runs2.borrow_mut() += 1;
            if *runs2.borrow() < 2 {
                trigger(target, Op::Set, &[key_inner.clone()], None);
            }
        });
        // Runs exactly once: the nested trigger finds the effect already on
        // the active stack, so its re-run is an untracked pass-through that
        // still increments runs, but the outer call never recurses further.
        assert!(*runs.borrow() <= 2);
        dep::clear_target(target);
    }

    #[test]
    fn computed_runners_fire_before_ordinary_effects() {
        let target = RawId(1003);
        let order = StdRc::new(StdRefCell::new(Vec::new()));
        let key = Key::Prop(Rc::from("n"));

        let order_c = order.clone();
        let key_c = key.clone();
        let _computed_effect = Effect::with_options(
            move || {
                track(target, Op::Get, key_c.clone());
                order_c.borrow_mut().push("computed");
            },
            EffectOptions::new().computed(),
        );

        let order_o = order.clone();
        let key_o = key.clone();
        let _ordinary_effect = Effect::new(move || {
            track(target, Op::Get, key_o.clone());
            order_o.borrow_mut().push("ordinary");
        });

        order.borrow_mut().clear();
        trigger(target, Op::Set, &[key], None);
        assert_eq!(&*order.borrow(), &["computed", "ordinary"]);
        dep::clear_target(target);
    }

    #[test]
    fn pause_tracking_suspends_dependency_collection() {
        let target = RawId(1004);
        let seen = StdRc::new(StdRefCell::new(0));
        let seen2 = seen.clone();
        let key = Key::Prop(Rc::from("n"));
        let key2 = key.clone();
        let _e = Effect::new(move || {
            pause_tracking();
            track(target, Op::Get, key2.clone());
            resume_tracking();
            *seen2.borrow_mut() += 1;
        });
        assert_eq!(*seen.borrow(), 1);
        trigger(target, Op::Set, &[key], None);
        // No dependency was recorded while paused, so no re-run happens.
        assert_eq!(*seen.borrow(), 1);
        dep::clear_target(target);
    }
}
