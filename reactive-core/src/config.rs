//! Process-wide configuration.
//!
//! The only knob the engine itself has is whether development diagnostics
//! are active: `on_track`/`on_trigger` hook invocation, old/new-value
//! payloads on trigger events, and warnings on misuse (§7, §10.3 of
//! SPEC_FULL.md). It defaults to `cfg!(debug_assertions)`, forced on
//! unconditionally by the `dev-diagnostics` Cargo feature, and can be
//! overridden at runtime on top of either — which is what lets integration
//! tests exercise the dev-only code paths without a release/debug split.

use std::sync::atomic::{AtomicBool, Ordering};

static DEV_DIAGNOSTICS: AtomicBool =
    AtomicBool::new(cfg!(debug_assertions) || cfg!(feature = "dev-diagnostics"));

/// Returns whether dev-diagnostics (hooks, extra payload fields, warnings on
/// dev-only violations) are currently active.
pub fn dev_diagnostics() -> bool {
    DEV_DIAGNOSTICS.load(Ordering::Relaxed)
}

/// Explicitly enable or disable dev-diagnostics at runtime.
pub fn set_dev_diagnostics(enabled: bool) {
    DEV_DIAGNOSTICS.store(enabled, Ordering::Relaxed);
}
