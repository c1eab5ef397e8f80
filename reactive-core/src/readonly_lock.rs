//! Process-wide readonly lock: when engaged, every readonly wrapper's
//! mutating methods become warn-and-no-op instead of forwarding to the
//! mutable implementation (§4.3).
//!
//! A plain `Copy` flag, so — unlike the dep/effect registries — this is a
//! true global `static`, same as `config::DEV_DIAGNOSTICS`.

use std::sync::atomic::{AtomicBool, Ordering};

static ENGAGED: AtomicBool = AtomicBool::new(false);

pub fn engage() {
    ENGAGED.store(true, Ordering::Relaxed);
}

pub fn disengage() {
    ENGAGED.store(false, Ordering::Relaxed);
}

pub fn is_engaged() -> bool {
    ENGAGED.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engage_and_disengage_round_trip() {
        disengage();
        assert!(!is_engaged());
        engage();
        assert!(is_engaged());
        disengage();
        assert!(!is_engaged());
    }
}
