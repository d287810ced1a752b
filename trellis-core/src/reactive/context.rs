//! Reactive Context
//!
//! The reactive context tracks which effect is currently running, so that
//! reads performed during the run can register that effect as a
//! subscriber.
//!
//! # Implementation
//!
//! A thread-local [`TrackingState`] records:
//!
//! - the active effect and the stack of effects currently running, which
//!   guards against an effect re-entering itself;
//! - the `should_track` flag plus a stack of saved values, toggled by
//!   [`pause_tracking`], [`enable_tracking`] and [`reset_tracking`];
//! - the nesting depth of effect runs and the marker bit `1 << depth` used
//!   by [`Dep`](super::Dep) bookkeeping.
//!
//! Entering a run returns a [`ReactiveContext`] guard. Dropping the guard
//! finalizes the dep markers and restores the outer state, even if the
//! effect function panics.

use std::cell::{Cell, RefCell};

use super::effect::{cleanup_effect, finalize_dep_markers, init_dep_markers, ReactiveEffect};
use super::subscriber::SubscriberId;
use crate::config;

struct TrackingState {
    active_effect: RefCell<Option<ReactiveEffect>>,
    effect_stack: RefCell<Vec<SubscriberId>>,
    should_track: Cell<bool>,
    track_stack: RefCell<Vec<bool>>,
    depth: Cell<u32>,
    track_op_bit: Cell<u32>,
}

thread_local! {
    static TRACKING: TrackingState = TrackingState {
        active_effect: RefCell::new(None),
        effect_stack: RefCell::new(Vec::new()),
        should_track: Cell::new(true),
        track_stack: RefCell::new(Vec::new()),
        depth: Cell::new(0),
        track_op_bit: Cell::new(1),
    };
}

/// Largest depth at which marker bits are still used.
pub(crate) fn max_marker_bits() -> u32 {
    config::with_config(|cfg| cfg.max_marker_bits).min(30)
}

/// Guard for one effect run; restores the outer context when dropped.
pub struct ReactiveContext {
    effect: ReactiveEffect,
    prev_effect: Option<ReactiveEffect>,
    prev_should_track: bool,
}

impl ReactiveContext {
    /// Makes `effect` the active effect and starts a tracking pass.
    pub fn enter(effect: &ReactiveEffect) -> Self {
        let (prev_effect, prev_should_track, depth) = TRACKING.with(|state| {
            state.effect_stack.borrow_mut().push(effect.id());
            let prev_effect = state.active_effect.replace(Some(effect.clone()));
            let prev_should_track = state.should_track.replace(true);
            let depth = state.depth.get() + 1;
            state.depth.set(depth);
            state.track_op_bit.set(1u32.checked_shl(depth).unwrap_or(0));
            (prev_effect, prev_should_track, depth)
        });

        if depth <= max_marker_bits() {
            init_dep_markers(effect);
        } else {
            cleanup_effect(effect);
        }

        Self {
            effect: effect.clone(),
            prev_effect,
            prev_should_track,
        }
    }

    /// The currently active effect, if any.
    pub fn current() -> Option<ReactiveEffect> {
        active_effect()
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        if track_depth() <= max_marker_bits() {
            finalize_dep_markers(&self.effect);
        }

        let popped = TRACKING.with(|state| {
            let depth = state.depth.get().saturating_sub(1);
            state.depth.set(depth);
            state.track_op_bit.set(1u32.checked_shl(depth).unwrap_or(0));
            state.active_effect.replace(self.prev_effect.take());
            state.should_track.set(self.prev_should_track);
            state.effect_stack.borrow_mut().pop()
        });

        debug_assert_eq!(
            popped,
            Some(self.effect.id()),
            "ReactiveContext mismatch: expected {:?}, got {:?}",
            self.effect.id(),
            popped
        );

        if self.effect.take_deferred_stop() {
            self.effect.stop();
        }
    }
}

/// The effect whose run is in progress, if any.
pub fn active_effect() -> Option<ReactiveEffect> {
    TRACKING.with(|state| state.active_effect.borrow().clone())
}

pub(crate) fn is_active_effect(effect: &ReactiveEffect) -> bool {
    TRACKING.with(|state| {
        state
            .active_effect
            .borrow()
            .as_ref()
            .is_some_and(|active| active.ptr_eq(effect))
    })
}

/// Whether `id` is somewhere on the stack of running effects.
pub(crate) fn is_running(id: SubscriberId) -> bool {
    TRACKING.with(|state| state.effect_stack.borrow().contains(&id))
}

/// True when a read right now would record a dependency.
pub fn is_tracking() -> bool {
    TRACKING.with(|state| state.should_track.get() && state.active_effect.borrow().is_some())
}

pub(crate) fn track_depth() -> u32 {
    TRACKING.with(|state| state.depth.get())
}

pub(crate) fn track_op_bit() -> u32 {
    TRACKING.with(|state| state.track_op_bit.get())
}

/// Suspends dependency collection until the matching [`reset_tracking`].
pub fn pause_tracking() {
    TRACKING.with(|state| {
        let prev = state.should_track.replace(false);
        state.track_stack.borrow_mut().push(prev);
    });
}

/// Forces dependency collection on until the matching [`reset_tracking`].
pub fn enable_tracking() {
    TRACKING.with(|state| {
        let prev = state.should_track.replace(true);
        state.track_stack.borrow_mut().push(prev);
    });
}

/// Restores the tracking flag saved by the last pause/enable call.
pub fn reset_tracking() {
    TRACKING.with(|state| {
        let last = state.track_stack.borrow_mut().pop();
        state.should_track.set(last.unwrap_or(true));
    });
}

/// Runs `f` without collecting dependencies.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    struct Restore;
    impl Drop for Restore {
        fn drop(&mut self) {
            reset_tracking();
        }
    }

    pause_tracking();
    let _restore = Restore;
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_tracks_active_effect() {
        let effect = ReactiveEffect::new(|| {});

        assert!(active_effect().is_none());
        assert!(!is_tracking());

        {
            let _ctx = ReactiveContext::enter(&effect);
            assert!(is_active_effect(&effect));
            assert!(is_running(effect.id()));
            assert!(is_tracking());
            assert_eq!(track_depth(), 1);
            assert_eq!(track_op_bit(), 1 << 1);
        }

        assert!(active_effect().is_none());
        assert_eq!(track_depth(), 0);
        assert_eq!(track_op_bit(), 1);
    }

    #[test]
    fn nested_contexts() {
        let outer = ReactiveEffect::new(|| {});
        let inner = ReactiveEffect::new(|| {});

        {
            let _ctx1 = ReactiveContext::enter(&outer);
            {
                let _ctx2 = ReactiveContext::enter(&inner);
                assert!(is_active_effect(&inner));
                assert!(is_running(outer.id()));
                assert_eq!(track_op_bit(), 1 << 2);
            }
            assert!(is_active_effect(&outer));
            assert!(!is_running(inner.id()));
        }

        assert!(active_effect().is_none());
    }

    #[test]
    fn pause_and_reset_nest() {
        let effect = ReactiveEffect::new(|| {});
        let _ctx = ReactiveContext::enter(&effect);

        pause_tracking();
        assert!(!is_tracking());
        enable_tracking();
        assert!(is_tracking());
        reset_tracking();
        assert!(!is_tracking());
        reset_tracking();
        assert!(is_tracking());

        let inside = untracked(is_tracking);
        assert!(!inside);
        assert!(is_tracking());
    }
}
