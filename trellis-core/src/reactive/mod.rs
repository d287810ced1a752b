//! Reactive Primitives
//!
//! This module implements fine-grained dependency tracking: effects,
//! reactive objects, refs and computed values.
//!
//! # Concepts
//!
//! ## Deps and Effects
//!
//! A [`Dep`] is the subscriber set of one reactive slot (one key of one
//! object, or one ref). A [`ReactiveEffect`] is a function that re-runs when
//! a dep it read during its last run is triggered. Each run re-derives the
//! effect's deps incrementally, so branches no longer taken stop being
//! tracked.
//!
//! ## Reactive Objects
//!
//! Plain data is never reactive. A [`RawObject`] (object, array, map, set,
//! weak map, weak set) becomes reactive when accessed through a
//! [`Reactive`] handle, which calls [`track`] on reads and [`trigger`] on
//! writes. Handles come in four flavours: deep or shallow, mutable or
//! readonly. Each raw object has at most one handle per flavour.
//!
//! ## Refs and Computeds
//!
//! A [`Ref`] holds a single value and owns one dep. A [`Computed`] caches
//! a derivation and recomputes it lazily after its inputs change.
//!
//! ## Scopes
//!
//! An [`EffectScope`] collects the effects created while it is active so
//! they can be stopped together.
//!
//! # Implementation Notes
//!
//! All bookkeeping is thread-local. Dependency edges are strong from dep to
//! effect and weak from effect to dep; the `target → key → dep` table is
//! cleared for a target when the target is dropped.

mod collection;
mod computed;
mod context;
mod deferred;
mod dep;
mod effect;
mod handlers;
mod proxy;
mod refs;
mod runtime;
mod scope;
mod subscriber;
mod value;

pub use computed::{computed, computed_writable, Computed};
pub use context::{active_effect, enable_tracking, is_tracking, pause_tracking, reset_tracking, untracked, ReactiveContext};
pub use deferred::{deferred_computed, DeferredComputed};
pub use dep::Dep;
pub use effect::{
    effect, effect_with, stop, track_effects, trigger_effects, EffectOptions, EffectRunner, EffectScheduler,
    ReactiveEffect, WeakEffect,
};
pub use proxy::{
    is_proxy, is_reactive, is_readonly, is_shallow, mark_raw, reactive, readonly, shallow_reactive,
    shallow_readonly, to_raw, to_reactive, to_readonly, ProxySource, Reactive,
};
pub use refs::{
    custom_ref, is_ref, shallow_ref, to_ref, to_ref_with_default, to_refs, trigger_ref, unref, Ref, RefTracker,
    Trackable,
};
pub(crate) use refs::{track_ref_value, trigger_ref_value};
pub use runtime::{get_dep, track, tracked_key_count, trigger, TrackOp, TriggerOp};
pub use scope::{effect_scope, get_current_scope, on_scope_dispose, EffectScope};
pub use subscriber::{SubscriberId, TargetId};
pub use value::{has_changed, same_value, PropKey, RawObject, TargetKind, Value};
