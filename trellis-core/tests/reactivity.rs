//! Integration Tests for the Reactive System
//!
//! These tests verify that reactive objects, refs, computeds and effects
//! work together correctly.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use trellis_core::reactive::{
    computed, effect, effect_scope, reactive, readonly, unref, RawObject, Ref, Value,
};

fn counter() -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
    let count = Rc::new(Cell::new(0));
    (count.clone(), count)
}

/// Test the basic effect scenario: the log sees the initial and the new value.
#[test]
fn effect_logs_every_change() {
    let state = reactive(RawObject::from_pairs([("count", 0)]));
    let log = Rc::new(RefCell::new(Vec::new()));

    let (s, l) = (state.clone(), log.clone());
    let _runner = effect(move || l.borrow_mut().push(s.get("count")));
    state.set("count", 1);

    assert_eq!(*log.borrow(), vec![Value::from(0), Value::from(1)]);
}

/// Test that an effect only re-runs for the slots it read.
#[test]
fn effect_tracks_only_read_slots() {
    let state = reactive(RawObject::from_pairs([("s", 0), ("t", 0)]));
    let (runs, seen) = counter();

    let s = state.clone();
    let _runner = effect(move || {
        s.get("s");
        seen.set(seen.get() + 1);
    });
    assert_eq!(runs.get(), 1);

    state.set("t", 5);
    assert_eq!(runs.get(), 1);

    state.set("s", 5);
    assert_eq!(runs.get(), 2);
}

/// Test that branches no longer taken stop being tracked.
#[test]
fn conditional_dependencies_are_pruned() {
    let state = reactive(RawObject::from_pairs([
        ("cond", Value::from(true)),
        ("a", Value::from(1)),
        ("b", Value::from(2)),
    ]));
    let (runs, seen) = counter();

    let s = state.clone();
    let _runner = effect(move || {
        seen.set(seen.get() + 1);
        if s.get("cond").truthy() {
            s.get("a");
        } else {
            s.get("b");
        }
    });

    // `b` was never read.
    state.set("b", 20);
    assert_eq!(runs.get(), 1);

    // Flip to the other branch.
    state.set("cond", false);
    assert_eq!(runs.get(), 2);

    // `a` is no longer a dependency, `b` now is.
    state.set("a", 10);
    assert_eq!(runs.get(), 2);
    state.set("b", 30);
    assert_eq!(runs.get(), 3);
}

/// Test that re-running an effect does not grow its dependency set.
#[test]
fn reruns_keep_one_edge_per_dependency() {
    let state = reactive(RawObject::from_pairs([("x", 0), ("y", 0)]));
    let s = state.clone();
    let runner = effect(move || {
        s.get("x");
        s.get("y");
        s.get("x");
    });
    assert_eq!(runner.effect().dep_count(), 2);

    for i in 1..=10 {
        state.set("x", i);
    }
    assert_eq!(runner.effect().dep_count(), 2);
}

/// Test that assigning a plain value to a slot holding a ref writes
/// through the ref.
#[test]
fn assignment_preserves_nested_ref() {
    let state = reactive(RawObject::object());
    let counter = Ref::new(Value::from(1));
    state.set("x", Value::Ref(counter.clone()));

    state.set("x", 2);

    assert_eq!(unref(&Value::Ref(counter.clone())), Value::from(2));
    assert_eq!(counter.get(), Value::from(2));
    assert_eq!(state.get("x"), Value::from(2));
}

/// Test that wrapping the same object twice yields the same proxy.
#[test]
fn proxy_creation_is_idempotent() {
    let raw = RawObject::from_pairs([("a", 1)]);
    let first = reactive(&raw);
    let second = reactive(&raw);
    let nested = reactive(&first);

    assert!(first.ptr_eq(&second));
    assert!(first.ptr_eq(&nested));

    // Readonly is a distinct flavour of the same target.
    let frozen = readonly(&raw);
    assert!(!frozen.ptr_eq(&first));
    assert!(frozen.raw().ptr_eq(&raw));
}

/// Test that a computed is lazy and caches until a dependency changes.
#[test]
fn computed_is_lazy_and_cached() {
    let a = Ref::new(Value::from(1));
    let b = Ref::new(Value::from(2));
    let (calls, seen) = counter();

    let (a2, b2) = (a.clone(), b.clone());
    let sum = computed(move || {
        seen.set(seen.get() + 1);
        let a = a2.get().as_f64().unwrap_or(0.0);
        let b = b2.get().as_f64().unwrap_or(0.0);
        Value::from(a + b)
    });
    assert_eq!(calls.get(), 0);

    assert_eq!(sum.get(), Value::from(3));
    assert_eq!(sum.get(), Value::from(3));
    assert_eq!(calls.get(), 1);

    a.set(Value::from(10));
    assert_eq!(calls.get(), 1);
    assert_eq!(sum.get(), Value::from(12));
    assert_eq!(sum.get(), Value::from(12));
    assert_eq!(calls.get(), 2);
}

/// Test that an effect reading a computed re-runs when the computed's
/// inputs change.
#[test]
fn effect_through_computed() {
    let count = Ref::new(Value::from(1));
    let c = count.clone();
    let doubled = computed(move || Value::from(c.get().as_f64().unwrap_or(0.0) * 2.0));

    let log = Rc::new(RefCell::new(Vec::new()));
    let (d, l) = (doubled.clone(), log.clone());
    let _runner = effect(move || l.borrow_mut().push(d.get()));

    count.set(Value::from(5));
    assert_eq!(*log.borrow(), vec![Value::from(2), Value::from(10)]);
}

/// Test that stopping a scope stops every effect created inside it.
#[test]
fn scope_stop_cascades() {
    let state = reactive(RawObject::from_pairs([("n", 0)]));
    let (runs, seen) = counter();

    let scope = effect_scope(false);
    let s = state.clone();
    scope.run(|| {
        effect(move || {
            s.get("n");
            seen.set(seen.get() + 1);
        });
    });
    assert_eq!(runs.get(), 1);

    scope.stop();
    state.set("n", 1);
    assert_eq!(runs.get(), 1);
}

/// Test that nested objects read through a reactive handle are reactive too.
#[test]
fn nested_objects_are_reactive() {
    let inner = RawObject::from_pairs([("value", 1)]);
    let state = reactive(RawObject::from_pairs([("inner", Value::Object(inner))]));
    let (runs, seen) = counter();

    let s = state.clone();
    let _runner = effect(move || {
        if let Some(inner) = s.get("inner").as_proxy() {
            inner.get("value");
        }
        seen.set(seen.get() + 1);
    });

    let nested = state.get("inner");
    if let Some(proxy) = nested.as_proxy() {
        proxy.set("value", 2);
    }
    assert_eq!(runs.get(), 2);
}
