//! Reactive Runtime
//!
//! The runtime owns the dependency map: `target → key → Dep`. Proxies call
//! [`track`] on reads and [`trigger`] on writes.
//!
//! # How It Works
//!
//! 1. A tracked read looks up (or creates) the dep for `(target, key)` and
//!    subscribes the active effect to it.
//!
//! 2. A write collects every dep that may observe the change:
//!    a. the dep for the written key;
//!    b. `Iterate` (and `MapKeyIterate` for maps) when keys are added or
//!       deleted, or when a map value is replaced;
//!    c. `Length` when an array grows through an index write;
//!    d. for an array length write, `Length` plus every index at or past
//!       the new length.
//!
//! 3. The collected effects are deduplicated and notified, computed-backed
//!    effects first.
//!
//! The map is thread-local; a target's entry is removed when the target
//! itself is dropped.

use std::cell::RefCell;
use std::collections::HashMap;

use indexmap::IndexMap;

use super::context;
use super::dep::Dep;
use super::effect::{track_effects, trigger_effects};
use super::subscriber::TargetId;
use super::value::{PropKey, RawObject, TargetKind, Value};

/// Kind of read being tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOp {
    Get,
    Has,
    Iterate,
}

/// Kind of write being triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOp {
    Set,
    Add,
    Delete,
    Clear,
}

type KeyToDepMap = HashMap<PropKey, Dep>;

thread_local! {
    static TARGET_MAP: RefCell<HashMap<TargetId, KeyToDepMap>> = RefCell::new(HashMap::new());
}

/// Records that the active effect read `key` of `target`.
pub fn track(target: &RawObject, op: TrackOp, key: PropKey) {
    if !context::is_tracking() {
        return;
    }
    tracing::trace!(target = target.id().as_u64(), ?op, %key, "track");

    let dep = TARGET_MAP.with(|map| {
        map.borrow_mut()
            .entry(target.id())
            .or_default()
            .entry(key)
            .or_default()
            .clone()
    });
    track_effects(&dep);
}

/// Notifies effects that depend on `key` of `target`.
///
/// `new_value` is only consulted for array length writes.
pub fn trigger(target: &RawObject, op: TriggerOp, key: Option<&PropKey>, new_value: Option<&Value>) {
    let deps = TARGET_MAP.with(|map| {
        let map = map.borrow();
        match map.get(&target.id()) {
            Some(dep_map) => collect_deps(dep_map, target.kind(), op, key, new_value),
            None => Vec::new(),
        }
    });
    if deps.is_empty() {
        return;
    }
    tracing::trace!(target = target.id().as_u64(), ?op, deps = deps.len(), "trigger");

    if let [dep] = deps.as_slice() {
        trigger_effects(dep.effects());
        return;
    }

    let mut effects = IndexMap::new();
    for dep in &deps {
        for effect in dep.effects() {
            effects.entry(effect.id()).or_insert(effect);
        }
    }
    trigger_effects(effects.into_values().collect());
}

fn collect_deps(
    dep_map: &KeyToDepMap,
    kind: TargetKind,
    op: TriggerOp,
    key: Option<&PropKey>,
    new_value: Option<&Value>,
) -> Vec<Dep> {
    let is_array = kind == TargetKind::Array;
    let is_map = kind.is_map_like();

    if op == TriggerOp::Clear {
        // Every key of the collection changes.
        return dep_map.values().cloned().collect();
    }

    if is_array && key == Some(&PropKey::Length) {
        let new_len = new_value.and_then(Value::as_f64).unwrap_or(0.0) as usize;
        return dep_map
            .iter()
            .filter(|(k, _)| match k {
                PropKey::Length => true,
                PropKey::Index(i) => *i >= new_len,
                _ => false,
            })
            .map(|(_, dep)| dep.clone())
            .collect();
    }

    let mut deps = Vec::new();
    let mut push = |k: &PropKey| {
        if let Some(dep) = dep_map.get(k) {
            deps.push(dep.clone());
        }
    };

    if let Some(key) = key {
        push(key);
    }

    match op {
        TriggerOp::Add => {
            if !is_array {
                push(&PropKey::Iterate);
                if is_map {
                    push(&PropKey::MapKeyIterate);
                }
            } else if matches!(key, Some(PropKey::Index(_))) {
                push(&PropKey::Length);
            }
        }
        TriggerOp::Delete => {
            if !is_array {
                push(&PropKey::Iterate);
                if is_map {
                    push(&PropKey::MapKeyIterate);
                }
            }
        }
        TriggerOp::Set => {
            if is_map {
                push(&PropKey::Iterate);
            }
        }
        TriggerOp::Clear => {}
    }
    deps
}

/// The dep for `key` of `target`, if any effect ever tracked it.
pub fn get_dep(target: &RawObject, key: &PropKey) -> Option<Dep> {
    TARGET_MAP.with(|map| map.borrow().get(&target.id()).and_then(|deps| deps.get(key).cloned()))
}

/// Number of keys with a dep on `target`.
pub fn tracked_key_count(target: &RawObject) -> usize {
    TARGET_MAP.with(|map| map.borrow().get(&target.id()).map_or(0, HashMap::len))
}

pub(crate) fn forget_target(id: TargetId) {
    let _ = TARGET_MAP.try_with(|map| {
        if let Ok(mut map) = map.try_borrow_mut() {
            map.remove(&id);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counting_effect(target: &RawObject, key: PropKey) -> (Rc<Cell<usize>>, crate::reactive::EffectRunner) {
        let runs = Rc::new(Cell::new(0));
        let (r, t) = (runs.clone(), target.clone());
        let runner = effect(move || {
            r.set(r.get() + 1);
            track(&t, TrackOp::Get, key.clone());
        });
        (runs, runner)
    }

    #[test]
    fn trigger_reaches_tracked_key() {
        let target = RawObject::object();
        let (runs, _runner) = counting_effect(&target, PropKey::from("a"));

        trigger(&target, TriggerOp::Set, Some(&PropKey::from("a")), None);
        assert_eq!(runs.get(), 2);

        trigger(&target, TriggerOp::Set, Some(&PropKey::from("b")), None);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn add_triggers_iteration() {
        let target = RawObject::object();
        let (runs, _runner) = counting_effect(&target, PropKey::Iterate);

        trigger(&target, TriggerOp::Add, Some(&PropKey::from("new")), None);
        assert_eq!(runs.get(), 2);

        // Replacing a value on a plain object leaves iteration untouched.
        trigger(&target, TriggerOp::Set, Some(&PropKey::from("new")), None);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn map_set_triggers_iteration() {
        let target = RawObject::map();
        let (runs, _runner) = counting_effect(&target, PropKey::Iterate);
        trigger(&target, TriggerOp::Set, Some(&PropKey::Item(Value::from(1))), None);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn length_write_hits_truncated_indices() {
        let target = RawObject::from_vec([1, 2, 3]);
        let (low, _r1) = counting_effect(&target, PropKey::Index(0));
        let (high, _r2) = counting_effect(&target, PropKey::Index(2));

        trigger(&target, TriggerOp::Set, Some(&PropKey::Length), Some(&Value::from(1)));
        assert_eq!(low.get(), 1);
        assert_eq!(high.get(), 2);
    }

    #[test]
    fn untracked_reads_create_no_deps() {
        let target = RawObject::object();
        track(&target, TrackOp::Get, PropKey::from("a"));
        assert_eq!(tracked_key_count(&target), 0);
    }

    #[test]
    fn dropping_target_clears_entry() {
        let target = RawObject::object();
        let id = target.id();
        let (_runs, runner) = counting_effect(&target, PropKey::from("a"));
        assert_eq!(tracked_key_count(&target), 1);

        // The effect closure holds a handle too, and the dep holds the
        // effect until it stops.
        runner.stop();
        drop(runner);
        drop(target);
        assert!(TARGET_MAP.with(|map| !map.borrow().contains_key(&id)));
    }
}
