//! Map and set behaviour of [`Reactive`].
//!
//! Collection entries are tracked by entry key. A lookup tries the key as
//! given and then its raw form, so a proxy and its raw target address the
//! same entry. Structural reads (`size`, iteration) track `Iterate`; map
//! key iteration tracks `MapKeyIterate`, which value replacement does not
//! trigger.
//!
//! Weak maps and sets hold their keys weakly and are not iterable.

use super::proxy::{to_raw, Reactive};
use super::runtime::{track, trigger, TrackOp, TriggerOp};
use super::value::{has_changed, PropKey, RawData, TargetKind, Value};
use crate::config;

impl Reactive {
    fn raw_contains(&self, key: &Value) -> bool {
        match &*self.raw().data() {
            RawData::Map(map) => map.contains_key(key),
            RawData::Set(set) => set.contains(key),
            RawData::WeakMap(map) => key
                .target_id()
                .and_then(|id| map.get(&id))
                .is_some_and(|(weak, _)| weak.upgrade().is_some()),
            RawData::WeakSet(set) => key
                .target_id()
                .and_then(|id| set.get(&id))
                .is_some_and(|weak| weak.upgrade().is_some()),
            _ => false,
        }
    }

    fn raw_entry(&self, key: &Value) -> Value {
        self.raw().get(PropKey::Item(key.clone()))
    }

    fn track_entry(&self, op: TrackOp, key: &Value, raw_key: &Value) {
        if !self.tracks() {
            return;
        }
        if key != raw_key {
            track(self.raw(), op, PropKey::Item(key.clone()));
        }
        track(self.raw(), op, PropKey::Item(raw_key.clone()));
    }

    fn wrap_entry(&self, value: Value) -> Value {
        self.wrap_nested(value)
    }

    fn check_identity_keys(&self, key: &Value) {
        let raw_key = to_raw(key);
        if &raw_key != key && self.raw_contains(&raw_key) {
            config::warn(format_args!(
                "reactive {:?} contains both the raw and reactive versions of the same object; \
                 this can lead to inconsistencies",
                self.kind()
            ));
        }
    }

    pub(super) fn collection_get(&self, key: Value) -> Value {
        let raw_key = to_raw(&key);
        self.track_entry(TrackOp::Get, &key, &raw_key);
        if self.raw_contains(&key) {
            self.wrap_entry(self.raw_entry(&key))
        } else if self.raw_contains(&raw_key) {
            self.wrap_entry(self.raw_entry(&raw_key))
        } else {
            Value::Undefined
        }
    }

    pub(super) fn collection_has(&self, key: Value) -> bool {
        let raw_key = to_raw(&key);
        self.track_entry(TrackOp::Has, &key, &raw_key);
        if key == raw_key {
            self.raw_contains(&key)
        } else {
            self.raw_contains(&key) || self.raw_contains(&raw_key)
        }
    }

    pub(super) fn collection_set(&self, key: Value, value: Value) -> bool {
        if self.is_readonly() {
            self.warn_readonly(&PropKey::Item(key));
            return false;
        }
        let value = to_raw(&value);
        let mut key = key;
        let mut had_key = self.raw_contains(&key);
        if !had_key {
            key = to_raw(&key);
            had_key = self.raw_contains(&key);
        } else {
            self.check_identity_keys(&key);
        }

        let old = self.raw_entry(&key);
        self.raw().insert(PropKey::Item(key.clone()), value.clone());
        let prop = PropKey::Item(key);
        if !had_key {
            trigger(self.raw(), TriggerOp::Add, Some(&prop), Some(&value));
        } else if has_changed(&value, &old) {
            trigger(self.raw(), TriggerOp::Set, Some(&prop), Some(&value));
        }
        true
    }

    /// Adds `value` to a set. Returns `false` when rejected.
    pub fn add(&self, value: impl Into<Value>) -> bool {
        let value = to_raw(&value.into());
        if self.is_readonly() {
            self.warn_readonly(&PropKey::Item(value));
            return false;
        }
        if !matches!(self.kind(), TargetKind::Set | TargetKind::WeakSet) {
            return false;
        }
        if !self.raw_contains(&value) {
            self.raw().insert(PropKey::Item(value.clone()), value.clone());
            let prop = PropKey::Item(value.clone());
            trigger(self.raw(), TriggerOp::Add, Some(&prop), Some(&value));
        }
        true
    }

    pub(super) fn collection_delete(&self, key: Value) -> bool {
        if self.is_readonly() {
            self.warn_readonly(&PropKey::Item(key));
            return false;
        }
        let mut key = key;
        let mut had_key = self.raw_contains(&key);
        if !had_key {
            key = to_raw(&key);
            had_key = self.raw_contains(&key);
        } else {
            self.check_identity_keys(&key);
        }
        if !had_key {
            return false;
        }

        match &mut *self.raw().data_mut() {
            RawData::Map(map) => {
                map.shift_remove(&key);
            }
            RawData::Set(set) => {
                set.shift_remove(&key);
            }
            RawData::WeakMap(map) => {
                if let Some(id) = key.target_id() {
                    map.shift_remove(&id);
                }
            }
            RawData::WeakSet(set) => {
                if let Some(id) = key.target_id() {
                    set.shift_remove(&id);
                }
            }
            _ => return false,
        }
        trigger(self.raw(), TriggerOp::Delete, Some(&PropKey::Item(key)), None);
        true
    }

    /// Removes every entry, triggering all tracked keys.
    pub fn clear(&self) -> bool {
        if self.is_readonly() {
            self.warn_readonly(&PropKey::Iterate);
            return false;
        }
        if self.kind() == TargetKind::Array {
            return self.set_len(0);
        }
        let had_items = self.raw().len() != 0;
        match &mut *self.raw().data_mut() {
            RawData::Map(map) => map.clear(),
            RawData::Set(set) => set.clear(),
            RawData::WeakMap(map) => map.clear(),
            RawData::WeakSet(set) => set.clear(),
            RawData::Object(map) => map.clear(),
            RawData::Array(_) => {}
        }
        if had_items {
            trigger(self.raw(), TriggerOp::Clear, None, None);
        }
        true
    }

    /// Number of entries, tracking iteration.
    pub fn size(&self) -> usize {
        if self.tracks() {
            track(self.raw(), TrackOp::Iterate, PropKey::Iterate);
        }
        self.raw().len()
    }

    pub(super) fn collection_keys(&self) -> Vec<Value> {
        if self.tracks() {
            let key = if self.kind() == TargetKind::Map {
                PropKey::MapKeyIterate
            } else {
                PropKey::Iterate
            };
            track(self.raw(), TrackOp::Iterate, key);
        }
        let keys: Vec<Value> = match &*self.raw().data() {
            RawData::Map(map) => map.keys().cloned().collect(),
            RawData::Set(set) => set.iter().cloned().collect(),
            _ => Vec::new(),
        };
        keys.into_iter().map(|k| self.wrap_entry(k)).collect()
    }

    pub(super) fn collection_values(&self) -> Vec<Value> {
        self.entries().into_iter().map(|(_, v)| v).collect()
    }

    /// `(key, value)` pairs in insertion order; sets yield `(v, v)`.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        if self.tracks() {
            track(self.raw(), TrackOp::Iterate, PropKey::Iterate);
        }
        let pairs: Vec<(Value, Value)> = match &*self.raw().data() {
            RawData::Map(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            RawData::Set(set) => set.iter().map(|v| (v.clone(), v.clone())).collect(),
            _ => Vec::new(),
        };
        pairs
            .into_iter()
            .map(|(k, v)| (self.wrap_entry(k), self.wrap_entry(v)))
            .collect()
    }

    /// Calls `f(value, key)` for each entry.
    pub fn for_each(&self, mut f: impl FnMut(&Value, &Value)) {
        for (k, v) in self.entries() {
            f(&v, &k);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::reactive::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn map_get_and_set() {
        let map = reactive(RawObject::map());
        let seen = Rc::new(Cell::new(0.0));
        let (m, out) = (map.clone(), seen.clone());
        let _e = effect(move || out.set(m.get("a").as_f64().unwrap_or(-1.0)));

        assert_eq!(seen.get(), -1.0);
        map.set("a", 3);
        assert_eq!(seen.get(), 3.0);
    }

    #[test]
    fn value_replacement_skips_key_iteration() {
        let map = reactive(RawObject::map());
        map.set("a", 1);

        let key_runs = Rc::new(Cell::new(0));
        let entry_runs = Rc::new(Cell::new(0));
        let (m1, k) = (map.clone(), key_runs.clone());
        let _keys = effect(move || {
            m1.keys();
            k.set(k.get() + 1);
        });
        let (m2, e) = (map.clone(), entry_runs.clone());
        let _entries = effect(move || {
            m2.entries();
            e.set(e.get() + 1);
        });

        map.set("a", 2);
        assert_eq!(key_runs.get(), 1);
        assert_eq!(entry_runs.get(), 2);

        map.set("b", 1);
        assert_eq!(key_runs.get(), 2);
        assert_eq!(entry_runs.get(), 3);
    }

    #[test]
    fn set_add_and_delete() {
        let set = reactive(RawObject::set());
        let size = Rc::new(Cell::new(0));
        let (s, out) = (set.clone(), size.clone());
        let _e = effect(move || out.set(s.size()));

        set.add(1);
        set.add(1);
        assert_eq!(size.get(), 1);
        assert!(set.has(Value::from(1)));
        set.delete(Value::from(1));
        assert_eq!(size.get(), 0);
    }

    #[test]
    fn proxy_and_raw_keys_address_same_entry() {
        let key = RawObject::object();
        let map = reactive(RawObject::map());
        map.set(Value::Proxy(reactive(&key)), "v");

        assert_eq!(map.get(Value::Object(key.clone())), Value::from("v"));
        assert!(map.has(Value::Proxy(reactive(&key))));
        assert_eq!(map.raw().len(), 1);
    }

    #[test]
    fn clear_triggers_everything() {
        let map = reactive(RawObject::map());
        map.set("a", 1);
        let runs = Rc::new(Cell::new(0));
        let (m, r) = (map.clone(), runs.clone());
        let _e = effect(move || {
            m.get("a");
            r.set(r.get() + 1);
        });

        map.clear();
        assert_eq!(runs.get(), 2);
        // Clearing an empty collection is silent.
        map.clear();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn weak_map_holds_keys_weakly() {
        let map = reactive(RawObject::weak_map());
        let key = RawObject::object();
        map.set(Value::Object(key.clone()), 1);
        assert!(map.has(Value::Object(key.clone())));
        let probe = Value::Object(key);
        assert_eq!(map.get(probe), Value::from(1));
    }

    #[test]
    fn readonly_collections_reject_mutation() {
        let raw = RawObject::set();
        let view = readonly(&raw);
        assert!(!view.add(1));
        assert!(!view.clear());
        assert!(raw.is_empty());
    }

    #[test]
    fn for_each_wraps_values() {
        let inner = RawObject::object();
        let map = reactive(RawObject::map());
        map.set("k", Value::Object(inner));
        let mut wrapped = false;
        map.for_each(|v, k| {
            assert_eq!(k, &Value::from("k"));
            wrapped = is_reactive(v);
        });
        assert!(wrapped);
    }
}
