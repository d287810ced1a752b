//! Object and array behaviour of [`Reactive`].
//!
//! Reads track the key they touch and wrap nested objects on the way out.
//! Writes store raw values (never deep proxies), keep existing refs in
//! plain-object slots, and trigger only when something observable changed:
//! a new key triggers `Add`, a replaced value triggers `Set` unless the old
//! and new values are the same under [`same_value`].
//!
//! Identity-sensitive array searches retry with raw arguments, so looking
//! up a proxy finds the raw element stored in the array. Length-mutating
//! array methods run with tracking paused: they read `length` internally
//! and would otherwise subscribe the calling effect to the very key they
//! write.

use super::context::untracked;
use super::proxy::{is_readonly, is_shallow, to_raw, Reactive};
use super::runtime::{track, trigger, TrackOp, TriggerOp};
use super::value::{has_changed, PropKey, RawData, TargetKind, Value};

impl Reactive {
    fn normalize_key(&self, key: PropKey) -> PropKey {
        if self.kind() != TargetKind::Array {
            return match key {
                PropKey::Index(i) => PropKey::Name(i.to_string().into()),
                PropKey::Length => PropKey::Name("length".into()),
                PropKey::Item(Value::Str(name)) => PropKey::Name(name),
                other => other,
            };
        }
        match key {
            PropKey::Name(name) if &*name == "length" => PropKey::Length,
            PropKey::Name(name) => match name.parse::<usize>() {
                Ok(i) => PropKey::Index(i),
                Err(_) => PropKey::Name(name),
            },
            PropKey::Item(Value::Number(n)) if n >= 0.0 && n.fract() == 0.0 => PropKey::Index(n as usize),
            other => other,
        }
    }

    fn has_own(&self, key: &PropKey) -> bool {
        match (&*self.raw().data(), key) {
            (RawData::Object(map), PropKey::Name(name)) => map.contains_key(name),
            (RawData::Array(items), PropKey::Index(i)) => *i < items.len(),
            (RawData::Array(_), PropKey::Length) => true,
            _ => false,
        }
    }

    pub(super) fn base_get(&self, key: PropKey) -> Value {
        let key = self.normalize_key(key);
        let raw = self.raw();
        let res = raw.get(key.clone());

        if self.tracks() {
            track(raw, TrackOp::Get, key.clone());
        }
        if self.is_shallow() {
            return res;
        }
        if let Value::Ref(r) = &res {
            // Refs stored at array indices are returned as refs.
            let is_index = self.kind() == TargetKind::Array && matches!(key, PropKey::Index(_));
            return if is_index { res } else { r.get() };
        }
        self.wrap_nested(res)
    }

    pub(super) fn base_set(&self, key: PropKey, value: Value) -> bool {
        let key = self.normalize_key(key);
        if self.is_readonly() {
            self.warn_readonly(&key);
            return false;
        }
        let is_array = self.kind() == TargetKind::Array;
        if is_array {
            match key {
                PropKey::Length => {
                    let Some(len) = value.as_f64().filter(|n| *n >= 0.0 && n.fract() == 0.0) else {
                        crate::config::warn(format_args!("invalid array length {value:?}"));
                        return false;
                    };
                    return self.set_array_len(len as usize);
                }
                PropKey::Index(_) => {}
                _ => return false,
            }
        }

        let raw = self.raw();
        let mut old = raw.get(key.clone());
        let mut value = value;
        if !self.is_shallow() && !is_readonly(&value) {
            if !is_shallow(&value) {
                value = to_raw(&value);
                old = to_raw(&old);
            }
            if !is_array {
                if let (Value::Ref(existing), false) = (&old, value.is_ref()) {
                    existing.set(value);
                    return true;
                }
            }
        }

        let had_key = self.has_own(&key);
        raw.insert(key.clone(), value.clone());
        if !had_key {
            trigger(raw, TriggerOp::Add, Some(&key), Some(&value));
        } else if has_changed(&value, &old) {
            trigger(raw, TriggerOp::Set, Some(&key), Some(&value));
        }
        true
    }

    pub(super) fn base_delete(&self, key: PropKey) -> bool {
        let key = self.normalize_key(key);
        if self.is_readonly() {
            self.warn_readonly(&key);
            return false;
        }
        if !self.has_own(&key) {
            return false;
        }

        let raw = self.raw();
        match (&mut *raw.data_mut(), &key) {
            (RawData::Object(map), PropKey::Name(name)) => {
                map.shift_remove(name);
            }
            (RawData::Array(items), PropKey::Index(i)) => {
                // Deleting an index leaves a hole; the length is unchanged.
                items[*i] = Value::Undefined;
            }
            _ => return false,
        }
        trigger(raw, TriggerOp::Delete, Some(&key), None);
        true
    }

    pub(super) fn base_has(&self, key: PropKey) -> bool {
        let key = self.normalize_key(key);
        let result = self.has_own(&key);
        if self.tracks() {
            track(self.raw(), TrackOp::Has, key);
        }
        result
    }

    pub(super) fn own_keys(&self) -> Vec<Value> {
        let raw = self.raw();
        let is_array = self.kind() == TargetKind::Array;
        if self.tracks() {
            let key = if is_array { PropKey::Length } else { PropKey::Iterate };
            track(raw, TrackOp::Iterate, key);
        }
        match &*raw.data() {
            RawData::Object(map) => map.keys().map(|k| Value::Str(k.clone())).collect(),
            RawData::Array(items) => (0..items.len()).map(Value::from).collect(),
            _ => Vec::new(),
        }
    }

    // ------------------------------------------------------------------------
    // Arrays
    // ------------------------------------------------------------------------

    pub(super) fn array_len(&self) -> usize {
        if self.tracks() {
            track(self.raw(), TrackOp::Get, PropKey::Length);
        }
        self.raw().len()
    }

    fn set_array_len(&self, new_len: usize) -> bool {
        if self.is_readonly() {
            self.warn_readonly(&PropKey::Length);
            return false;
        }
        let raw = self.raw();
        {
            let mut data = raw.data_mut();
            let RawData::Array(items) = &mut *data else {
                return false;
            };
            if items.len() == new_len {
                return true;
            }
            items.resize(new_len, Value::Undefined);
        }
        trigger(raw, TriggerOp::Set, Some(&PropKey::Length), Some(&Value::from(new_len)));
        true
    }

    /// Sets the array length, truncating or padding with `Undefined`.
    pub fn set_len(&self, len: usize) -> bool {
        self.set_array_len(len)
    }

    /// All elements, tracking the length and every index.
    pub fn to_vec(&self) -> Vec<Value> {
        let len = self.array_len();
        (0..len).map(|i| self.base_get(PropKey::Index(i))).collect()
    }

    pub fn iter(&self) -> std::vec::IntoIter<Value> {
        self.to_vec().into_iter()
    }

    /// Appends `items`, returning the new length.
    pub fn push<I, V>(&self, items: I) -> usize
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        untracked(|| {
            for item in items {
                let len = self.raw().len();
                self.base_set(PropKey::Index(len), item.into());
            }
            self.raw().len()
        })
    }

    pub fn pop(&self) -> Value {
        untracked(|| {
            let len = self.raw().len();
            if len == 0 {
                return Value::Undefined;
            }
            let last = self.base_get(PropKey::Index(len - 1));
            self.set_array_len(len - 1);
            last
        })
    }

    pub fn shift(&self) -> Value {
        self.splice(0, 1, Vec::<Value>::new())
            .into_iter()
            .next()
            .unwrap_or_default()
    }

    /// Prepends `items`, returning the new length.
    pub fn unshift<I, V>(&self, items: I) -> usize
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.splice(0, 0, items);
        self.raw().len()
    }

    /// Removes `delete_count` elements at `start` and inserts `items` in
    /// their place. Returns the removed elements.
    pub fn splice<I, V>(&self, start: usize, delete_count: usize, items: I) -> Vec<Value>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        if self.is_readonly() {
            self.warn_readonly(&PropKey::Length);
            return Vec::new();
        }
        untracked(|| {
            let current = match &*self.raw().data() {
                RawData::Array(items) => items.clone(),
                _ => return Vec::new(),
            };
            let len = current.len();
            let start = start.min(len);
            let end = start.saturating_add(delete_count).min(len);

            let removed = current[start..end]
                .iter()
                .map(|v| self.wrap_nested(v.clone()))
                .collect();
            let mut next = current;
            next.splice(start..end, items.into_iter().map(Into::into));

            let new_len = next.len();
            for (i, value) in next.into_iter().enumerate() {
                self.base_set(PropKey::Index(i), value);
            }
            if new_len < len {
                self.set_array_len(new_len);
            }
            removed
        })
    }

    fn search(&self, needle: &Value, find: impl Fn(&[Value], &Value) -> Option<usize>) -> Option<usize> {
        if self.tracks() {
            let len = self.array_len();
            for i in 0..len {
                track(self.raw(), TrackOp::Get, PropKey::Index(i));
            }
        }
        let run = |needle: &Value| match &*self.raw().data() {
            RawData::Array(items) => find(items, needle),
            _ => None,
        };
        run(needle).or_else(|| {
            let raw_needle = to_raw(needle);
            if &raw_needle == needle {
                None
            } else {
                run(&raw_needle)
            }
        })
    }

    /// SameValueZero membership test.
    pub fn includes(&self, needle: &Value) -> bool {
        self.search(needle, |items, n| items.iter().position(|v| v == n))
            .is_some()
    }

    /// Strict-equality search from the front.
    pub fn index_of(&self, needle: &Value) -> Option<usize> {
        self.search(needle, |items, n| items.iter().position(|v| strict_eq(v, n)))
    }

    /// Strict-equality search from the back.
    pub fn last_index_of(&self, needle: &Value) -> Option<usize> {
        self.search(needle, |items, n| items.iter().rposition(|v| strict_eq(v, n)))
    }
}

fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y,
        _ => a == b,
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::reactive::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counter() -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
        let c = Rc::new(Cell::new(0));
        (c.clone(), c)
    }

    #[test]
    fn get_tracks_and_set_triggers() {
        let state = reactive(RawObject::from_pairs([("count", 0)]));
        let (runs, r) = counter();
        let s = state.clone();
        let _e = effect(move || {
            s.get("count");
            r.set(r.get() + 1);
        });

        state.set("count", 1);
        assert_eq!(runs.get(), 2);

        // Same value: no trigger.
        state.set("count", 1);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn nan_writes_do_not_retrigger() {
        let state = reactive(RawObject::from_pairs([("n", f64::NAN)]));
        let (runs, r) = counter();
        let s = state.clone();
        let _e = effect(move || {
            s.get("n");
            r.set(r.get() + 1);
        });
        state.set("n", f64::NAN);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn nested_objects_are_wrapped_lazily() {
        let inner = RawObject::from_pairs([("x", 1)]);
        let outer = reactive(RawObject::from_pairs([("inner", Value::Object(inner.clone()))]));

        let first = outer.get("inner");
        let second = outer.get("inner");
        assert!(is_reactive(&first));
        assert_eq!(first, second);
        assert_eq!(to_raw(&first), Value::Object(inner));
    }

    #[test]
    fn stores_raw_targets_not_proxies() {
        let child = RawObject::object();
        let parent = reactive(RawObject::object());
        parent.set("child", reactive(&child));
        assert_eq!(parent.raw().get("child"), Value::Object(child));
    }

    #[test]
    fn ref_slots_are_preserved() {
        let count = Ref::new(Value::from(1));
        let state = reactive(RawObject::from_pairs([("count", Value::Ref(count.clone()))]));

        assert_eq!(state.get("count"), Value::from(1));
        state.set("count", 5);
        assert_eq!(count.get_untracked(), Value::from(5));
        assert!(state.raw().get("count").is_ref());
    }

    #[test]
    fn adding_keys_triggers_iteration() {
        let state = reactive(RawObject::object());
        let (runs, r) = counter();
        let s = state.clone();
        let _e = effect(move || {
            s.keys();
            r.set(r.get() + 1);
        });

        state.set("a", 1);
        assert_eq!(runs.get(), 2);
        state.set("a", 2);
        assert_eq!(runs.get(), 2);
        state.delete("a");
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn has_tracks_membership() {
        let state = reactive(RawObject::object());
        let seen = Rc::new(Cell::new(false));
        let (s, out) = (state.clone(), seen.clone());
        let _e = effect(move || out.set(s.has("key")));

        assert!(!seen.get());
        state.set("key", true);
        assert!(seen.get());
    }

    #[test]
    fn readonly_rejects_writes() {
        let raw = RawObject::from_pairs([("a", 1)]);
        let view = readonly(&raw);
        assert!(!view.set("a", 2));
        assert!(!view.delete("a"));
        assert_eq!(raw.get("a"), Value::from(1));
    }

    #[test]
    fn readonly_view_of_reactive_tracks() {
        let state = reactive(RawObject::from_pairs([("a", 1)]));
        let view = readonly(&state);
        let seen = Rc::new(Cell::new(0.0));
        let (v, out) = (view.clone(), seen.clone());
        let _e = effect(move || out.set(v.get("a").as_f64().unwrap()));

        state.set("a", 2);
        assert_eq!(seen.get(), 2.0);
    }

    #[test]
    fn shallow_returns_nested_as_stored() {
        let inner = RawObject::object();
        let state = shallow_reactive(RawObject::from_pairs([("inner", Value::Object(inner.clone()))]));
        assert_eq!(state.get("inner"), Value::Object(inner));
    }

    #[test]
    fn invalid_length_leaves_array_intact() {
        crate::config::reset();
        let warnings = Rc::new(Cell::new(0));
        let w = warnings.clone();
        crate::config::configure(|cfg| cfg.warn_handler = Some(Rc::new(move |_: &str| w.set(w.get() + 1))));

        let list = reactive(RawObject::from_vec([1, 2, 3]));
        assert!(!list.set("length", f64::NAN));
        assert!(!list.set("length", -1));
        assert!(!list.set("length", 1.5));
        assert_eq!(list.len(), 3);
        assert_eq!(warnings.get(), 3);

        assert!(list.set("length", 1));
        assert_eq!(list.len(), 1);
        crate::config::reset();
    }

    #[test]
    fn index_write_past_end_triggers_length() {
        let list = reactive(RawObject::from_vec([1, 2]));
        let seen = Rc::new(Cell::new(0));
        let (l, out) = (list.clone(), seen.clone());
        let _e = effect(move || out.set(l.len()));

        list.set(4usize, 5);
        assert_eq!(seen.get(), 5);
    }

    #[test]
    fn truncation_triggers_dropped_indices() {
        let list = reactive(RawObject::from_vec([1, 2, 3]));
        let (runs, r) = counter();
        let l = list.clone();
        let _e = effect(move || {
            l.get(2usize);
            r.set(r.get() + 1);
        });

        list.set_len(1);
        assert_eq!(runs.get(), 2);
        assert!(list.get(2usize).is_undefined());
    }

    #[test]
    fn push_inside_effect_does_not_loop() {
        let list = reactive(RawObject::array());
        let l1 = list.clone();
        let _a = effect(move || {
            l1.push([1]);
        });
        let l2 = list.clone();
        let _b = effect(move || {
            l2.push([2]);
        });
        assert_eq!(list.raw().len(), 2);
    }

    #[test]
    fn splice_and_friends() {
        let list = reactive(RawObject::from_vec([1, 2, 3, 4]));
        let removed = list.splice(1, 2, [9]);
        assert_eq!(removed, vec![Value::from(2), Value::from(3)]);
        assert_eq!(list.to_vec(), vec![Value::from(1), Value::from(9), Value::from(4)]);

        assert_eq!(list.shift(), Value::from(1));
        assert_eq!(list.unshift([0]), 3);
        assert_eq!(list.pop(), Value::from(4));
        assert_eq!(list.to_vec(), vec![Value::from(0), Value::from(9)]);
    }

    #[test]
    fn identity_search_retries_with_raw() {
        let item = RawObject::object();
        let list = reactive(RawObject::from_vec([Value::Object(item.clone())]));
        let wrapped = Value::Proxy(reactive(&item));

        assert!(list.includes(&wrapped));
        assert_eq!(list.index_of(&wrapped), Some(0));
        assert_eq!(list.last_index_of(&Value::from(7)), None);
    }

    #[test]
    fn iteration_tracks_length() {
        let list = reactive(RawObject::from_vec([1]));
        let total = Rc::new(Cell::new(0.0));
        let (l, out) = (list.clone(), total.clone());
        let _e = effect(move || out.set(l.iter().filter_map(|v| v.as_f64()).sum()));

        list.push([2, 3]);
        assert_eq!(total.get(), 6.0);
    }
}
