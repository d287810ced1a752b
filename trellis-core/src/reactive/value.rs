//! Dynamic Values and Raw Targets
//!
//! Reactive proxies wrap *raw targets*: shared, mutable containers that
//! hold [`Value`]s. A target is one of six kinds: plain object, array, map,
//! set, weak map or weak set.
//!
//! # Identity
//!
//! Every raw target has a [`TargetId`]. Two [`Value::Object`]s are equal
//! only when they are the same target, matching reference semantics.
//! Numbers compare with SameValueZero (`NaN` equals `NaN`, `+0` equals
//! `-0`) for map and set keys, while change detection uses
//! [`same_value`], which also tells `+0` and `-0` apart.
//!
//! # Side Tables
//!
//! The dep map and the proxy caches are keyed by `TargetId`. When the last
//! handle to a target drops, its dep-map entry is removed.

use std::cell::{Cell, Ref as CellRef, RefCell, RefMut};
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use indexmap::{IndexMap, IndexSet};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use super::proxy::Reactive;
use super::refs::Ref;
use super::runtime;
use super::subscriber::TargetId;

/// The six kinds of raw target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Object,
    Array,
    Map,
    Set,
    WeakMap,
    WeakSet,
}

impl TargetKind {
    pub fn is_collection(self) -> bool {
        matches!(
            self,
            TargetKind::Map | TargetKind::Set | TargetKind::WeakMap | TargetKind::WeakSet
        )
    }

    pub fn is_map_like(self) -> bool {
        matches!(self, TargetKind::Map | TargetKind::WeakMap)
    }
}

pub(crate) enum RawData {
    Object(IndexMap<Rc<str>, Value>),
    Array(Vec<Value>),
    Map(IndexMap<Value, Value>),
    Set(IndexSet<Value>),
    WeakMap(IndexMap<TargetId, (WeakRaw, Value)>),
    WeakSet(IndexMap<TargetId, WeakRaw>),
}

impl RawData {
    fn kind(&self) -> TargetKind {
        match self {
            RawData::Object(_) => TargetKind::Object,
            RawData::Array(_) => TargetKind::Array,
            RawData::Map(_) => TargetKind::Map,
            RawData::Set(_) => TargetKind::Set,
            RawData::WeakMap(_) => TargetKind::WeakMap,
            RawData::WeakSet(_) => TargetKind::WeakSet,
        }
    }
}

struct RawCell {
    id: TargetId,
    kind: TargetKind,
    data: RefCell<RawData>,
    skip: Cell<bool>,
}

impl Drop for RawCell {
    fn drop(&mut self) {
        runtime::forget_target(self.id);
    }
}

/// A shared raw target.
#[derive(Clone)]
pub struct RawObject(Rc<RawCell>);

/// Non-owning handle used by weak collections.
#[derive(Clone)]
pub(crate) struct WeakRaw(Weak<RawCell>);

impl WeakRaw {
    pub(crate) fn upgrade(&self) -> Option<RawObject> {
        self.0.upgrade().map(RawObject)
    }
}

impl RawObject {
    fn with_data(data: RawData) -> Self {
        Self(Rc::new(RawCell {
            id: TargetId::new(),
            kind: data.kind(),
            data: RefCell::new(data),
            skip: Cell::new(false),
        }))
    }

    pub fn object() -> Self {
        Self::with_data(RawData::Object(IndexMap::new()))
    }

    pub fn array() -> Self {
        Self::with_data(RawData::Array(Vec::new()))
    }

    pub fn map() -> Self {
        Self::with_data(RawData::Map(IndexMap::new()))
    }

    pub fn set() -> Self {
        Self::with_data(RawData::Set(IndexSet::new()))
    }

    pub fn weak_map() -> Self {
        Self::with_data(RawData::WeakMap(IndexMap::new()))
    }

    pub fn weak_set() -> Self {
        Self::with_data(RawData::WeakSet(IndexMap::new()))
    }

    /// A plain object holding `entries`.
    pub fn from_pairs<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Rc<str>>,
        V: Into<Value>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::with_data(RawData::Object(map))
    }

    /// An array holding `items`.
    pub fn from_vec<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::with_data(RawData::Array(items.into_iter().map(Into::into).collect()))
    }

    pub fn id(&self) -> TargetId {
        self.0.id
    }

    pub fn kind(&self) -> TargetKind {
        self.0.kind
    }

    /// Excludes this target from reactive wrapping when it is reached
    /// through another proxy or converted from a [`Value`].
    pub fn mark_raw(&self) -> &Self {
        self.0.skip.set(true);
        self
    }

    pub fn is_marked_raw(&self) -> bool {
        self.0.skip.get()
    }

    pub fn ptr_eq(&self, other: &RawObject) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn downgrade(&self) -> WeakRaw {
        WeakRaw(Rc::downgrade(&self.0))
    }

    pub(crate) fn data(&self) -> CellRef<'_, RawData> {
        self.0.data.borrow()
    }

    pub(crate) fn data_mut(&self) -> RefMut<'_, RawData> {
        self.0.data.borrow_mut()
    }

    /// Reads `key` without tracking.
    pub fn get(&self, key: impl Into<PropKey>) -> Value {
        let key = key.into();
        match &*self.data() {
            RawData::Object(map) => match &key {
                PropKey::Name(name) => map.get(name).cloned().unwrap_or_default(),
                PropKey::Index(i) => map.get(i.to_string().as_str()).cloned().unwrap_or_default(),
                _ => Value::Undefined,
            },
            RawData::Array(items) => match &key {
                PropKey::Index(i) => items.get(*i).cloned().unwrap_or_default(),
                PropKey::Length => Value::Number(items.len() as f64),
                _ => Value::Undefined,
            },
            RawData::Map(map) => map.get(&key.into_value()).cloned().unwrap_or_default(),
            RawData::WeakMap(map) => key
                .into_value()
                .target_id()
                .and_then(|id| map.get(&id))
                .filter(|(weak, _)| weak.upgrade().is_some())
                .map(|(_, v)| v.clone())
                .unwrap_or_default(),
            RawData::Set(_) | RawData::WeakSet(_) => Value::Undefined,
        }
    }

    /// Writes `key` without triggering. Intended for initialising targets
    /// before they are shared.
    pub fn insert(&self, key: impl Into<PropKey>, value: impl Into<Value>) {
        let (key, value) = (key.into(), value.into());
        match &mut *self.data_mut() {
            RawData::Object(map) => {
                map.insert(key.to_name(), value);
            }
            RawData::Array(items) => {
                if let PropKey::Index(i) = key {
                    if i >= items.len() {
                        items.resize(i + 1, Value::Undefined);
                    }
                    items[i] = value;
                }
            }
            RawData::Map(map) => {
                map.insert(key.into_value(), value);
            }
            RawData::Set(set) => {
                set.insert(value);
            }
            RawData::WeakMap(map) => {
                if let Some(raw) = key.into_value().raw_target() {
                    map.insert(raw.id(), (raw.downgrade(), value));
                }
            }
            RawData::WeakSet(set) => {
                if let Some(raw) = value.raw_target() {
                    set.insert(raw.id(), raw.downgrade());
                }
            }
        }
    }

    /// Own keys without tracking: names, indices, map keys, or set items.
    pub fn keys(&self) -> Vec<Value> {
        match &*self.data() {
            RawData::Object(map) => map.keys().map(|k| Value::Str(k.clone())).collect(),
            RawData::Array(items) => (0..items.len()).map(Value::from).collect(),
            RawData::Map(map) => map.keys().cloned().collect(),
            RawData::Set(set) => set.iter().cloned().collect(),
            RawData::WeakMap(_) | RawData::WeakSet(_) => Vec::new(),
        }
    }

    /// Number of own entries, without tracking.
    pub fn len(&self) -> usize {
        match &*self.data() {
            RawData::Object(map) => map.len(),
            RawData::Array(items) => items.len(),
            RawData::Map(map) => map.len(),
            RawData::Set(set) => set.len(),
            RawData::WeakMap(map) => map.values().filter(|(w, _)| w.upgrade().is_some()).count(),
            RawData::WeakSet(set) => set.values().filter(|w| w.upgrade().is_some()).count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for RawObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawObject({:?} #{})", self.kind(), self.id().as_u64())
    }
}

// ----------------------------------------------------------------------------
// Property keys
// ----------------------------------------------------------------------------

/// A key that can be tracked on a target.
///
/// `Iterate` and `MapKeyIterate` are the synthetic keys used for
/// structural reads: enumerating entries, and enumerating map keys only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropKey {
    Name(Rc<str>),
    Index(usize),
    Item(Value),
    Length,
    Iterate,
    MapKeyIterate,
}

impl PropKey {
    /// The key as a collection entry key.
    pub fn into_value(self) -> Value {
        match self {
            PropKey::Name(name) => Value::Str(name),
            PropKey::Index(i) => Value::Number(i as f64),
            PropKey::Item(value) => value,
            PropKey::Length => Value::Str(Rc::from("length")),
            PropKey::Iterate | PropKey::MapKeyIterate => Value::Undefined,
        }
    }

    pub(crate) fn to_name(&self) -> Rc<str> {
        match self {
            PropKey::Name(name) => name.clone(),
            PropKey::Index(i) => Rc::from(i.to_string()),
            PropKey::Item(value) => Rc::from(value.to_display_string()),
            PropKey::Length => Rc::from("length"),
            PropKey::Iterate => Rc::from("[iterate]"),
            PropKey::MapKeyIterate => Rc::from("[map key iterate]"),
        }
    }
}

impl fmt::Display for PropKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_name())
    }
}

impl From<&str> for PropKey {
    fn from(name: &str) -> Self {
        PropKey::Name(Rc::from(name))
    }
}

impl From<String> for PropKey {
    fn from(name: String) -> Self {
        PropKey::Name(Rc::from(name))
    }
}

impl From<Rc<str>> for PropKey {
    fn from(name: Rc<str>) -> Self {
        PropKey::Name(name)
    }
}

impl From<&Rc<str>> for PropKey {
    fn from(name: &Rc<str>) -> Self {
        PropKey::Name(name.clone())
    }
}

impl From<usize> for PropKey {
    fn from(index: usize) -> Self {
        PropKey::Index(index)
    }
}

impl From<Value> for PropKey {
    fn from(value: Value) -> Self {
        PropKey::Item(value)
    }
}

impl From<&Value> for PropKey {
    fn from(value: &Value) -> Self {
        PropKey::Item(value.clone())
    }
}

// ----------------------------------------------------------------------------
// Value
// ----------------------------------------------------------------------------

/// A dynamically typed value stored in raw targets and passed as props.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Object(RawObject),
    Proxy(Reactive),
    Ref(Ref<Value>),
}

/// `Object.is` semantics: like `==` on [`Value`] except that `+0` and `-0`
/// differ. Used for change detection.
pub fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            (x.is_nan() && y.is_nan()) || x.to_bits() == y.to_bits()
        }
        _ => a == b,
    }
}

/// Whether replacing `old` with `new` counts as a change.
pub fn has_changed(new: &Value, old: &Value) -> bool {
    !same_value(new, old)
}

impl Value {
    /// An array target holding `items`.
    pub fn array<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::Object(RawObject::from_vec(items))
    }

    /// A plain object target holding `entries`.
    pub fn object<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Rc<str>>,
        V: Into<Value>,
    {
        Value::Object(RawObject::from_pairs(entries))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Objects and proxies.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Proxy(_))
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, Value::Ref(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&Reactive> {
        match self {
            Value::Proxy(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_ref_value(&self) -> Option<&Ref<Value>> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// The raw target behind an object or proxy.
    pub fn raw_target(&self) -> Option<RawObject> {
        match self {
            Value::Object(raw) => Some(raw.clone()),
            Value::Proxy(proxy) => Some(proxy.raw().clone()),
            _ => None,
        }
    }

    pub(crate) fn target_id(&self) -> Option<TargetId> {
        match self {
            Value::Object(raw) => Some(raw.id()),
            Value::Proxy(proxy) => Some(proxy.raw().id()),
            _ => None,
        }
    }

    /// JavaScript-style truthiness.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Object(_) | Value::Proxy(_) | Value::Ref(_) => true,
        }
    }

    /// Text used when the value is rendered as content.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Undefined | Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.to_string(),
            Value::Ref(r) => r.get_untracked().to_display_string(),
            Value::Object(_) | Value::Proxy(_) => serde_json::to_string(self).unwrap_or_default(),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// SameValueZero.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Proxy(a), Value::Proxy(b)) => a.ptr_eq(b),
            (Value::Ref(a), Value::Ref(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Undefined | Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Number(n) => {
                let canonical = if *n == 0.0 {
                    0u64
                } else if n.is_nan() {
                    f64::NAN.to_bits()
                } else {
                    n.to_bits()
                };
                canonical.hash(state);
            }
            Value::Str(s) => s.hash(state),
            Value::Object(raw) => raw.id().hash(state),
            Value::Proxy(proxy) => proxy.proxy_id().hash(state),
            Value::Ref(r) => r.addr().hash(state),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Object(raw) => write!(f, "{raw:?}"),
            Value::Proxy(proxy) => write!(f, "{proxy:?}"),
            Value::Ref(_) => f.write_str("Ref(..)"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

macro_rules! impl_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

impl_from_number!(f64, f32, i32, i64, u32, u64, usize);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::Str(s)
    }
}

impl From<RawObject> for Value {
    fn from(raw: RawObject) -> Self {
        Value::Object(raw)
    }
}

impl From<Reactive> for Value {
    fn from(proxy: Reactive) -> Self {
        Value::Proxy(proxy)
    }
}

impl From<Ref<Value>> for Value {
    fn from(r: Ref<Value>) -> Self {
        Value::Ref(r)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => Value::array(items.into_iter().map(Value::from)),
            serde_json::Value::Object(map) => {
                Value::object(map.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Serialization
// ----------------------------------------------------------------------------

/// Serializes through proxies and refs without tracking. Cycles serialize
/// as `null`.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let seen = RefCell::new(HashSet::new());
        Snapshot { value: self, seen: &seen }.serialize(serializer)
    }
}

struct Snapshot<'a> {
    value: &'a Value,
    seen: &'a RefCell<HashSet<TargetId>>,
}

impl Serialize for Snapshot<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.value {
            Value::Undefined | Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) if n.is_finite() => {
                if n.fract() == 0.0 && n.abs() < 9e15 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            Value::Number(_) => serializer.serialize_unit(),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Ref(r) => {
                let inner = r.get_untracked();
                Snapshot { value: &inner, seen: self.seen }.serialize(serializer)
            }
            Value::Object(_) | Value::Proxy(_) => {
                let Some(raw) = self.value.raw_target() else {
                    return serializer.serialize_unit();
                };
                if !self.seen.borrow_mut().insert(raw.id()) {
                    return serializer.serialize_unit();
                }
                let result = serialize_target(&raw, self.seen, serializer);
                self.seen.borrow_mut().remove(&raw.id());
                result
            }
        }
    }
}

fn serialize_target<S: Serializer>(
    raw: &RawObject,
    seen: &RefCell<HashSet<TargetId>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let data = raw.data();
    match &*data {
        RawData::Object(map) => {
            let mut out = serializer.serialize_map(Some(map.len()))?;
            for (k, v) in map.iter().filter(|(_, v)| !v.is_undefined()) {
                out.serialize_entry(&**k, &Snapshot { value: v, seen })?;
            }
            out.end()
        }
        RawData::Array(items) => {
            let mut out = serializer.serialize_seq(Some(items.len()))?;
            for item in items {
                out.serialize_element(&Snapshot { value: item, seen })?;
            }
            out.end()
        }
        RawData::Map(map) => {
            let mut out = serializer.serialize_seq(Some(map.len()))?;
            for (k, v) in map {
                out.serialize_element(&(Snapshot { value: k, seen }, Snapshot { value: v, seen }))?;
            }
            out.end()
        }
        RawData::Set(set) => {
            let mut out = serializer.serialize_seq(Some(set.len()))?;
            for item in set {
                out.serialize_element(&Snapshot { value: item, seen })?;
            }
            out.end()
        }
        RawData::WeakMap(_) | RawData::WeakSet(_) => serializer.serialize_map(Some(0))?.end(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn same_value_zero_for_keys() {
        assert_eq!(Value::Number(f64::NAN), Value::Number(f64::NAN));
        assert_eq!(Value::Number(0.0), Value::Number(-0.0));

        let mut map = HashMap::new();
        map.insert(Value::Number(-0.0), 1);
        assert_eq!(map.get(&Value::Number(0.0)), Some(&1));
    }

    #[test]
    fn change_detection_uses_object_is() {
        assert!(!has_changed(&Value::Number(f64::NAN), &Value::Number(f64::NAN)));
        assert!(has_changed(&Value::Number(0.0), &Value::Number(-0.0)));
        assert!(!has_changed(&Value::from("a"), &Value::from("a")));
    }

    #[test]
    fn objects_compare_by_identity() {
        let a = RawObject::object();
        let b = RawObject::object();
        assert_eq!(Value::Object(a.clone()), Value::Object(a));
        assert_ne!(Value::Object(b), Value::Object(RawObject::object()));
    }

    #[test]
    fn raw_access_is_untracked() {
        let raw = RawObject::from_pairs([("a", 1)]);
        raw.insert("b", "two");
        assert_eq!(raw.get("a"), Value::from(1));
        assert_eq!(raw.get("b"), Value::from("two"));
        assert_eq!(raw.len(), 2);

        let list = RawObject::from_vec([1, 2]);
        list.insert(3usize, 4);
        assert_eq!(list.len(), 4);
        assert!(list.get(2usize).is_undefined());
    }

    #[test]
    fn serializes_nested_targets() {
        let inner = Value::array([1, 2]);
        let obj = Value::object([("list", inner), ("name", Value::from("x"))]);
        let json = serde_json::to_value(&obj).unwrap();
        assert_eq!(json, serde_json::json!({ "list": [1, 2], "name": "x" }));
    }

    #[test]
    fn cycles_serialize_as_null() {
        let raw = RawObject::object();
        raw.insert("me", Value::Object(raw.clone()));
        let json = serde_json::to_value(Value::Object(raw.clone())).unwrap();
        assert_eq!(json, serde_json::json!({ "me": null }));
        // Break the cycle so the target can drop.
        raw.insert("me", Value::Null);
    }

    #[test]
    fn converts_from_json() {
        let value = Value::from(serde_json::json!({ "a": [1, true, null] }));
        let raw = value.raw_target().unwrap();
        assert_eq!(raw.kind(), TargetKind::Object);
        let list = raw.get("a").raw_target().unwrap();
        assert_eq!(list.get(1usize), Value::Bool(true));
    }

    #[test]
    fn display_formats_numbers() {
        assert_eq!(Value::from(3).to_display_string(), "3");
        assert_eq!(Value::from(1.5).to_display_string(), "1.5");
        assert_eq!(Value::Number(f64::NAN).to_display_string(), "NaN");
    }
}
