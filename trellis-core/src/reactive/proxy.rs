//! Reactive Proxies
//!
//! A [`Reactive`] is a handle over a raw target that tracks reads and
//! triggers writes. Four flavours exist:
//!
//! | constructor          | writes      | nested values          |
//! |----------------------|-------------|------------------------|
//! | [`reactive`]         | trigger     | wrapped on access      |
//! | [`shallow_reactive`] | trigger     | returned as stored     |
//! | [`readonly`]         | rejected    | wrapped readonly       |
//! | [`shallow_readonly`] | rejected    | returned as stored     |
//!
//! Proxies are memoized per target and flavour: wrapping the same target
//! twice yields the same proxy while any handle to it is alive. Wrapping a
//! mutable proxy in `readonly` produces a readonly view that still tracks,
//! since reads flow through the mutable proxy underneath.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use super::subscriber::TargetId;
use super::value::{PropKey, RawObject, TargetKind, Value};

#[derive(Clone)]
pub struct Reactive {
    inner: Rc<ProxyInner>,
}

struct ProxyInner {
    id: u64,
    raw: RawObject,
    readonly: bool,
    shallow: bool,
    /// Readonly view over a mutable proxy.
    observed: bool,
}

type CacheKey = (TargetId, u8);

thread_local! {
    static PROXY_CACHE: RefCell<HashMap<CacheKey, Weak<ProxyInner>>> = RefCell::new(HashMap::new());
}

fn cache_key(raw: &RawObject, readonly: bool, shallow: bool, observed: bool) -> CacheKey {
    let flavour = readonly as u8 | (shallow as u8) << 1 | (observed as u8) << 2;
    (raw.id(), flavour)
}

impl Drop for ProxyInner {
    fn drop(&mut self) {
        let key = cache_key(&self.raw, self.readonly, self.shallow, self.observed);
        let _ = PROXY_CACHE.try_with(|cache| {
            if let Ok(mut cache) = cache.try_borrow_mut() {
                if cache.get(&key).is_some_and(|weak| weak.upgrade().is_none()) {
                    cache.remove(&key);
                }
            }
        });
    }
}

fn create_reactive_object(raw: RawObject, readonly: bool, shallow: bool, observed: bool) -> Reactive {
    let key = cache_key(&raw, readonly, shallow, observed);
    if let Some(existing) = PROXY_CACHE.with(|cache| cache.borrow().get(&key).and_then(Weak::upgrade)) {
        return Reactive { inner: existing };
    }

    static NEXT_PROXY_ID: AtomicU64 = AtomicU64::new(0);
    let inner = Rc::new(ProxyInner {
        id: NEXT_PROXY_ID.fetch_add(1, Ordering::Relaxed),
        raw,
        readonly,
        shallow,
        observed,
    });
    PROXY_CACHE.with(|cache| cache.borrow_mut().insert(key, Rc::downgrade(&inner)));
    Reactive { inner }
}

/// What a proxy constructor accepts: a raw target or an existing proxy.
pub enum ProxySource {
    Raw(RawObject),
    Proxy(Reactive),
}

impl From<RawObject> for ProxySource {
    fn from(raw: RawObject) -> Self {
        ProxySource::Raw(raw)
    }
}

impl From<&RawObject> for ProxySource {
    fn from(raw: &RawObject) -> Self {
        ProxySource::Raw(raw.clone())
    }
}

impl From<Reactive> for ProxySource {
    fn from(proxy: Reactive) -> Self {
        ProxySource::Proxy(proxy)
    }
}

impl From<&Reactive> for ProxySource {
    fn from(proxy: &Reactive) -> Self {
        ProxySource::Proxy(proxy.clone())
    }
}

/// Deep mutable proxy. Passing a proxy returns it unchanged.
pub fn reactive(source: impl Into<ProxySource>) -> Reactive {
    match source.into() {
        ProxySource::Raw(raw) => create_reactive_object(raw, false, false, false),
        ProxySource::Proxy(proxy) => proxy,
    }
}

/// Mutable proxy that tracks only its own keys.
pub fn shallow_reactive(source: impl Into<ProxySource>) -> Reactive {
    match source.into() {
        ProxySource::Raw(raw) => create_reactive_object(raw, false, true, false),
        ProxySource::Proxy(proxy) => proxy,
    }
}

/// Deep readonly proxy.
pub fn readonly(source: impl Into<ProxySource>) -> Reactive {
    match source.into() {
        ProxySource::Raw(raw) => create_reactive_object(raw, true, false, false),
        ProxySource::Proxy(proxy) if proxy.is_readonly() => proxy,
        ProxySource::Proxy(proxy) => create_reactive_object(proxy.raw().clone(), true, false, true),
    }
}

/// Readonly proxy over own keys only.
pub fn shallow_readonly(source: impl Into<ProxySource>) -> Reactive {
    match source.into() {
        ProxySource::Raw(raw) => create_reactive_object(raw, true, true, false),
        ProxySource::Proxy(proxy) if proxy.is_readonly() => proxy,
        ProxySource::Proxy(proxy) => create_reactive_object(proxy.raw().clone(), true, true, true),
    }
}

/// True for mutable proxies and readonly views over them.
pub fn is_reactive(value: &Value) -> bool {
    value.as_proxy().is_some_and(Reactive::is_reactive)
}

pub fn is_readonly(value: &Value) -> bool {
    match value {
        Value::Proxy(proxy) => proxy.is_readonly(),
        Value::Ref(r) => r.is_readonly(),
        _ => false,
    }
}

pub fn is_shallow(value: &Value) -> bool {
    match value {
        Value::Proxy(proxy) => proxy.is_shallow(),
        Value::Ref(r) => r.is_shallow(),
        _ => false,
    }
}

pub fn is_proxy(value: &Value) -> bool {
    matches!(value, Value::Proxy(_))
}

/// The raw target behind a proxy; other values are returned unchanged.
pub fn to_raw(value: &Value) -> Value {
    match value {
        Value::Proxy(proxy) => Value::Object(proxy.raw().clone()),
        other => other.clone(),
    }
}

/// Excludes `raw` from implicit wrapping.
pub fn mark_raw(raw: &RawObject) -> RawObject {
    raw.mark_raw();
    raw.clone()
}

/// Wraps objects in a deep mutable proxy, respecting [`mark_raw`].
pub fn to_reactive(value: Value) -> Value {
    match value {
        Value::Object(raw) if !raw.is_marked_raw() => Value::Proxy(reactive(raw)),
        other => other,
    }
}

/// Wraps objects in a deep readonly proxy, respecting [`mark_raw`].
pub fn to_readonly(value: Value) -> Value {
    match value {
        Value::Object(raw) if !raw.is_marked_raw() => Value::Proxy(readonly(raw)),
        Value::Proxy(proxy) => Value::Proxy(readonly(proxy)),
        other => other,
    }
}

impl Reactive {
    pub fn raw(&self) -> &RawObject {
        &self.inner.raw
    }

    pub fn kind(&self) -> TargetKind {
        self.inner.raw.kind()
    }

    pub fn is_reactive(&self) -> bool {
        !self.inner.readonly || self.inner.observed
    }

    pub fn is_readonly(&self) -> bool {
        self.inner.readonly
    }

    pub fn is_shallow(&self) -> bool {
        self.inner.shallow
    }

    pub fn ptr_eq(&self, other: &Reactive) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn proxy_id(&self) -> u64 {
        self.inner.id
    }

    /// Whether reads through this proxy record dependencies.
    pub(crate) fn tracks(&self) -> bool {
        !self.inner.readonly || self.inner.observed
    }

    /// Wraps a nested value read through this proxy.
    pub(crate) fn wrap_nested(&self, value: Value) -> Value {
        if self.inner.shallow {
            return value;
        }
        let raw = match &value {
            Value::Object(raw) if !raw.is_marked_raw() => raw.clone(),
            Value::Proxy(proxy) if self.inner.readonly && !proxy.is_readonly() => proxy.raw().clone(),
            _ => return value,
        };
        let proxy = if self.inner.readonly {
            create_reactive_object(raw, true, false, self.inner.observed)
        } else {
            create_reactive_object(raw, false, false, false)
        };
        Value::Proxy(proxy)
    }

    pub(crate) fn warn_readonly(&self, key: &PropKey) {
        crate::config::warn(crate::Error::ReadonlyMutation {
            key: key.to_string(),
        });
    }

    // ------------------------------------------------------------------------
    // Dispatch by target kind
    // ------------------------------------------------------------------------

    /// Reads `key`, tracking it. Maps look the key up as an entry key.
    pub fn get(&self, key: impl Into<PropKey>) -> Value {
        let key = key.into();
        match self.kind() {
            TargetKind::Object | TargetKind::Array => self.base_get(key),
            TargetKind::Map | TargetKind::WeakMap => self.collection_get(key.into_value()),
            TargetKind::Set | TargetKind::WeakSet => Value::Undefined,
        }
    }

    /// Writes `key`. Returns `false` when rejected.
    pub fn set(&self, key: impl Into<PropKey>, value: impl Into<Value>) -> bool {
        let (key, value) = (key.into(), value.into());
        match self.kind() {
            TargetKind::Object | TargetKind::Array => self.base_set(key, value),
            TargetKind::Map | TargetKind::WeakMap => self.collection_set(key.into_value(), value),
            TargetKind::Set | TargetKind::WeakSet => self.add(value),
        }
    }

    /// Removes `key`. Returns whether anything was removed.
    pub fn delete(&self, key: impl Into<PropKey>) -> bool {
        let key = key.into();
        match self.kind() {
            TargetKind::Object | TargetKind::Array => self.base_delete(key),
            _ => self.collection_delete(key.into_value()),
        }
    }

    /// Membership check, tracked as a `Has` read.
    pub fn has(&self, key: impl Into<PropKey>) -> bool {
        let key = key.into();
        match self.kind() {
            TargetKind::Object | TargetKind::Array => self.base_has(key),
            _ => self.collection_has(key.into_value()),
        }
    }

    /// Own keys (objects, arrays) or entry keys (collections).
    pub fn keys(&self) -> Vec<Value> {
        match self.kind() {
            TargetKind::Object | TargetKind::Array => self.own_keys(),
            _ => self.collection_keys(),
        }
    }

    /// Values in iteration order, wrapped for this proxy.
    pub fn values(&self) -> Vec<Value> {
        match self.kind() {
            TargetKind::Object => self
                .own_keys()
                .into_iter()
                .filter_map(|k| match k {
                    Value::Str(name) => Some(self.get(PropKey::Name(name))),
                    _ => None,
                })
                .collect(),
            TargetKind::Array => self.to_vec(),
            _ => self.collection_values(),
        }
    }

    /// Entry count: array length, collection size or own key count.
    pub fn len(&self) -> usize {
        match self.kind() {
            TargetKind::Array => self.array_len(),
            TargetKind::Object => self.own_keys().len(),
            _ => self.size(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactive")
            .field("raw", &self.inner.raw)
            .field("readonly", &self.inner.readonly)
            .field("shallow", &self.inner.shallow)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxies_are_memoized() {
        let raw = RawObject::object();
        let a = reactive(&raw);
        let b = reactive(&raw);
        assert!(a.ptr_eq(&b));
        assert!(reactive(&a).ptr_eq(&a));

        let ro = readonly(&raw);
        assert!(!ro.ptr_eq(&a));
        assert!(readonly(&ro).ptr_eq(&ro));
    }

    #[test]
    fn flavour_predicates() {
        let raw = RawObject::object();
        let r = Value::Proxy(reactive(&raw));
        let ro = Value::Proxy(readonly(&raw));
        let view = Value::Proxy(readonly(reactive(&raw)));
        let shallow = Value::Proxy(shallow_reactive(RawObject::object()));

        assert!(is_reactive(&r) && !is_readonly(&r));
        assert!(!is_reactive(&ro) && is_readonly(&ro));
        assert!(is_reactive(&view) && is_readonly(&view));
        assert!(is_shallow(&shallow));
        assert!(is_proxy(&r) && !is_proxy(&Value::Object(raw.clone())));
    }

    #[test]
    fn to_raw_unwraps() {
        let raw = RawObject::object();
        let proxy = Value::Proxy(reactive(&raw));
        assert_eq!(to_raw(&proxy), Value::Object(raw));
        assert_eq!(to_raw(&Value::from(1)), Value::from(1));
    }

    #[test]
    fn mark_raw_skips_wrapping() {
        let raw = mark_raw(&RawObject::object());
        assert!(matches!(to_reactive(Value::Object(raw)), Value::Object(_)));
        assert!(matches!(to_reactive(Value::Object(RawObject::object())), Value::Proxy(_)));
    }

    #[test]
    fn cache_entry_released_with_last_handle() {
        let raw = RawObject::object();
        let first_id = reactive(&raw).proxy_id();
        let second = reactive(&raw);
        assert_ne!(first_id, second.proxy_id());
        assert!(reactive(&raw).ptr_eq(&second));
    }
}
