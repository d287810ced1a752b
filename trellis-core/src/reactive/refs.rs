//! Refs
//!
//! A [`Ref<T>`] is a reactive cell holding a single value. Reading it
//! tracks the ref's own [`Dep`]; writing a changed value triggers it.
//!
//! # How Refs Work
//!
//! 1. `Ref::new(v)` stores `v` and, for [`Value`]s, a deep proxy of it:
//!    objects placed in a ref are reactive when read back.
//!
//! 2. `set` compares the new raw value against the stored raw value with
//!    [`Trackable::has_changed`]. Only a change triggers subscribers.
//!
//! 3. Shallow refs store values as given and only react to replacement.
//!    Custom refs hand `track`/`trigger` callbacks to user code, which
//!    decides when each happens. Property refs forward to one key of a
//!    reactive object.
//!
//! # Example
//!
//! ```rust,ignore
//! let count = Ref::new(0);
//! let c = count.clone();
//! effect(move || println!("{}", c.get()));
//! count.set(1);           // prints 1
//! count.update(|n| n + 1); // prints 2
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use super::dep::Dep;
use super::effect::{track_effects, trigger_effects};
use super::proxy::{to_raw, to_reactive, Reactive};
use super::value::{same_value, PropKey, Value};
use crate::config;

/// Values that can live in a [`Ref`].
pub trait Trackable: Clone + 'static {
    /// Whether replacing `old` with `self` counts as a change.
    fn has_changed(&self, old: &Self) -> bool;

    /// Returned by a computed read before its first value exists.
    fn placeholder() -> Self;

    /// Form stored for comparison (proxies are unwrapped).
    fn to_raw(self) -> Self {
        self
    }

    /// Form handed out by deep refs (objects become reactive).
    fn to_reactive(self) -> Self {
        self
    }
}

impl Trackable for Value {
    fn has_changed(&self, old: &Self) -> bool {
        !same_value(self, old)
    }

    fn placeholder() -> Self {
        Value::Undefined
    }

    fn to_raw(self) -> Self {
        to_raw(&self)
    }

    fn to_reactive(self) -> Self {
        to_reactive(self)
    }
}

macro_rules! impl_trackable_eq {
    ($($ty:ty),*) => {
        $(
            impl Trackable for $ty {
                fn has_changed(&self, old: &Self) -> bool {
                    self != old
                }

                fn placeholder() -> Self {
                    Default::default()
                }
            }
        )*
    };
}

impl_trackable_eq!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, String, &'static str, ()
);

impl Trackable for Rc<str> {
    fn has_changed(&self, old: &Self) -> bool {
        self != old
    }

    fn placeholder() -> Self {
        Rc::from("")
    }
}

macro_rules! impl_trackable_float {
    ($($ty:ty),*) => {
        $(
            impl Trackable for $ty {
                fn has_changed(&self, old: &Self) -> bool {
                    !((self.is_nan() && old.is_nan()) || self.to_bits() == old.to_bits())
                }

                fn placeholder() -> Self {
                    0.0
                }
            }
        )*
    };
}

impl_trackable_float!(f32, f64);

impl<T: Trackable> Trackable for Option<T> {
    fn has_changed(&self, old: &Self) -> bool {
        match (self, old) {
            (Some(a), Some(b)) => a.has_changed(b),
            (None, None) => false,
            _ => true,
        }
    }

    fn placeholder() -> Self {
        None
    }
}

impl<T: Trackable> Trackable for Vec<T> {
    fn has_changed(&self, old: &Self) -> bool {
        self.len() != old.len() || self.iter().zip(old).any(|(a, b)| a.has_changed(b))
    }

    fn placeholder() -> Self {
        Vec::new()
    }
}

impl<A: Trackable, B: Trackable> Trackable for (A, B) {
    fn has_changed(&self, old: &Self) -> bool {
        self.0.has_changed(&old.0) || self.1.has_changed(&old.1)
    }

    fn placeholder() -> Self {
        (A::placeholder(), B::placeholder())
    }
}

// ----------------------------------------------------------------------------
// Ref sources
// ----------------------------------------------------------------------------

pub(crate) trait RefSource<T> {
    fn get(&self) -> T;
    fn get_untracked(&self) -> T;
    fn set(&self, value: T);
    fn dep(&self) -> Option<Dep> {
        None
    }
    fn is_shallow(&self) -> bool {
        false
    }
    fn is_readonly(&self) -> bool {
        false
    }
}

pub(crate) fn track_ref_value(dep: &Dep) {
    track_effects(dep);
}

pub(crate) fn trigger_ref_value(dep: &Dep) {
    trigger_effects(dep.effects());
}

struct PlainRef<T> {
    raw: RefCell<T>,
    value: RefCell<T>,
    dep: Dep,
    shallow: bool,
}

impl<T: Trackable> RefSource<T> for PlainRef<T> {
    fn get(&self) -> T {
        track_ref_value(&self.dep);
        self.value.borrow().clone()
    }

    fn get_untracked(&self) -> T {
        self.value.borrow().clone()
    }

    fn set(&self, new_value: T) {
        let new_raw = if self.shallow {
            new_value.clone()
        } else {
            new_value.clone().to_raw()
        };
        if !new_raw.has_changed(&self.raw.borrow()) {
            return;
        }
        *self.raw.borrow_mut() = new_raw;
        *self.value.borrow_mut() = if self.shallow {
            new_value
        } else {
            new_value.to_reactive()
        };
        trigger_ref_value(&self.dep);
    }

    fn dep(&self) -> Option<Dep> {
        Some(self.dep.clone())
    }

    fn is_shallow(&self) -> bool {
        self.shallow
    }
}

struct CustomRef<T> {
    dep: Dep,
    getter: Box<dyn Fn() -> T>,
    setter: Box<dyn Fn(T)>,
}

impl<T: Trackable> RefSource<T> for CustomRef<T> {
    fn get(&self) -> T {
        (self.getter)()
    }

    fn get_untracked(&self) -> T {
        super::context::untracked(|| (self.getter)())
    }

    fn set(&self, value: T) {
        (self.setter)(value)
    }

    fn dep(&self) -> Option<Dep> {
        Some(self.dep.clone())
    }
}

struct PropertyRef {
    object: Reactive,
    key: PropKey,
    default: Option<Value>,
}

impl RefSource<Value> for PropertyRef {
    fn get(&self) -> Value {
        let value = self.object.get(self.key.clone());
        match (&value, &self.default) {
            (Value::Undefined, Some(default)) => default.clone(),
            _ => value,
        }
    }

    fn get_untracked(&self) -> Value {
        super::context::untracked(|| self.get())
    }

    fn set(&self, value: Value) {
        self.object.set(self.key.clone(), value);
    }

    fn is_readonly(&self) -> bool {
        self.object.is_readonly()
    }
}

// ----------------------------------------------------------------------------
// Ref handle
// ----------------------------------------------------------------------------

/// A reactive single-value cell.
pub struct Ref<T: 'static> {
    source: Rc<dyn RefSource<T>>,
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
        }
    }
}

impl<T: Trackable> Ref<T> {
    /// Creates a deep ref.
    pub fn new(value: T) -> Self {
        Self::plain(value, false)
    }

    fn plain(value: T, shallow: bool) -> Self {
        let (raw, value) = if shallow {
            (value.clone(), value)
        } else {
            (value.clone().to_raw(), value.to_reactive())
        };
        Self {
            source: Rc::new(PlainRef {
                raw: RefCell::new(raw),
                value: RefCell::new(value),
                dep: Dep::new(),
                shallow,
            }),
        }
    }

    pub(crate) fn from_source(source: Rc<dyn RefSource<T>>) -> Self {
        Self { source }
    }

    /// Reads the value, tracking the ref.
    pub fn get(&self) -> T {
        self.source.get()
    }

    /// Reads the value without tracking.
    pub fn get_untracked(&self) -> T {
        self.source.get_untracked()
    }

    /// Writes the value; subscribers run only if it changed.
    pub fn set(&self, value: T) {
        if self.source.is_readonly() {
            config::warn("write operation failed: ref is readonly");
            return;
        }
        self.source.set(value);
    }

    /// Writes `f(current)`.
    pub fn update(&self, f: impl FnOnce(T) -> T) {
        self.set(f(self.get_untracked()));
    }

    pub fn is_shallow(&self) -> bool {
        self.source.is_shallow()
    }

    pub fn is_readonly(&self) -> bool {
        self.source.is_readonly()
    }

    /// The ref's own dep, for refs that have one.
    pub fn dep(&self) -> Option<Dep> {
        self.source.dep()
    }
}

impl<T> Ref<T> {
    pub fn ptr_eq(&self, other: &Ref<T>) -> bool {
        self.addr() == other.addr()
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.source) as *const () as usize
    }
}

impl<T: Trackable + Default> Default for Ref<T> {
    fn default() -> Self {
        Ref::new(T::default())
    }
}

/// A ref that only reacts to replacement of its value.
pub fn shallow_ref<T: Trackable>(value: T) -> Ref<T> {
    Ref::plain(value, true)
}

/// Handle passed to [`custom_ref`] factories.
#[derive(Clone)]
pub struct RefTracker {
    dep: Dep,
}

impl RefTracker {
    pub fn track(&self) {
        track_ref_value(&self.dep);
    }

    pub fn trigger(&self) {
        trigger_ref_value(&self.dep);
    }
}

/// A ref whose tracking and triggering is driven by `factory`.
///
/// The factory returns the getter and setter; both may call
/// [`RefTracker::track`] and [`RefTracker::trigger`] whenever they choose.
pub fn custom_ref<T, F, G, S>(factory: F) -> Ref<T>
where
    T: Trackable,
    F: FnOnce(RefTracker) -> (G, S),
    G: Fn() -> T + 'static,
    S: Fn(T) + 'static,
{
    let dep = Dep::new();
    let (getter, setter) = factory(RefTracker { dep: dep.clone() });
    Ref::from_source(Rc::new(CustomRef {
        dep,
        getter: Box::new(getter),
        setter: Box::new(setter),
    }))
}

/// Triggers a ref's subscribers without changing its value.
pub fn trigger_ref<T: Trackable>(r: &Ref<T>) {
    if let Some(dep) = r.dep() {
        trigger_ref_value(&dep);
    }
}

/// The value inside a ref, or the value itself.
pub fn unref(value: &Value) -> Value {
    match value {
        Value::Ref(r) => r.get(),
        other => other.clone(),
    }
}

pub fn is_ref(value: &Value) -> bool {
    value.is_ref()
}

/// A ref bound to `key` of `object`. Refs already stored there are
/// returned as they are.
pub fn to_ref(object: &Reactive, key: impl Into<PropKey>) -> Ref<Value> {
    to_ref_with_default(object, key, None)
}

pub fn to_ref_with_default(object: &Reactive, key: impl Into<PropKey>, default: Option<Value>) -> Ref<Value> {
    let key = key.into();
    if let Value::Ref(existing) = object.raw().get(key.clone()) {
        return existing;
    }
    Ref::from_source(Rc::new(PropertyRef {
        object: object.clone(),
        key,
        default,
    }))
}

/// One property ref per own key of `object`.
pub fn to_refs(object: &Reactive) -> IndexMap<std::rc::Rc<str>, Ref<Value>> {
    if !object.is_reactive() {
        config::warn("to_refs() expects a reactive object");
    }
    let keys = super::context::untracked(|| object.keys());
    keys.into_iter()
        .filter_map(|k| match k {
            Value::Str(name) => Some((name.clone(), to_ref(object, PropKey::Name(name)))),
            Value::Number(i) => Some((Rc::from(i.to_string()), to_ref(object, PropKey::Index(i as usize)))),
            _ => None,
        })
        .collect()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{effect, is_reactive, reactive, RawObject};
    use std::cell::Cell;

    #[test]
    fn ref_get_and_set() {
        let count = Ref::new(0);
        assert_eq!(count.get(), 0);
        count.set(42);
        assert_eq!(count.get(), 42);
        count.update(|n| n + 1);
        assert_eq!(count.get_untracked(), 43);
    }

    #[test]
    fn unchanged_writes_do_not_trigger() {
        let name = Ref::new(String::from("a"));
        let runs = Rc::new(Cell::new(0));
        let (n, r) = (name.clone(), runs.clone());
        let _e = effect(move || {
            n.get();
            r.set(r.get() + 1);
        });

        name.set("a".into());
        assert_eq!(runs.get(), 1);
        name.set("b".into());
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn float_refs_treat_nan_as_unchanged() {
        let x = Ref::new(f64::NAN);
        let runs = Rc::new(Cell::new(0));
        let (xc, r) = (x.clone(), runs.clone());
        let _e = effect(move || {
            xc.get();
            r.set(r.get() + 1);
        });
        x.set(f64::NAN);
        assert_eq!(runs.get(), 1);
        x.set(-0.0);
        x.set(0.0);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn deep_ref_wraps_objects() {
        let r = Ref::new(Value::object([("a", 1)]));
        assert!(is_reactive(&r.get()));

        let shallow = shallow_ref(Value::object([("a", 1)]));
        assert!(!is_reactive(&shallow.get()));
    }

    #[test]
    fn shallow_ref_needs_replacement() {
        let state = shallow_ref(Value::object([("n", 1)]));
        let runs = Rc::new(Cell::new(0));
        let (s, r) = (state.clone(), runs.clone());
        let _e = effect(move || {
            s.get();
            r.set(r.get() + 1);
        });

        // Mutating through a reactive view does not reach the ref's dep.
        if let Some(raw) = state.get_untracked().raw_target() {
            reactive(raw).set("n", 2);
        }
        assert_eq!(runs.get(), 1);

        trigger_ref(&state);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn custom_ref_controls_tracking() {
        let store = Rc::new(Cell::new(0));
        let s = store.clone();
        let r = custom_ref(move |tracker: RefTracker| {
            let (get_store, set_store) = (s.clone(), s);
            let (t1, t2) = (tracker.clone(), tracker);
            (
                move || {
                    t1.track();
                    get_store.get()
                },
                move |v: i32| {
                    set_store.set(v);
                    t2.trigger();
                },
            )
        });

        let seen = Rc::new(Cell::new(-1));
        let (rc, out) = (r.clone(), seen.clone());
        let _e = effect(move || out.set(rc.get()));
        r.set(9);
        assert_eq!(seen.get(), 9);
        assert_eq!(store.get(), 9);
    }

    #[test]
    fn property_refs_follow_their_object() {
        let state = reactive(RawObject::from_pairs([("a", 1), ("b", 2)]));
        let a = to_ref(&state, "a");
        a.set(Value::from(10));
        assert_eq!(state.get("a"), Value::from(10));

        let refs = to_refs(&state);
        assert_eq!(refs.len(), 2);
        state.set("b", 5);
        assert_eq!(refs["b"].get(), Value::from(5));

        let missing = to_ref_with_default(&state, "c", Some(Value::from("fallback")));
        assert_eq!(missing.get(), Value::from("fallback"));
    }

    #[test]
    fn unref_unwraps() {
        let r = Ref::new(Value::from(3));
        assert_eq!(unref(&Value::Ref(r)), Value::from(3));
        assert_eq!(unref(&Value::from("x")), Value::from("x"));
        assert!(is_ref(&Value::Ref(Ref::new(Value::Null))));
    }
}
