//! Computed Implementation
//!
//! A computed value caches the result of a derivation and recomputes it
//! lazily.
//!
//! # How Computeds Work
//!
//! 1. The derivation runs inside a lazy [`ReactiveEffect`]. It does not run
//!    until the first read.
//!
//! 2. When a dependency changes, the effect's scheduler does not re-run the
//!    derivation. It marks the computed dirty and triggers the computed's
//!    own dep, so downstream readers learn the value is stale.
//!
//! 3. The next read finds the computed dirty and recomputes once. Further
//!    reads return the cache until the next invalidation.
//!
//! Values derived but never read are never recomputed.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::dep::Dep;
use super::effect::ReactiveEffect;
use super::refs::{track_ref_value, trigger_ref_value, Ref, RefSource, Trackable};
use crate::config;

pub(crate) struct ComputedInner<T> {
    value: RefCell<Option<T>>,
    dirty: Cell<bool>,
    dep: Dep,
    effect: ReactiveEffect,
    setter: Option<Box<dyn Fn(T)>>,
}

impl<T: Trackable> ComputedInner<T> {
    fn new<G>(getter: G, setter: Option<Box<dyn Fn(T)>>) -> Rc<Self>
    where
        G: Fn() -> T + 'static,
    {
        Rc::new_cyclic(|weak: &Weak<Self>| {
            let for_run = weak.clone();
            let for_schedule = weak.clone();
            let effect = ReactiveEffect::new(move || {
                if let Some(inner) = for_run.upgrade() {
                    let value = getter();
                    *inner.value.borrow_mut() = Some(value);
                }
            });
            effect.set_scheduler(Some(Rc::new(move || {
                if let Some(inner) = for_schedule.upgrade() {
                    if !inner.dirty.get() {
                        inner.dirty.set(true);
                        trigger_ref_value(&inner.dep);
                    }
                }
            })));
            effect.mark_computed();
            Self {
                value: RefCell::new(None),
                dirty: Cell::new(true),
                dep: Dep::new(),
                effect,
                setter,
            }
        })
    }

    fn refresh(&self) {
        if self.dirty.get() || !self.effect.is_active() {
            self.dirty.set(false);
            self.effect.run();
        }
    }

    fn cached(&self) -> T {
        let cached = self.value.borrow().clone();
        cached.unwrap_or_else(|| {
            config::warn("computed read itself during its first evaluation");
            T::placeholder()
        })
    }
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        self.effect.stop();
    }
}

impl<T: Trackable> RefSource<T> for ComputedInner<T> {
    fn get(&self) -> T {
        track_ref_value(&self.dep);
        self.refresh();
        self.cached()
    }

    fn get_untracked(&self) -> T {
        self.refresh();
        self.cached()
    }

    fn set(&self, value: T) {
        match &self.setter {
            Some(setter) => setter(value),
            None => config::warn("write operation failed: computed value is readonly"),
        }
    }

    fn dep(&self) -> Option<Dep> {
        Some(self.dep.clone())
    }

    fn is_readonly(&self) -> bool {
        self.setter.is_none()
    }
}

/// A cached derived value.
///
/// `Computed<T>` reads like a [`Ref<T>`]; [`Computed::as_ref`] returns the
/// same computed as a ref handle, e.g. to store it in a reactive object.
pub struct Computed<T: 'static> {
    inner: Rc<ComputedInner<T>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Trackable> Computed<T> {
    /// Reads the value, recomputing if a dependency changed.
    pub fn get(&self) -> T {
        self.inner.get()
    }

    pub fn get_untracked(&self) -> T {
        self.inner.get_untracked()
    }

    /// Passes `value` to the setter of a writable computed.
    pub fn set(&self, value: T) {
        self.inner.set(value);
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    pub fn is_readonly(&self) -> bool {
        self.inner.setter.is_none()
    }

    /// The effect running the derivation.
    pub fn effect(&self) -> &ReactiveEffect {
        &self.inner.effect
    }

    pub fn as_ref(&self) -> Ref<T> {
        Ref::from_source(self.inner.clone())
    }
}

/// Creates a readonly computed value.
///
/// # Example
///
/// ```rust,ignore
/// let a = Ref::new(1);
/// let b = Ref::new(2);
/// let (a2, b2) = (a.clone(), b.clone());
/// let sum = computed(move || a2.get() + b2.get());
/// assert_eq!(sum.get(), 3);
/// a.set(10);
/// assert_eq!(sum.get(), 12);
/// ```
pub fn computed<T, G>(getter: G) -> Computed<T>
where
    T: Trackable,
    G: Fn() -> T + 'static,
{
    Computed {
        inner: ComputedInner::new(getter, None),
    }
}

/// Creates a computed value whose writes go to `setter`.
pub fn computed_writable<T, G, S>(getter: G, setter: S) -> Computed<T>
where
    T: Trackable,
    G: Fn() -> T + 'static,
    S: Fn(T) + 'static,
{
    Computed {
        inner: ComputedInner::new(getter, Some(Box::new(setter))),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{effect, reactive, RawObject, Value};

    #[test]
    fn lazy_and_cached() {
        let a = Ref::new(1);
        let calls = Rc::new(Cell::new(0));
        let (a2, c2) = (a.clone(), calls.clone());
        let double = computed(move || {
            c2.set(c2.get() + 1);
            a2.get() * 2
        });

        assert_eq!(calls.get(), 0);
        assert_eq!(double.get(), 2);
        assert_eq!(double.get(), 2);
        assert_eq!(calls.get(), 1);

        a.set(5);
        assert!(double.is_dirty());
        assert_eq!(calls.get(), 1);
        assert_eq!(double.get(), 10);
        assert_eq!(double.get(), 10);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn self_read_on_first_evaluation_warns() {
        crate::config::reset();
        let warnings = Rc::new(RefCell::new(Vec::new()));
        let sink = warnings.clone();
        crate::config::configure(|cfg| {
            cfg.warn_handler = Some(Rc::new(move |msg: &str| sink.borrow_mut().push(msg.to_string())));
        });

        let slot: Rc<RefCell<Option<Computed<i32>>>> = Rc::default();
        let s = slot.clone();
        let looped = computed(move || {
            let seen = s.borrow().as_ref().map_or(-1, |c| c.get());
            seen + 1
        });
        *slot.borrow_mut() = Some(looped.clone());

        assert_eq!(looped.get(), 1);
        assert_eq!(warnings.borrow().len(), 1);
        assert!(warnings.borrow()[0].contains("read itself"));
        slot.borrow_mut().take();
        crate::config::reset();
    }

    #[test]
    fn sum_of_two_refs() {
        let a = Ref::new(1);
        let b = Ref::new(2);
        let calls = Rc::new(Cell::new(0));
        let (a2, b2, c2) = (a.clone(), b.clone(), calls.clone());
        let c = computed(move || {
            c2.set(c2.get() + 1);
            a2.get() + b2.get()
        });

        assert_eq!(c.get(), 3);
        assert_eq!(c.get(), 3);
        assert_eq!(calls.get(), 1);
        a.set(10);
        assert_eq!(c.get(), 12);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn effects_see_computed_changes() {
        let state = reactive(RawObject::from_pairs([("n", 1)]));
        let s = state.clone();
        let plus_one = computed(move || s.get("n").as_f64().unwrap_or(0.0) + 1.0);

        let seen = Rc::new(Cell::new(0.0));
        let (p, out) = (plus_one.clone(), seen.clone());
        let _e = effect(move || out.set(p.get()));
        assert_eq!(seen.get(), 2.0);

        state.set("n", 4);
        assert_eq!(seen.get(), 5.0);
    }

    #[test]
    fn chained_computeds() {
        let base = Ref::new(1);
        let b = base.clone();
        let double = computed(move || b.get() * 2);
        let d = double.clone();
        let quad = computed(move || d.get() * 2);

        assert_eq!(quad.get(), 4);
        base.set(3);
        assert_eq!(quad.get(), 12);
    }

    #[test]
    fn writable_computed_forwards_writes() {
        let first = Ref::new(Value::from("Ada"));
        let (f1, f2) = (first.clone(), first.clone());
        let greeting = computed_writable(
            move || Value::from(format!("hi {}", f1.get())),
            move |v: Value| f2.set(v),
        );

        assert_eq!(greeting.get(), Value::from("hi Ada"));
        greeting.set(Value::from("Grace"));
        assert_eq!(greeting.get(), Value::from("hi Grace"));
        assert!(!greeting.is_readonly());
    }

    #[test]
    fn readonly_computed_ignores_writes() {
        let c = computed(|| 1);
        c.set(2);
        assert_eq!(c.get(), 1);
        assert!(c.as_ref().is_readonly());
    }

    #[test]
    fn stopped_computed_recomputes_on_every_read() {
        let a = Ref::new(1);
        let a2 = a.clone();
        let c = computed(move || a2.get());
        assert_eq!(c.get(), 1);
        c.effect().stop();
        a.set(2);
        assert_eq!(c.get(), 2);
    }
}
