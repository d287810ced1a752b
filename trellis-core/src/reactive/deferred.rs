//! Deferred computed values.
//!
//! A deferred computed invalidates like a [`Computed`](super::Computed), but
//! notifies its own subscribers from a microtask, and only if the value it
//! recomputes there differs from the value subscribers last saw. Deferred
//! computeds chained on each other are invalidated synchronously so that a
//! direct read is never stale; only the notification of ordinary effects is
//! deferred.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::dep::Dep;
use super::effect::ReactiveEffect;
use super::refs::{track_ref_value, trigger_ref_value, Ref, RefSource, Trackable};
use crate::config;
use crate::scheduler;

struct DeferredInner<T> {
    value: RefCell<Option<T>>,
    dirty: Cell<bool>,
    dep: Dep,
    effect: ReactiveEffect,
    compare_target: RefCell<Option<T>>,
    scheduled: Cell<bool>,
}

impl<T: Trackable> DeferredInner<T> {
    fn new<G>(getter: G) -> Rc<Self>
    where
        G: Fn() -> T + 'static,
    {
        let inner = Rc::new_cyclic(|weak: &Weak<Self>| {
            let for_run = weak.clone();
            let effect = ReactiveEffect::new(move || {
                if let Some(inner) = for_run.upgrade() {
                    let value = getter();
                    *inner.value.borrow_mut() = Some(value);
                }
            });
            effect.mark_computed();
            Self {
                value: RefCell::new(None),
                dirty: Cell::new(true),
                dep: Dep::new(),
                effect,
                compare_target: RefCell::new(None),
                scheduled: Cell::new(false),
            }
        });

        let weak = Rc::downgrade(&inner);
        inner.effect.set_scheduler(Some(Rc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.invalidate(false);
            }
        })));
        let weak = Rc::downgrade(&inner);
        inner.effect.set_computed_trigger(Rc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.invalidate(true);
            }
        }));
        inner
    }

    /// `from_upstream` is set when an upstream deferred computed forwards
    /// its invalidation synchronously.
    fn invalidate(self: &Rc<Self>, from_upstream: bool) {
        if !self.dep.is_empty() {
            if from_upstream {
                *self.compare_target.borrow_mut() = self.value.borrow().clone();
            } else if !self.scheduled.get() {
                let compare = self
                    .compare_target
                    .borrow_mut()
                    .take()
                    .or_else(|| self.value.borrow().clone());
                self.scheduled.set(true);
                let weak = Rc::downgrade(self);
                scheduler::queue_microtask(move || {
                    let Some(inner) = weak.upgrade() else {
                        return;
                    };
                    if inner.effect.is_active() {
                        let current = inner.current();
                        let changed = match &compare {
                            Some(previous) => current.has_changed(previous),
                            None => true,
                        };
                        if changed {
                            trigger_ref_value(&inner.dep);
                        }
                    }
                    inner.scheduled.set(false);
                });
            }
            for downstream in self.dep.effects() {
                if let Some(hook) = downstream.computed_trigger() {
                    hook();
                }
            }
        }
        self.dirty.set(true);
    }

    fn current(&self) -> T {
        if self.dirty.get() {
            self.dirty.set(false);
            self.effect.run();
        }
        let cached = self.value.borrow().clone();
        cached.unwrap_or_else(|| {
            config::warn("deferred computed read itself during its first evaluation");
            T::placeholder()
        })
    }
}

impl<T> Drop for DeferredInner<T> {
    fn drop(&mut self) {
        self.effect.stop();
    }
}

impl<T: Trackable> RefSource<T> for DeferredInner<T> {
    fn get(&self) -> T {
        track_ref_value(&self.dep);
        self.current()
    }

    fn get_untracked(&self) -> T {
        self.current()
    }

    fn set(&self, _value: T) {
        config::warn("write operation failed: computed value is readonly");
    }

    fn dep(&self) -> Option<Dep> {
        Some(self.dep.clone())
    }

    fn is_readonly(&self) -> bool {
        true
    }
}

/// A computed value whose notifications are batched into a microtask.
pub struct DeferredComputed<T: 'static> {
    inner: Rc<DeferredInner<T>>,
}

impl<T> Clone for DeferredComputed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Trackable> DeferredComputed<T> {
    pub fn get(&self) -> T {
        self.inner.get()
    }

    pub fn get_untracked(&self) -> T {
        self.inner.get_untracked()
    }

    pub fn effect(&self) -> &ReactiveEffect {
        &self.inner.effect
    }

    pub fn as_ref(&self) -> Ref<T> {
        Ref::from_source(self.inner.clone())
    }
}

pub fn deferred_computed<T, G>(getter: G) -> DeferredComputed<T>
where
    T: Trackable,
    G: Fn() -> T + 'static,
{
    DeferredComputed {
        inner: DeferredInner::new(getter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{computed, effect};

    #[test]
    fn notifies_after_microtask() {
        let src = Ref::new(1);
        let s = src.clone();
        let c = deferred_computed(move || s.get() * 2);

        let seen = Rc::new(Cell::new(0));
        let (cc, out) = (c.clone(), seen.clone());
        let _e = effect(move || out.set(cc.get()));
        assert_eq!(seen.get(), 2);

        src.set(2);
        assert_eq!(seen.get(), 2);
        // A direct read is never stale.
        assert_eq!(c.get(), 4);

        scheduler::run_microtasks();
        assert_eq!(seen.get(), 4);
    }

    #[test]
    fn unchanged_result_is_not_notified() {
        let src = Ref::new(1);
        let s = src.clone();
        let parity = deferred_computed(move || s.get() % 2);

        let runs = Rc::new(Cell::new(0));
        let (p, r) = (parity.clone(), runs.clone());
        let _e = effect(move || {
            p.get();
            r.set(r.get() + 1);
        });

        src.set(3);
        src.set(5);
        scheduler::run_microtasks();
        assert_eq!(runs.get(), 1);

        src.set(6);
        scheduler::run_microtasks();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn chained_deferred_skips_unchanged_tail() {
        let src = Ref::new(0);
        let s = src.clone();
        let first = deferred_computed(move || s.get() + 1);
        let f = first.clone();
        let second = deferred_computed(move || f.get() > 0);

        let runs = Rc::new(Cell::new(0));
        let (sc, r) = (second.clone(), runs.clone());
        let _e = effect(move || {
            sc.get();
            r.set(r.get() + 1);
        });

        src.set(1);
        assert!(second.get());
        scheduler::run_microtasks();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn works_with_regular_computed_downstream() {
        let src = Ref::new(1);
        let s = src.clone();
        let d = deferred_computed(move || s.get() + 1);
        let dc = d.clone();
        let c = computed(move || dc.get() * 10);
        assert_eq!(c.get(), 20);

        src.set(2);
        scheduler::run_microtasks();
        assert_eq!(c.get(), 30);
    }
}
