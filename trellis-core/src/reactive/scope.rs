//! Effect Scopes
//!
//! An [`EffectScope`] collects the effects, cleanup callbacks and child
//! scopes created while it is active, so they can be stopped together.
//! Components own one scope each; stopping it tears down every watcher and
//! computed created during setup.
//!
//! A non-detached scope registers itself with the scope that was active
//! when it was created. Stopping a parent stops its children; stopping a
//! child on its own removes it from the parent.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::effect::ReactiveEffect;
use crate::config;

#[derive(Clone)]
pub struct EffectScope {
    inner: Rc<ScopeInner>,
}

struct ScopeInner {
    active: Cell<bool>,
    detached: bool,
    effects: RefCell<Vec<ReactiveEffect>>,
    cleanups: RefCell<Vec<Box<dyn FnOnce()>>>,
    scopes: RefCell<Vec<EffectScope>>,
    parent: Option<Weak<ScopeInner>>,
    prev: RefCell<Option<EffectScope>>,
}

thread_local! {
    static ACTIVE_SCOPE: RefCell<Option<EffectScope>> = const { RefCell::new(None) };
}

impl EffectScope {
    pub fn new(detached: bool) -> Self {
        let parent = if detached { None } else { get_current_scope() };
        let scope = Self {
            inner: Rc::new(ScopeInner {
                active: Cell::new(true),
                detached,
                effects: RefCell::new(Vec::new()),
                cleanups: RefCell::new(Vec::new()),
                scopes: RefCell::new(Vec::new()),
                parent: parent.as_ref().map(|p| Rc::downgrade(&p.inner)),
                prev: RefCell::new(None),
            }),
        };
        if let Some(parent) = parent {
            parent.inner.scopes.borrow_mut().push(scope.clone());
        }
        scope
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Runs `f` with this scope active. Returns `None` on a stopped scope.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        if !self.is_active() {
            config::warn("cannot run an inactive effect scope");
            return None;
        }

        struct Restore(Option<EffectScope>);
        impl Drop for Restore {
            fn drop(&mut self) {
                let prev = self.0.take();
                ACTIVE_SCOPE.with(|slot| *slot.borrow_mut() = prev);
            }
        }

        let prev = ACTIVE_SCOPE.with(|slot| slot.replace(Some(self.clone())));
        let _restore = Restore(prev);
        Some(f())
    }

    /// Makes this scope active until [`off`](Self::off).
    pub fn on(&self) {
        let prev = ACTIVE_SCOPE.with(|slot| slot.replace(Some(self.clone())));
        *self.inner.prev.borrow_mut() = prev;
    }

    pub fn off(&self) {
        let prev = self.inner.prev.borrow_mut().take();
        ACTIVE_SCOPE.with(|slot| *slot.borrow_mut() = prev);
    }

    /// Stops every effect, cleanup and child scope collected so far.
    pub fn stop(&self) {
        self.stop_inner(false);
    }

    fn stop_inner(&self, from_parent: bool) {
        if !self.is_active() {
            return;
        }

        let effects = std::mem::take(&mut *self.inner.effects.borrow_mut());
        for effect in &effects {
            effect.stop();
        }
        let cleanups = std::mem::take(&mut *self.inner.cleanups.borrow_mut());
        for cleanup in cleanups {
            cleanup();
        }
        let scopes = std::mem::take(&mut *self.inner.scopes.borrow_mut());
        for scope in &scopes {
            scope.stop_inner(true);
        }

        if !self.inner.detached && !from_parent {
            if let Some(parent) = self.inner.parent.as_ref().and_then(Weak::upgrade) {
                parent
                    .scopes
                    .borrow_mut()
                    .retain(|child| !Rc::ptr_eq(&child.inner, &self.inner));
            }
        }
        self.inner.active.set(false);
    }

    pub fn effect_count(&self) -> usize {
        self.inner.effects.borrow().len()
    }

    pub fn child_count(&self) -> usize {
        self.inner.scopes.borrow().len()
    }

    pub(crate) fn remove_effect(&self, effect: &ReactiveEffect) {
        self.inner
            .effects
            .borrow_mut()
            .retain(|existing| !existing.ptr_eq(effect));
    }

    pub fn ptr_eq(&self, other: &EffectScope) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Creates a new scope; see [`EffectScope::new`].
pub fn effect_scope(detached: bool) -> EffectScope {
    EffectScope::new(detached)
}

pub fn get_current_scope() -> Option<EffectScope> {
    ACTIVE_SCOPE.with(|slot| slot.borrow().clone())
}

/// Registers `f` to run when the active scope stops.
pub fn on_scope_dispose<F>(f: F)
where
    F: FnOnce() + 'static,
{
    match get_current_scope() {
        Some(scope) => scope.inner.cleanups.borrow_mut().push(Box::new(f)),
        None => config::warn("on_scope_dispose() called with no active effect scope"),
    }
}

pub(crate) fn record_effect_scope(effect: &ReactiveEffect, scope: Option<&EffectScope>) {
    let scope = scope.cloned().or_else(get_current_scope);
    if let Some(scope) = scope {
        if scope.is_active() {
            scope.inner.effects.borrow_mut().push(effect.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{computed, effect, Ref};
    use std::cell::Cell;

    #[test]
    fn collects_effects_and_stops_them() {
        let scope = effect_scope(false);
        let count = Ref::new(0);
        let runs = Rc::new(Cell::new(0));

        scope.run(|| {
            let (c, r) = (count.clone(), runs.clone());
            effect(move || {
                c.get();
                r.set(r.get() + 1);
            });
            let c = count.clone();
            let _doubled = computed(move || c.get() * 2);
        });
        assert_eq!(scope.effect_count(), 2);

        count.set(1);
        assert_eq!(runs.get(), 2);

        scope.stop();
        count.set(2);
        assert_eq!(runs.get(), 2);
        assert!(!scope.is_active());
        assert!(scope.run(|| ()).is_none());
    }

    #[test]
    fn nested_scopes_follow_parent() {
        let parent = effect_scope(false);
        let (child, detached) = parent
            .run(|| (effect_scope(false), effect_scope(true)))
            .unwrap();
        assert_eq!(parent.child_count(), 1);

        parent.stop();
        assert!(!child.is_active());
        assert!(detached.is_active());
    }

    #[test]
    fn stopping_child_detaches_it() {
        let parent = effect_scope(false);
        let child = parent.run(|| effect_scope(false)).unwrap();
        child.stop();
        assert_eq!(parent.child_count(), 0);
        assert!(parent.is_active());
    }

    #[test]
    fn dispose_callbacks_run_on_stop() {
        let scope = effect_scope(false);
        let disposed = Rc::new(Cell::new(false));
        let d = disposed.clone();
        scope.run(|| on_scope_dispose(move || d.set(true)));

        assert!(!disposed.get());
        scope.stop();
        assert!(disposed.get());
    }
}
