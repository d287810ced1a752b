//! Dependency Sets
//!
//! A [`Dep`] is the set of effects subscribed to one reactive source: one
//! key of one target, or the value of one ref or computed.
//!
//! # Marker Bits
//!
//! Each dep carries two bitfields, `was_tracked` (`w`) and `new_tracked`
//! (`n`). While an effect at nesting depth `d` runs, bit `1 << d` in `w`
//! means "this effect depended on me during its previous run" and the same
//! bit in `n` means "this effect has read me during the current run". At
//! the end of the run, deps with `w` set and `n` clear are stale and the
//! effect is removed from them. Keeping one bit per depth lets nested
//! effects track independently without clearing and rebuilding every edge.
//!
//! The dep holds its subscribers strongly; effects hold their deps weakly.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::effect::ReactiveEffect;
use super::subscriber::SubscriberId;

#[derive(Clone, Default)]
pub struct Dep {
    inner: Rc<DepInner>,
}

#[derive(Default)]
pub(crate) struct DepInner {
    subscribers: RefCell<IndexMap<SubscriberId, ReactiveEffect>>,
    was_tracked: Cell<u32>,
    new_tracked: Cell<u32>,
}

#[derive(Clone)]
pub(crate) struct WeakDep(Weak<DepInner>);

impl WeakDep {
    pub(crate) fn upgrade(&self) -> Option<Dep> {
        self.0.upgrade().map(|inner| Dep { inner })
    }
}

impl Dep {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of subscribed effects.
    pub fn len(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, effect: &ReactiveEffect) -> bool {
        self.inner.subscribers.borrow().contains_key(&effect.id())
    }

    /// Snapshot of the subscribers, in subscription order.
    pub fn effects(&self) -> Vec<ReactiveEffect> {
        self.inner.subscribers.borrow().values().cloned().collect()
    }

    pub fn ptr_eq(&self, other: &Dep) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn insert(&self, effect: &ReactiveEffect) {
        self.inner
            .subscribers
            .borrow_mut()
            .insert(effect.id(), effect.clone());
    }

    pub(crate) fn remove(&self, id: SubscriberId) {
        self.inner.subscribers.borrow_mut().shift_remove(&id);
    }

    pub(crate) fn downgrade(&self) -> WeakDep {
        WeakDep(Rc::downgrade(&self.inner))
    }

    pub(crate) fn was_tracked(&self, bit: u32) -> bool {
        self.inner.was_tracked.get() & bit > 0
    }

    pub(crate) fn new_tracked(&self, bit: u32) -> bool {
        self.inner.new_tracked.get() & bit > 0
    }

    pub(crate) fn mark_was_tracked(&self, bit: u32) {
        self.inner.was_tracked.set(self.inner.was_tracked.get() | bit);
    }

    pub(crate) fn mark_new_tracked(&self, bit: u32) {
        self.inner.new_tracked.set(self.inner.new_tracked.get() | bit);
    }

    pub(crate) fn clear_markers(&self, bit: u32) {
        self.inner.was_tracked.set(self.inner.was_tracked.get() & !bit);
        self.inner.new_tracked.set(self.inner.new_tracked.get() & !bit);
    }
}

impl std::fmt::Debug for Dep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dep")
            .field("subscribers", &self.len())
            .field("w", &self.inner.was_tracked.get())
            .field("n", &self.inner.new_tracked.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_are_per_bit() {
        let dep = Dep::new();
        dep.mark_was_tracked(1 << 1);
        dep.mark_new_tracked(1 << 2);

        assert!(dep.was_tracked(1 << 1));
        assert!(!dep.was_tracked(1 << 2));
        assert!(dep.new_tracked(1 << 2));

        dep.clear_markers(1 << 1);
        assert!(!dep.was_tracked(1 << 1));
        assert!(dep.new_tracked(1 << 2));
    }

    #[test]
    fn weak_handle_follows_dep_lifetime() {
        let dep = Dep::new();
        let weak = dep.downgrade();
        assert!(weak.upgrade().is_some());
        drop(dep);
        assert!(weak.upgrade().is_none());
    }
}
