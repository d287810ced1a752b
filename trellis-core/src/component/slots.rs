//! Slots: named child render functions passed to a component.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::reactive::Value;
use crate::vnode::VNode;

/// Renders slot content for the given slot props.
pub type Slot = Rc<dyn Fn(&Value) -> Vec<VNode>>;

#[derive(Clone, Default)]
pub struct Slots {
    entries: IndexMap<Rc<str>, Slot>,
    stable: bool,
}

impl Slots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slots whose content only depends on the child's own state. A parent
    /// re-render passing stable slots does not force the child to update.
    pub fn stable() -> Self {
        Self {
            entries: IndexMap::new(),
            stable: true,
        }
    }

    pub fn with(mut self, name: &str, slot: Slot) -> Self {
        self.insert(name, slot);
        self
    }

    /// Adds a slot from a closure.
    pub fn with_fn<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&Value) -> Vec<VNode> + 'static,
    {
        self.with(name, Rc::new(f))
    }

    pub fn insert(&mut self, name: &str, slot: Slot) {
        self.entries.insert(Rc::from(name), slot);
    }

    pub fn get(&self, name: &str) -> Option<Slot> {
        self.entries.get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Renders slot `name`; a missing slot renders nothing.
    pub fn render(&self, name: &str, props: &Value) -> Vec<VNode> {
        match self.entries.get(name) {
            Some(slot) => slot(props),
            None => Vec::new(),
        }
    }

    pub fn names(&self) -> Vec<Rc<str>> {
        self.entries.keys().cloned().collect()
    }

    pub fn is_stable(&self) -> bool {
        self.stable
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl fmt::Debug for Slots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slots")
            .field("names", &self.names())
            .field("stable", &self.stable)
            .finish()
    }
}
