//! Components
//!
//! A [`Component`] is a shared, immutable definition built with
//! [`ComponentDef`]. Mounting a component vnode creates a
//! [`ComponentInstance`] which owns:
//!
//! - the resolved props (a shallow reactive object), the fallthrough attrs
//!   and the slots passed by the parent,
//! - a render effect that re-renders the instance's subtree when anything
//!   it read changes, scheduled as a job ordered by the instance uid,
//! - an [`EffectScope`](crate::reactive::EffectScope) collecting every
//!   effect created during setup, stopped on unmount,
//! - lifecycle hooks registered during setup.
//!
//! # Setup
//!
//! `setup` runs once per instance with the props and a [`SetupContext`]. It
//! returns a [`SetupResult`]: a render function, exposed state that the
//! definition's `render` reads, or a [`Pending`] result for async setup.
//! Async setup suspends the nearest suspense boundary until it settles.
//!
//! # Example
//!
//! ```rust,ignore
//! let counter = ComponentDef::new()
//!     .name("Counter")
//!     .prop("start", PropOptions::new().default_value(0))
//!     .setup(|props, _ctx| {
//!         let count = Ref::new(props.get("start"));
//!         SetupResult::render(move |_| text(count.get().to_string()))
//!     })
//!     .build();
//! ```

mod inject;
mod instance;
mod lifecycle;
mod pending;
mod props;
mod render;
mod slots;

pub use inject::{inject, inject_or, provide};
pub use instance::{get_current_instance, get_current_rendering_instance, ComponentInstance, SetupContext, WeakInstance};
pub use lifecycle::{
    on_activated, on_before_mount, on_before_unmount, on_before_update, on_deactivated, on_error_captured,
    on_mounted, on_unmounted, on_updated, LifecycleHook,
};
pub use pending::{pending, Pending, Settle};
pub use props::should_update_component;
pub use slots::{Slot, Slots};

pub(crate) use lifecycle::{invoke_hooks, queue_hooks};
pub(crate) use props::{init_props, update_props};
pub(crate) use render::{finish_setup_result, render_component_root, setup_component, slots_of};

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::{CallResult, IntoCallResult};
use crate::reactive::{Reactive, Value};
use crate::vnode::VNode;

/// Renders an instance's subtree.
pub type RenderFn = Rc<dyn Fn(&ComponentInstance) -> CallResult<VNode>>;

/// `setup(props, ctx)`.
pub type SetupFn = Rc<dyn Fn(&Reactive, &SetupContext) -> CallResult<SetupResult>>;

/// What `setup` hands back.
pub enum SetupResult {
    /// The instance renders with this function.
    Render(RenderFn),
    /// State exposed to the definition's `render` through
    /// [`ComponentInstance::state`].
    State(Value),
    Empty,
    /// Setup finishes later. The enclosing suspense boundary waits for it.
    Async(Pending<SetupResult>),
}

impl SetupResult {
    pub fn render<F, R>(f: F) -> Self
    where
        F: Fn(&ComponentInstance) -> R + 'static,
        R: IntoCallResult<VNode>,
    {
        SetupResult::Render(Rc::new(move |instance: &ComponentInstance| f(instance).into_call_result()))
    }
}

impl fmt::Debug for SetupResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupResult::Render(_) => f.write_str("Render"),
            SetupResult::State(state) => f.debug_tuple("State").field(state).finish(),
            SetupResult::Empty => f.write_str("Empty"),
            SetupResult::Async(pending) => f.debug_tuple("Async").field(pending).finish(),
        }
    }
}

impl IntoCallResult<SetupResult> for SetupResult {
    fn into_call_result(self) -> CallResult<SetupResult> {
        Ok(self)
    }
}

impl IntoCallResult<VNode> for VNode {
    fn into_call_result(self) -> CallResult<VNode> {
        Ok(self)
    }
}

/// Declaration of one component prop.
#[derive(Debug, Clone, Default)]
pub struct PropOptions {
    pub default: Option<Value>,
    pub required: bool,
    /// Absent means `false`; an empty string or the prop's own hyphenated
    /// name means `true`.
    pub boolean: bool,
}

impl PropOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn boolean(mut self) -> Self {
        self.boolean = true;
        self
    }
}

/// Built-in component behaviour the renderer must know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    KeepAlive,
}

/// Component definition builder.
#[derive(Clone)]
pub struct ComponentDef {
    pub(crate) name: Option<Rc<str>>,
    pub(crate) props: Option<IndexMap<Rc<str>, PropOptions>>,
    pub(crate) emits: Option<Vec<Rc<str>>>,
    pub(crate) inherit_attrs: bool,
    pub(crate) setup: Option<SetupFn>,
    pub(crate) render: Option<RenderFn>,
    pub(crate) functional: bool,
    pub(crate) scope_id: Option<Rc<str>>,
    pub(crate) builtin: Option<Builtin>,
}

impl Default for ComponentDef {
    fn default() -> Self {
        Self {
            name: None,
            props: None,
            emits: None,
            inherit_attrs: true,
            setup: None,
            render: None,
            functional: false,
            scope_id: None,
            builtin: None,
        }
    }
}

impl ComponentDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(Rc::from(name));
        self
    }

    /// Declares a prop. Names are given in camelCase; hyphenated names
    /// passed by the parent are matched to them.
    pub fn prop(mut self, name: &str, options: PropOptions) -> Self {
        self.props
            .get_or_insert_with(IndexMap::new)
            .insert(Rc::from(name), options);
        self
    }

    /// Declares several props with default options.
    pub fn props<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        let declared = self.props.get_or_insert_with(IndexMap::new);
        for name in names {
            declared.insert(Rc::from(name), PropOptions::default());
        }
        self
    }

    /// Declares emitted events. Their listeners are kept out of attrs.
    pub fn emits<'a>(mut self, events: impl IntoIterator<Item = &'a str>) -> Self {
        self.emits
            .get_or_insert_with(Vec::new)
            .extend(events.into_iter().map(Rc::from));
        self
    }

    pub fn inherit_attrs(mut self, inherit: bool) -> Self {
        self.inherit_attrs = inherit;
        self
    }

    pub fn setup<F, R>(mut self, f: F) -> Self
    where
        F: Fn(&Reactive, &SetupContext) -> R + 'static,
        R: IntoCallResult<SetupResult>,
    {
        self.setup = Some(Rc::new(move |props: &Reactive, ctx: &SetupContext| f(props, ctx).into_call_result()));
        self
    }

    /// Setup that completes later.
    pub fn async_setup<F>(mut self, f: F) -> Self
    where
        F: Fn(&Reactive, &SetupContext) -> Pending<SetupResult> + 'static,
    {
        self.setup = Some(Rc::new(move |props: &Reactive, ctx: &SetupContext| {
            Ok(SetupResult::Async(f(props, ctx)))
        }));
        self
    }

    /// Render function used when `setup` does not return one.
    pub fn render<F, R>(mut self, f: F) -> Self
    where
        F: Fn(&ComponentInstance) -> R + 'static,
        R: IntoCallResult<VNode>,
    {
        self.render = Some(Rc::new(move |instance: &ComponentInstance| f(instance).into_call_result()));
        self
    }

    /// A stateless component: `f` is its render function and it has no
    /// setup. Without declared props it receives every passed prop.
    pub fn functional<F, R>(self, f: F) -> Self
    where
        F: Fn(&ComponentInstance) -> R + 'static,
        R: IntoCallResult<VNode>,
    {
        let mut def = self.render(f);
        def.functional = true;
        def
    }

    pub fn scope_id(mut self, id: &str) -> Self {
        self.scope_id = Some(Rc::from(id));
        self
    }

    pub(crate) fn builtin(mut self, builtin: Builtin) -> Self {
        self.builtin = Some(builtin);
        self
    }

    pub fn build(self) -> Component {
        Component(Rc::new(self))
    }
}

/// Shared component definition. Compares by identity.
#[derive(Clone)]
pub struct Component(Rc<ComponentDef>);

impl Component {
    pub fn def(&self) -> &ComponentDef {
        &self.0
    }

    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    pub fn is_functional(&self) -> bool {
        self.0.functional
    }

    pub fn is_keep_alive(&self) -> bool {
        self.0.builtin == Some(Builtin::KeepAlive)
    }

    pub fn scope_id(&self) -> Option<&Rc<str>> {
        self.0.scope_id.as_ref()
    }

    pub fn ptr_eq(&self, other: &Component) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }
}

impl From<ComponentDef> for Component {
    fn from(def: ComponentDef) -> Self {
        def.build()
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Component {}

impl std::hash::Hash for Component {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.name().unwrap_or("Anonymous"))
    }
}

impl ComponentDef {
    pub(crate) fn is_emit_listener(&self, key: &str) -> bool {
        let Some(emits) = &self.emits else {
            return false;
        };
        let Some(event) = key.strip_prefix("on") else {
            return false;
        };
        let event = event.strip_suffix("Once").unwrap_or(event);
        let mut chars = event.chars();
        let lowered = match chars.next() {
            Some(first) => format!("{}{}", first.to_lowercase(), chars.as_str()),
            None => return false,
        };
        let hyphenated = crate::vnode::props::hyphenate(&lowered);
        emits.iter().any(|e| **e == *lowered || **e == *hyphenated || **e == *event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn components_compare_by_identity() {
        let a = ComponentDef::new().name("A").build();
        let b = ComponentDef::new().name("A").build();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn emit_listeners_are_recognized() {
        let def = ComponentDef::new().emits(["change", "update:modelValue", "item-click"]);
        assert!(def.is_emit_listener("onChange"));
        assert!(def.is_emit_listener("onChangeOnce"));
        assert!(def.is_emit_listener("onUpdate:modelValue"));
        assert!(def.is_emit_listener("onItemClick"));
        assert!(!def.is_emit_listener("onClick"));
        assert!(!def.is_emit_listener("change"));
    }
}
