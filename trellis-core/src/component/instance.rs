//! Component instances.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::lifecycle::{Hook, LifecycleHook};
use super::{Component, Pending, RenderFn, SetupResult, Slots};
use crate::builtins::keep_alive::KeepAliveHooks;
use crate::builtins::suspense::SuspenseBoundary;
use crate::error::{call_with_error_handling, Error, ErrorKind};
use crate::reactive::{
    shallow_reactive, track_ref_value, trigger_ref_value, unref, Dep, EffectScope, RawObject, Reactive,
    ReactiveEffect, Value,
};
use crate::scheduler::{queue_job, Job};
use crate::vnode::props::{camelize, hyphenate, to_handler_key};
use crate::vnode::{Props, RefTarget, VNode};

pub(crate) type ErrorCapturedHook = Rc<dyn Fn(&Error, &ComponentInstance, ErrorKind) -> bool>;

thread_local! {
    static NEXT_UID: Cell<u64> = const { Cell::new(0) };
    static CURRENT_INSTANCE: RefCell<Option<ComponentInstance>> = const { RefCell::new(None) };
    static CURRENT_RENDERING_INSTANCE: RefCell<Option<ComponentInstance>> = const { RefCell::new(None) };
}

/// A mounted component.
///
/// Handles are cheap to clone and compare by identity.
#[derive(Clone)]
pub struct ComponentInstance {
    inner: Rc<InstanceInner>,
}

/// Non-owning handle to a [`ComponentInstance`].
#[derive(Clone)]
pub struct WeakInstance(Weak<InstanceInner>);

impl WeakInstance {
    pub fn upgrade(&self) -> Option<ComponentInstance> {
        self.0.upgrade().map(|inner| ComponentInstance { inner })
    }
}

pub(crate) struct InstanceInner {
    uid: u64,
    def: Component,
    parent: Option<WeakInstance>,
    vnode: RefCell<VNode>,
    next: RefCell<Option<VNode>>,
    sub_tree: RefCell<Option<VNode>>,
    effect: RefCell<Option<ReactiveEffect>>,
    update: RefCell<Option<Job>>,
    scope: EffectScope,
    render: RefCell<Option<RenderFn>>,

    props: Reactive,
    attrs: RefCell<Props>,
    attrs_dep: Dep,
    slots: RefCell<Slots>,
    setup_state: RefCell<Value>,
    exposed: RefCell<Option<Value>>,
    refs: RefCell<IndexMap<Rc<str>, RefTarget>>,
    provides: RefCell<HashMap<Rc<str>, Value>>,

    suspense: Option<SuspenseBoundary>,
    suspense_id: u64,
    async_setup: RefCell<Option<Pending<SetupResult>>>,
    has_async_dep: Cell<bool>,
    async_resolved: Cell<bool>,

    is_mounted: Cell<bool>,
    is_unmounted: Cell<bool>,
    is_deactivated: Cell<bool>,
    hooks: RefCell<HashMap<LifecycleHook, Vec<Hook>>>,
    error_captured: RefCell<Vec<ErrorCapturedHook>>,

    keep_alive: RefCell<Option<Rc<KeepAliveHooks>>>,
}

impl ComponentInstance {
    pub(crate) fn new(
        def: Component,
        vnode: &VNode,
        parent: Option<&ComponentInstance>,
        suspense: Option<&SuspenseBoundary>,
    ) -> Self {
        let uid = NEXT_UID.with(|n| {
            n.set(n.get() + 1);
            n.get()
        });
        Self {
            inner: Rc::new(InstanceInner {
                uid,
                def,
                parent: parent.map(ComponentInstance::downgrade),
                vnode: RefCell::new(vnode.clone()),
                next: RefCell::new(None),
                sub_tree: RefCell::new(None),
                effect: RefCell::new(None),
                update: RefCell::new(None),
                scope: EffectScope::new(true),
                render: RefCell::new(None),
                props: shallow_reactive(RawObject::object()),
                attrs: RefCell::new(Props::new()),
                attrs_dep: Dep::new(),
                slots: RefCell::new(Slots::new()),
                setup_state: RefCell::new(Value::Undefined),
                exposed: RefCell::new(None),
                refs: RefCell::new(IndexMap::new()),
                provides: RefCell::new(HashMap::new()),
                suspense: suspense.cloned(),
                suspense_id: suspense.map(SuspenseBoundary::pending_id).unwrap_or(0),
                async_setup: RefCell::new(None),
                has_async_dep: Cell::new(false),
                async_resolved: Cell::new(false),
                is_mounted: Cell::new(false),
                is_unmounted: Cell::new(false),
                is_deactivated: Cell::new(false),
                hooks: RefCell::new(HashMap::new()),
                error_captured: RefCell::new(Vec::new()),
                keep_alive: RefCell::new(None),
            }),
        }
    }

    /// Creation-order id. Parents always have smaller uids than children.
    pub fn uid(&self) -> u64 {
        self.inner.uid
    }

    pub fn def(&self) -> &Component {
        &self.inner.def
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.def.name()
    }

    pub fn parent(&self) -> Option<ComponentInstance> {
        self.inner.parent.as_ref().and_then(WeakInstance::upgrade)
    }

    /// The vnode this instance is currently mounted from.
    pub fn vnode(&self) -> VNode {
        self.inner.vnode.borrow().clone()
    }

    pub(crate) fn set_vnode(&self, vnode: VNode) {
        *self.inner.vnode.borrow_mut() = vnode;
    }

    pub(crate) fn take_next(&self) -> Option<VNode> {
        self.inner.next.borrow_mut().take()
    }

    pub(crate) fn set_next(&self, next: Option<VNode>) {
        *self.inner.next.borrow_mut() = next;
    }

    /// The rendered subtree.
    pub fn sub_tree(&self) -> Option<VNode> {
        self.inner.sub_tree.borrow().clone()
    }

    pub(crate) fn set_sub_tree(&self, tree: Option<VNode>) -> Option<VNode> {
        std::mem::replace(&mut *self.inner.sub_tree.borrow_mut(), tree)
    }

    pub fn effect(&self) -> Option<ReactiveEffect> {
        self.inner.effect.borrow().clone()
    }

    pub(crate) fn set_effect(&self, effect: ReactiveEffect) {
        *self.inner.effect.borrow_mut() = Some(effect);
    }

    /// The update job; `None` before the first render.
    pub fn update_job(&self) -> Option<Job> {
        self.inner.update.borrow().clone()
    }

    pub(crate) fn set_update_job(&self, job: Job) {
        *self.inner.update.borrow_mut() = Some(job);
    }

    /// Schedules a re-render.
    pub fn force_update(&self) {
        if let Some(job) = self.update_job() {
            queue_job(job);
        }
    }

    pub fn scope(&self) -> &EffectScope {
        &self.inner.scope
    }

    pub(crate) fn render_fn(&self) -> Option<RenderFn> {
        self.inner.render.borrow().clone()
    }

    pub(crate) fn set_render_fn(&self, render: Option<RenderFn>) {
        *self.inner.render.borrow_mut() = render;
    }

    /// Resolved props.
    pub fn props(&self) -> &Reactive {
        &self.inner.props
    }

    pub fn prop(&self, key: &str) -> Value {
        self.inner.props.get(key)
    }

    /// Passed props that are not declared, tracked for the current effect.
    pub fn attrs(&self) -> Props {
        track_ref_value(&self.inner.attrs_dep);
        self.inner.attrs.borrow().clone()
    }

    pub(crate) fn attrs_untracked(&self) -> Props {
        self.inner.attrs.borrow().clone()
    }

    /// Replaces the attrs, notifying readers if they changed.
    pub(crate) fn set_attrs(&self, attrs: Props, notify: bool) {
        let changed = *self.inner.attrs.borrow() != attrs;
        *self.inner.attrs.borrow_mut() = attrs;
        if changed && notify {
            trigger_ref_value(&self.inner.attrs_dep);
        }
    }

    pub fn slots(&self) -> Slots {
        self.inner.slots.borrow().clone()
    }

    pub(crate) fn set_slots(&self, slots: Slots) {
        *self.inner.slots.borrow_mut() = slots;
    }

    /// State returned by setup.
    pub fn setup_state(&self) -> Value {
        self.inner.setup_state.borrow().clone()
    }

    pub(crate) fn set_setup_state(&self, state: Value) {
        *self.inner.setup_state.borrow_mut() = state;
    }

    /// One entry of the setup state, with refs unwrapped.
    pub fn state(&self, key: &str) -> Value {
        match &*self.inner.setup_state.borrow() {
            Value::Proxy(proxy) => proxy.get(key),
            Value::Object(raw) => unref(&raw.get(key)),
            _ => Value::Undefined,
        }
    }

    /// What a parent's template ref to this instance resolves to.
    pub fn exposed(&self) -> Option<Value> {
        self.inner.exposed.borrow().clone()
    }

    pub fn expose(&self, value: Value) {
        *self.inner.exposed.borrow_mut() = Some(value);
    }

    /// The element or component recorded under a named template ref.
    pub fn template_ref(&self, name: &str) -> Option<RefTarget> {
        self.inner.refs.borrow().get(name).cloned()
    }

    pub(crate) fn set_template_ref(&self, name: &Rc<str>, target: Option<RefTarget>) {
        let mut refs = self.inner.refs.borrow_mut();
        match target {
            Some(target) => {
                refs.insert(name.clone(), target);
            }
            None => {
                refs.shift_remove(name);
            }
        }
    }

    pub(crate) fn own_provides(&self) -> std::cell::RefMut<'_, HashMap<Rc<str>, Value>> {
        self.inner.provides.borrow_mut()
    }

    pub(crate) fn lookup_provided(&self, key: &str) -> Option<Value> {
        self.inner.provides.borrow().get(key).cloned()
    }

    pub fn suspense(&self) -> Option<&SuspenseBoundary> {
        self.inner.suspense.as_ref()
    }

    pub(crate) fn suspense_id(&self) -> u64 {
        self.inner.suspense_id
    }

    pub(crate) fn set_async_setup(&self, pending: Pending<SetupResult>) {
        self.inner.has_async_dep.set(true);
        *self.inner.async_setup.borrow_mut() = Some(pending);
    }

    pub(crate) fn take_async_setup(&self) -> Option<Pending<SetupResult>> {
        self.inner.async_setup.borrow_mut().take()
    }

    /// Whether setup returned a pending result.
    pub fn has_async_dep(&self) -> bool {
        self.inner.has_async_dep.get()
    }

    pub fn is_async_resolved(&self) -> bool {
        self.inner.async_resolved.get()
    }

    pub(crate) fn set_async_resolved(&self) {
        self.inner.async_resolved.set(true);
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.is_mounted.get()
    }

    pub(crate) fn set_mounted(&self) {
        self.inner.is_mounted.set(true);
    }

    pub fn is_unmounted(&self) -> bool {
        self.inner.is_unmounted.get()
    }

    pub(crate) fn set_unmounted(&self) {
        self.inner.is_unmounted.set(true);
    }

    pub fn is_deactivated(&self) -> bool {
        self.inner.is_deactivated.get()
    }

    pub(crate) fn set_deactivated(&self, deactivated: bool) {
        self.inner.is_deactivated.set(deactivated);
    }

    pub(crate) fn add_hook(&self, kind: LifecycleHook, hook: Hook) {
        self.inner.hooks.borrow_mut().entry(kind).or_default().push(hook);
    }

    pub(crate) fn hooks(&self, kind: LifecycleHook) -> Vec<Hook> {
        self.inner.hooks.borrow().get(&kind).cloned().unwrap_or_default()
    }

    pub(crate) fn add_error_captured(&self, hook: ErrorCapturedHook) {
        self.inner.error_captured.borrow_mut().push(hook);
    }

    pub(crate) fn error_captured_hooks(&self) -> Vec<ErrorCapturedHook> {
        self.inner.error_captured.borrow().clone()
    }

    pub(crate) fn keep_alive_hooks(&self) -> Option<Rc<KeepAliveHooks>> {
        self.inner.keep_alive.borrow().clone()
    }

    pub(crate) fn set_keep_alive_hooks(&self, hooks: Rc<KeepAliveHooks>) {
        *self.inner.keep_alive.borrow_mut() = Some(hooks);
    }

    /// Drops the links that keep an unmounted instance and its vnodes
    /// alive through each other.
    pub(crate) fn release(&self) {
        self.inner.sub_tree.borrow_mut().take();
        self.inner.effect.borrow_mut().take();
        self.inner.next.borrow_mut().take();
        self.inner.keep_alive.borrow_mut().take();
        self.inner.hooks.borrow_mut().clear();
        let vnode = self.vnode();
        if vnode.component().is_some_and(|c| c.ptr_eq(self)) {
            vnode.set_component(None);
        }
    }

    /// Emits `event` to the listener the parent passed as `on<Event>`.
    pub fn emit(&self, event: &str, args: &[Value]) {
        if self.is_unmounted() {
            return;
        }
        let def = self.inner.def.def();
        if let Some(emits) = &def.emits {
            let declared = emits.iter().any(|e| **e == *event);
            let is_prop = def.props.as_ref().is_some_and(|p| p.contains_key(to_handler_key(&camelize(event)).as_str()));
            if !declared && !is_prop {
                crate::config::warn(format_args!(
                    "component emitted event {event:?} but it is not declared in its emits"
                ));
            }
        }

        let vnode = self.vnode();
        let Some(props) = vnode.props() else {
            return;
        };
        let handler = props
            .get(&to_handler_key(event))
            .or_else(|| props.get(&to_handler_key(&camelize(event))))
            .or_else(|| props.get(&to_handler_key(&hyphenate(event))));
        let Some(handler) = handler else {
            return;
        };
        for h in handler.handlers() {
            let _: Option<()> =
                call_with_error_handling(ErrorKind::ComponentEventHandler, Some(self), || h(args));
        }
    }

    pub fn downgrade(&self) -> WeakInstance {
        WeakInstance(Rc::downgrade(&self.inner))
    }

    pub fn ptr_eq(&self, other: &ComponentInstance) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("uid", &self.inner.uid)
            .field("name", &self.name())
            .field("mounted", &self.is_mounted())
            .field("unmounted", &self.is_unmounted())
            .finish()
    }
}

/// Second argument to `setup`.
pub struct SetupContext {
    instance: ComponentInstance,
}

impl SetupContext {
    pub(crate) fn new(instance: &ComponentInstance) -> Self {
        Self {
            instance: instance.clone(),
        }
    }

    pub fn instance(&self) -> &ComponentInstance {
        &self.instance
    }

    pub fn attrs(&self) -> Props {
        self.instance.attrs()
    }

    pub fn slots(&self) -> Slots {
        self.instance.slots()
    }

    pub fn emit(&self, event: &str, args: &[Value]) {
        self.instance.emit(event, args);
    }

    pub fn expose(&self, value: Value) {
        self.instance.expose(value);
    }
}

// ----------------------------------------------------------------------------
// Current instance
// ----------------------------------------------------------------------------

/// The instance whose setup or lifecycle hook is running, or else the one
/// currently rendering.
pub fn get_current_instance() -> Option<ComponentInstance> {
    CURRENT_INSTANCE
        .with(|slot| slot.borrow().clone())
        .or_else(get_current_rendering_instance)
}

/// The instance whose render function is running.
pub fn get_current_rendering_instance() -> Option<ComponentInstance> {
    CURRENT_RENDERING_INSTANCE.with(|slot| slot.borrow().clone())
}

#[derive(Clone, Copy)]
enum GuardSlot {
    Current,
    Rendering,
}

/// Restores the previous current (or rendering) instance on drop.
pub(crate) struct CurrentInstanceGuard {
    slot: GuardSlot,
    prev: Option<ComponentInstance>,
}

impl CurrentInstanceGuard {
    pub(crate) fn enter(instance: &ComponentInstance) -> Self {
        let prev = CURRENT_INSTANCE.with(|slot| slot.replace(Some(instance.clone())));
        Self {
            slot: GuardSlot::Current,
            prev,
        }
    }

    pub(crate) fn rendering(instance: &ComponentInstance) -> Self {
        let prev = CURRENT_RENDERING_INSTANCE.with(|slot| slot.replace(Some(instance.clone())));
        Self {
            slot: GuardSlot::Rendering,
            prev,
        }
    }
}

impl Drop for CurrentInstanceGuard {
    fn drop(&mut self) {
        let prev = self.prev.take();
        match self.slot {
            GuardSlot::Current => CURRENT_INSTANCE.with(|slot| *slot.borrow_mut() = prev),
            GuardSlot::Rendering => CURRENT_RENDERING_INSTANCE.with(|slot| *slot.borrow_mut() = prev),
        }
    }
}
