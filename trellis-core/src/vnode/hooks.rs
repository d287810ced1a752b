//! Hook contracts carried by vnodes: directives, transitions and template
//! refs. The renderer calls into these at fixed points of an element's
//! life; what the hooks do is up to their provider.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::VNode;
use crate::component::{get_current_rendering_instance, ComponentInstance, WeakInstance};
use crate::error::{call_with_error_handling, CallResult, ErrorKind};
use crate::reactive::{pause_tracking, reset_tracking, Ref, Trackable, Value};
use crate::renderer::NodeHandle;

// ----------------------------------------------------------------------------
// Directives
// ----------------------------------------------------------------------------

/// `(el, binding, vnode, previous vnode)`.
pub type DirectiveHookFn = Rc<dyn Fn(NodeHandle, &DirectiveBinding, &VNode, Option<&VNode>) -> CallResult>;

/// The points at which directive hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveHook {
    Created,
    BeforeMount,
    Mounted,
    BeforeUpdate,
    Updated,
    BeforeUnmount,
    Unmounted,
}

/// A set of element hooks.
#[derive(Clone, Default)]
pub struct Directive {
    pub created: Option<DirectiveHookFn>,
    pub before_mount: Option<DirectiveHookFn>,
    pub mounted: Option<DirectiveHookFn>,
    pub before_update: Option<DirectiveHookFn>,
    pub updated: Option<DirectiveHookFn>,
    pub before_unmount: Option<DirectiveHookFn>,
    pub unmounted: Option<DirectiveHookFn>,
}

impl Directive {
    fn hook(&self, which: DirectiveHook) -> Option<&DirectiveHookFn> {
        match which {
            DirectiveHook::Created => self.created.as_ref(),
            DirectiveHook::BeforeMount => self.before_mount.as_ref(),
            DirectiveHook::Mounted => self.mounted.as_ref(),
            DirectiveHook::BeforeUpdate => self.before_update.as_ref(),
            DirectiveHook::Updated => self.updated.as_ref(),
            DirectiveHook::BeforeUnmount => self.before_unmount.as_ref(),
            DirectiveHook::Unmounted => self.unmounted.as_ref(),
        }
    }

    /// A directive whose `mounted` and `updated` hooks both run `f`.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(NodeHandle, &DirectiveBinding, &VNode, Option<&VNode>) -> CallResult + 'static,
    {
        let f: DirectiveHookFn = Rc::new(f);
        Self {
            mounted: Some(f.clone()),
            updated: Some(f),
            ..Default::default()
        }
    }
}

/// One directive applied to one element.
#[derive(Clone)]
pub struct DirectiveBinding {
    pub dir: Rc<Directive>,
    pub value: Value,
    pub old_value: Value,
    pub arg: Option<Rc<str>>,
    pub modifiers: Vec<Rc<str>>,
    pub instance: Option<WeakInstance>,
}

impl fmt::Debug for DirectiveBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectiveBinding")
            .field("value", &self.value)
            .field("old_value", &self.old_value)
            .field("arg", &self.arg)
            .field("modifiers", &self.modifiers)
            .finish()
    }
}

/// Attaches directives to `vnode`. Only valid inside a render function.
pub fn with_directives<I>(vnode: VNode, directives: I) -> VNode
where
    I: IntoIterator<Item = (Rc<Directive>, Value, Option<Rc<str>>, Vec<Rc<str>>)>,
{
    let Some(instance) = get_current_rendering_instance() else {
        crate::config::warn("with_directives can only be used inside render functions");
        return vnode;
    };
    let owner = instance.downgrade();
    {
        let mut dirs = vnode.dirs_mut();
        for (dir, value, arg, modifiers) in directives {
            dirs.push(DirectiveBinding {
                dir,
                value,
                old_value: Value::Undefined,
                arg,
                modifiers,
                instance: Some(owner.clone()),
            });
        }
    }
    vnode
}

/// Runs the `which` hook of every directive on `vnode`.
pub(crate) fn invoke_directive_hook(
    vnode: &VNode,
    prev: Option<&VNode>,
    instance: Option<&ComponentInstance>,
    which: DirectiveHook,
) {
    let Some(el) = vnode.el() else {
        return;
    };
    let old_values: Vec<Value> = prev
        .map(|p| p.dirs().iter().map(|b| b.value.clone()).collect())
        .unwrap_or_default();
    let count = vnode.dirs().len();
    for i in 0..count {
        let binding = {
            let mut dirs = vnode.dirs_mut();
            if let Some(old) = old_values.get(i) {
                dirs[i].old_value = old.clone();
            }
            dirs[i].clone()
        };
        if let Some(hook) = binding.dir.hook(which) {
            // Hooks may read reactive state without subscribing the
            // surrounding render to it.
            pause_tracking();
            let _: Option<()> =
                call_with_error_handling(ErrorKind::DirectiveHook, instance, || hook(el, &binding, vnode, prev));
            reset_tracking();
        }
    }
}

// ----------------------------------------------------------------------------
// Transitions
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionMode {
    #[default]
    Default,
    InOut,
    OutIn,
}

pub type ElementHook = Rc<dyn Fn(NodeHandle)>;
/// `(el, done)`: the leave hook must call `done` to let the removal happen.
pub type LeaveHook = Rc<dyn Fn(NodeHandle, Box<dyn FnOnce()>)>;
/// `(el, remove now, leave later)`.
pub type DelayLeaveHook = Rc<dyn Fn(NodeHandle, Box<dyn FnOnce()>, Box<dyn FnOnce()>)>;

/// Enter/leave hooks consulted when elements are inserted, moved or
/// removed.
#[derive(Default)]
pub struct TransitionHooks {
    pub mode: TransitionMode,
    /// The element stays in place on leave; only hooks run.
    pub persisted: bool,
    pub before_enter: Option<ElementHook>,
    pub enter: Option<ElementHook>,
    pub leave: Option<LeaveHook>,
    pub delay_leave: Option<DelayLeaveHook>,
    after_leave: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl TransitionHooks {
    /// Sets the callback run once the leaving element is removed.
    pub fn set_after_leave(&self, f: impl FnOnce() + 'static) {
        *self.after_leave.borrow_mut() = Some(Box::new(f));
    }

    pub(crate) fn take_after_leave(&self) -> Option<Box<dyn FnOnce()>> {
        self.after_leave.borrow_mut().take()
    }
}

impl fmt::Debug for TransitionHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionHooks")
            .field("mode", &self.mode)
            .field("persisted", &self.persisted)
            .finish()
    }
}

/// Attaches transition hooks to `vnode`. Component vnodes forward them to
/// their rendered root.
pub fn with_transition(vnode: VNode, hooks: Rc<TransitionHooks>) -> VNode {
    vnode.set_transition(Some(hooks));
    vnode
}

// ----------------------------------------------------------------------------
// Template refs
// ----------------------------------------------------------------------------

/// What a template ref points at once mounted.
#[derive(Clone)]
pub enum RefTarget {
    Element(NodeHandle),
    Component(ComponentInstance),
}

impl PartialEq for RefTarget {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RefTarget::Element(a), RefTarget::Element(b)) => a == b,
            (RefTarget::Component(a), RefTarget::Component(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for RefTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefTarget::Element(el) => write!(f, "Element({el:?})"),
            RefTarget::Component(i) => write!(f, "Component(#{})", i.uid()),
        }
    }
}

impl Trackable for RefTarget {
    fn has_changed(&self, old: &Self) -> bool {
        self != old
    }

    fn placeholder() -> Self {
        RefTarget::Element(NodeHandle(0))
    }
}

/// How a template ref is stored.
#[derive(Clone)]
pub enum RefBinding {
    /// Recorded by name on the owning instance (see
    /// [`ComponentInstance::template_ref`]).
    Named(Rc<str>),
    Callback(Rc<dyn Fn(Option<RefTarget>)>),
    Ref(Ref<Option<RefTarget>>),
}

impl RefBinding {
    pub fn callback(f: impl Fn(Option<RefTarget>) + 'static) -> Self {
        RefBinding::Callback(Rc::new(f))
    }

    pub(crate) fn same_as(&self, other: &RefBinding) -> bool {
        match (self, other) {
            (RefBinding::Named(a), RefBinding::Named(b)) => a == b,
            (RefBinding::Callback(a), RefBinding::Callback(b)) => {
                Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const ()
            }
            (RefBinding::Ref(a), RefBinding::Ref(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<&str> for RefBinding {
    fn from(name: &str) -> Self {
        RefBinding::Named(Rc::from(name))
    }
}

impl From<Ref<Option<RefTarget>>> for RefBinding {
    fn from(r: Ref<Option<RefTarget>>) -> Self {
        RefBinding::Ref(r)
    }
}

/// A template ref together with the instance whose render created it.
#[derive(Clone)]
pub struct VNodeRef {
    pub binding: RefBinding,
    pub owner: Option<WeakInstance>,
}

/// Attaches a template ref to `vnode`, owned by the instance currently
/// rendering.
pub fn with_ref(vnode: VNode, binding: impl Into<RefBinding>) -> VNode {
    let owner = get_current_rendering_instance().map(|i| i.downgrade());
    vnode.edit(|inner| {
        inner.node_ref = Some(VNodeRef {
            binding: binding.into(),
            owner,
        })
    })
}
