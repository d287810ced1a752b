//! Reconciler
//!
//! The renderer turns vnode trees into host nodes and keeps them in sync.
//! It is generic over a [`HostOps`] implementation; the only state it keeps
//! itself is the last tree rendered into each container.
//!
//! # Patching
//!
//! [`Renderer::render`] diffs the new tree against the previous one:
//!
//! - nodes of a different type (or key) are unmounted and the new node is
//!   mounted in their place,
//! - elements are patched in place: props first guided by patch flags,
//!   then children,
//! - child lists are diffed by key with a longest-increasing-subsequence
//!   pass so that the minimum number of nodes move,
//! - component vnodes reuse their instance and only re-render when their
//!   inputs changed.
//!
//! Blocks (vnodes carrying `dynamic_children`) are patched by walking only
//! their flat list of dynamic descendants.
//!
//! # Scheduling
//!
//! Each component owns a render effect whose scheduler queues the
//! component's update job. Post-render work (mounted/updated hooks,
//! template refs, transition enters) runs as post-flush callbacks, held
//! back by a pending suspense boundary until it resolves.

mod children;
mod component;
mod host;
mod patch;
pub mod test_host;
mod unmount;

pub use children::longest_increasing_subsequence;
pub use host::{HostOps, NodeHandle};

pub(crate) use component::update_hoc_host_el;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::builtins::suspense::{queue_effect_with_suspense, SuspenseBoundary};
use crate::component::ComponentInstance;
use crate::error::{call_with_error_handling, take_unhandled, Error, ErrorKind};
use crate::scheduler::{flush_post_flush_cbs, flush_pre_flush_cbs, Job};
use crate::vnode::{shape, PropValue, RefBinding, RefTarget, VNode, VNodeRef};

/// Where a patch happens: the owning component, the enclosing suspense
/// boundary and whether the optimized (block) path may be taken.
#[derive(Clone, Copy, Default)]
pub(crate) struct PatchContext<'a> {
    pub parent: Option<&'a ComponentInstance>,
    pub suspense: Option<&'a SuspenseBoundary>,
    pub optimized: bool,
}

impl<'a> PatchContext<'a> {
    pub(crate) fn with_suspense(self, suspense: Option<&'a SuspenseBoundary>) -> Self {
        Self { suspense, ..self }
    }

    pub(crate) fn unoptimized(self) -> Self {
        Self {
            optimized: false,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MoveType {
    Enter,
    Leave,
    Reorder,
}

/// The renderer operations built-in components call back into.
pub(crate) trait RendererInternals {
    fn patch(&self, n1: Option<&VNode>, n2: &VNode, container: NodeHandle, anchor: Option<NodeHandle>, ctx: PatchContext<'_>);

    fn unmount(&self, vnode: &VNode, ctx: PatchContext<'_>, do_remove: bool);

    fn move_node(
        &self,
        vnode: &VNode,
        container: NodeHandle,
        anchor: Option<NodeHandle>,
        move_type: MoveType,
        suspense: Option<&SuspenseBoundary>,
    );

    /// Mounts the array children of `parent`.
    fn mount_children(&self, parent: &VNode, container: NodeHandle, anchor: Option<NodeHandle>, ctx: PatchContext<'_>);

    /// Diffs the children of `n1` against those of `n2`.
    fn patch_children(&self, n1: &VNode, n2: &VNode, container: NodeHandle, anchor: Option<NodeHandle>, ctx: PatchContext<'_>);

    fn patch_block_children(&self, old: &[VNode], new: &[VNode], fallback_container: NodeHandle, ctx: PatchContext<'_>);

    /// The host node right after everything `vnode` rendered.
    fn next_host_node(&self, vnode: &VNode) -> Option<NodeHandle>;

    /// Creates the render effect of a set-up instance and runs it.
    fn setup_render_effect(
        &self,
        instance: &ComponentInstance,
        container: NodeHandle,
        anchor: Option<NodeHandle>,
        suspense: Option<&SuspenseBoundary>,
        optimized: bool,
    );

    fn host(&self) -> &dyn HostOps;

    fn handle(&self) -> Weak<dyn RendererInternals>;
}

/// Renders vnode trees into containers of a host.
pub struct Renderer<H: HostOps + 'static> {
    core: Rc<RendererCore<H>>,
}

pub(crate) struct RendererCore<H: HostOps + 'static> {
    host: H,
    this: Weak<RendererCore<H>>,
    roots: RefCell<HashMap<NodeHandle, VNode>>,
}

impl<H: HostOps + 'static> Renderer<H> {
    pub fn new(host: H) -> Self {
        Self {
            core: Rc::new_cyclic(|this| RendererCore {
                host,
                this: this.clone(),
                roots: RefCell::new(HashMap::new()),
            }),
        }
    }

    pub fn host(&self) -> &H {
        &self.core.host
    }

    /// Renders `vnode` into `container`, patching whatever was rendered
    /// there before. `None` unmounts.
    ///
    /// Pre and post flush callbacks queued by the render run before this
    /// returns. Returns the first error nothing handled.
    pub fn render(&self, vnode: Option<VNode>, container: NodeHandle) -> Result<(), Error> {
        let _span = tracing::debug_span!("render", container = container.0).entered();
        let prev = self.core.roots.borrow().get(&container).cloned();
        let ctx = PatchContext::default();
        match vnode {
            Some(vnode) => {
                self.core.patch_node(prev.as_ref(), &vnode, container, None, ctx);
                self.core.roots.borrow_mut().insert(container, vnode);
            }
            None => {
                if let Some(prev) = prev {
                    self.core.unmount_node(&prev, ctx, true);
                }
                self.core.roots.borrow_mut().remove(&container);
            }
        }
        flush_pre_flush_cbs(None);
        flush_post_flush_cbs();
        take_unhandled()
    }

    /// The tree currently rendered into `container`.
    pub fn root(&self, container: NodeHandle) -> Option<VNode> {
        self.core.roots.borrow().get(&container).cloned()
    }
}

impl<H: HostOps + 'static> RendererCore<H> {
    /// Records the element or component of `vnode` in its template ref, or
    /// clears it on unmount.
    pub(crate) fn set_ref(
        &self,
        raw: &VNodeRef,
        old: Option<&VNodeRef>,
        suspense: Option<&SuspenseBoundary>,
        vnode: &VNode,
        is_unmount: bool,
    ) {
        let target = if vnode.has_shape(shape::STATEFUL_COMPONENT) {
            vnode.component().map(RefTarget::Component)
        } else {
            vnode.el().map(RefTarget::Element)
        };
        let value = if is_unmount { None } else { target };
        let owner = raw.owner.as_ref().and_then(|o| o.upgrade());

        if let Some(old) = old {
            if !old.binding.same_as(&raw.binding) {
                match &old.binding {
                    RefBinding::Named(name) => {
                        if let Some(owner) = &owner {
                            owner.set_template_ref(name, None);
                        }
                    }
                    RefBinding::Ref(r) => r.set(None),
                    RefBinding::Callback(_) => {}
                }
            }
        }

        match &raw.binding {
            RefBinding::Callback(f) => {
                let f = f.clone();
                let _: Option<()> = call_with_error_handling(ErrorKind::FunctionRef, owner.as_ref(), || {
                    f(value);
                    Ok(())
                });
            }
            binding => {
                let binding = binding.clone();
                let owner = owner.as_ref().map(ComponentInstance::downgrade);
                let apply = move |value: Option<RefTarget>| match &binding {
                    RefBinding::Named(name) => {
                        if let Some(owner) = owner.as_ref().and_then(|o| o.upgrade()) {
                            owner.set_template_ref(name, value);
                        }
                    }
                    RefBinding::Ref(r) => r.set(value),
                    RefBinding::Callback(_) => {}
                };
                match value {
                    // Set after the tree is in place, before any other post job.
                    Some(value) => queue_effect_with_suspense(
                        Job::with_id(0, move || apply(Some(value.clone()))).labelled("template ref"),
                        suspense,
                    ),
                    None => apply(None),
                }
            }
        }
    }
}

/// Runs an `onVnode*` hook.
pub(crate) fn invoke_vnode_hook(hook: &PropValue, instance: Option<&ComponentInstance>, vnode: &VNode, prev: Option<&VNode>) {
    if let PropValue::VNodeHook(f) = hook {
        let _: Option<()> = call_with_error_handling(ErrorKind::VNodeHook, instance, || f(vnode, prev));
    }
}

/// Lets the parent's render effect and update job re-trigger themselves
/// (or not) while hooks run.
pub(crate) fn toggle_recurse(instance: Option<&ComponentInstance>, allowed: bool) {
    if let Some(instance) = instance {
        if let Some(effect) = instance.effect() {
            effect.set_allow_recurse(allowed);
        }
        if let Some(job) = instance.update_job() {
            job.set_allow_recurse(allowed);
        }
    }
}

impl<H: HostOps + 'static> RendererInternals for RendererCore<H> {
    fn patch(&self, n1: Option<&VNode>, n2: &VNode, container: NodeHandle, anchor: Option<NodeHandle>, ctx: PatchContext<'_>) {
        self.patch_node(n1, n2, container, anchor, ctx);
    }

    fn unmount(&self, vnode: &VNode, ctx: PatchContext<'_>, do_remove: bool) {
        self.unmount_node(vnode, ctx, do_remove);
    }

    fn move_node(
        &self,
        vnode: &VNode,
        container: NodeHandle,
        anchor: Option<NodeHandle>,
        move_type: MoveType,
        suspense: Option<&SuspenseBoundary>,
    ) {
        self.move_vnode(vnode, container, anchor, move_type, suspense);
    }

    fn mount_children(&self, parent: &VNode, container: NodeHandle, anchor: Option<NodeHandle>, ctx: PatchContext<'_>) {
        self.mount_children_from(parent, container, anchor, ctx, 0);
    }

    fn patch_children(&self, n1: &VNode, n2: &VNode, container: NodeHandle, anchor: Option<NodeHandle>, ctx: PatchContext<'_>) {
        self.patch_child_lists(n1, n2, container, anchor, ctx);
    }

    fn patch_block_children(&self, old: &[VNode], new: &[VNode], fallback_container: NodeHandle, ctx: PatchContext<'_>) {
        self.patch_blocks(old, new, fallback_container, ctx);
    }

    fn next_host_node(&self, vnode: &VNode) -> Option<NodeHandle> {
        self.next_node(vnode)
    }

    fn setup_render_effect(
        &self,
        instance: &ComponentInstance,
        container: NodeHandle,
        anchor: Option<NodeHandle>,
        suspense: Option<&SuspenseBoundary>,
        optimized: bool,
    ) {
        self.create_render_effect(instance, container, anchor, suspense, optimized);
    }

    fn host(&self) -> &dyn HostOps {
        &self.host
    }

    fn handle(&self) -> Weak<dyn RendererInternals> {
        let this: Weak<dyn RendererInternals> = self.this.clone();
        this
    }
}
