//! Suspense boundaries.
//!
//! A boundary renders its content into an off-tree container first. Every
//! component with async setup mounted under it registers as a dependency;
//! while any is outstanding the boundary shows its fallback, and once the
//! last one settles the content is moved into place (*resolve*).
//!
//! Post-render effects queued under a pending boundary are buffered and
//! released on resolve, to the nearest pending ancestor boundary if there
//! is one, so nested boundaries resolve outward.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::component::{finish_setup_result, ComponentInstance, SetupResult, WeakInstance};
use crate::error::{call_with_error_handling, handle_error, Error, ErrorKind};
use crate::renderer::{update_hoc_host_el, MoveType, NodeHandle, PatchContext, RendererInternals};
use crate::scheduler::{queue_post_flush_cb, queue_post_flush_cbs, set_timeout, Job};
use crate::vnode::{clone_if_mounted, comment, fragment, is_same_vnode_type, text, Children, TransitionMode, VNode};

/// Runtime state of one mounted suspense vnode.
#[derive(Clone)]
pub struct SuspenseBoundary {
    inner: Rc<BoundaryInner>,
}

struct BoundaryInner {
    vnode: RefCell<Option<VNode>>,
    parent: Option<Weak<BoundaryInner>>,
    parent_component: Option<WeakInstance>,
    internals: Weak<dyn RendererInternals>,
    container: Cell<NodeHandle>,
    hidden_container: Cell<NodeHandle>,
    anchor: Option<NodeHandle>,
    active_branch: RefCell<Option<VNode>>,
    pending_branch: RefCell<Option<VNode>>,
    deps: Cell<usize>,
    pending_id: Cell<u64>,
    timeout: Option<Duration>,
    in_fallback: Cell<bool>,
    unmounted: Cell<bool>,
    optimized: bool,
    effects: RefCell<Vec<Job>>,
}

impl SuspenseBoundary {
    fn new(
        vnode: &VNode,
        internals: Weak<dyn RendererInternals>,
        ctx: PatchContext<'_>,
        container: NodeHandle,
        hidden_container: NodeHandle,
        anchor: Option<NodeHandle>,
    ) -> Self {
        let timeout = vnode
            .props()
            .and_then(|p| p.value("timeout").as_f64())
            .filter(|ms| *ms >= 0.0)
            .map(|ms| Duration::from_secs_f64(ms / 1000.0));
        Self {
            inner: Rc::new(BoundaryInner {
                vnode: RefCell::new(Some(vnode.clone())),
                parent: ctx.suspense.map(|s| Rc::downgrade(&s.inner)),
                parent_component: ctx.parent.map(ComponentInstance::downgrade),
                internals,
                container: Cell::new(container),
                hidden_container: Cell::new(hidden_container),
                anchor,
                active_branch: RefCell::new(None),
                pending_branch: RefCell::new(None),
                deps: Cell::new(0),
                pending_id: Cell::new(0),
                timeout,
                in_fallback: Cell::new(true),
                unmounted: Cell::new(false),
                optimized: ctx.optimized,
                effects: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Whether content is still waiting on async dependencies.
    pub fn has_pending_branch(&self) -> bool {
        self.inner.pending_branch.borrow().is_some()
    }

    /// Outstanding async dependencies of the pending branch.
    pub fn deps(&self) -> usize {
        self.inner.deps.get()
    }

    pub fn is_in_fallback(&self) -> bool {
        self.inner.in_fallback.get() && self.has_pending_branch()
    }

    pub fn is_unmounted(&self) -> bool {
        self.inner.unmounted.get()
    }

    /// The branch currently in the tree: resolved content or the fallback.
    pub fn active_branch(&self) -> Option<VNode> {
        self.inner.active_branch.borrow().clone()
    }

    pub fn pending_branch(&self) -> Option<VNode> {
        self.inner.pending_branch.borrow().clone()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.inner.timeout
    }

    /// Generation of the pending branch. Async callbacks from a discarded
    /// branch compare against it and bail.
    pub(crate) fn pending_id(&self) -> u64 {
        self.inner.pending_id.get()
    }

    pub(crate) fn hidden_container(&self) -> NodeHandle {
        self.inner.hidden_container.get()
    }

    pub fn ptr_eq(&self, other: &SuspenseBoundary) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn parent(&self) -> Option<SuspenseBoundary> {
        self.inner
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| SuspenseBoundary { inner })
    }

    fn parent_component(&self) -> Option<ComponentInstance> {
        self.inner.parent_component.as_ref().and_then(WeakInstance::upgrade)
    }

    fn internals(&self) -> Option<Rc<dyn RendererInternals>> {
        self.inner.internals.upgrade()
    }

    fn vnode(&self) -> Option<VNode> {
        self.inner.vnode.borrow().clone()
    }

    fn downgrade(&self) -> Weak<BoundaryInner> {
        Rc::downgrade(&self.inner)
    }

    fn upgrade(weak: &Weak<BoundaryInner>) -> Option<SuspenseBoundary> {
        weak.upgrade().map(|inner| SuspenseBoundary { inner })
    }

    fn set_active_branch(&self, branch: &VNode) {
        *self.inner.active_branch.borrow_mut() = Some(branch.clone());
        let Some(vnode) = self.vnode() else {
            return;
        };
        let el = branch.el();
        vnode.set_el(el);
        if let Some(parent) = self.parent_component() {
            if parent.sub_tree().is_some_and(|tree| tree.ptr_eq(&vnode)) {
                parent.vnode().set_el(el);
                update_hoc_host_el(&parent, el);
            }
        }
    }

    /// Moves the pending branch into place and releases buffered effects.
    ///
    /// With `resume` the pending branch is already in place (the boundary
    /// toggled back to its active content).
    pub(crate) fn resolve(&self, resume: bool) {
        let Some(pending) = self.pending_branch() else {
            crate::config::warn("suspense resolve called without a pending branch");
            return;
        };
        let Some(internals) = self.internals() else {
            return;
        };
        let _span = tracing::debug_span!("suspense_resolve", pending_id = self.pending_id()).entered();
        let active = self.active_branch();
        let container = self.inner.container.get();

        if !resume {
            let delay_enter = active.is_some()
                && pending
                    .transition()
                    .is_some_and(|t| t.mode == TransitionMode::OutIn);
            if delay_enter {
                if let Some(transition) = active.as_ref().and_then(VNode::transition) {
                    let boundary = self.downgrade();
                    let pending_id = self.pending_id();
                    let branch = pending.clone();
                    let anchor = self.inner.anchor;
                    transition.set_after_leave(move || {
                        let Some(boundary) = SuspenseBoundary::upgrade(&boundary) else {
                            return;
                        };
                        if boundary.pending_id() != pending_id {
                            return;
                        }
                        if let Some(internals) = boundary.internals() {
                            internals.move_node(&branch, boundary.inner.container.get(), anchor, MoveType::Enter, None);
                        }
                    });
                }
            }

            let mut anchor = self.inner.anchor;
            if let Some(active) = &active {
                anchor = internals.next_host_node(active);
                let parent = self.parent_component();
                let ctx = PatchContext {
                    parent: parent.as_ref(),
                    suspense: Some(self),
                    optimized: self.inner.optimized,
                };
                internals.unmount(active, ctx, true);
            }
            if !delay_enter {
                internals.move_node(&pending, container, anchor, MoveType::Enter, None);
            }
        }

        self.set_active_branch(&pending);
        self.inner.pending_branch.borrow_mut().take();
        self.inner.in_fallback.set(false);

        let effects = std::mem::take(&mut *self.inner.effects.borrow_mut());
        let mut ancestor = self.parent();
        let mut effects = Some(effects);
        while let Some(boundary) = ancestor {
            if boundary.has_pending_branch() {
                if let Some(effects) = effects.take() {
                    boundary.inner.effects.borrow_mut().extend(effects);
                }
                break;
            }
            ancestor = boundary.parent();
        }
        if let Some(effects) = effects {
            queue_post_flush_cbs(effects);
        }

        if let Some(vnode) = self.vnode() {
            trigger_event(&vnode, "onResolve");
        }
    }

    /// Swaps the active content for `fallback` while a new pending branch
    /// resolves.
    fn fallback(&self, fallback: &VNode) {
        if !self.has_pending_branch() {
            return;
        }
        let (Some(internals), Some(active)) = (self.internals(), self.active_branch()) else {
            return;
        };
        if let Some(vnode) = self.vnode() {
            trigger_event(&vnode, "onFallback");
        }
        let anchor = internals.next_host_node(&active);

        let mount_fallback: Rc<dyn Fn()> = {
            let boundary = self.downgrade();
            let fallback = fallback.clone();
            Rc::new(move || {
                let Some(boundary) = SuspenseBoundary::upgrade(&boundary) else {
                    return;
                };
                if !boundary.inner.in_fallback.get() {
                    return;
                }
                let Some(internals) = boundary.internals() else {
                    return;
                };
                let parent = boundary.parent_component();
                let ctx = PatchContext {
                    parent: parent.as_ref(),
                    suspense: None,
                    optimized: boundary.inner.optimized,
                };
                internals.patch(None, &fallback, boundary.inner.container.get(), anchor, ctx);
                boundary.set_active_branch(&fallback);
            })
        };

        let delay_enter = fallback.transition().is_some_and(|t| t.mode == TransitionMode::OutIn);
        if delay_enter {
            if let Some(transition) = active.transition() {
                let mount = Rc::clone(&mount_fallback);
                transition.set_after_leave(move || mount());
            }
        }
        self.inner.in_fallback.set(true);
        let parent = self.parent_component();
        let ctx = PatchContext {
            parent: parent.as_ref(),
            suspense: None,
            optimized: self.inner.optimized,
        };
        internals.unmount(&active, ctx, true);
        if !delay_enter {
            mount_fallback();
        }
    }

    pub(crate) fn move_to(&self, container: NodeHandle, anchor: Option<NodeHandle>, move_type: MoveType) {
        if let (Some(internals), Some(active)) = (self.internals(), self.active_branch()) {
            internals.move_node(&active, container, anchor, move_type, None);
        }
        self.inner.container.set(container);
    }

    pub(crate) fn next(&self) -> Option<NodeHandle> {
        let internals = self.internals()?;
        let active = self.active_branch()?;
        internals.next_host_node(&active)
    }

    /// Waits on `instance`'s async setup. Once it settles the instance is
    /// rendered in place of its placeholder, and the boundary resolves when
    /// it was the last outstanding dependency.
    pub(crate) fn register_dep(&self, instance: &ComponentInstance) {
        let in_pending = self.has_pending_branch();
        if in_pending {
            self.inner.deps.set(self.inner.deps.get() + 1);
        }
        let Some(setup) = instance.take_async_setup() else {
            return;
        };
        let target = instance.downgrade();
        let boundary = self.downgrade();
        let optimized = self.inner.optimized;
        setup.then(move |result| {
            let (Some(instance), Some(boundary)) = (target.upgrade(), SuspenseBoundary::upgrade(&boundary)) else {
                return;
            };
            let result = match result {
                Ok(result) => result,
                Err(source) => {
                    handle_error(
                        Error::Callback {
                            kind: ErrorKind::AsyncSetup,
                            source,
                        },
                        Some(&instance),
                        false,
                    );
                    SetupResult::Empty
                }
            };
            if instance.is_unmounted() || boundary.is_unmounted() || boundary.pending_id() != instance.suspense_id() {
                return;
            }
            instance.set_async_resolved();
            finish_setup_result(&instance, result);

            let Some(internals) = boundary.internals() else {
                return;
            };
            let placeholder = instance.sub_tree();
            let Some(el) = placeholder.as_ref().and_then(VNode::el) else {
                return;
            };
            let Some(container) = internals.host().parent_node(el) else {
                return;
            };
            let anchor = placeholder.as_ref().and_then(|p| internals.next_host_node(p));
            internals.setup_render_effect(&instance, container, anchor, Some(&boundary), optimized);
            internals.host().remove(el);
            update_hoc_host_el(&instance, instance.vnode().el());

            if in_pending {
                let deps = boundary.inner.deps.get().saturating_sub(1);
                boundary.inner.deps.set(deps);
                if deps == 0 {
                    boundary.resolve(false);
                }
            }
        });
    }

    /// Counts an unmounted, still unresolved dependency as settled.
    pub(crate) fn dep_unmounted(&self, instance: &ComponentInstance) {
        if !self.has_pending_branch()
            || self.is_unmounted()
            || !instance.has_async_dep()
            || instance.is_async_resolved()
            || instance.suspense_id() != self.pending_id()
        {
            return;
        }
        let deps = self.inner.deps.get().saturating_sub(1);
        self.inner.deps.set(deps);
        if deps == 0 {
            self.resolve(false);
        }
    }

    pub(crate) fn unmount(&self, parent_suspense: Option<&SuspenseBoundary>, do_remove: bool) {
        self.inner.unmounted.set(true);
        let internals = self.internals();
        let parent = self.parent_component();
        let ctx = PatchContext {
            parent: parent.as_ref(),
            suspense: parent_suspense,
            optimized: self.inner.optimized,
        };
        let active = self.inner.active_branch.borrow_mut().take();
        let pending = self.inner.pending_branch.borrow_mut().take();
        if let Some(internals) = internals {
            for branch in active.iter().chain(pending.iter()) {
                internals.unmount(branch, ctx, do_remove);
            }
        }
        self.inner.effects.borrow_mut().clear();
        if let Some(vnode) = self.inner.vnode.borrow_mut().take() {
            vnode.set_suspense(None);
        }
    }
}

impl std::fmt::Debug for SuspenseBoundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuspenseBoundary")
            .field("deps", &self.deps())
            .field("pending", &self.has_pending_branch())
            .field("pending_id", &self.pending_id())
            .field("in_fallback", &self.inner.in_fallback.get())
            .finish()
    }
}

fn trigger_event(vnode: &VNode, name: &str) {
    let Some(listener) = vnode.props().and_then(|p| p.get(name)) else {
        return;
    };
    for handler in listener.handlers() {
        let _: Option<()> = call_with_error_handling(ErrorKind::ComponentEventHandler, None, || handler(&[]));
    }
}

/// Queues `job` after the render, or buffers it on `suspense` while the
/// boundary is pending.
pub(crate) fn queue_effect_with_suspense(job: Job, suspense: Option<&SuspenseBoundary>) {
    match suspense {
        Some(boundary) if boundary.has_pending_branch() => boundary.inner.effects.borrow_mut().push(job),
        _ => queue_post_flush_cb(job),
    }
}

/// Mounts or patches a suspense vnode.
pub(crate) fn process(
    internals: &dyn RendererInternals,
    n1: Option<&VNode>,
    n2: &VNode,
    container: NodeHandle,
    anchor: Option<NodeHandle>,
    ctx: PatchContext<'_>,
) {
    match n1 {
        None => mount(internals, n2, container, anchor, ctx),
        Some(n1) => patch(internals, n1, n2, container, anchor, ctx),
    }
}

fn mount(
    internals: &dyn RendererInternals,
    vnode: &VNode,
    container: NodeHandle,
    anchor: Option<NodeHandle>,
    ctx: PatchContext<'_>,
) {
    let (Some(content), Some(fallback)) = (vnode.ss_content(), vnode.ss_fallback()) else {
        return;
    };
    let hidden = internals.host().create_element("div");
    let boundary = SuspenseBoundary::new(vnode, internals.handle(), ctx, container, hidden, anchor);
    vnode.set_suspense(Some(boundary.clone()));

    *boundary.inner.pending_branch.borrow_mut() = Some(content.clone());
    internals.patch(None, &content, hidden, None, ctx.with_suspense(Some(&boundary)));

    if boundary.deps() > 0 {
        trigger_event(vnode, "onPending");
        trigger_event(vnode, "onFallback");
        // The fallback has no suspense context of its own.
        internals.patch(None, &fallback, container, anchor, ctx.with_suspense(None));
        boundary.set_active_branch(&fallback);
    } else {
        boundary.resolve(false);
    }
}

fn patch(
    internals: &dyn RendererInternals,
    n1: &VNode,
    n2: &VNode,
    container: NodeHandle,
    anchor: Option<NodeHandle>,
    ctx: PatchContext<'_>,
) {
    let Some(boundary) = n1.suspense() else {
        return;
    };
    let (Some(new_branch), Some(new_fallback)) = (n2.ss_content(), n2.ss_fallback()) else {
        return;
    };
    n2.set_suspense(Some(boundary.clone()));
    *boundary.inner.vnode.borrow_mut() = Some(n2.clone());
    n2.set_el(n1.el());

    let inner_ctx = ctx.with_suspense(Some(&boundary));
    let active = boundary.active_branch();
    let in_fallback = boundary.inner.in_fallback.get();

    if let Some(pending) = boundary.pending_branch() {
        *boundary.inner.pending_branch.borrow_mut() = Some(new_branch.clone());
        if is_same_vnode_type(&new_branch, &pending) {
            internals.patch(Some(&pending), &new_branch, boundary.hidden_container(), None, inner_ctx);
            if boundary.deps() == 0 {
                boundary.resolve(false);
            } else if in_fallback {
                internals.patch(active.as_ref(), &new_fallback, container, anchor, ctx.with_suspense(None));
                boundary.set_active_branch(&new_fallback);
            }
            return;
        }

        // The content changed type before it resolved: start over.
        boundary.inner.pending_id.set(boundary.pending_id() + 1);
        internals.unmount(&pending, inner_ctx, false);
        boundary.inner.deps.set(0);
        boundary.inner.effects.borrow_mut().clear();
        boundary.inner.hidden_container.set(internals.host().create_element("div"));

        if in_fallback {
            internals.patch(None, &new_branch, boundary.hidden_container(), None, inner_ctx);
            if boundary.deps() == 0 {
                boundary.resolve(false);
            } else {
                internals.patch(active.as_ref(), &new_fallback, container, anchor, ctx.with_suspense(None));
                boundary.set_active_branch(&new_fallback);
            }
        } else if let Some(active) = active.as_ref().filter(|a| is_same_vnode_type(&new_branch, a)) {
            // Toggled back to the content already on screen.
            internals.patch(Some(active), &new_branch, container, anchor, inner_ctx);
            boundary.resolve(true);
        } else {
            internals.patch(None, &new_branch, boundary.hidden_container(), None, inner_ctx);
            if boundary.deps() == 0 {
                boundary.resolve(false);
            }
        }
        return;
    }

    if let Some(active) = active.as_ref().filter(|a| is_same_vnode_type(&new_branch, a)) {
        internals.patch(Some(active), &new_branch, container, anchor, inner_ctx);
        boundary.set_active_branch(&new_branch);
        return;
    }

    trigger_event(n2, "onPending");
    *boundary.inner.pending_branch.borrow_mut() = Some(new_branch.clone());
    boundary.inner.pending_id.set(boundary.pending_id() + 1);
    internals.patch(None, &new_branch, boundary.hidden_container(), None, inner_ctx);
    if boundary.deps() == 0 {
        boundary.resolve(false);
        return;
    }
    match boundary.timeout() {
        Some(delay) if delay > Duration::ZERO => {
            let pending_id = boundary.pending_id();
            let weak = boundary.downgrade();
            set_timeout(delay, move || {
                if let Some(boundary) = SuspenseBoundary::upgrade(&weak) {
                    if boundary.pending_id() == pending_id {
                        boundary.fallback(&new_fallback);
                    }
                }
            });
        }
        Some(_) => boundary.fallback(&new_fallback),
        None => {}
    }
}

fn normalize_branch(mut nodes: Vec<VNode>) -> VNode {
    match nodes.len() {
        0 => comment(""),
        1 => nodes.pop().map(|node| clone_if_mounted(&node)).unwrap_or_else(|| comment("")),
        _ => fragment(nodes),
    }
}

/// Splits the children of a suspense vnode into its content and fallback
/// branches. Plain children are the content; the fallback defaults to an
/// empty comment.
pub(crate) fn normalize_suspense_children(vnode: &VNode) {
    let children = vnode.children().clone();
    let (content, fallback) = match children {
        Children::Slots(slots) => (
            slots.render("default", &crate::reactive::Value::Undefined),
            Some(slots.render("fallback", &crate::reactive::Value::Undefined)),
        ),
        Children::Array(items) => (items, None),
        Children::Text(content) => (vec![text(&*content)], None),
        Children::None => (Vec::new(), None),
    };
    let fallback = fallback.map(normalize_branch).unwrap_or_else(|| comment(""));
    vnode.set_ss_branches(normalize_branch(content), fallback);
}
