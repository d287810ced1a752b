//! Component mounting and updates.

use super::{invoke_vnode_hook, toggle_recurse, HostOps, NodeHandle, PatchContext, RendererCore};
use crate::builtins::keep_alive;
use crate::builtins::suspense::{queue_effect_with_suspense, SuspenseBoundary};
use crate::component::{
    finish_setup_result, invoke_hooks, queue_hooks, render_component_root, setup_component, should_update_component,
    slots_of, update_props, ComponentInstance, LifecycleHook,
};
use crate::error::{handle_error, Error, ErrorKind};
use crate::reactive::{pause_tracking, reset_tracking, ReactiveEffect};
use crate::scheduler::{flush_pre_flush_cbs, invalidate_job, queue_job, Job};
use crate::vnode::{comment, shape, VNode};

impl<H: HostOps + 'static> RendererCore<H> {
    pub(crate) fn process_component(
        &self,
        n1: Option<&VNode>,
        n2: &VNode,
        container: NodeHandle,
        anchor: Option<NodeHandle>,
        ctx: PatchContext<'_>,
    ) {
        match n1 {
            None if n2.has_shape(shape::COMPONENT_KEPT_ALIVE) => {
                match ctx.parent.and_then(ComponentInstance::keep_alive_hooks) {
                    Some(hooks) => hooks.activate(n2, container, anchor, ctx.optimized),
                    None => self.mount_component(n2, container, anchor, ctx),
                }
            }
            None => self.mount_component(n2, container, anchor, ctx),
            Some(n1) => self.update_component(n1, n2, ctx.optimized),
        }
    }

    fn mount_component(&self, vnode: &VNode, container: NodeHandle, anchor: Option<NodeHandle>, ctx: PatchContext<'_>) {
        let Some(def) = vnode.component_def().cloned() else {
            return;
        };
        let _span = tracing::trace_span!("mount_component", name = def.name().unwrap_or("Anonymous")).entered();
        let instance = ComponentInstance::new(def.clone(), vnode, ctx.parent, ctx.suspense);
        vnode.set_component(Some(instance.clone()));
        if def.is_keep_alive() {
            keep_alive::attach(&instance, self.this.clone(), self.host.create_element("div"));
        }

        if setup_component(&instance) {
            self.mount_async_placeholder(&instance, container, anchor, ctx.suspense);
            match ctx.suspense {
                Some(boundary) => boundary.register_dep(&instance),
                None => self.resume_without_suspense(&instance, ctx.optimized),
            }
            return;
        }

        self.create_render_effect(&instance, container, anchor, ctx.suspense, ctx.optimized);
    }

    /// Holds the place of a component whose setup has not settled.
    fn mount_async_placeholder(
        &self,
        instance: &ComponentInstance,
        container: NodeHandle,
        anchor: Option<NodeHandle>,
        suspense: Option<&SuspenseBoundary>,
    ) {
        let placeholder = comment("");
        let el = self.host.create_comment("");
        placeholder.set_el(Some(el));
        self.host.insert(el, container, anchor);
        instance.set_sub_tree(Some(placeholder));
        if suspense.is_none() {
            instance.vnode().set_el(Some(el));
        }
    }

    /// Async setup outside any suspense boundary: keep the placeholder until
    /// setup settles, then render in its place.
    fn resume_without_suspense(&self, instance: &ComponentInstance, optimized: bool) {
        crate::config::warn(format_args!(
            "component {} has async setup but is not inside a suspense boundary",
            instance.name().unwrap_or("Anonymous")
        ));
        let Some(pending) = instance.take_async_setup() else {
            return;
        };
        let target = instance.downgrade();
        let core = self.this.clone();
        pending.then(move |result| {
            let (Some(instance), Some(core)) = (target.upgrade(), core.upgrade()) else {
                return;
            };
            let result = match result {
                Ok(result) => result,
                Err(source) => {
                    handle_error(Error::Callback { kind: ErrorKind::AsyncSetup, source }, Some(&instance), false);
                    crate::component::SetupResult::Empty
                }
            };
            if instance.is_unmounted() {
                return;
            }
            instance.set_async_resolved();
            finish_setup_result(&instance, result);
            let Some(placeholder) = instance.sub_tree() else {
                return;
            };
            let Some(el) = placeholder.el() else {
                return;
            };
            let Some(container) = core.host.parent_node(el) else {
                return;
            };
            let anchor = core.host.next_sibling(el);
            core.create_render_effect(&instance, container, anchor, None, optimized);
            core.host.remove(el);
            update_hoc_host_el(&instance, instance.vnode().el());
        });
    }

    fn update_component(&self, n1: &VNode, n2: &VNode, optimized: bool) {
        let Some(instance) = n1.component() else {
            return;
        };
        n2.set_component(Some(instance.clone()));
        if !should_update_component(n1, n2, optimized) {
            n2.set_el(n1.el());
            instance.set_vnode(n2.clone());
            return;
        }
        if instance.has_async_dep() && !instance.is_async_resolved() {
            // Setup is still pending; only record the new inputs.
            update_component_pre_render(&instance, n2);
            return;
        }
        instance.set_next(Some(n2.clone()));
        // The parent update covers any update of this child already queued.
        if let Some(job) = instance.update_job() {
            invalidate_job(&job);
        }
        if let Some(effect) = instance.effect() {
            effect.run();
        }
    }

    /// Creates the instance's render effect and runs it once to mount.
    pub(crate) fn create_render_effect(
        &self,
        instance: &ComponentInstance,
        container: NodeHandle,
        anchor: Option<NodeHandle>,
        suspense: Option<&SuspenseBoundary>,
        optimized: bool,
    ) {
        let target = instance.downgrade();
        let core = self.this.clone();
        let boundary = suspense.cloned();
        let effect = ReactiveEffect::new_in(
            move || {
                let (Some(instance), Some(core)) = (target.upgrade(), core.upgrade()) else {
                    return;
                };
                core.component_update(&instance, container, anchor, boundary.as_ref(), optimized);
            },
            Some(instance.scope()),
        );

        let weak_effect = effect.downgrade();
        let label = format!("update {}", instance.name().unwrap_or("Anonymous"));
        let job = Job::with_id(instance.uid(), move || {
            if let Some(effect) = weak_effect.upgrade() {
                effect.run();
            }
        })
        .labelled(label);
        let scheduled = job.clone();
        effect.set_scheduler(Some(std::rc::Rc::new(move || queue_job(scheduled.clone()))));

        instance.set_effect(effect.clone());
        instance.set_update_job(job);
        toggle_recurse(Some(instance), true);
        effect.run();
    }

    fn component_update(
        &self,
        instance: &ComponentInstance,
        container: NodeHandle,
        anchor: Option<NodeHandle>,
        suspense: Option<&SuspenseBoundary>,
        optimized: bool,
    ) {
        let ctx = PatchContext {
            parent: Some(instance),
            suspense,
            optimized,
        };
        let parent = instance.parent();

        if !instance.is_mounted() {
            let vnode = instance.vnode();
            toggle_recurse(Some(instance), false);
            invoke_hooks(instance, LifecycleHook::BeforeMount);
            if let Some(hook) = vnode.props().and_then(|p| p.get("onVnodeBeforeMount")) {
                invoke_vnode_hook(hook, parent.as_ref(), &vnode, None);
            }
            toggle_recurse(Some(instance), true);

            let tree = render_component_root(instance);
            instance.set_sub_tree(Some(tree.clone()));
            self.patch_node(None, &tree, container, anchor, ctx);
            vnode.set_el(tree.el());

            queue_hooks(instance, LifecycleHook::Mounted, suspense);
            if let Some(hook) = vnode.props().and_then(|p| p.get("onVnodeMounted")).cloned() {
                let (mounted, owner) = (vnode.clone(), parent.as_ref().map(ComponentInstance::downgrade));
                let job = Job::new(move || {
                    let owner = owner.as_ref().and_then(|o| o.upgrade());
                    invoke_vnode_hook(&hook, owner.as_ref(), &mounted, None);
                });
                queue_effect_with_suspense(job, suspense);
            }
            if vnode.has_shape(shape::COMPONENT_SHOULD_KEEP_ALIVE) {
                keep_alive::queue_activated(instance, suspense);
            }
            instance.set_mounted();
            return;
        }

        let vnode = instance.vnode();
        let next = instance.take_next();
        toggle_recurse(Some(instance), false);
        let parent_driven = next.is_some();
        let next = match next {
            Some(next) => {
                next.set_el(vnode.el());
                update_component_pre_render(instance, &next);
                next
            }
            None => vnode.clone(),
        };
        invoke_hooks(instance, LifecycleHook::BeforeUpdate);
        if let Some(hook) = next.props().and_then(|p| p.get("onVnodeBeforeUpdate")) {
            invoke_vnode_hook(hook, parent.as_ref(), &next, Some(&vnode));
        }
        toggle_recurse(Some(instance), true);

        let next_tree = render_component_root(instance);
        let prev_tree = instance.set_sub_tree(Some(next_tree.clone()));
        let (container, anchor) = match &prev_tree {
            Some(prev) => (
                prev.el().and_then(|el| self.host.parent_node(el)).unwrap_or(container),
                self.next_node(prev),
            ),
            None => (container, anchor),
        };
        self.patch_node(prev_tree.as_ref(), &next_tree, container, anchor, ctx);
        next.set_el(next_tree.el());
        if !parent_driven {
            // Self-triggered update: ancestors rendering this component as
            // their root still point at the old element.
            update_hoc_host_el(instance, next_tree.el());
        }

        queue_hooks(instance, LifecycleHook::Updated, suspense);
        if let Some(hook) = next.props().and_then(|p| p.get("onVnodeUpdated")).cloned() {
            let (updated, prev, owner) = (next.clone(), vnode, parent.as_ref().map(ComponentInstance::downgrade));
            let job = Job::new(move || {
                let owner = owner.as_ref().and_then(|o| o.upgrade());
                invoke_vnode_hook(&hook, owner.as_ref(), &updated, Some(&prev));
            });
            queue_effect_with_suspense(job, suspense);
        }
    }
}

/// Moves the instance onto `next`: props and slots are updated and pre
/// watchers triggered by them run before the render.
fn update_component_pre_render(instance: &ComponentInstance, next: &VNode) {
    next.set_component(Some(instance.clone()));
    instance.set_vnode(next.clone());
    instance.set_next(None);
    update_props(instance, next.props());
    instance.set_slots(slots_of(next));

    pause_tracking();
    let update = instance.update_job();
    flush_pre_flush_cbs(update.as_ref());
    reset_tracking();
}

/// Propagates a changed root element to ancestors rendering this
/// component as their own root.
pub(crate) fn update_hoc_host_el(instance: &ComponentInstance, el: Option<NodeHandle>) {
    let mut vnode = instance.vnode();
    let mut parent = instance.parent();
    while let Some(ancestor) = parent {
        let is_root = ancestor.sub_tree().is_some_and(|tree| tree.ptr_eq(&vnode));
        if !is_root {
            break;
        }
        vnode = ancestor.vnode();
        vnode.set_el(el);
        parent = ancestor.parent();
    }
}
