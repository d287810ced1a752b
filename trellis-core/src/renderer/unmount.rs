//! Unmounting, removal and moves.

use std::rc::Rc;

use super::{invoke_vnode_hook, HostOps, MoveType, NodeHandle, PatchContext, RendererCore};
use crate::builtins::suspense::{queue_effect_with_suspense, SuspenseBoundary};
use crate::builtins::teleport;
use crate::component::{invoke_hooks, queue_hooks, ComponentInstance, LifecycleHook};
use crate::scheduler::Job;
use crate::vnode::hooks::{invoke_directive_hook, DirectiveHook, TransitionHooks};
use crate::vnode::{patch, shape, VNode, VNodeType};

impl<H: HostOps + 'static> RendererCore<H> {
    /// Tears down `vnode`: hooks, component instances, refs, and with
    /// `do_remove` its host nodes.
    pub(crate) fn unmount_node(&self, vnode: &VNode, ctx: PatchContext<'_>, do_remove: bool) {
        if let Some(node_ref) = vnode.node_ref() {
            self.set_ref(node_ref, None, ctx.suspense, vnode, true);
        }

        if vnode.has_shape(shape::COMPONENT_SHOULD_KEEP_ALIVE) {
            if let Some(hooks) = ctx.parent.and_then(ComponentInstance::keep_alive_hooks) {
                hooks.deactivate(vnode);
                return;
            }
        }

        let invoke_dirs = vnode.has_shape(shape::ELEMENT) && vnode.has_dirs();
        if let Some(hook) = vnode.props().and_then(|p| p.get("onVnodeBeforeUnmount")) {
            invoke_vnode_hook(hook, ctx.parent, vnode, None);
        }

        if vnode.has_shape(shape::COMPONENT) {
            if let Some(instance) = vnode.component() {
                self.unmount_component(&instance, ctx.suspense, do_remove);
            }
        } else {
            if vnode.has_shape(shape::SUSPENSE) {
                if let Some(boundary) = vnode.suspense() {
                    boundary.unmount(ctx.suspense, do_remove);
                }
                return;
            }

            if invoke_dirs {
                invoke_directive_hook(vnode, None, ctx.parent, DirectiveHook::BeforeUnmount);
            }

            let flag = vnode.patch_flag();
            let is_fragment = matches!(vnode.kind(), VNodeType::Fragment);
            if vnode.has_shape(shape::TELEPORT) {
                teleport::remove(self, vnode, ctx, do_remove);
            } else if let Some(dynamic) = vnode
                .dynamic_children()
                .filter(|_| !is_fragment || (flag > 0 && flag & patch::STABLE_FRAGMENT != 0))
            {
                // Only dynamic descendants can own components or hooks.
                self.unmount_child_list(&dynamic, ctx, false);
            } else if (is_fragment && flag & (patch::KEYED_FRAGMENT | patch::UNKEYED_FRAGMENT) != 0)
                || (!ctx.optimized && vnode.has_shape(shape::ARRAY_CHILDREN))
            {
                self.unmount_child_list(&vnode.child_list(), ctx, false);
            }

            if do_remove {
                self.remove_vnode(vnode);
            }
        }

        let unmounted_hook = vnode.props().and_then(|p| p.get("onVnodeUnmounted")).cloned();
        if unmounted_hook.is_some() || invoke_dirs {
            let vnode = vnode.clone();
            let parent = ctx.parent.map(ComponentInstance::downgrade);
            let job = Job::new(move || {
                let parent = parent.as_ref().and_then(|p| p.upgrade());
                if let Some(hook) = &unmounted_hook {
                    invoke_vnode_hook(hook, parent.as_ref(), &vnode, None);
                }
                if invoke_dirs {
                    invoke_directive_hook(&vnode, None, parent.as_ref(), DirectiveHook::Unmounted);
                }
            })
            .labelled("vnode unmounted");
            queue_effect_with_suspense(job, ctx.suspense);
        }
    }

    fn unmount_component(&self, instance: &ComponentInstance, suspense: Option<&SuspenseBoundary>, do_remove: bool) {
        invoke_hooks(instance, LifecycleHook::BeforeUnmount);

        // Stops the render effect and every effect created during setup.
        instance.scope().stop();
        if let Some(job) = instance.update_job() {
            job.set_active(false);
        }
        if let Some(tree) = instance.sub_tree() {
            let ctx = PatchContext {
                parent: Some(instance),
                suspense,
                optimized: false,
            };
            self.unmount_node(&tree, ctx, do_remove);
        }

        queue_hooks(instance, LifecycleHook::Unmounted, suspense);
        let target = instance.clone();
        let finalize = Job::new(move || {
            target.set_unmounted();
            target.release();
        })
        .labelled("release instance");
        queue_effect_with_suspense(finalize, suspense);

        if let Some(boundary) = suspense {
            boundary.dep_unmounted(instance);
        }
    }

    /// Detaches the host nodes of `vnode`, letting a leave transition
    /// delay the removal.
    pub(crate) fn remove_vnode(&self, vnode: &VNode) {
        match vnode.kind() {
            VNodeType::Fragment => {
                if let (Some(start), Some(end)) = (vnode.el(), vnode.anchor()) {
                    self.remove_range(start, end);
                }
                return;
            }
            VNodeType::Static => {
                if let (Some(start), Some(end)) = (vnode.el(), vnode.anchor()) {
                    self.remove_range(start, end);
                }
                return;
            }
            _ => {}
        }
        let Some(el) = vnode.el() else {
            return;
        };

        let transition = vnode
            .transition()
            .filter(|t| vnode.has_shape(shape::ELEMENT) && !t.persisted);
        let Some(transition) = transition else {
            self.host.remove(el);
            return;
        };

        let make_remove = {
            let core = self.this.clone();
            let transition = Rc::clone(&transition);
            move || -> Box<dyn FnOnce()> {
                let core = core.clone();
                let transition = Rc::clone(&transition);
                Box::new(move || {
                    if let Some(core) = core.upgrade() {
                        core.host.remove(el);
                    }
                    if let Some(after_leave) = transition.take_after_leave() {
                        after_leave();
                    }
                })
            }
        };
        leave_with(&transition, el, make_remove);
    }

    /// Moves the host nodes of `vnode` before `anchor`.
    pub(crate) fn move_vnode(
        &self,
        vnode: &VNode,
        container: NodeHandle,
        anchor: Option<NodeHandle>,
        move_type: MoveType,
        suspense: Option<&SuspenseBoundary>,
    ) {
        if vnode.has_shape(shape::COMPONENT) {
            if let Some(tree) = vnode.component().and_then(|c| c.sub_tree()) {
                self.move_vnode(&tree, container, anchor, move_type, suspense);
            }
            return;
        }
        if vnode.has_shape(shape::SUSPENSE) {
            if let Some(boundary) = vnode.suspense() {
                boundary.move_to(container, anchor, move_type);
            }
            return;
        }
        if vnode.has_shape(shape::TELEPORT) {
            teleport::move_teleport(self, vnode, container, anchor);
            return;
        }
        match vnode.kind() {
            VNodeType::Fragment => {
                if let Some(start) = vnode.el() {
                    self.host.insert(start, container, anchor);
                }
                for child in vnode.child_list() {
                    self.move_vnode(&child, container, anchor, move_type, suspense);
                }
                if let Some(end) = vnode.anchor() {
                    self.host.insert(end, container, anchor);
                }
                return;
            }
            VNodeType::Static => {
                self.move_static(vnode, container, anchor);
                return;
            }
            _ => {}
        }

        let Some(el) = vnode.el() else {
            return;
        };
        let transition = vnode
            .transition()
            .filter(|_| move_type != MoveType::Reorder && vnode.has_shape(shape::ELEMENT));
        let Some(transition) = transition else {
            self.host.insert(el, container, anchor);
            return;
        };

        if move_type == MoveType::Enter {
            if let Some(before_enter) = &transition.before_enter {
                before_enter(el);
            }
            self.host.insert(el, container, anchor);
            if let Some(enter) = transition.enter.clone() {
                queue_effect_with_suspense(Job::new(move || enter(el)).labelled("transition enter"), suspense);
            }
            return;
        }

        // Leaving into storage: the node is re-inserted instead of removed.
        let make_insert = {
            let core = self.this.clone();
            let transition = Rc::clone(&transition);
            move || -> Box<dyn FnOnce()> {
                let core = core.clone();
                let transition = Rc::clone(&transition);
                Box::new(move || {
                    if let Some(core) = core.upgrade() {
                        core.host.insert(el, container, anchor);
                    }
                    if let Some(after_leave) = transition.take_after_leave() {
                        after_leave();
                    }
                })
            }
        };
        leave_with(&transition, el, make_insert);
    }

    /// The host node right after everything `vnode` rendered.
    pub(crate) fn next_node(&self, vnode: &VNode) -> Option<NodeHandle> {
        if vnode.has_shape(shape::COMPONENT) {
            return vnode
                .component()
                .and_then(|c| c.sub_tree())
                .and_then(|tree| self.next_node(&tree));
        }
        if vnode.has_shape(shape::SUSPENSE) {
            return vnode.suspense().and_then(|s| s.next());
        }
        vnode.anchor().or(vnode.el()).and_then(|node| self.host.next_sibling(node))
    }
}

/// Runs the leave hooks of `transition` for `el`; `finish` builds the
/// completion callback.
fn leave_with(transition: &Rc<TransitionHooks>, el: NodeHandle, finish: impl Fn() -> Box<dyn FnOnce()> + 'static) {
    let Some(leave) = transition.leave.clone() else {
        finish()();
        return;
    };
    match transition.delay_leave.clone() {
        Some(delay_leave) => {
            let now = finish();
            let later: Box<dyn FnOnce()> = Box::new(move || leave(el, finish()));
            delay_leave(el, now, later);
        }
        None => leave(el, finish()),
    }
}
