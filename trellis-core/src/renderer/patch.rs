//! Node-level patching: text, comments, static content, elements and
//! fragments.

use super::{invoke_vnode_hook, toggle_recurse, HostOps, NodeHandle, PatchContext, RendererCore};
use crate::builtins::suspense::{self, queue_effect_with_suspense};
use crate::builtins::teleport;
use crate::component::ComponentInstance;
use crate::scheduler::Job;
use crate::vnode::hooks::{invoke_directive_hook, DirectiveHook};
use crate::vnode::props::is_reserved_prop;
use crate::vnode::{clone_if_mounted, is_same_vnode_type, patch, shape, Children, Props, VNode, VNodeType};

impl<H: HostOps + 'static> RendererCore<H> {
    /// Brings the host tree of `n1` in line with `n2`, or mounts `n2` when
    /// there is no `n1`.
    pub(crate) fn patch_node(
        &self,
        n1: Option<&VNode>,
        n2: &VNode,
        container: NodeHandle,
        anchor: Option<NodeHandle>,
        ctx: PatchContext<'_>,
    ) {
        if n1.is_some_and(|n1| n1.ptr_eq(n2)) {
            return;
        }

        let mut n1 = n1;
        let mut anchor = anchor;
        if let Some(old) = n1 {
            if !is_same_vnode_type(old, n2) {
                anchor = self.next_node(old);
                self.unmount_node(old, ctx, true);
                n1 = None;
            }
        }

        let mut ctx = ctx;
        if n2.patch_flag() == patch::BAIL {
            ctx.optimized = false;
            n2.set_dynamic_children(None);
        }

        match n2.kind() {
            VNodeType::Text => self.process_text(n1, n2, container, anchor),
            VNodeType::Comment => self.process_comment(n1, n2, container, anchor),
            VNodeType::Static => match n1 {
                None => self.mount_static(n2, container, anchor),
                Some(n1) => {
                    n2.set_el(n1.el());
                    n2.set_anchor(n1.anchor());
                }
            },
            VNodeType::Fragment => self.process_fragment(n1, n2, container, anchor, ctx),
            VNodeType::Element(_) => self.process_element(n1, n2, container, anchor, ctx),
            VNodeType::Component(_) => self.process_component(n1, n2, container, anchor, ctx),
            VNodeType::Teleport => teleport::process(self, n1, n2, container, anchor, ctx),
            VNodeType::Suspense => suspense::process(self, n1, n2, container, anchor, ctx),
        }

        if let Some(node_ref) = n2.node_ref() {
            self.set_ref(node_ref, n1.and_then(VNode::node_ref), ctx.suspense, n2, false);
        }
    }

    fn process_text(&self, n1: Option<&VNode>, n2: &VNode, container: NodeHandle, anchor: Option<NodeHandle>) {
        let text = n2.children().as_text().unwrap_or_default().to_string();
        match n1 {
            None => {
                let el = self.host.create_text(&text);
                n2.set_el(Some(el));
                self.host.insert(el, container, anchor);
            }
            Some(n1) => {
                let el = n1.el();
                n2.set_el(el);
                let changed = n1.children().as_text() != Some(text.as_str());
                if let (Some(el), true) = (el, changed) {
                    self.host.set_text(el, &text);
                }
            }
        }
    }

    fn process_comment(&self, n1: Option<&VNode>, n2: &VNode, container: NodeHandle, anchor: Option<NodeHandle>) {
        match n1 {
            None => {
                let text = n2.children().as_text().unwrap_or_default().to_string();
                let el = self.host.create_comment(&text);
                n2.set_el(Some(el));
                self.host.insert(el, container, anchor);
            }
            // Comments never change.
            Some(n1) => n2.set_el(n1.el()),
        }
    }

    fn mount_static(&self, n2: &VNode, container: NodeHandle, anchor: Option<NodeHandle>) {
        let markup = n2.children().as_text().unwrap_or_default().to_string();
        let (first, last) = self.host.insert_static_content(&markup, container, anchor);
        n2.set_el(Some(first));
        n2.set_anchor(Some(last));
    }

    /// Moves the nodes of a static vnode, first to last.
    pub(crate) fn move_static(&self, vnode: &VNode, container: NodeHandle, anchor: Option<NodeHandle>) {
        let (Some(mut cur), Some(last)) = (vnode.el(), vnode.anchor()) else {
            return;
        };
        while cur != last {
            let next = self.host.next_sibling(cur);
            self.host.insert(cur, container, anchor);
            match next {
                Some(next) => cur = next,
                None => return,
            }
        }
        self.host.insert(last, container, anchor);
    }

    /// Removes the nodes from `start` through `end`.
    pub(crate) fn remove_range(&self, start: NodeHandle, end: NodeHandle) {
        let mut cur = start;
        while cur != end {
            let next = self.host.next_sibling(cur);
            self.host.remove(cur);
            match next {
                Some(next) => cur = next,
                None => return,
            }
        }
        self.host.remove(end);
    }

    // ------------------------------------------------------------------
    // Elements
    // ------------------------------------------------------------------

    fn process_element(
        &self,
        n1: Option<&VNode>,
        n2: &VNode,
        container: NodeHandle,
        anchor: Option<NodeHandle>,
        ctx: PatchContext<'_>,
    ) {
        match n1 {
            None => self.mount_element(n2, container, anchor, ctx),
            Some(n1) => self.patch_element(n1, n2, ctx),
        }
    }

    fn mount_element(&self, vnode: &VNode, container: NodeHandle, anchor: Option<NodeHandle>, ctx: PatchContext<'_>) {
        let VNodeType::Element(tag) = vnode.kind() else {
            return;
        };
        let el = self.host.create_element(tag);
        vnode.set_el(Some(el));

        if vnode.has_shape(shape::TEXT_CHILDREN) {
            let text = vnode.children().as_text().unwrap_or_default().to_string();
            self.host.set_element_text(el, &text);
        } else if vnode.has_shape(shape::ARRAY_CHILDREN) {
            let child_ctx = PatchContext {
                optimized: ctx.optimized && vnode.dynamic_children().is_some(),
                ..ctx
            };
            self.mount_children_from(vnode, el, None, child_ctx, 0);
        }

        if vnode.has_dirs() {
            invoke_directive_hook(vnode, None, ctx.parent, DirectiveHook::Created);
        }

        if let Some(props) = vnode.props() {
            for (key, value) in props.iter() {
                if &**key != "value" && !is_reserved_prop(key) {
                    self.host.patch_prop(el, key, None, Some(value));
                }
            }
            // `value` goes last so it is checked against min/max set above.
            if let Some(value) = props.get("value") {
                self.host.patch_prop(el, "value", None, Some(value));
            }
            if let Some(hook) = props.get("onVnodeBeforeMount") {
                invoke_vnode_hook(hook, ctx.parent, vnode, None);
            }
        }
        self.set_scope_id(el, vnode, ctx.parent);

        if vnode.has_dirs() {
            invoke_directive_hook(vnode, None, ctx.parent, DirectiveHook::BeforeMount);
        }

        let pending = ctx.suspense.is_some_and(|s| s.has_pending_branch());
        let transition = vnode.transition().filter(|t| !pending && !t.persisted);
        if let Some(before_enter) = transition.as_ref().and_then(|t| t.before_enter.clone()) {
            before_enter(el);
        }
        self.host.insert(el, container, anchor);

        let mounted_hook = vnode.props().and_then(|p| p.get("onVnodeMounted")).cloned();
        if mounted_hook.is_some() || transition.is_some() || vnode.has_dirs() {
            let vnode = vnode.clone();
            let parent = ctx.parent.map(ComponentInstance::downgrade);
            let job = Job::new(move || {
                let parent = parent.as_ref().and_then(|p| p.upgrade());
                if let Some(hook) = &mounted_hook {
                    invoke_vnode_hook(hook, parent.as_ref(), &vnode, None);
                }
                if let Some(enter) = transition.as_ref().and_then(|t| t.enter.clone()) {
                    enter(el);
                }
                if vnode.has_dirs() {
                    invoke_directive_hook(&vnode, None, parent.as_ref(), DirectiveHook::Mounted);
                }
            })
            .labelled("element mounted");
            queue_effect_with_suspense(job, ctx.suspense);
        }
    }

    /// Applies the scope id of `vnode`, and of every ancestor component it is
    /// the root of.
    fn set_scope_id(&self, el: NodeHandle, vnode: &VNode, parent: Option<&ComponentInstance>) {
        if let Some(id) = vnode.scope_id() {
            self.host.set_scope_id(el, id);
        }
        let mut current = parent.cloned();
        let mut child = vnode.clone();
        while let Some(instance) = current {
            let is_root = instance.sub_tree().is_some_and(|tree| tree.ptr_eq(&child));
            if !is_root {
                break;
            }
            let parent_vnode = instance.vnode();
            if let Some(id) = parent_vnode.scope_id() {
                self.host.set_scope_id(el, id);
            }
            child = parent_vnode;
            current = instance.parent();
        }
    }

    fn patch_element(&self, n1: &VNode, n2: &VNode, ctx: PatchContext<'_>) {
        let Some(el) = n1.el() else {
            return;
        };
        n2.set_el(Some(el));

        // A FULL_PROPS node patched against its own clone keeps needing a
        // full diff.
        let flag = n2.patch_flag() | (n1.patch_flag() & patch::FULL_PROPS);
        let empty = Props::new();
        let old_props = n1.props().unwrap_or(&empty);
        let new_props = n2.props().unwrap_or(&empty);

        toggle_recurse(ctx.parent, false);
        if let Some(hook) = new_props.get("onVnodeBeforeUpdate") {
            invoke_vnode_hook(hook, ctx.parent, n2, Some(n1));
        }
        if n2.has_dirs() {
            invoke_directive_hook(n2, Some(n1), ctx.parent, DirectiveHook::BeforeUpdate);
        }
        toggle_recurse(ctx.parent, true);

        match n2.dynamic_children() {
            Some(dynamic) => {
                let old_dynamic = n1.dynamic_children().unwrap_or_default();
                self.patch_blocks(&old_dynamic, &dynamic, el, ctx);
            }
            None if !ctx.optimized => self.patch_child_lists(n1, n2, el, None, ctx.unoptimized()),
            None => {}
        }

        if flag > 0 {
            if flag & patch::FULL_PROPS != 0 {
                self.patch_props(el, old_props, new_props);
            } else {
                if flag & patch::CLASS != 0 && old_props.get("class") != new_props.get("class") {
                    self.host.patch_prop(el, "class", old_props.get("class"), new_props.get("class"));
                }
                if flag & patch::STYLE != 0 {
                    self.host.patch_prop(el, "style", old_props.get("style"), new_props.get("style"));
                }
                if flag & patch::PROPS != 0 {
                    for key in n2.dynamic_props().unwrap_or_default() {
                        let (prev, next) = (old_props.get(key), new_props.get(key));
                        if next != prev || &**key == "value" {
                            self.host.patch_prop(el, key, prev, next);
                        }
                    }
                }
            }
            if flag & patch::TEXT != 0 {
                let next = n2.children().as_text().map(str::to_string);
                if n1.children().as_text() != next.as_deref() {
                    self.host.set_element_text(el, next.as_deref().unwrap_or_default());
                }
            }
        } else if !ctx.optimized && n2.dynamic_children().is_none() {
            self.patch_props(el, old_props, new_props);
        }

        let updated_hook = new_props.get("onVnodeUpdated").cloned();
        if updated_hook.is_some() || n2.has_dirs() {
            let (n1, n2) = (n1.clone(), n2.clone());
            let parent = ctx.parent.map(ComponentInstance::downgrade);
            let job = Job::new(move || {
                let parent = parent.as_ref().and_then(|p| p.upgrade());
                if let Some(hook) = &updated_hook {
                    invoke_vnode_hook(hook, parent.as_ref(), &n2, Some(&n1));
                }
                if n2.has_dirs() {
                    invoke_directive_hook(&n2, Some(&n1), parent.as_ref(), DirectiveHook::Updated);
                }
            })
            .labelled("element updated");
            queue_effect_with_suspense(job, ctx.suspense);
        }
    }

    /// Full prop diff.
    fn patch_props(&self, el: NodeHandle, old: &Props, new: &Props) {
        if old == new {
            return;
        }
        for (key, next) in new.iter() {
            if is_reserved_prop(key) || &**key == "value" {
                continue;
            }
            let prev = old.get(key);
            if prev != Some(next) {
                self.host.patch_prop(el, key, prev, Some(next));
            }
        }
        for (key, prev) in old.iter() {
            if !is_reserved_prop(key) && !new.contains_key(key) {
                self.host.patch_prop(el, key, Some(prev), None);
            }
        }
        if let Some(next) = new.get("value") {
            let prev = old.get("value");
            if prev != Some(next) {
                self.host.patch_prop(el, "value", prev, Some(next));
            }
        }
    }

    // ------------------------------------------------------------------
    // Fragments
    // ------------------------------------------------------------------

    fn process_fragment(
        &self,
        n1: Option<&VNode>,
        n2: &VNode,
        container: NodeHandle,
        anchor: Option<NodeHandle>,
        ctx: PatchContext<'_>,
    ) {
        let Some(n1) = n1 else {
            let start = self.host.create_text("");
            let end = self.host.create_text("");
            n2.set_el(Some(start));
            n2.set_anchor(Some(end));
            self.host.insert(start, container, anchor);
            self.host.insert(end, container, anchor);
            self.mount_children_from(n2, container, Some(end), ctx, 0);
            return;
        };

        n2.set_el(n1.el());
        n2.set_anchor(n1.anchor());
        let end = n1.anchor();

        let flag = n2.patch_flag();
        let stable = flag > 0 && flag & patch::STABLE_FRAGMENT != 0;
        match (stable, n1.dynamic_children(), n2.dynamic_children()) {
            (true, Some(old_dynamic), Some(dynamic)) => {
                self.patch_blocks(&old_dynamic, &dynamic, container, ctx);
                let is_root = ctx.parent.is_some_and(|p| p.sub_tree().is_some_and(|t| t.ptr_eq(n2)));
                if n2.key().is_some() || is_root {
                    traverse_static_children(n1, n2, true);
                }
            }
            _ => self.patch_child_lists(n1, n2, container, end, ctx),
        }
    }
}

/// Static children of a stable fragment are not part of its block; give
/// the new ones the host nodes of the old ones so later moves find them.
pub(crate) fn traverse_static_children(n1: &VNode, n2: &VNode, shallow: bool) {
    if !matches!(&*n2.children(), Children::Array(_)) {
        return;
    }
    let old = n1.child_list();
    let new = n2.child_list();
    for (i, (c1, c2)) in old.iter().zip(new).enumerate() {
        let mut c2 = c2;
        if !c2.has_shape(shape::ELEMENT) || c2.dynamic_children().is_some() {
            continue;
        }
        if c2.patch_flag() <= 0 || c2.patch_flag() == patch::HYDRATE_EVENTS {
            c2 = clone_if_mounted(&c2);
            if let Children::Array(list) = &mut *n2.children_mut() {
                list[i] = c2.clone();
            }
            c2.set_el(c1.el());
        }
        if !shallow {
            traverse_static_children(c1, &c2, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vnode::{element, element_with_flags, fragment};

    #[test]
    fn static_children_keep_new_props() {
        let old_child = element_with_flags("button", Some(Props::new().with("id", "old")), "go", patch::HYDRATE_EVENTS, None);
        old_child.set_el(Some(NodeHandle(7)));
        let n1 = fragment(vec![old_child]);
        let n2 = fragment(vec![element_with_flags(
            "button",
            Some(Props::new().with("id", "new")),
            "go",
            patch::HYDRATE_EVENTS,
            None,
        )]);

        traverse_static_children(&n1, &n2, false);

        let child = &n2.child_list()[0];
        assert_eq!(child.el(), Some(NodeHandle(7)));
        assert_eq!(child.props().map(|p| p.value("id")), Some("new".into()));
    }

    #[test]
    fn mounted_new_child_is_copied_before_sharing_el() {
        let shared = element("p", None, "static");
        shared.set_el(Some(NodeHandle(3)));
        let old_child = element("p", None, "static");
        old_child.set_el(Some(NodeHandle(9)));

        let n1 = fragment(vec![old_child]);
        let n2 = fragment(vec![shared.clone()]);
        traverse_static_children(&n1, &n2, false);

        let child = &n2.child_list()[0];
        assert!(!child.ptr_eq(&shared));
        assert_eq!(child.el(), Some(NodeHandle(9)));
        assert_eq!(shared.el(), Some(NodeHandle(3)));
    }
}
