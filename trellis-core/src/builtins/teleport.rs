//! Teleport: renders its children into a host node elsewhere.
//!
//! The teleport leaves two empty text markers at its own position. Its
//! children live between a target anchor appended to the target node, or
//! between the two markers while `disabled` is set.

use crate::error::Error;
use crate::renderer::{MoveType, NodeHandle, PatchContext, RendererInternals};
use crate::vnode::{shape, VNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TeleportMove {
    /// `to` now names another node.
    TargetChange,
    /// `disabled` flipped.
    Toggle,
    /// The teleport itself moved among its siblings.
    Reorder,
}

fn is_disabled(vnode: &VNode) -> bool {
    vnode.props().map_or(false, |props| {
        let disabled = props.value("disabled");
        disabled.truthy() || disabled.as_str() == Some("")
    })
}

fn target_selector(vnode: &VNode) -> Option<String> {
    vnode
        .props()
        .and_then(|p| p.value("to").as_str().map(str::to_owned))
}

fn resolve_target(internals: &dyn RendererInternals, vnode: &VNode) -> Option<NodeHandle> {
    let Some(selector) = target_selector(vnode) else {
        crate::config::warn("teleport target must be a selector string");
        return None;
    };
    let target = internals.host().query_selector(&selector);
    if target.is_none() {
        crate::config::warn(Error::InvalidTarget { selector });
    }
    target
}

/// Mounts or patches a teleport vnode.
pub(crate) fn process(
    internals: &dyn RendererInternals,
    n1: Option<&VNode>,
    n2: &VNode,
    container: NodeHandle,
    anchor: Option<NodeHandle>,
    ctx: PatchContext<'_>,
) {
    let host = internals.host();
    let disabled = is_disabled(n2);

    let Some(n1) = n1 else {
        let placeholder = host.create_text("");
        let main_anchor = host.create_text("");
        n2.set_el(Some(placeholder));
        n2.set_anchor(Some(main_anchor));
        host.insert(placeholder, container, anchor);
        host.insert(main_anchor, container, anchor);

        let target = resolve_target(internals, n2);
        n2.set_target(target);
        let target_anchor = host.create_text("");
        n2.set_target_anchor(Some(target_anchor));
        if let Some(target) = target {
            host.insert(target_anchor, target, None);
        }

        if !n2.has_shape(shape::ARRAY_CHILDREN) {
            return;
        }
        if disabled {
            internals.mount_children(n2, container, Some(main_anchor), ctx);
        } else if let Some(target) = target {
            internals.mount_children(n2, target, Some(target_anchor), ctx);
        }
        return;
    };

    n2.set_el(n1.el());
    n2.set_anchor(n1.anchor());
    n2.set_target(n1.target());
    n2.set_target_anchor(n1.target_anchor());
    let main_anchor = n1.anchor();
    let target = n1.target();
    let target_anchor = n1.target_anchor();

    let was_disabled = is_disabled(n1);
    let (current_container, current_anchor) = match target {
        Some(target) if !was_disabled => (target, target_anchor),
        _ => (container, main_anchor),
    };
    match (n1.dynamic_children(), n2.dynamic_children()) {
        (Some(old), Some(new)) => internals.patch_block_children(&old, &new, current_container, ctx),
        _ if !ctx.optimized => internals.patch_children(n1, n2, current_container, current_anchor, ctx),
        _ => {}
    }

    if disabled {
        if !was_disabled {
            move_with(internals, n2, container, main_anchor, TeleportMove::Toggle);
        }
        return;
    }
    if target_selector(n2) != target_selector(n1) {
        match resolve_target(internals, n2) {
            Some(next) => {
                n2.set_target(Some(next));
                move_with(internals, n2, next, None, TeleportMove::TargetChange);
            }
            None => n2.set_target(target),
        }
    } else if was_disabled {
        if let Some(target) = target {
            move_with(internals, n2, target, target_anchor, TeleportMove::Toggle);
        }
    }
}

/// Unmounts the children of a teleport. The children are detached from the
/// target even when the teleport's own nodes stay in place.
pub(crate) fn remove(internals: &dyn RendererInternals, vnode: &VNode, ctx: PatchContext<'_>, do_remove: bool) {
    let host = internals.host();
    if vnode.target().is_some() {
        if let Some(target_anchor) = vnode.target_anchor() {
            host.remove(target_anchor);
        }
    }
    if !do_remove && is_disabled(vnode) {
        return;
    }
    if let Some(anchor) = vnode.anchor() {
        host.remove(anchor);
    }
    if vnode.has_shape(shape::ARRAY_CHILDREN) {
        for child in vnode.child_list() {
            let optimized = child.dynamic_children().is_some();
            internals.unmount(&child, PatchContext { optimized, ..ctx }, true);
        }
    }
}

/// Moves a teleport among its siblings. Enabled children stay in the target.
pub(crate) fn move_teleport(
    internals: &dyn RendererInternals,
    vnode: &VNode,
    container: NodeHandle,
    anchor: Option<NodeHandle>,
) {
    move_with(internals, vnode, container, anchor, TeleportMove::Reorder);
}

fn move_with(
    internals: &dyn RendererInternals,
    vnode: &VNode,
    container: NodeHandle,
    anchor: Option<NodeHandle>,
    how: TeleportMove,
) {
    let host = internals.host();
    if how == TeleportMove::TargetChange {
        if let Some(target_anchor) = vnode.target_anchor() {
            host.insert(target_anchor, container, anchor);
        }
    }
    let reorder = how == TeleportMove::Reorder;
    if reorder {
        if let Some(el) = vnode.el() {
            host.insert(el, container, anchor);
        }
    }
    if (!reorder || is_disabled(vnode)) && vnode.has_shape(shape::ARRAY_CHILDREN) {
        for child in vnode.child_list() {
            internals.move_node(&child, container, anchor, MoveType::Reorder, None);
        }
    }
    if reorder {
        if let Some(end) = vnode.anchor() {
            host.insert(end, container, anchor);
        }
    }
}
