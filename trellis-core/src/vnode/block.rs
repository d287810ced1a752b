//! Block tracking.
//!
//! A block is a vnode that records, at creation, every dynamic descendant
//! created while it was open. Patching a block then only visits that flat
//! list instead of the whole subtree.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::{create_vnode, patch, shape, Children, Props, VNode, VNodeType};

thread_local! {
    /// Open blocks, innermost last. `None` marks a block opened with
    /// tracking disabled.
    static BLOCK_STACK: RefCell<Vec<Option<Vec<VNode>>>> = const { RefCell::new(Vec::new()) };
    static BLOCK_TRACKING: Cell<i32> = const { Cell::new(1) };
}

/// Opens a block. With `disable_tracking`, descendants are not collected
/// (used for lists whose children are diffed as a whole).
pub fn open_block(disable_tracking: bool) {
    let block = if disable_tracking { None } else { Some(Vec::new()) };
    BLOCK_STACK.with(|stack| stack.borrow_mut().push(block));
}

/// Discards the innermost open block.
pub fn close_block() {
    BLOCK_STACK.with(|stack| {
        stack.borrow_mut().pop();
    });
}

/// Adjusts block tracking. Negative values pause it until matched by a
/// positive one, for subtrees that must not be collected (cached output).
pub fn set_block_tracking(delta: i32) {
    BLOCK_TRACKING.with(|t| t.set(t.get() + delta));
}

fn tracking_enabled() -> bool {
    BLOCK_TRACKING.with(Cell::get) > 0
}

/// Records `vnode` in the innermost open block if it is dynamic.
pub(crate) fn track_in_current_block(vnode: &VNode, is_block_node: bool) {
    if is_block_node || !tracking_enabled() {
        return;
    }
    let flag = vnode.patch_flag();
    let dynamic = flag > 0 || vnode.has_shape(shape::COMPONENT);
    if !dynamic || flag == patch::HYDRATE_EVENTS {
        return;
    }
    BLOCK_STACK.with(|stack| {
        if let Some(Some(block)) = stack.borrow_mut().last_mut() {
            block.push(vnode.clone());
        }
    });
}

fn setup_block(vnode: VNode) -> VNode {
    let collected = BLOCK_STACK.with(|stack| stack.borrow_mut().pop()).flatten();
    if tracking_enabled() {
        vnode.set_dynamic_children(Some(collected.unwrap_or_default()));
        BLOCK_STACK.with(|stack| {
            if let Some(Some(parent)) = stack.borrow_mut().last_mut() {
                parent.push(vnode.clone());
            }
        });
    }
    vnode
}

/// Closes the innermost block as an element block root.
pub fn create_element_block(
    tag: &str,
    props: Option<Props>,
    children: impl Into<Children>,
    patch_flag: i32,
    dynamic_props: Option<Vec<&str>>,
) -> VNode {
    create_block(
        VNodeType::Element(Rc::from(tag)),
        props,
        children,
        patch_flag,
        dynamic_props,
    )
}

/// Closes the innermost block with a vnode of any type as its root.
pub fn create_block(
    kind: VNodeType,
    props: Option<Props>,
    children: impl Into<Children>,
    patch_flag: i32,
    dynamic_props: Option<Vec<&str>>,
) -> VNode {
    let vnode = create_vnode(
        kind,
        props,
        children.into(),
        patch_flag,
        dynamic_props.map(|names| names.into_iter().map(Rc::from).collect()),
        true,
    );
    setup_block(vnode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vnode::{element, element_with_flags, text};

    #[test]
    fn block_collects_dynamic_descendants() {
        open_block(false);
        let stat = element("span", None, "static");
        let dynamic = element_with_flags("span", None, "x", patch::TEXT, None);
        let root = create_element_block("div", None, vec![stat, dynamic.clone()], 0, None);

        let collected = root.dynamic_children().unwrap();
        assert_eq!(collected.len(), 1);
        assert!(collected[0].ptr_eq(&dynamic));
    }

    #[test]
    fn nested_blocks_register_with_parent() {
        open_block(false);
        open_block(false);
        let inner = create_element_block("p", None, vec![text("a")], 0, None);
        let outer = create_element_block("div", None, vec![inner.clone()], 0, None);

        let collected = outer.dynamic_children().unwrap();
        assert_eq!(collected.len(), 1);
        assert!(collected[0].ptr_eq(&inner));
    }

    #[test]
    fn paused_tracking_skips_collection() {
        open_block(false);
        set_block_tracking(-1);
        let _ = element_with_flags("span", None, "x", patch::TEXT, None);
        set_block_tracking(1);
        let root = create_element_block("div", None, (), 0, None);
        assert_eq!(root.dynamic_children().unwrap().len(), 0);
    }
}
