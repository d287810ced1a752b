//! Child list reconciliation.

use std::collections::HashMap;

use super::{HostOps, MoveType, NodeHandle, PatchContext, RendererCore};
use crate::reactive::Value;
use crate::vnode::{clone_if_mounted, is_same_vnode_type, patch, shape, Children, VNode, VNodeType};

/// Clones already-mounted children of `parent` in place so each position
/// holds a vnode that is free to take new host nodes.
fn normalize_children_of(parent: &VNode) -> Vec<VNode> {
    let mut children = parent.children_mut();
    let Children::Array(list) = &mut *children else {
        return Vec::new();
    };
    for child in list.iter_mut() {
        let normalized = clone_if_mounted(child);
        if !normalized.ptr_eq(child) {
            *child = normalized;
        }
    }
    list.clone()
}

impl<H: HostOps + 'static> RendererCore<H> {
    pub(crate) fn mount_children_from(
        &self,
        parent: &VNode,
        container: NodeHandle,
        anchor: Option<NodeHandle>,
        ctx: PatchContext<'_>,
        start: usize,
    ) {
        let children = normalize_children_of(parent);
        for child in children.iter().skip(start) {
            self.patch_node(None, child, container, anchor, ctx);
        }
    }

    pub(crate) fn unmount_child_list(&self, children: &[VNode], ctx: PatchContext<'_>, do_remove: bool) {
        for child in children {
            self.unmount_node(child, ctx, do_remove);
        }
    }

    pub(crate) fn patch_child_lists(
        &self,
        n1: &VNode,
        n2: &VNode,
        container: NodeHandle,
        anchor: Option<NodeHandle>,
        ctx: PatchContext<'_>,
    ) {
        let flag = n2.patch_flag();
        if flag > 0 {
            if flag & patch::KEYED_FRAGMENT != 0 {
                self.patch_keyed_children(n1, n2, container, anchor, ctx);
                return;
            }
            if flag & patch::UNKEYED_FRAGMENT != 0 {
                self.patch_unkeyed_children(n1, n2, container, anchor, ctx);
                return;
            }
        }

        let prev_shape = n1.shape_flag();
        let next_shape = n2.shape_flag();
        if next_shape & shape::TEXT_CHILDREN != 0 {
            if prev_shape & shape::ARRAY_CHILDREN != 0 {
                self.unmount_child_list(&n1.child_list(), ctx, true);
            }
            let next = n2.children().as_text().map(str::to_string);
            if n1.children().as_text() != next.as_deref() {
                self.host.set_element_text(container, next.as_deref().unwrap_or_default());
            }
        } else if prev_shape & shape::ARRAY_CHILDREN != 0 {
            if next_shape & shape::ARRAY_CHILDREN != 0 {
                self.patch_keyed_children(n1, n2, container, anchor, ctx);
            } else {
                self.unmount_child_list(&n1.child_list(), ctx, true);
            }
        } else {
            if prev_shape & shape::TEXT_CHILDREN != 0 {
                self.host.set_element_text(container, "");
            }
            if next_shape & shape::ARRAY_CHILDREN != 0 {
                self.mount_children_from(n2, container, anchor, ctx, 0);
            }
        }
    }

    /// Patches by position. Extra old children are unmounted, extra new
    /// ones mounted.
    fn patch_unkeyed_children(
        &self,
        n1: &VNode,
        n2: &VNode,
        container: NodeHandle,
        anchor: Option<NodeHandle>,
        ctx: PatchContext<'_>,
    ) {
        let old = n1.child_list();
        let new = normalize_children_of(n2);
        let common = old.len().min(new.len());
        for (prev, next) in old.iter().zip(&new) {
            self.patch_node(Some(prev), next, container, None, ctx);
        }
        if old.len() > new.len() {
            self.unmount_child_list(&old[common..], ctx, true);
        } else {
            self.mount_children_from(n2, container, anchor, ctx, common);
        }
    }

    /// Keyed diff: sync the common prefix and suffix, then match the middle
    /// by key, moving only nodes outside the longest increasing subsequence
    /// of their old positions.
    fn patch_keyed_children(
        &self,
        n1: &VNode,
        n2: &VNode,
        container: NodeHandle,
        parent_anchor: Option<NodeHandle>,
        ctx: PatchContext<'_>,
    ) {
        let c1 = n1.child_list();
        let c2 = normalize_children_of(n2);
        let l2 = c2.len();

        let mut i = 0usize;
        // Exclusive ends.
        let mut e1 = c1.len();
        let mut e2 = l2;

        // 1. common prefix
        while i < e1 && i < e2 {
            if !is_same_vnode_type(&c1[i], &c2[i]) {
                break;
            }
            self.patch_node(Some(&c1[i]), &c2[i], container, None, ctx);
            i += 1;
        }

        // 2. common suffix
        while i < e1 && i < e2 {
            if !is_same_vnode_type(&c1[e1 - 1], &c2[e2 - 1]) {
                break;
            }
            self.patch_node(Some(&c1[e1 - 1]), &c2[e2 - 1], container, None, ctx);
            e1 -= 1;
            e2 -= 1;
        }

        // 3. only new nodes left
        if i >= e1 {
            if i < e2 {
                let anchor = if e2 < l2 { c2[e2].el() } else { parent_anchor };
                for child in &c2[i..e2] {
                    self.patch_node(None, child, container, anchor, ctx);
                }
            }
            return;
        }

        // 4. only old nodes left
        if i >= e2 {
            self.unmount_child_list(&c1[i..e1], ctx, true);
            return;
        }

        // 5. unknown middle
        let (s1, s2) = (i, i);
        let mut key_to_new_index: HashMap<Value, usize> = HashMap::new();
        for (index, child) in c2.iter().enumerate().take(e2).skip(s2) {
            if let Some(key) = child.key() {
                if key_to_new_index.insert(key.clone(), index).is_some() {
                    crate::config::warn(format_args!(
                        "duplicate keys found during update: {key:?}; keys should be unique"
                    ));
                }
            }
        }

        let to_be_patched = e2 - s2;
        let mut patched = 0usize;
        let mut moved = false;
        let mut max_new_index_so_far = 0usize;
        // Old index + 1 for each new position; 0 means a new node.
        let mut new_index_to_old_index = vec![0usize; to_be_patched];

        for (old_index, prev) in c1.iter().enumerate().take(e1).skip(s1) {
            if patched >= to_be_patched {
                self.unmount_node(prev, ctx, true);
                continue;
            }
            let new_index = match prev.key() {
                Some(key) => key_to_new_index.get(key).copied(),
                None => (s2..e2).find(|&j| new_index_to_old_index[j - s2] == 0 && is_same_vnode_type(prev, &c2[j])),
            };
            match new_index {
                None => self.unmount_node(prev, ctx, true),
                Some(new_index) => {
                    new_index_to_old_index[new_index - s2] = old_index + 1;
                    if new_index >= max_new_index_so_far {
                        max_new_index_so_far = new_index;
                    } else {
                        moved = true;
                    }
                    self.patch_node(Some(prev), &c2[new_index], container, None, ctx);
                    patched += 1;
                }
            }
        }

        let stable = if moved {
            longest_increasing_subsequence(&new_index_to_old_index)
        } else {
            Vec::new()
        };
        let mut stable = stable.iter().rev().peekable();
        for offset in (0..to_be_patched).rev() {
            let index = s2 + offset;
            let child = &c2[index];
            let anchor = if index + 1 < l2 { c2[index + 1].el() } else { parent_anchor };
            if new_index_to_old_index[offset] == 0 {
                self.patch_node(None, child, container, anchor, ctx);
            } else if moved {
                if stable.peek() == Some(&&offset) {
                    stable.next();
                } else {
                    self.move_vnode(child, container, anchor, MoveType::Reorder, None);
                }
            }
        }
    }

    /// Patches the flat dynamic descendants of a block.
    pub(crate) fn patch_blocks(&self, old: &[VNode], new: &[VNode], fallback_container: NodeHandle, ctx: PatchContext<'_>) {
        let ctx = PatchContext { optimized: true, ..ctx };
        for (prev, next) in old.iter().zip(new) {
            // Nodes that may be replaced or moved need their real parent;
            // everything else patches in place.
            let needs_parent = matches!(prev.kind(), VNodeType::Fragment)
                || !is_same_vnode_type(prev, next)
                || prev.has_shape(shape::COMPONENT | shape::TELEPORT);
            let container = match prev.el() {
                Some(el) if needs_parent => self.host.parent_node(el).unwrap_or(fallback_container),
                _ => fallback_container,
            };
            self.patch_node(Some(prev), next, container, None, ctx);
        }
    }
}

/// Indices of a longest strictly increasing subsequence of `seq`, ignoring
/// zero entries.
///
/// ```
/// use trellis_core::renderer::longest_increasing_subsequence;
///
/// assert_eq!(longest_increasing_subsequence(&[3, 1, 2, 0, 4]), vec![1, 2, 4]);
/// ```
pub fn longest_increasing_subsequence(seq: &[usize]) -> Vec<usize> {
    let mut predecessor = vec![usize::MAX; seq.len()];
    // `tails[k]` is the index of the smallest tail of an increasing run of
    // length k + 1.
    let mut tails: Vec<usize> = Vec::new();

    for (i, &value) in seq.iter().enumerate() {
        if value == 0 {
            continue;
        }
        if let Some(&last) = tails.last() {
            if seq[last] < value {
                predecessor[i] = last;
                tails.push(i);
                continue;
            }
        } else {
            tails.push(i);
            continue;
        }
        let slot = tails.partition_point(|&t| seq[t] < value);
        if value < seq[tails[slot]] {
            if slot > 0 {
                predecessor[i] = tails[slot - 1];
            }
            tails[slot] = i;
        }
    }

    let mut result = vec![0; tails.len()];
    let mut cursor = tails.last().copied();
    for slot in result.iter_mut().rev() {
        let Some(index) = cursor else {
            break;
        };
        *slot = index;
        cursor = match predecessor[index] {
            usize::MAX => None,
            prev => Some(prev),
        };
    }
    result
}
