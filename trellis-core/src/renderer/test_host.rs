//! In-memory host.
//!
//! `TestHost` keeps its nodes in an arena and records every operation the
//! renderer performs, so tests can assert on both the resulting tree and
//! the work it took to get there.
//!
//! ```rust,ignore
//! let renderer = Renderer::new(TestHost::new());
//! let root = renderer.host().create_root();
//! renderer.render(Some(element("div", None, "hi")), root)?;
//! assert_eq!(renderer.host().serialize_inner(root), "<div>hi</div>");
//! ```

use std::cell::RefCell;
use std::fmt::Write as _;

use indexmap::IndexMap;

use super::host::{HostOps, NodeHandle};
use crate::error::{call_with_error_handling, ErrorKind};
use crate::reactive::Value;
use crate::vnode::PropValue;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element(String),
    Text(String),
    Comment(String),
    /// Pre-rendered markup, kept as one node.
    Static(String),
}

/// One host operation, in the order the renderer issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOp {
    Create { node: NodeHandle, kind: NodeKind },
    /// A detached node was inserted.
    Insert { node: NodeHandle, parent: NodeHandle, anchor: Option<NodeHandle> },
    /// An attached node was moved.
    Move { node: NodeHandle, parent: NodeHandle, anchor: Option<NodeHandle> },
    Remove { node: NodeHandle },
    SetText { node: NodeHandle, text: String },
    SetElementText { el: NodeHandle, text: String },
    PatchProp { el: NodeHandle, key: String, value: Option<String> },
}

impl NodeOp {
    pub fn is_move(&self) -> bool {
        matches!(self, NodeOp::Move { .. })
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, NodeOp::Remove { .. })
    }

    pub fn is_create(&self) -> bool {
        matches!(self, NodeOp::Create { .. })
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeHandle>,
    children: Vec<NodeHandle>,
    attrs: IndexMap<String, String>,
    listeners: IndexMap<String, PropValue>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            attrs: IndexMap::new(),
            listeners: IndexMap::new(),
        }
    }
}

#[derive(Default)]
struct Arena {
    nodes: Vec<NodeData>,
    ops: Vec<NodeOp>,
}

impl Arena {
    fn node(&self, handle: NodeHandle) -> Option<&NodeData> {
        self.nodes.get(handle.0 as usize)
    }

    fn node_mut(&mut self, handle: NodeHandle) -> Option<&mut NodeData> {
        self.nodes.get_mut(handle.0 as usize)
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeHandle {
        let handle = NodeHandle(self.nodes.len() as u64);
        self.nodes.push(NodeData::new(kind.clone()));
        self.ops.push(NodeOp::Create { node: handle, kind });
        handle
    }

    fn detach(&mut self, child: NodeHandle) -> bool {
        let Some(parent) = self.node(child).and_then(|n| n.parent) else {
            return false;
        };
        if let Some(parent) = self.node_mut(parent) {
            parent.children.retain(|c| *c != child);
        }
        if let Some(child) = self.node_mut(child) {
            child.parent = None;
        }
        true
    }

    fn clone_subtree(&mut self, node: NodeHandle) -> NodeHandle {
        let Some(data) = self.node(node).cloned() else {
            return node;
        };
        let copy = self.alloc(data.kind.clone());
        if let Some(target) = self.node_mut(copy) {
            target.attrs = data.attrs.clone();
            target.listeners = data.listeners.clone();
        }
        for child in data.children {
            let child_copy = self.clone_subtree(child);
            if let Some(c) = self.node_mut(child_copy) {
                c.parent = Some(copy);
            }
            if let Some(target) = self.node_mut(copy) {
                target.children.push(child_copy);
            }
        }
        copy
    }
}

/// An in-memory [`HostOps`] implementation with an operation log.
#[derive(Default)]
pub struct TestHost {
    arena: RefCell<Arena>,
}

impl TestHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A detached element to render into.
    pub fn create_root(&self) -> NodeHandle {
        self.create_element("root")
    }

    /// Every operation since creation or the last [`reset_ops`](Self::reset_ops).
    pub fn ops(&self) -> Vec<NodeOp> {
        self.arena.borrow().ops.clone()
    }

    pub fn reset_ops(&self) {
        self.arena.borrow_mut().ops.clear();
    }

    pub fn kind(&self, node: NodeHandle) -> Option<NodeKind> {
        self.arena.borrow().node(node).map(|n| n.kind.clone())
    }

    pub fn children(&self, node: NodeHandle) -> Vec<NodeHandle> {
        self.arena
            .borrow()
            .node(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn attr(&self, el: NodeHandle, key: &str) -> Option<String> {
        self.arena.borrow().node(el).and_then(|n| n.attrs.get(key).cloned())
    }

    /// Text of a text or comment node.
    pub fn text(&self, node: NodeHandle) -> Option<String> {
        match self.kind(node)? {
            NodeKind::Text(text) | NodeKind::Comment(text) => Some(text),
            _ => None,
        }
    }

    /// Runs the listeners bound to `event` (e.g. `"onClick"`) on `el`.
    pub fn dispatch(&self, el: NodeHandle, event: &str, args: &[Value]) {
        let listener = self.arena.borrow().node(el).and_then(|n| n.listeners.get(event).cloned());
        let Some(listener) = listener else {
            return;
        };
        for handler in listener.handlers() {
            let _: Option<()> = call_with_error_handling(ErrorKind::ComponentEventHandler, None, || handler(args));
        }
    }

    /// The markup of `node`'s children.
    pub fn serialize_inner(&self, node: NodeHandle) -> String {
        let arena = self.arena.borrow();
        let mut out = String::new();
        if let Some(data) = arena.node(node) {
            for child in &data.children {
                serialize_into(&arena, *child, &mut out);
            }
        }
        out
    }

    /// The markup of `node` itself.
    pub fn serialize(&self, node: NodeHandle) -> String {
        let arena = self.arena.borrow();
        let mut out = String::new();
        serialize_into(&arena, node, &mut out);
        out
    }
}

fn serialize_into(arena: &Arena, node: NodeHandle, out: &mut String) {
    let Some(data) = arena.node(node) else {
        return;
    };
    match &data.kind {
        NodeKind::Text(text) => out.push_str(text),
        NodeKind::Comment(text) => {
            let _ = write!(out, "<!--{text}-->");
        }
        NodeKind::Static(markup) => out.push_str(markup),
        NodeKind::Element(tag) => {
            let _ = write!(out, "<{tag}");
            for (key, value) in &data.attrs {
                if value.is_empty() {
                    let _ = write!(out, " {key}");
                } else {
                    let _ = write!(out, " {key}=\"{value}\"");
                }
            }
            out.push('>');
            for child in &data.children {
                serialize_into(arena, *child, out);
            }
            let _ = write!(out, "</{tag}>");
        }
    }
}

/// The attribute text of a prop value; `None` removes the attribute.
fn attr_text(value: &PropValue) -> Option<String> {
    match value.as_value()? {
        Value::Undefined | Value::Null | Value::Bool(false) => None,
        Value::Bool(true) => Some(String::new()),
        other => Some(other.to_display_string()),
    }
}

impl HostOps for TestHost {
    fn insert(&self, child: NodeHandle, parent: NodeHandle, anchor: Option<NodeHandle>) {
        let mut arena = self.arena.borrow_mut();
        let moved = arena.detach(child);
        let Some(parent_data) = arena.node_mut(parent) else {
            return;
        };
        let index = anchor
            .and_then(|a| parent_data.children.iter().position(|c| *c == a))
            .unwrap_or(parent_data.children.len());
        parent_data.children.insert(index, child);
        if let Some(data) = arena.node_mut(child) {
            data.parent = Some(parent);
        }
        let op = if moved {
            NodeOp::Move { node: child, parent, anchor }
        } else {
            NodeOp::Insert { node: child, parent, anchor }
        };
        arena.ops.push(op);
    }

    fn remove(&self, child: NodeHandle) {
        let mut arena = self.arena.borrow_mut();
        if arena.detach(child) {
            arena.ops.push(NodeOp::Remove { node: child });
        }
    }

    fn create_element(&self, tag: &str) -> NodeHandle {
        self.arena.borrow_mut().alloc(NodeKind::Element(tag.to_string()))
    }

    fn create_text(&self, text: &str) -> NodeHandle {
        self.arena.borrow_mut().alloc(NodeKind::Text(text.to_string()))
    }

    fn create_comment(&self, text: &str) -> NodeHandle {
        self.arena.borrow_mut().alloc(NodeKind::Comment(text.to_string()))
    }

    fn set_text(&self, node: NodeHandle, text: &str) {
        let mut arena = self.arena.borrow_mut();
        if let Some(data) = arena.node_mut(node) {
            match &mut data.kind {
                NodeKind::Text(content) | NodeKind::Comment(content) => *content = text.to_string(),
                _ => return,
            }
        }
        arena.ops.push(NodeOp::SetText {
            node,
            text: text.to_string(),
        });
    }

    fn set_element_text(&self, el: NodeHandle, text: &str) {
        let mut arena = self.arena.borrow_mut();
        let old = arena.node(el).map(|n| n.children.clone()).unwrap_or_default();
        for child in old {
            arena.detach(child);
        }
        if !text.is_empty() {
            let node = NodeHandle(arena.nodes.len() as u64);
            let mut data = NodeData::new(NodeKind::Text(text.to_string()));
            data.parent = Some(el);
            arena.nodes.push(data);
            if let Some(parent) = arena.node_mut(el) {
                parent.children.push(node);
            }
        }
        arena.ops.push(NodeOp::SetElementText {
            el,
            text: text.to_string(),
        });
    }

    fn parent_node(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.arena.borrow().node(node).and_then(|n| n.parent)
    }

    fn next_sibling(&self, node: NodeHandle) -> Option<NodeHandle> {
        let arena = self.arena.borrow();
        let parent = arena.node(node)?.parent?;
        let siblings = &arena.node(parent)?.children;
        let index = siblings.iter().position(|c| *c == node)?;
        siblings.get(index + 1).copied()
    }

    fn patch_prop(&self, el: NodeHandle, key: &str, _prev: Option<&PropValue>, next: Option<&PropValue>) {
        let mut arena = self.arena.borrow_mut();
        let Some(data) = arena.node_mut(el) else {
            return;
        };
        let value = match next {
            Some(next) if next.is_callable() => {
                data.listeners.insert(key.to_string(), next.clone());
                None
            }
            Some(next) => {
                data.listeners.shift_remove(key);
                attr_text(next)
            }
            None => {
                data.listeners.shift_remove(key);
                None
            }
        };
        match &value {
            Some(text) => {
                data.attrs.insert(key.to_string(), text.clone());
            }
            None => {
                data.attrs.shift_remove(key);
            }
        }
        arena.ops.push(NodeOp::PatchProp {
            el,
            key: key.to_string(),
            value,
        });
    }

    fn query_selector(&self, selector: &str) -> Option<NodeHandle> {
        let arena = self.arena.borrow();
        let matches = |data: &NodeData| match selector.strip_prefix('#') {
            Some(id) => data.attrs.get("id").is_some_and(|v| v == id),
            None => matches!(&data.kind, NodeKind::Element(tag) if tag == selector),
        };
        arena
            .nodes
            .iter()
            .position(matches)
            .map(|index| NodeHandle(index as u64))
    }

    fn set_scope_id(&self, el: NodeHandle, id: &str) {
        if let Some(data) = self.arena.borrow_mut().node_mut(el) {
            data.attrs.insert(id.to_string(), String::new());
        }
    }

    fn clone_node(&self, node: NodeHandle) -> NodeHandle {
        self.arena.borrow_mut().clone_subtree(node)
    }

    fn insert_static_content(
        &self,
        content: &str,
        parent: NodeHandle,
        anchor: Option<NodeHandle>,
    ) -> (NodeHandle, NodeHandle) {
        let node = self.arena.borrow_mut().alloc(NodeKind::Static(content.to_string()));
        self.insert(node, parent, anchor);
        (node, node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_before_anchor_and_move() {
        let host = TestHost::new();
        let root = host.create_root();
        let a = host.create_text("a");
        let b = host.create_text("b");
        host.insert(a, root, None);
        host.insert(b, root, Some(a));
        assert_eq!(host.serialize_inner(root), "ba");
        assert_eq!(host.next_sibling(b), Some(a));

        host.reset_ops();
        host.insert(b, root, None);
        assert_eq!(host.serialize_inner(root), "ab");
        assert_eq!(host.ops(), vec![NodeOp::Move { node: b, parent: root, anchor: None }]);
    }

    #[test]
    fn props_become_attributes() {
        let host = TestHost::new();
        let el = host.create_element("div");
        host.patch_prop(el, "id", None, Some(&PropValue::from("app")));
        host.patch_prop(el, "hidden", None, Some(&PropValue::from(true)));
        assert_eq!(host.serialize(el), "<div id=\"app\" hidden></div>");
        assert_eq!(host.query_selector("#app"), Some(el));

        host.patch_prop(el, "hidden", None, Some(&PropValue::from(false)));
        assert_eq!(host.attr(el, "hidden"), None);
    }

    #[test]
    fn element_text_replaces_children() {
        let host = TestHost::new();
        let el = host.create_element("p");
        let child = host.create_element("span");
        host.insert(child, el, None);
        host.set_element_text(el, "hello");
        assert_eq!(host.serialize(el), "<p>hello</p>");
        assert_eq!(host.parent_node(child), None);
    }

    #[test]
    fn clone_copies_the_subtree() {
        let host = TestHost::new();
        let el = host.create_element("ul");
        let item = host.create_element("li");
        host.insert(item, el, None);
        let copy = host.clone_node(el);
        assert_ne!(copy, el);
        assert_eq!(host.serialize(copy), "<ul><li></li></ul>");
    }
}
