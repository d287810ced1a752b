//! Virtual Nodes
//!
//! A [`VNode`] describes one unit of rendered output: an element, a text or
//! comment node, a fragment, a component, or one of the built-in structural
//! nodes (teleport, suspense). Render functions build fresh vnode trees; the
//! renderer diffs each new tree against the previous one.
//!
//! # Identity and Mutability
//!
//! A vnode is a shared handle. What it describes (type, props, key) is fixed
//! at creation. The fields the renderer fills in while mounting (host
//! element, anchors, component instance, suspense boundary) are interior
//! mutable, which is why vnodes that were already mounted are cloned before
//! they are reused in another tree ([`clone_if_mounted`]).
//!
//! Two vnodes are the *same node* for patching when their types are equal
//! and their keys match ([`is_same_vnode_type`]).
//!
//! # Flags
//!
//! Shape flags ([`flags::shape`]) are derived from the type and children.
//! Patch flags ([`flags::patch`]) are optional hints supplied with
//! [`element_with_flags`] or the block helpers in [`block`].

pub mod block;
pub mod flags;
pub mod hooks;
pub mod props;

use std::cell::{Cell, Ref as CellRef, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::builtins::suspense::{normalize_suspense_children, SuspenseBoundary};
use crate::component::{get_current_rendering_instance, Component, ComponentInstance, Slot, Slots, WeakInstance};
use crate::reactive::Value;
use crate::renderer::NodeHandle;

pub use block::{close_block, create_block, create_element_block, open_block, set_block_tracking};
pub use flags::{patch, shape};
pub use hooks::{
    with_directives, with_ref, with_transition, Directive, DirectiveBinding, DirectiveHook, RefBinding, RefTarget,
    TransitionHooks, TransitionMode, VNodeRef,
};
pub use props::{merge_props, normalize_class, normalize_style, Handler, PropValue, Props};

/// What a vnode renders.
#[derive(Clone)]
pub enum VNodeType {
    Text,
    Comment,
    /// Pre-rendered markup inserted as-is.
    Static,
    Fragment,
    Element(Rc<str>),
    Component(Component),
    Teleport,
    Suspense,
}

impl PartialEq for VNodeType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (VNodeType::Element(a), VNodeType::Element(b)) => a == b,
            (VNodeType::Component(a), VNodeType::Component(b)) => a.ptr_eq(b),
            (VNodeType::Text, VNodeType::Text)
            | (VNodeType::Comment, VNodeType::Comment)
            | (VNodeType::Static, VNodeType::Static)
            | (VNodeType::Fragment, VNodeType::Fragment)
            | (VNodeType::Teleport, VNodeType::Teleport)
            | (VNodeType::Suspense, VNodeType::Suspense) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for VNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VNodeType::Text => f.write_str("Text"),
            VNodeType::Comment => f.write_str("Comment"),
            VNodeType::Static => f.write_str("Static"),
            VNodeType::Fragment => f.write_str("Fragment"),
            VNodeType::Element(tag) => write!(f, "<{tag}>"),
            VNodeType::Component(c) => write!(f, "<{}>", c.name().unwrap_or("Anonymous")),
            VNodeType::Teleport => f.write_str("Teleport"),
            VNodeType::Suspense => f.write_str("Suspense"),
        }
    }
}

/// Children of a vnode.
#[derive(Clone, Default)]
pub enum Children {
    #[default]
    None,
    Text(Rc<str>),
    Array(Vec<VNode>),
    Slots(Slots),
}

impl Children {
    pub fn as_array(&self) -> Option<&[VNode]> {
        match self {
            Children::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Children::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<Vec<VNode>> for Children {
    fn from(items: Vec<VNode>) -> Self {
        Children::Array(items)
    }
}

impl From<VNode> for Children {
    fn from(item: VNode) -> Self {
        Children::Array(vec![item])
    }
}

impl From<&str> for Children {
    fn from(text: &str) -> Self {
        Children::Text(Rc::from(text))
    }
}

impl From<String> for Children {
    fn from(text: String) -> Self {
        Children::Text(Rc::from(text))
    }
}

impl From<Slots> for Children {
    fn from(slots: Slots) -> Self {
        Children::Slots(slots)
    }
}

impl From<()> for Children {
    fn from(_: ()) -> Self {
        Children::None
    }
}

/// Shared handle to a virtual node.
#[derive(Clone)]
pub struct VNode {
    inner: Rc<VNodeInner>,
}

pub(crate) struct VNodeInner {
    kind: VNodeType,
    props: Option<Props>,
    key: Option<Value>,
    node_ref: Option<VNodeRef>,
    scope_id: Option<Rc<str>>,
    children: RefCell<Children>,
    dirs: RefCell<Vec<DirectiveBinding>>,
    transition: RefCell<Option<Rc<TransitionHooks>>>,
    owner: Option<WeakInstance>,

    shape_flag: Cell<u32>,
    patch_flag: Cell<i32>,
    dynamic_props: Option<Rc<[Rc<str>]>>,
    dynamic_children: RefCell<Option<Vec<VNode>>>,

    el: Cell<Option<NodeHandle>>,
    anchor: Cell<Option<NodeHandle>>,
    target: Cell<Option<NodeHandle>>,
    target_anchor: Cell<Option<NodeHandle>>,
    static_count: usize,
    component: RefCell<Option<ComponentInstance>>,
    suspense: RefCell<Option<SuspenseBoundary>>,
    ss_content: RefCell<Option<VNode>>,
    ss_fallback: RefCell<Option<VNode>>,
}

impl VNode {
    /// Creates a vnode. `key` is taken from `props["key"]`; `class` and
    /// `style` are normalized.
    pub fn new(kind: VNodeType, props: Option<Props>, children: impl Into<Children>) -> Self {
        create_vnode(kind, props, children.into(), 0, None, false)
    }

    pub fn kind(&self) -> &VNodeType {
        &self.inner.kind
    }

    pub fn props(&self) -> Option<&Props> {
        self.inner.props.as_ref()
    }

    pub fn key(&self) -> Option<&Value> {
        self.inner.key.as_ref()
    }

    pub fn node_ref(&self) -> Option<&VNodeRef> {
        self.inner.node_ref.as_ref()
    }

    pub fn scope_id(&self) -> Option<&Rc<str>> {
        self.inner.scope_id.as_ref()
    }

    /// The instance whose render function created this vnode.
    pub fn owner(&self) -> Option<ComponentInstance> {
        self.inner.owner.as_ref().and_then(WeakInstance::upgrade)
    }

    pub fn children(&self) -> CellRef<'_, Children> {
        self.inner.children.borrow()
    }

    pub(crate) fn children_mut(&self) -> RefMut<'_, Children> {
        self.inner.children.borrow_mut()
    }

    /// Array children, cloned out of the cell.
    pub fn child_list(&self) -> Vec<VNode> {
        self.children().as_array().map(<[VNode]>::to_vec).unwrap_or_default()
    }

    pub fn dirs(&self) -> CellRef<'_, Vec<DirectiveBinding>> {
        self.inner.dirs.borrow()
    }

    pub(crate) fn dirs_mut(&self) -> RefMut<'_, Vec<DirectiveBinding>> {
        self.inner.dirs.borrow_mut()
    }

    pub fn has_dirs(&self) -> bool {
        !self.inner.dirs.borrow().is_empty()
    }

    pub fn transition(&self) -> Option<Rc<TransitionHooks>> {
        self.inner.transition.borrow().clone()
    }

    pub(crate) fn set_transition(&self, hooks: Option<Rc<TransitionHooks>>) {
        *self.inner.transition.borrow_mut() = hooks;
    }

    pub fn shape_flag(&self) -> u32 {
        self.inner.shape_flag.get()
    }

    pub fn has_shape(&self, flag: u32) -> bool {
        self.inner.shape_flag.get() & flag != 0
    }

    pub(crate) fn set_shape_flag(&self, flag: u32) {
        self.inner.shape_flag.set(flag);
    }

    pub fn patch_flag(&self) -> i32 {
        self.inner.patch_flag.get()
    }

    pub(crate) fn set_patch_flag(&self, flag: i32) {
        self.inner.patch_flag.set(flag);
    }

    pub fn dynamic_props(&self) -> Option<&[Rc<str>]> {
        self.inner.dynamic_props.as_deref()
    }

    pub fn dynamic_children(&self) -> Option<Vec<VNode>> {
        self.inner.dynamic_children.borrow().clone()
    }

    pub(crate) fn set_dynamic_children(&self, children: Option<Vec<VNode>>) {
        *self.inner.dynamic_children.borrow_mut() = children;
    }

    pub fn el(&self) -> Option<NodeHandle> {
        self.inner.el.get()
    }

    pub(crate) fn set_el(&self, el: Option<NodeHandle>) {
        self.inner.el.set(el);
    }

    pub fn anchor(&self) -> Option<NodeHandle> {
        self.inner.anchor.get()
    }

    pub(crate) fn set_anchor(&self, anchor: Option<NodeHandle>) {
        self.inner.anchor.set(anchor);
    }

    pub fn target(&self) -> Option<NodeHandle> {
        self.inner.target.get()
    }

    pub(crate) fn set_target(&self, target: Option<NodeHandle>) {
        self.inner.target.set(target);
    }

    pub fn target_anchor(&self) -> Option<NodeHandle> {
        self.inner.target_anchor.get()
    }

    pub(crate) fn set_target_anchor(&self, anchor: Option<NodeHandle>) {
        self.inner.target_anchor.set(anchor);
    }

    pub fn static_count(&self) -> usize {
        self.inner.static_count
    }

    pub fn component(&self) -> Option<ComponentInstance> {
        self.inner.component.borrow().clone()
    }

    pub(crate) fn set_component(&self, instance: Option<ComponentInstance>) {
        *self.inner.component.borrow_mut() = instance;
    }

    pub fn suspense(&self) -> Option<SuspenseBoundary> {
        self.inner.suspense.borrow().clone()
    }

    pub(crate) fn set_suspense(&self, boundary: Option<SuspenseBoundary>) {
        *self.inner.suspense.borrow_mut() = boundary;
    }

    pub(crate) fn ss_content(&self) -> Option<VNode> {
        self.inner.ss_content.borrow().clone()
    }

    pub(crate) fn ss_fallback(&self) -> Option<VNode> {
        self.inner.ss_fallback.borrow().clone()
    }

    pub(crate) fn set_ss_branches(&self, content: VNode, fallback: VNode) {
        *self.inner.ss_content.borrow_mut() = Some(content);
        *self.inner.ss_fallback.borrow_mut() = Some(fallback);
    }

    /// The component definition, for component vnodes.
    pub fn component_def(&self) -> Option<&Component> {
        match &self.inner.kind {
            VNodeType::Component(def) => Some(def),
            _ => None,
        }
    }

    pub fn is_component(&self) -> bool {
        self.has_shape(shape::COMPONENT)
    }

    pub fn ptr_eq(&self, other: &VNode) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Applies `f` to a vnode that is not shared yet, cloning first if it is.
    pub(crate) fn edit(self, f: impl FnOnce(&mut VNodeInner)) -> VNode {
        let mut vnode = match Rc::strong_count(&self.inner) {
            1 => self,
            _ => clone_vnode(&self, None),
        };
        match Rc::get_mut(&mut vnode.inner) {
            Some(inner) => f(inner),
            None => crate::config::warn("vnode is shared and cannot be edited"),
        }
        vnode
    }

    /// Returns the vnode with `key` as its key.
    pub fn with_key(self, key: impl Into<Value>) -> VNode {
        let key = key.into();
        self.edit(|inner| inner.key = Some(key))
    }

    /// Returns the vnode with a scope id added to its element.
    pub fn with_scope_id(self, id: &str) -> VNode {
        let id = Rc::from(id);
        self.edit(|inner| inner.scope_id = Some(id))
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("VNode");
        s.field("type", &self.inner.kind);
        if let Some(key) = &self.inner.key {
            s.field("key", key);
        }
        if let Some(props) = &self.inner.props {
            s.field("props", props);
        }
        match &*self.inner.children.borrow() {
            Children::Text(t) => {
                s.field("children", t);
            }
            Children::Array(items) => {
                s.field("children", items);
            }
            Children::Slots(slots) => {
                s.field("slots", &slots.names());
            }
            Children::None => {}
        }
        s.finish()
    }
}

/// Whether `a` can be patched into `b` in place.
pub fn is_same_vnode_type(a: &VNode, b: &VNode) -> bool {
    a.inner.kind == b.inner.kind && a.inner.key == b.inner.key
}

fn shape_of(kind: &VNodeType) -> u32 {
    match kind {
        VNodeType::Element(_) => shape::ELEMENT,
        VNodeType::Suspense => shape::SUSPENSE,
        VNodeType::Teleport => shape::TELEPORT,
        VNodeType::Component(def) if def.is_functional() => shape::FUNCTIONAL_COMPONENT,
        VNodeType::Component(_) => shape::STATEFUL_COMPONENT,
        _ => 0,
    }
}

/// Children passed to a component become its default slot; slots passed to
/// an element or teleport render as their default slot's output.
fn normalize_children(shape_flag: u32, children: Children) -> (Children, u32) {
    match children {
        Children::None => (Children::None, 0),
        Children::Text(text) if shape_flag & shape::COMPONENT != 0 => {
            let slot: Slot = Rc::new(move |_: &Value| vec![text_vnode(&text)]);
            (Children::Slots(Slots::new().with("default", slot)), shape::SLOTS_CHILDREN)
        }
        Children::Text(text) if shape_flag & shape::TELEPORT != 0 => {
            (Children::Array(vec![text_vnode(&text)]), shape::ARRAY_CHILDREN)
        }
        Children::Text(text) => (Children::Text(text), shape::TEXT_CHILDREN),
        Children::Array(items) if shape_flag & shape::COMPONENT != 0 => {
            let slot: Slot = Rc::new(move |_: &Value| items.iter().map(clone_if_mounted).collect());
            (Children::Slots(Slots::new().with("default", slot)), shape::SLOTS_CHILDREN)
        }
        Children::Array(items) => (Children::Array(items), shape::ARRAY_CHILDREN),
        Children::Slots(slots) if shape_flag & (shape::ELEMENT | shape::TELEPORT) != 0 => {
            let rendered = slots.render("default", &Value::Undefined);
            (Children::Array(rendered), shape::ARRAY_CHILDREN)
        }
        Children::Slots(slots) => (Children::Slots(slots), shape::SLOTS_CHILDREN),
    }
}

pub(crate) fn create_vnode(
    kind: VNodeType,
    props: Option<Props>,
    children: Children,
    patch_flag: i32,
    dynamic_props: Option<Vec<Rc<str>>>,
    is_block_node: bool,
) -> VNode {
    let mut props = props;
    let key = props
        .as_mut()
        .and_then(|p| p.remove("key"))
        .map(|k| k.to_value())
        .filter(|k| !k.is_undefined());
    if let Some(props) = props.as_mut() {
        props::normalize_props(props);
    }

    let base_shape = shape_of(&kind);
    let (children, child_shape) = normalize_children(base_shape, children);
    let rendering = get_current_rendering_instance();
    let scope_id = rendering.as_ref().and_then(|i| i.def().scope_id().cloned());
    let is_suspense = matches!(kind, VNodeType::Suspense);

    let vnode = VNode {
        inner: Rc::new(VNodeInner {
            kind,
            props,
            key,
            node_ref: None,
            scope_id,
            children: RefCell::new(children),
            dirs: RefCell::new(Vec::new()),
            transition: RefCell::new(None),
            owner: rendering.map(|i| i.downgrade()),
            shape_flag: Cell::new(base_shape | child_shape),
            patch_flag: Cell::new(patch_flag),
            dynamic_props: dynamic_props.map(Rc::from),
            dynamic_children: RefCell::new(None),
            el: Cell::new(None),
            anchor: Cell::new(None),
            target: Cell::new(None),
            target_anchor: Cell::new(None),
            static_count: 0,
            component: RefCell::new(None),
            suspense: RefCell::new(None),
            ss_content: RefCell::new(None),
            ss_fallback: RefCell::new(None),
        }),
    };

    if is_suspense {
        normalize_suspense_children(&vnode);
    }
    block::track_in_current_block(&vnode, is_block_node);
    vnode
}

/// Copies `vnode`, merging `extra_props` over its props.
///
/// The copy shares children, hooks and mounted state with the original.
pub fn clone_vnode(vnode: &VNode, extra_props: Option<&Props>) -> VNode {
    let src = &vnode.inner;
    let props = match (extra_props, &src.props) {
        (Some(extra), Some(own)) => Some(merge_props([own, extra])),
        (Some(extra), None) => Some(merge_props([extra])),
        (None, own) => own.clone(),
    };
    let key = match extra_props.map(|p| p.value("key")) {
        Some(key) if !key.is_undefined() => Some(key),
        _ => src.key.clone(),
    };
    let props = props.map(|mut p| {
        p.remove("key");
        p
    });
    let patch_flag = match (extra_props, &src.kind) {
        (Some(_), kind) if *kind != VNodeType::Fragment => {
            if src.patch_flag.get() == patch::HOISTED {
                patch::FULL_PROPS
            } else {
                src.patch_flag.get() | patch::FULL_PROPS
            }
        }
        _ => src.patch_flag.get(),
    };

    VNode {
        inner: Rc::new(VNodeInner {
            kind: src.kind.clone(),
            props,
            key,
            node_ref: src.node_ref.clone(),
            scope_id: src.scope_id.clone(),
            children: RefCell::new(src.children.borrow().clone()),
            dirs: RefCell::new(src.dirs.borrow().clone()),
            transition: RefCell::new(src.transition.borrow().clone()),
            owner: src.owner.clone(),
            shape_flag: Cell::new(src.shape_flag.get()),
            patch_flag: Cell::new(patch_flag),
            dynamic_props: src.dynamic_props.clone(),
            dynamic_children: RefCell::new(src.dynamic_children.borrow().clone()),
            el: Cell::new(src.el.get()),
            anchor: Cell::new(src.anchor.get()),
            target: Cell::new(src.target.get()),
            target_anchor: Cell::new(src.target_anchor.get()),
            static_count: src.static_count,
            component: RefCell::new(src.component.borrow().clone()),
            suspense: RefCell::new(src.suspense.borrow().clone()),
            ss_content: RefCell::new(src.ss_content.borrow().as_ref().map(|v| clone_vnode(v, None))),
            ss_fallback: RefCell::new(src.ss_fallback.borrow().as_ref().map(|v| clone_vnode(v, None))),
        }),
    }
}

/// `vnode` itself if it was never mounted, otherwise a fresh copy.
pub fn clone_if_mounted(vnode: &VNode) -> VNode {
    if vnode.el().is_none() || vnode.patch_flag() == patch::HOISTED {
        vnode.clone()
    } else {
        clone_vnode(vnode, None)
    }
}

// ----------------------------------------------------------------------------
// Constructors
// ----------------------------------------------------------------------------

fn text_vnode(text: &str) -> VNode {
    create_vnode(VNodeType::Text, None, Children::Text(Rc::from(text)), 0, None, false)
}

/// A text node.
pub fn text(content: impl AsRef<str>) -> VNode {
    text_vnode(content.as_ref())
}

/// A text node whose content may change.
pub fn dynamic_text(content: impl AsRef<str>) -> VNode {
    create_vnode(
        VNodeType::Text,
        None,
        Children::Text(Rc::from(content.as_ref())),
        patch::TEXT,
        None,
        false,
    )
}

pub fn comment(content: impl AsRef<str>) -> VNode {
    create_vnode(
        VNodeType::Comment,
        None,
        Children::Text(Rc::from(content.as_ref())),
        0,
        None,
        false,
    )
}

/// Pre-rendered markup spanning `node_count` host nodes.
pub fn static_content(markup: impl AsRef<str>, node_count: usize) -> VNode {
    let vnode = create_vnode(
        VNodeType::Static,
        None,
        Children::Text(Rc::from(markup.as_ref())),
        0,
        None,
        false,
    );
    vnode.edit(|inner| inner.static_count = node_count)
}

pub fn element(tag: &str, props: Option<Props>, children: impl Into<Children>) -> VNode {
    create_vnode(VNodeType::Element(Rc::from(tag)), props, children.into(), 0, None, false)
}

/// An element with patch hints. `dynamic_props` lists the props that may
/// change when `patch_flag` includes [`patch::PROPS`].
pub fn element_with_flags(
    tag: &str,
    props: Option<Props>,
    children: impl Into<Children>,
    patch_flag: i32,
    dynamic_props: Option<Vec<&str>>,
) -> VNode {
    create_vnode(
        VNodeType::Element(Rc::from(tag)),
        props,
        children.into(),
        patch_flag,
        dynamic_props.map(|names| names.into_iter().map(Rc::from).collect()),
        false,
    )
}

/// A static element, hoisted out of the render function and shared by
/// every render. It is mounted by cloning its first host node.
pub fn hoisted(vnode: VNode) -> VNode {
    vnode.set_patch_flag(patch::HOISTED);
    vnode
}

pub fn fragment(children: Vec<VNode>) -> VNode {
    create_vnode(VNodeType::Fragment, None, Children::Array(children), 0, None, false)
}

/// A fragment with keyed children, diffed with the keyed algorithm.
pub fn keyed_fragment(children: Vec<VNode>) -> VNode {
    create_vnode(
        VNodeType::Fragment,
        None,
        Children::Array(children),
        patch::KEYED_FRAGMENT,
        None,
        false,
    )
}

pub fn component(def: &Component, props: Option<Props>, children: impl Into<Children>) -> VNode {
    create_vnode(VNodeType::Component(def.clone()), props, children.into(), 0, None, false)
}

/// Renders `children` into the host node matched by `to`. With `disabled`
/// set, the children stay in place.
pub fn teleport(to: &str, disabled: bool, children: Vec<VNode>) -> VNode {
    let props = Props::new().with("to", to).with("disabled", disabled);
    create_vnode(VNodeType::Teleport, Some(props), Children::Array(children), 0, None, false)
}

/// A suspense boundary showing `fallback` until `content` settles.
pub fn suspense(props: Option<Props>, content: VNode, fallback: VNode) -> VNode {
    let (c, f) = (content, fallback);
    let slots = Slots::new()
        .with("default", Rc::new(move |_: &Value| vec![c.clone()]) as Slot)
        .with("fallback", Rc::new(move |_: &Value| vec![f.clone()]) as Slot);
    create_vnode(VNodeType::Suspense, props, Children::Slots(slots), 0, None, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_flags_follow_children() {
        let el = element("div", None, "hi");
        assert!(el.has_shape(shape::ELEMENT));
        assert!(el.has_shape(shape::TEXT_CHILDREN));

        let list = element("ul", None, vec![element("li", None, ())]);
        assert!(list.has_shape(shape::ARRAY_CHILDREN));
        assert!(!list.has_shape(shape::TEXT_CHILDREN));
    }

    #[test]
    fn key_comes_from_props() {
        let a = element("li", Some(Props::new().with("key", 1).with("id", "x")), ());
        assert_eq!(a.key(), Some(&Value::from(1)));
        assert!(!a.props().unwrap().contains_key("key"));

        let b = element("li", Some(Props::new().with("key", 1)), ());
        let c = element("li", Some(Props::new().with("key", 2)), ());
        assert!(is_same_vnode_type(&a, &b));
        assert!(!is_same_vnode_type(&a, &c));
        assert!(!is_same_vnode_type(&a, &element("p", None, ())));
    }

    #[test]
    fn class_is_normalized() {
        let el = element(
            "div",
            Some(Props::new().with("class", Value::array(["a", "b"]))),
            (),
        );
        assert_eq!(el.props().unwrap().value("class"), Value::from("a b"));
    }

    #[test]
    fn clone_merges_props_and_marks_full_props() {
        let el = element("div", Some(Props::new().with("class", "a")), ());
        let extra = Props::new().with("class", "b").with("id", "x");
        let copy = clone_vnode(&el, Some(&extra));
        assert_eq!(copy.props().unwrap().value("class"), Value::from("a b"));
        assert_eq!(copy.props().unwrap().value("id"), Value::from("x"));
        assert_ne!(copy.patch_flag() & patch::FULL_PROPS, 0);
        assert!(!copy.ptr_eq(&el));
    }

    #[test]
    fn with_key_on_fresh_vnode_edits_in_place() {
        let el = text("a").with_key("k");
        assert_eq!(el.key(), Some(&Value::from("k")));
    }

    #[test]
    fn mounted_vnodes_are_cloned_for_reuse() {
        let el = element("div", None, ());
        assert!(clone_if_mounted(&el).ptr_eq(&el));
        el.set_el(Some(NodeHandle(7)));
        assert!(!clone_if_mounted(&el).ptr_eq(&el));
    }
}
