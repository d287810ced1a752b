//! The host side of the renderer.

use std::fmt;

use crate::vnode::PropValue;

/// Opaque handle to a node owned by the host.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub u64);

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Node operations the renderer drives.
///
/// The renderer never inspects host nodes; everything it learns about the
/// host tree comes back through these calls. All methods take `&self`:
/// hosts that keep state use interior mutability.
pub trait HostOps {
    /// Inserts `child` into `parent` before `anchor`, or at the end. A
    /// child that is already attached somewhere is moved.
    fn insert(&self, child: NodeHandle, parent: NodeHandle, anchor: Option<NodeHandle>);

    /// Detaches `child` from its parent.
    fn remove(&self, child: NodeHandle);

    fn create_element(&self, tag: &str) -> NodeHandle;

    fn create_text(&self, text: &str) -> NodeHandle;

    fn create_comment(&self, text: &str) -> NodeHandle;

    /// Replaces the content of a text or comment node.
    fn set_text(&self, node: NodeHandle, text: &str);

    /// Replaces every child of `el` with a single text.
    fn set_element_text(&self, el: NodeHandle, text: &str);

    fn parent_node(&self, node: NodeHandle) -> Option<NodeHandle>;

    fn next_sibling(&self, node: NodeHandle) -> Option<NodeHandle>;

    /// Applies one prop change. `None` on either side means absent.
    fn patch_prop(&self, el: NodeHandle, key: &str, prev: Option<&PropValue>, next: Option<&PropValue>);

    /// Resolves a teleport target.
    fn query_selector(&self, _selector: &str) -> Option<NodeHandle> {
        None
    }

    /// Marks `el` with a scoped-style id.
    fn set_scope_id(&self, _el: NodeHandle, _id: &str) {}

    fn clone_node(&self, node: NodeHandle) -> NodeHandle;

    /// Inserts pre-rendered markup and returns its first and last node.
    fn insert_static_content(
        &self,
        content: &str,
        parent: NodeHandle,
        anchor: Option<NodeHandle>,
    ) -> (NodeHandle, NodeHandle);
}
