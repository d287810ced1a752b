//! Shape and patch flags.
//!
//! Both are plain integer bitmasks. Shape flags describe what a vnode is and
//! what kind of children it carries; patch flags are hints from whoever built
//! the vnode about which parts of it can change between renders.

/// What a vnode is.
pub mod shape {
    pub const ELEMENT: u32 = 1;
    pub const FUNCTIONAL_COMPONENT: u32 = 1 << 1;
    pub const STATEFUL_COMPONENT: u32 = 1 << 2;
    pub const TEXT_CHILDREN: u32 = 1 << 3;
    pub const ARRAY_CHILDREN: u32 = 1 << 4;
    pub const SLOTS_CHILDREN: u32 = 1 << 5;
    pub const TELEPORT: u32 = 1 << 6;
    pub const SUSPENSE: u32 = 1 << 7;
    /// Set by keep-alive on a child it caches: unmount deactivates instead.
    pub const COMPONENT_SHOULD_KEEP_ALIVE: u32 = 1 << 8;
    /// Set by keep-alive on a cache hit: mount activates instead.
    pub const COMPONENT_KEPT_ALIVE: u32 = 1 << 9;
    pub const COMPONENT: u32 = STATEFUL_COMPONENT | FUNCTIONAL_COMPONENT;
}

/// Which parts of a vnode may change. Positive values combine; negative
/// values are special markers.
pub mod patch {
    /// Dynamic text content.
    pub const TEXT: i32 = 1;
    /// Dynamic `class` binding.
    pub const CLASS: i32 = 1 << 1;
    /// Dynamic `style` binding.
    pub const STYLE: i32 = 1 << 2;
    /// Dynamic props other than class and style, listed in `dynamic_props`.
    pub const PROPS: i32 = 1 << 3;
    /// Props with dynamic keys; needs a full diff.
    pub const FULL_PROPS: i32 = 1 << 4;
    pub const HYDRATE_EVENTS: i32 = 1 << 5;
    /// Fragment whose children order never changes.
    pub const STABLE_FRAGMENT: i32 = 1 << 6;
    /// Fragment with keyed (or partially keyed) children.
    pub const KEYED_FRAGMENT: i32 = 1 << 7;
    pub const UNKEYED_FRAGMENT: i32 = 1 << 8;
    /// Only non-prop patching is needed (refs, directives).
    pub const NEED_PATCH: i32 = 1 << 9;
    /// Component with dynamic slots.
    pub const DYNAMIC_SLOTS: i32 = 1 << 10;
    pub const DEV_ROOT_FRAGMENT: i32 = 1 << 11;
    /// Static vnode, hoisted out of the render function. Never patched.
    pub const HOISTED: i32 = -1;
    /// Leave optimized mode: diff everything.
    pub const BAIL: i32 = -2;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_covers_both_kinds() {
        assert_ne!(shape::COMPONENT & shape::STATEFUL_COMPONENT, 0);
        assert_ne!(shape::COMPONENT & shape::FUNCTIONAL_COMPONENT, 0);
        assert_eq!(shape::COMPONENT & shape::ELEMENT, 0);
    }

    #[test]
    fn patch_flags_do_not_overlap() {
        let all = [
            patch::TEXT,
            patch::CLASS,
            patch::STYLE,
            patch::PROPS,
            patch::FULL_PROPS,
            patch::HYDRATE_EVENTS,
            patch::STABLE_FRAGMENT,
            patch::KEYED_FRAGMENT,
            patch::UNKEYED_FRAGMENT,
            patch::NEED_PATCH,
            patch::DYNAMIC_SLOTS,
            patch::DEV_ROOT_FRAGMENT,
        ];
        let mut seen = 0;
        for flag in all {
            assert_eq!(seen & flag, 0);
            seen |= flag;
        }
    }
}
