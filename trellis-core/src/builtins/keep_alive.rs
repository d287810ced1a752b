//! Keep-alive: caches the component instances it renders.
//!
//! Switching the single child of a keep-alive moves the previous child's
//! host nodes into an off-tree storage container instead of unmounting it.
//! Rendering a cached child again moves the nodes back and reuses the
//! instance. The cache is keyed by the child's key, or by its component
//! definition when it has none, and evicts least recently used entries
//! once `max` is exceeded.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use indexmap::IndexSet;

use super::suspense::{queue_effect_with_suspense, SuspenseBoundary};
use crate::component::{
    invoke_hooks, on_before_unmount, on_mounted, on_updated, Builtin, Component, ComponentDef, ComponentInstance,
    LifecycleHook, PropOptions, SetupResult, WeakInstance,
};
use crate::reactive::Value;
use crate::renderer::{invoke_vnode_hook, MoveType, NodeHandle, PatchContext, RendererInternals};
use crate::scheduler::Job;
use crate::vnode::{clone_vnode, comment, fragment, is_same_vnode_type, shape, VNode};
use crate::watch::{watch, WatchFlush, WatchOptions, WatchSource};

thread_local! {
    static KEEP_ALIVE: Component = ComponentDef::new()
        .name("KeepAlive")
        .builtin(Builtin::KeepAlive)
        .prop("include", PropOptions::new())
        .prop("exclude", PropOptions::new())
        .prop("max", PropOptions::new())
        .setup(setup)
        .build();
}

/// The keep-alive component. Props: `include` and `exclude` (a
/// comma-separated string or an array of component names) and `max`.
pub fn keep_alive() -> Component {
    KEEP_ALIVE.with(Component::clone)
}

/// Renderer-facing side of a keep-alive instance: moves cached subtrees in
/// and out of storage.
pub(crate) struct KeepAliveHooks {
    storage: NodeHandle,
    internals: Weak<dyn RendererInternals>,
    owner: WeakInstance,
}

pub(crate) fn attach(instance: &ComponentInstance, internals: Weak<dyn RendererInternals>, storage: NodeHandle) {
    instance.set_keep_alive_hooks(Rc::new(KeepAliveHooks {
        storage,
        internals,
        owner: instance.downgrade(),
    }));
}

impl KeepAliveHooks {
    fn parent_suspense(&self) -> Option<SuspenseBoundary> {
        self.owner.upgrade().and_then(|owner| owner.suspense().cloned())
    }

    /// Moves a cached child back into the tree in place of a mount.
    pub(crate) fn activate(&self, vnode: &VNode, container: NodeHandle, anchor: Option<NodeHandle>, optimized: bool) {
        let (Some(internals), Some(instance)) = (self.internals.upgrade(), vnode.component()) else {
            return;
        };
        let suspense = self.parent_suspense();
        internals.move_node(vnode, container, anchor, MoveType::Enter, suspense.as_ref());
        // Props may have changed while the child was cached.
        let ctx = PatchContext {
            parent: Some(&instance),
            suspense: suspense.as_ref(),
            optimized,
        };
        internals.patch(Some(&instance.vnode()), vnode, container, anchor, ctx);

        let target = instance.downgrade();
        let activated = vnode.clone();
        let job = Job::new(move || {
            let Some(instance) = target.upgrade() else {
                return;
            };
            instance.set_deactivated(false);
            invoke_tree_hooks(&instance, LifecycleHook::Activated);
            if let Some(hook) = activated.props().and_then(|p| p.get("onVnodeMounted")) {
                invoke_vnode_hook(hook, instance.parent().as_ref(), &activated, None);
            }
        })
        .labelled("keep-alive activate");
        queue_effect_with_suspense(job, suspense.as_ref());
    }

    /// Moves a kept-alive child into storage in place of an unmount.
    pub(crate) fn deactivate(&self, vnode: &VNode) {
        let (Some(internals), Some(instance)) = (self.internals.upgrade(), vnode.component()) else {
            return;
        };
        let suspense = self.parent_suspense();
        internals.move_node(vnode, self.storage, None, MoveType::Leave, suspense.as_ref());

        let target = instance.downgrade();
        let deactivated = vnode.clone();
        let job = Job::new(move || {
            let Some(instance) = target.upgrade() else {
                return;
            };
            invoke_tree_hooks(&instance, LifecycleHook::Deactivated);
            if let Some(hook) = deactivated.props().and_then(|p| p.get("onVnodeUnmounted")) {
                invoke_vnode_hook(hook, instance.parent().as_ref(), &deactivated, None);
            }
            instance.set_deactivated(true);
        })
        .labelled("keep-alive deactivate");
        queue_effect_with_suspense(job, suspense.as_ref());
    }

    /// Unmounts a cached child for real.
    fn unmount(&self, vnode: &VNode) {
        reset_shape_flag(vnode);
        let (Some(internals), Some(owner)) = (self.internals.upgrade(), self.owner.upgrade()) else {
            return;
        };
        let ctx = PatchContext {
            parent: Some(&owner),
            suspense: owner.suspense(),
            optimized: false,
        };
        internals.unmount(vnode, ctx, true);
    }
}

/// Queues the activated hooks of a kept-alive child after its first mount.
pub(crate) fn queue_activated(instance: &ComponentInstance, suspense: Option<&SuspenseBoundary>) {
    let target = instance.downgrade();
    let job = Job::new(move || {
        if let Some(instance) = target.upgrade() {
            invoke_tree_hooks(&instance, LifecycleHook::Activated);
        }
    })
    .labelled("keep-alive activated");
    queue_effect_with_suspense(job, suspense);
}

/// Runs `kind` hooks of every live component under `root`, descendants
/// first, then `root`'s own.
fn invoke_tree_hooks(root: &ComponentInstance, kind: LifecycleHook) {
    let mut instances = Vec::new();
    if let Some(tree) = root.sub_tree() {
        collect_instances(&tree, &mut instances);
    }
    instances.push(root.clone());
    for instance in instances.iter().filter(|i| !i.is_unmounted()) {
        invoke_hooks(instance, kind);
    }
}

fn collect_instances(vnode: &VNode, out: &mut Vec<ComponentInstance>) {
    if vnode.has_shape(shape::COMPONENT) {
        if let Some(instance) = vnode.component() {
            if let Some(tree) = instance.sub_tree() {
                collect_instances(&tree, out);
            }
            out.push(instance);
        }
        return;
    }
    if vnode.has_shape(shape::SUSPENSE) {
        if let Some(active) = vnode.suspense().and_then(|s| s.active_branch()) {
            collect_instances(&active, out);
        }
        return;
    }
    for child in vnode.child_list() {
        collect_instances(&child, out);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheKey {
    Key(Value),
    Component(Component),
}

#[derive(Default)]
struct KeepAliveState {
    cache: HashMap<CacheKey, VNode>,
    /// Access order, least recently used first.
    keys: IndexSet<CacheKey>,
    current: Option<VNode>,
    pending_key: Option<CacheKey>,
}

fn reset_shape_flag(vnode: &VNode) {
    vnode.set_shape_flag(vnode.shape_flag() & !(shape::COMPONENT_SHOULD_KEEP_ALIVE | shape::COMPONENT_KEPT_ALIVE));
}

/// The component vnode a keep-alive caches: the content of a suspense
/// child, otherwise the child itself.
fn inner_child(vnode: &VNode) -> VNode {
    if vnode.has_shape(shape::SUSPENSE) {
        if let Some(content) = vnode.ss_content() {
            return content;
        }
    }
    vnode.clone()
}

/// Whether `name` is listed in `pattern`.
fn matches(pattern: &Value, name: &str) -> bool {
    if let Some(list) = pattern.as_str() {
        return list.split(',').any(|entry| entry.trim() == name);
    }
    match pattern.raw_target() {
        Some(raw) => (0..raw.len()).any(|i| matches(&raw.get(i), name)),
        None => false,
    }
}

fn max_entries(max: &Value) -> Option<usize> {
    let n = match max {
        Value::Number(n) => *n,
        Value::Str(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (n >= 1.0).then_some(n as usize)
}

type State = Rc<RefCell<KeepAliveState>>;

fn prune_cache(state: &State, hooks: &KeepAliveHooks, keep: impl Fn(&str) -> bool) {
    let doomed: Vec<CacheKey> = state
        .borrow()
        .cache
        .iter()
        .filter(|(_, cached)| {
            cached
                .component_def()
                .and_then(Component::name)
                .is_some_and(|name| !keep(name))
        })
        .map(|(key, _)| key.clone())
        .collect();
    for key in doomed {
        prune_entry(state, hooks, &key);
    }
}

fn prune_entry(state: &State, hooks: &KeepAliveHooks, key: &CacheKey) {
    let (cached, current) = {
        let mut state = state.borrow_mut();
        state.keys.shift_remove(key);
        (state.cache.remove(key), state.current.clone())
    };
    let Some(cached) = cached else {
        return;
    };
    tracing::debug!(?key, "keep-alive: pruning cache entry");
    match current {
        // The rendered child stays mounted but is no longer kept alive.
        Some(current) if is_same_vnode_type(&cached, &current) => reset_shape_flag(&current),
        _ => hooks.unmount(&cached),
    }
}

fn setup(props: &crate::reactive::Reactive, ctx: &crate::component::SetupContext) -> SetupResult {
    let instance = ctx.instance();
    let Some(hooks) = instance.keep_alive_hooks() else {
        crate::config::warn("keep-alive mounted without renderer support");
        return SetupResult::Empty;
    };
    let state: State = Rc::default();
    let owner = instance.downgrade();

    {
        let (state, hooks) = (Rc::clone(&state), Rc::clone(&hooks));
        let filters = props.clone();
        watch(
            WatchSource::getter(move || Value::array([filters.get("include"), filters.get("exclude")])),
            move |filters: &Value, _: &Value, _| {
                let Some(filters) = filters.raw_target() else {
                    return;
                };
                let (include, exclude) = (filters.get(0usize), filters.get(1usize));
                if !include.is_nullish() {
                    prune_cache(&state, &hooks, |name| matches(&include, name));
                }
                if !exclude.is_nullish() {
                    prune_cache(&state, &hooks, |name| !matches(&exclude, name));
                }
            },
            WatchOptions {
                deep: true,
                flush: WatchFlush::Post,
                ..Default::default()
            },
        );
    }

    let cache_subtree: Rc<dyn Fn()> = {
        let (state, owner) = (Rc::clone(&state), owner.clone());
        Rc::new(move || {
            let Some(tree) = owner.upgrade().and_then(|i| i.sub_tree()) else {
                return;
            };
            let mut state = state.borrow_mut();
            let inner = inner_child(&tree);
            // The mounted tree may be a copy of what render returned.
            if state.current.is_some() {
                state.current = Some(inner.clone());
            }
            if let Some(key) = state.pending_key.clone() {
                state.cache.insert(key, inner);
            }
        })
    };
    let on_mount = Rc::clone(&cache_subtree);
    on_mounted(move || on_mount());
    on_updated(move || cache_subtree());

    {
        let (state, hooks, owner) = (Rc::clone(&state), Rc::clone(&hooks), owner.clone());
        on_before_unmount(move || {
            let Some(owner) = owner.upgrade() else {
                return;
            };
            let current = owner.sub_tree().map(|tree| inner_child(&tree));
            let cached: Vec<VNode> = state.borrow().cache.values().cloned().collect();
            for vnode in cached {
                match &current {
                    Some(current) if is_same_vnode_type(&vnode, current) => {
                        // Unmounted with its parent; only its deactivated hooks run here.
                        reset_shape_flag(current);
                        if let Some(instance) = current.component() {
                            let target = instance.downgrade();
                            let job = Job::new(move || {
                                if let Some(instance) = target.upgrade() {
                                    invoke_hooks(&instance, LifecycleHook::Deactivated);
                                }
                            });
                            queue_effect_with_suspense(job, owner.suspense());
                        }
                    }
                    _ => hooks.unmount(&vnode),
                }
            }
        });
    }

    let props = props.clone();
    SetupResult::render(move |instance: &ComponentInstance| -> VNode {
        state.borrow_mut().pending_key = None;
        let slots = instance.slots();
        if !slots.has("default") {
            state.borrow_mut().current = None;
            return comment("");
        }
        let mut children = slots.render("default", &Value::Undefined);
        if children.len() > 1 {
            crate::config::warn("KeepAlive should contain exactly one component child");
            state.borrow_mut().current = None;
            return fragment(children);
        }
        let Some(raw) = children.pop() else {
            state.borrow_mut().current = None;
            return comment("");
        };
        if !raw.has_shape(shape::STATEFUL_COMPONENT) && !raw.has_shape(shape::SUSPENSE) {
            state.borrow_mut().current = None;
            return raw;
        }

        let mut vnode = inner_child(&raw);
        let Some(def) = vnode.component_def().cloned() else {
            state.borrow_mut().current = None;
            return raw;
        };
        let name = def.name();
        let include = props.get("include");
        let exclude = props.get("exclude");
        let excluded = (!include.is_nullish() && !name.is_some_and(|n| matches(&include, n)))
            || (!exclude.is_nullish() && name.is_some_and(|n| matches(&exclude, n)));
        if excluded {
            state.borrow_mut().current = Some(vnode);
            return raw;
        }

        let key = match vnode.key() {
            Some(key) => CacheKey::Key(key.clone()),
            None => CacheKey::Component(def.clone()),
        };
        let cached = state.borrow().cache.get(&key).cloned();
        if vnode.el().is_some() {
            vnode = clone_vnode(&vnode, None);
            if raw.has_shape(shape::SUSPENSE) {
                let fallback = raw.ss_fallback().unwrap_or_else(|| comment(""));
                raw.set_ss_branches(vnode.clone(), fallback);
            }
        }
        state.borrow_mut().pending_key = Some(key.clone());

        match cached {
            Some(cached) => {
                vnode.set_el(cached.el());
                vnode.set_component(cached.component());
                vnode.set_shape_flag(vnode.shape_flag() | shape::COMPONENT_KEPT_ALIVE);
                let mut state = state.borrow_mut();
                state.keys.shift_remove(&key);
                state.keys.insert(key);
            }
            None => {
                let oldest = {
                    let mut state = state.borrow_mut();
                    state.keys.insert(key);
                    match max_entries(&props.get("max")) {
                        Some(max) if state.keys.len() > max => state.keys.first().cloned(),
                        _ => None,
                    }
                };
                if let Some(oldest) = oldest {
                    prune_entry(&state, &hooks, &oldest);
                }
            }
        }

        vnode.set_shape_flag(vnode.shape_flag() | shape::COMPONENT_SHOULD_KEEP_ALIVE);
        state.borrow_mut().current = Some(vnode.clone());
        if raw.has_shape(shape::SUSPENSE) {
            raw
        } else {
            vnode
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_patterns() {
        let list = Value::from("Foo, Bar");
        assert!(matches(&list, "Foo"));
        assert!(matches(&list, "Bar"));
        assert!(!matches(&list, "Baz"));

        let array = Value::array(["Foo", "Qux"]);
        assert!(matches(&array, "Qux"));
        assert!(!matches(&array, "Bar"));
    }

    #[test]
    fn max_accepts_numbers_and_numeric_strings() {
        assert_eq!(max_entries(&Value::Number(2.0)), Some(2));
        assert_eq!(max_entries(&Value::from("3")), Some(3));
        assert_eq!(max_entries(&Value::Number(0.0)), None);
        assert_eq!(max_entries(&Value::Undefined), None);
    }

    #[test]
    fn keep_alive_is_a_singleton() {
        let a = keep_alive();
        assert!(a.is_keep_alive());
        assert_eq!(a, keep_alive());
        assert_eq!(a.name(), Some("KeepAlive"));
    }
}
