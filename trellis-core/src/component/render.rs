//! Setup and root rendering.

use super::instance::{CurrentInstanceGuard, SetupContext};
use super::{init_props, ComponentInstance, SetupResult, Slots};
use crate::error::{call_with_error_handling, ErrorKind};
use crate::reactive::{pause_tracking, reset_tracking, shallow_readonly};
use crate::vnode::props::is_on;
use crate::vnode::{clone_if_mounted, clone_vnode, comment, shape, Children, Props, VNode};

/// Resolves props and slots, then runs setup.
///
/// Returns `true` when setup handed back a pending result; the instance is
/// finished later by [`finish_setup_result`].
pub(crate) fn setup_component(instance: &ComponentInstance) -> bool {
    let vnode = instance.vnode();
    init_props(instance, vnode.props());
    instance.set_slots(slots_of(&vnode));

    let def = instance.def().def();
    let Some(setup) = def.setup.clone() else {
        finish_setup(instance);
        return false;
    };

    let props = shallow_readonly(instance.props());
    let ctx = SetupContext::new(instance);
    let result = instance.scope().run(|| {
        pause_tracking();
        let _guard = CurrentInstanceGuard::enter(instance);
        let result = call_with_error_handling(ErrorKind::SetupFunction, Some(instance), || setup(&props, &ctx));
        drop(_guard);
        reset_tracking();
        result
    });

    match result.flatten() {
        Some(SetupResult::Async(pending)) => {
            instance.set_async_setup(pending);
            true
        }
        Some(result) => {
            finish_setup_result(instance, result);
            false
        }
        None => {
            finish_setup(instance);
            false
        }
    }
}

/// Applies a settled setup result.
pub(crate) fn finish_setup_result(instance: &ComponentInstance, result: SetupResult) {
    match result {
        SetupResult::Render(render) => instance.set_render_fn(Some(render)),
        SetupResult::State(state) => instance.set_setup_state(state),
        SetupResult::Empty => {}
        SetupResult::Async(_) => {
            crate::config::warn("async setup resolved to another pending result; ignoring it");
        }
    }
    finish_setup(instance);
}

fn finish_setup(instance: &ComponentInstance) {
    if instance.render_fn().is_some() {
        return;
    }
    match instance.def().def().render.clone() {
        Some(render) => instance.set_render_fn(Some(render)),
        None => crate::config::warn(format_args!(
            "component {} is missing a render function",
            instance.name().unwrap_or("Anonymous")
        )),
    }
}

pub(crate) fn slots_of(vnode: &VNode) -> Slots {
    match &*vnode.children() {
        Children::Slots(slots) => slots.clone(),
        _ => Slots::new(),
    }
}

/// Functional components without declared props only forward these.
fn functional_fallthrough(attrs: &Props) -> Props {
    attrs
        .iter()
        .filter(|(key, _)| &***key == "class" || &***key == "style" || is_on(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Runs the render function of `instance` and prepares the result as its
/// subtree: fallthrough attrs, directives and transition of the component
/// vnode are carried over to the root.
pub(crate) fn render_component_root(instance: &ComponentInstance) -> VNode {
    let vnode = instance.vnode();
    let rendered = {
        let _guard = CurrentInstanceGuard::rendering(instance);
        match instance.render_fn() {
            Some(render) => call_with_error_handling(ErrorKind::RenderFunction, Some(instance), || render(instance)),
            None => None,
        }
    };
    let mut root = match rendered {
        Some(tree) => clone_if_mounted(&tree),
        None => comment(""),
    };

    let def = instance.def().def();
    if def.inherit_attrs {
        let attrs = instance.attrs_untracked();
        let fallthrough = if def.functional && def.props.is_none() {
            functional_fallthrough(&attrs)
        } else {
            attrs
        };
        if !fallthrough.is_empty() {
            if root.has_shape(shape::ELEMENT) || root.has_shape(shape::COMPONENT) {
                root = clone_vnode(&root, Some(&fallthrough));
            } else {
                crate::config::warn(format_args!(
                    "extraneous attributes {:?} could not be inherited by component {}: its root is not a single element",
                    fallthrough.keys().collect::<Vec<_>>(),
                    instance.name().unwrap_or("Anonymous")
                ));
            }
        }
    }

    if vnode.has_dirs() {
        let inherited = vnode.dirs().clone();
        root.dirs_mut().extend(inherited);
    }
    if let Some(transition) = vnode.transition() {
        root.set_transition(Some(transition));
    }
    root
}
