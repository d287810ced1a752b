//! Prop resolution.
//!
//! Props passed on a component vnode are split between the instance's
//! declared props and its fallthrough attrs. Declared names are camelCase;
//! a parent may pass them hyphenated.

use std::rc::Rc;

use super::{ComponentDef, ComponentInstance, PropOptions};
use crate::reactive::{PropKey, Value};
use crate::vnode::props::{camelize, hyphenate, is_reserved_prop};
use crate::vnode::{patch, Children, PropValue, Props, VNode};

struct Resolved {
    props: Vec<(Rc<str>, Value)>,
    attrs: Props,
}

fn resolve(def: &ComponentDef, raw: Option<&Props>) -> Resolved {
    let mut props: Vec<(Rc<str>, Value)> = Vec::new();
    let mut attrs = Props::new();

    if let Some(raw) = raw {
        for (key, value) in raw.iter() {
            if is_reserved_prop(key) {
                continue;
            }
            match &def.props {
                Some(declared) => {
                    let camel = camelize(key);
                    match (declared.get_key_value(camel.as_str()), value) {
                        (Some((name, _)), PropValue::Value(v)) => props.push((name.clone(), v.clone())),
                        _ if def.is_emit_listener(key) => {}
                        _ => attrs.insert(key, value.clone()),
                    }
                }
                None if def.functional => {
                    if let PropValue::Value(v) = value {
                        props.push((key.clone(), v.clone()));
                    }
                    attrs.insert(key, value.clone());
                }
                None => {
                    if !def.is_emit_listener(key) {
                        attrs.insert(key, value.clone());
                    }
                }
            }
        }
    }

    if let Some(declared) = &def.props {
        for (name, options) in declared {
            let passed = props.iter().position(|(k, _)| k == name);
            let current = passed.map(|i| props[i].1.clone());
            let value = resolve_prop_value(def, name, options, current);
            match passed {
                Some(i) => props[i].1 = value,
                None => props.push((name.clone(), value)),
            }
        }
    }

    Resolved { props, attrs }
}

fn resolve_prop_value(def: &ComponentDef, name: &str, options: &PropOptions, value: Option<Value>) -> Value {
    let absent = value.as_ref().map_or(true, Value::is_undefined);
    if absent && options.required {
        crate::config::warn(format_args!(
            "missing required prop {name:?} on component {}",
            def.name.as_deref().unwrap_or("Anonymous")
        ));
    }
    let mut value = match value {
        Some(v) if !v.is_undefined() => v,
        _ => options.default.clone().unwrap_or(Value::Undefined),
    };
    if options.boolean {
        if absent && options.default.is_none() {
            value = Value::Bool(false);
        } else if let Some(s) = value.as_str() {
            if s.is_empty() || s == hyphenate(name) {
                value = Value::Bool(true);
            }
        }
    }
    value
}

/// Fills the props of a fresh instance. Writes go to the raw object so
/// nothing is triggered.
pub(crate) fn init_props(instance: &ComponentInstance, raw: Option<&Props>) {
    let resolved = resolve(instance.def().def(), raw);
    let target = instance.props().raw();
    for (key, value) in resolved.props {
        target.insert(&*key, value);
    }
    instance.set_attrs(resolved.attrs, false);
}

/// Applies the props of `next` to a mounted instance. Only changed keys
/// trigger.
pub(crate) fn update_props(instance: &ComponentInstance, raw: Option<&Props>) {
    let resolved = resolve(instance.def().def(), raw);
    let props = instance.props();

    let stale: Vec<Rc<str>> = props
        .raw()
        .keys()
        .iter()
        .filter_map(|k| k.as_str().map(Rc::from))
        .filter(|k: &Rc<str>| !resolved.props.iter().any(|(name, _)| name == k))
        .collect();
    for key in stale {
        props.delete(PropKey::from(&*key));
    }
    for (key, value) in resolved.props {
        props.set(&*key, value);
    }
    instance.set_attrs(resolved.attrs, true);
}

fn has_props_changed(def: &ComponentDef, prev: &Props, next: &Props) -> bool {
    if prev.len() != next.len() {
        return true;
    }
    next.iter()
        .any(|(key, value)| prev.get(key) != Some(value) && !def.is_emit_listener(key))
}

/// Whether a parent re-render must re-render the child as well.
///
/// With `optimized`, the patch flags of `next` are trusted; otherwise every
/// passed prop is compared. Non-stable slots always force an update.
pub fn should_update_component(prev: &VNode, next: &VNode, optimized: bool) -> bool {
    let Some(component) = next.component_def() else {
        return true;
    };
    let def = component.def();

    if next.has_dirs() || next.transition().is_some() {
        return true;
    }

    let flag = next.patch_flag();
    let (prev_props, next_props) = (prev.props(), next.props());

    if optimized && flag >= 0 {
        if flag & patch::DYNAMIC_SLOTS != 0 {
            return true;
        }
        if flag & patch::FULL_PROPS != 0 {
            return match (prev_props, next_props) {
                (None, next) => next.is_some(),
                (Some(prev), Some(next)) => has_props_changed(def, prev, next),
                (Some(_), None) => true,
            };
        }
        if flag & patch::PROPS != 0 {
            let dynamic = next.dynamic_props().unwrap_or_default();
            return dynamic.iter().any(|key| {
                let before = prev_props.and_then(|p| p.get(key));
                let after = next_props.and_then(|p| p.get(key));
                before != after && !def.is_emit_listener(key)
            });
        }
        return false;
    }

    let has_children = |v: &VNode| !matches!(&*v.children(), Children::None);
    if has_children(prev) || has_children(next) {
        let stable = matches!(&*next.children(), Children::Slots(slots) if slots.is_stable());
        if !stable {
            return true;
        }
    }
    match (prev_props, next_props) {
        (None, None) => false,
        (None, Some(_)) | (Some(_), None) => true,
        (Some(prev), Some(next)) => has_props_changed(def, prev, next),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{PropOptions, Slots};
    use crate::vnode::component;

    fn def() -> ComponentDef {
        ComponentDef::new()
            .prop("fooBar", PropOptions::new())
            .prop("count", PropOptions::new().default_value(1))
            .prop("disabled", PropOptions::new().boolean())
            .emits(["change"])
    }

    #[test]
    fn declared_props_and_attrs_are_split() {
        let raw = Props::new()
            .with("foo-bar", "x")
            .with("id", "main")
            .on("onChange", |_| ())
            .on("onClick", |_| ());
        let resolved = resolve(&def(), Some(&raw));

        let props: Vec<_> = resolved.props.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        assert_eq!(
            props,
            vec![
                ("fooBar".to_string(), Value::from("x")),
                ("count".to_string(), Value::from(1)),
                ("disabled".to_string(), Value::Bool(false)),
            ]
        );
        assert!(resolved.attrs.contains_key("id"));
        assert!(resolved.attrs.contains_key("onClick"));
        assert!(!resolved.attrs.contains_key("onChange"));
    }

    #[test]
    fn boolean_props_cast_empty_strings() {
        let raw = Props::new().with("disabled", "");
        let resolved = resolve(&def(), Some(&raw));
        let disabled = resolved.props.iter().find(|(k, _)| &**k == "disabled").map(|(_, v)| v.clone());
        assert_eq!(disabled, Some(Value::Bool(true)));
    }

    #[test]
    fn unchanged_props_skip_update() {
        let comp = def().build();
        let a = component(&comp, Some(Props::new().with("count", 2)), ());
        let b = component(&comp, Some(Props::new().with("count", 2)), ());
        let c = component(&comp, Some(Props::new().with("count", 3)), ());
        assert!(!should_update_component(&a, &b, false));
        assert!(should_update_component(&a, &c, false));
    }

    #[test]
    fn non_stable_slots_force_update() {
        let comp = def().build();
        let slots = || Slots::new().with_fn("default", |_| Vec::new());
        let a = component(&comp, None, slots());
        let b = component(&comp, None, slots());
        assert!(should_update_component(&a, &b, false));

        let stable = || Slots::stable().with_fn("default", |_| Vec::new());
        let c = component(&comp, None, stable());
        let d = component(&comp, None, stable());
        assert!(!should_update_component(&c, &d, false));
    }
}
