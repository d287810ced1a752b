//! Provide / inject across the component tree.

use std::rc::Rc;

use super::get_current_instance;
use crate::reactive::Value;

/// Makes `value` available to every descendant of the current component.
pub fn provide(key: &str, value: impl Into<Value>) {
    match get_current_instance() {
        Some(instance) => {
            instance.own_provides().insert(Rc::from(key), value.into());
        }
        None => crate::config::warn("provide() can only be used inside setup()"),
    }
}

/// Looks `key` up in the providers above the current component. A
/// component never sees its own provides.
pub fn inject(key: &str) -> Option<Value> {
    let Some(instance) = get_current_instance() else {
        crate::config::warn("inject() can only be used inside setup() or a render function");
        return None;
    };
    let mut current = instance.parent();
    while let Some(ancestor) = current {
        if let Some(value) = ancestor.lookup_provided(key) {
            return Some(value);
        }
        current = ancestor.parent();
    }
    None
}

/// [`inject`] with a fallback.
pub fn inject_or(key: &str, default: impl Into<Value>) -> Value {
    inject(key).unwrap_or_else(|| default.into())
}
