//! VNode props.
//!
//! Props map names to [`PropValue`]s: plain [`Value`]s, event handlers
//! (`onClick`), or vnode lifecycle hooks (`onVnodeMounted`). `class` and
//! `style` are normalized when vnodes are created and merged specially by
//! [`merge_props`].

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::VNode;
use crate::error::CallResult;
use crate::reactive::{PropKey, RawObject, Reactive, Ref, TargetKind, Value};

/// Event handler. Receives the emitted arguments.
pub type Handler = Rc<dyn Fn(&[Value]) -> CallResult>;

/// VNode hook: `(vnode, previous vnode)`.
pub type VNodeHookFn = Rc<dyn Fn(&VNode, Option<&VNode>) -> CallResult>;

#[derive(Clone)]
pub enum PropValue {
    Value(Value),
    Handler(Handler),
    /// Several handlers for the same event, after merging.
    Handlers(Vec<Handler>),
    VNodeHook(VNodeHookFn),
}

impl PropValue {
    /// Wraps a closure as an event handler.
    pub fn handler<F, R>(f: F) -> Self
    where
        F: Fn(&[Value]) -> R + 'static,
        R: crate::error::IntoCallResult<()>,
    {
        PropValue::Handler(Rc::new(move |args: &[Value]| f(args).into_call_result()))
    }

    pub fn vnode_hook<F, R>(f: F) -> Self
    where
        F: Fn(&VNode, Option<&VNode>) -> R + 'static,
        R: crate::error::IntoCallResult<()>,
    {
        PropValue::VNodeHook(Rc::new(move |vnode: &VNode, prev: Option<&VNode>| f(vnode, prev).into_call_result()))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            PropValue::Value(v) => Some(v),
            _ => None,
        }
    }

    /// The value, or `Undefined` for callables.
    pub fn to_value(&self) -> Value {
        self.as_value().cloned().unwrap_or(Value::Undefined)
    }

    /// Every handler this prop carries.
    pub fn handlers(&self) -> Vec<Handler> {
        match self {
            PropValue::Handler(h) => vec![h.clone()],
            PropValue::Handlers(hs) => hs.clone(),
            _ => Vec::new(),
        }
    }

    pub fn is_callable(&self) -> bool {
        !matches!(self, PropValue::Value(_))
    }
}

fn same_fn<T: ?Sized>(a: &Rc<T>, b: &Rc<T>) -> bool {
    Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const ()
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropValue::Value(a), PropValue::Value(b)) => a == b,
            (PropValue::Handler(a), PropValue::Handler(b)) => same_fn(a, b),
            (PropValue::Handlers(a), PropValue::Handlers(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same_fn(x, y))
            }
            (PropValue::VNodeHook(a), PropValue::VNodeHook(b)) => same_fn(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Value(v) => write!(f, "{v:?}"),
            PropValue::Handler(_) => f.write_str("<handler>"),
            PropValue::Handlers(hs) => write!(f, "<{} handlers>", hs.len()),
            PropValue::VNodeHook(_) => f.write_str("<vnode hook>"),
        }
    }
}

macro_rules! impl_prop_value_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for PropValue {
                fn from(value: $ty) -> Self {
                    PropValue::Value(value.into())
                }
            }
        )*
    };
}

impl_prop_value_from!(
    Value, &str, String, Rc<str>, bool, f64, f32, i32, i64, u32, u64, usize, RawObject, Reactive, Ref<Value>
);

/// Ordered prop map.
#[derive(Clone, Default, PartialEq)]
pub struct Props {
    entries: IndexMap<Rc<str>, PropValue>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<PropValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Builder-style event handler.
    pub fn on<F, R>(self, key: &str, f: F) -> Self
    where
        F: Fn(&[Value]) -> R + 'static,
        R: crate::error::IntoCallResult<()>,
    {
        self.with(key, PropValue::handler(f))
    }

    pub fn insert(&mut self, key: &str, value: impl Into<PropValue>) {
        self.entries.insert(Rc::from(key), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<PropValue> {
        self.entries.shift_remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.entries.get(key)
    }

    /// The plain value under `key`, or `Undefined`.
    pub fn value(&self, key: &str) -> Value {
        self.get(key).map(PropValue::to_value).unwrap_or(Value::Undefined)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Rc<str>> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Rc<str>, &PropValue)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl<K: AsRef<str>, V: Into<PropValue>> FromIterator<(K, V)> for Props {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut props = Props::new();
        for (k, v) in iter {
            props.insert(k.as_ref(), v);
        }
        props
    }
}

/// Event-listener prop names: `on` followed by a non-lowercase letter.
pub fn is_on(key: &str) -> bool {
    let bytes = key.as_bytes();
    bytes.len() > 2 && bytes.starts_with(b"on") && !bytes[2].is_ascii_lowercase()
}

/// Props the renderer handles itself and never forwards to the host.
pub fn is_reserved_prop(key: &str) -> bool {
    matches!(
        key,
        "" | "key"
            | "ref"
            | "onVnodeBeforeMount"
            | "onVnodeMounted"
            | "onVnodeBeforeUpdate"
            | "onVnodeUpdated"
            | "onVnodeBeforeUnmount"
            | "onVnodeUnmounted"
    )
}

/// `foo-bar` → `fooBar`.
pub fn camelize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper = false;
    for c in s.chars() {
        if c == '-' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// `fooBar` → `foo-bar`.
pub fn hyphenate(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            out.push('-');
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}

/// `update:value` → `onUpdate:value`.
pub fn to_handler_key(event: &str) -> String {
    let mut chars = event.chars();
    match chars.next() {
        Some(first) => format!("on{}{}", first.to_uppercase(), chars.as_str()),
        None => String::new(),
    }
}

// ----------------------------------------------------------------------------
// class / style normalization
// ----------------------------------------------------------------------------

fn list_items(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::Proxy(p) if p.kind() == TargetKind::Array => Some(p.to_vec()),
        Value::Object(raw) if raw.kind() == TargetKind::Array => Some((0..raw.len()).map(|i| raw.get(i)).collect()),
        _ => None,
    }
}

fn object_entries(value: &Value) -> Option<Vec<(Rc<str>, Value)>> {
    match value {
        Value::Proxy(p) if p.kind() == TargetKind::Object => Some(
            p.keys()
                .into_iter()
                .filter_map(|k| match k {
                    Value::Str(name) => {
                        let v = p.get(PropKey::Name(name.clone()));
                        Some((name, v))
                    }
                    _ => None,
                })
                .collect(),
        ),
        Value::Object(raw) if raw.kind() == TargetKind::Object => Some(
            raw.keys()
                .into_iter()
                .filter_map(|k| match k {
                    Value::Str(name) => {
                        let v = raw.get(PropKey::Name(name.clone()));
                        Some((name, v))
                    }
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    }
}

/// Flattens a class binding (string, array, or `{name: enabled}` object)
/// into a space separated string.
pub fn normalize_class(value: &Value) -> String {
    if let Value::Str(s) = value {
        return s.to_string();
    }
    if let Some(items) = list_items(value) {
        let parts: Vec<String> = items
            .iter()
            .map(normalize_class)
            .filter(|s| !s.is_empty())
            .collect();
        return parts.join(" ");
    }
    if let Some(entries) = object_entries(value) {
        let parts: Vec<&str> = entries
            .iter()
            .filter(|(_, v)| v.truthy())
            .map(|(k, _)| &**k)
            .collect();
        return parts.join(" ");
    }
    String::new()
}

/// Parses `color: red; width: 1px` into declarations.
pub fn parse_string_style(css: &str) -> Vec<(String, String)> {
    css.split(';')
        .filter_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Normalizes a style binding. Arrays are merged left to right into one
/// object; strings and objects pass through.
pub fn normalize_style(value: &Value) -> Value {
    let Some(items) = list_items(value) else {
        return match value {
            Value::Str(_) => value.clone(),
            _ if object_entries(value).is_some() => value.clone(),
            _ => Value::Undefined,
        };
    };

    let merged = RawObject::object();
    for item in &items {
        let declarations: Vec<(Rc<str>, Value)> = match item {
            Value::Str(css) => parse_string_style(css)
                .into_iter()
                .map(|(k, v)| (Rc::from(k), Value::from(v)))
                .collect(),
            other => match normalize_style(other) {
                Value::Undefined => Vec::new(),
                normalized => object_entries(&normalized).unwrap_or_default(),
            },
        };
        for (k, v) in declarations {
            merged.insert(PropKey::Name(k), v);
        }
    }
    Value::Object(merged)
}

fn class_prop(value: Value) -> Value {
    match value {
        Value::Str(_) | Value::Undefined | Value::Null => value,
        other => Value::from(normalize_class(&other)),
    }
}

/// Normalizes `class` and `style` in place.
pub(crate) fn normalize_props(props: &mut Props) {
    if let Some(PropValue::Value(class)) = props.get("class").cloned() {
        props.insert("class", class_prop(class));
    }
    if let Some(PropValue::Value(style)) = props.get("style").cloned() {
        props.insert("style", normalize_style(&style));
    }
}

/// Merges prop maps left to right. `class` and `style` are combined, event
/// handlers accumulate, everything else is overwritten.
pub fn merge_props<'a>(sources: impl IntoIterator<Item = &'a Props>) -> Props {
    let mut ret = Props::new();
    for source in sources {
        for (key, incoming) in source.iter() {
            match &**key {
                "class" => {
                    let existing = ret.value("class");
                    let next = incoming.to_value();
                    if existing != next {
                        let joined = Value::array([existing, next]);
                        ret.insert("class", Value::from(normalize_class(&joined)));
                    }
                }
                "style" => {
                    let joined = Value::array([ret.value("style"), incoming.to_value()]);
                    ret.insert("style", normalize_style(&joined));
                }
                "" => {}
                k if is_on(k) && incoming.is_callable() => {
                    let merged = match ret.get(k) {
                        Some(existing) if existing != incoming => {
                            let mut handlers = existing.handlers();
                            for h in incoming.handlers() {
                                if !handlers.iter().any(|e| same_fn(e, &h)) {
                                    handlers.push(h);
                                }
                            }
                            PropValue::Handlers(handlers)
                        }
                        _ => incoming.clone(),
                    };
                    ret.insert(k, merged);
                }
                k => ret.insert(k, incoming.clone()),
            }
        }
    }
    ret
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_forms() {
        assert_eq!(normalize_class(&Value::from("a b")), "a b");
        assert_eq!(
            normalize_class(&Value::array([Value::from("a"), Value::object([("b", true), ("c", false)])])),
            "a b"
        );
        assert_eq!(normalize_class(&Value::Null), "");
    }

    #[test]
    fn style_arrays_merge() {
        let style = normalize_style(&Value::array([
            Value::from("color: red; width: 1px"),
            Value::object([("color", "blue")]),
        ]));
        let raw = style.raw_target().unwrap();
        assert_eq!(raw.get("color"), Value::from("blue"));
        assert_eq!(raw.get("width"), Value::from("1px"));
    }

    #[test]
    fn merge_accumulates_handlers() {
        let a = Props::new().with("class", "x").on("onClick", |_: &[Value]| ());
        let b = Props::new().with("class", "y").with("id", "z").on("onClick", |_: &[Value]| ());
        let merged = merge_props([&a, &b]);
        assert_eq!(merged.value("class"), Value::from("x y"));
        assert_eq!(merged.value("id"), Value::from("z"));
        assert_eq!(merged.get("onClick").map(|p| p.handlers().len()), Some(2));
    }

    #[test]
    fn merging_same_handler_twice_keeps_one() {
        let a = Props::new().on("onClick", |_: &[Value]| ());
        let merged = merge_props([&a, &a]);
        assert_eq!(merged.get("onClick").map(|p| p.handlers().len()), Some(1));
    }

    #[test]
    fn listener_names() {
        assert!(is_on("onClick"));
        assert!(is_on("onUpdate:modelValue"));
        assert!(!is_on("once"));
        assert!(!is_on("on"));
        assert_eq!(to_handler_key("change"), "onChange");
        assert_eq!(camelize("foo-bar"), "fooBar");
        assert_eq!(hyphenate("fooBar"), "foo-bar");
    }
}
