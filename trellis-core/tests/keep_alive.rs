//! Integration Tests for KeepAlive
//!
//! Each test component records its lifecycle into a shared log so the
//! tests can count hook invocations per component.

use std::cell::RefCell;
use std::rc::Rc;

use trellis_core::prelude::*;

type Log = Rc<RefCell<Vec<String>>>;

fn tracked(name: &'static str, log: &Log) -> Component {
    let log = log.clone();
    ComponentDef::new()
        .name(name)
        .setup(move |_, _| {
            log.borrow_mut().push(format!("{name}:setup"));
            let hook = |event: &'static str| {
                let log = log.clone();
                move || log.borrow_mut().push(format!("{name}:{event}"))
            };
            on_mounted(hook("mounted"));
            on_unmounted(hook("unmounted"));
            on_activated(hook("activated"));
            on_deactivated(hook("deactivated"));
            SetupResult::render(move |_| text(name))
        })
        .build()
}

fn kept(child: &Component, props: Option<Props>) -> VNode {
    let child = child.clone();
    component(
        &keep_alive(),
        props,
        Slots::new().with_fn("default", move |_| vec![component(&child, None, ())]),
    )
}

fn count(log: &Log, entry: &str) -> usize {
    log.borrow().iter().filter(|e| *e == entry).count()
}

fn setup() -> (Renderer<TestHost>, NodeHandle) {
    let renderer = Renderer::new(TestHost::new());
    let root = renderer.host().create_root();
    (renderer, root)
}

/// Test that switching back to a cached child reactivates it instead of
/// running setup again.
#[test]
fn cached_child_is_reactivated() {
    let (renderer, root) = setup();
    let log: Log = Rc::default();
    let a = tracked("A", &log);
    let b = tracked("B", &log);

    renderer.render(Some(kept(&a, None)), root).unwrap();
    assert_eq!(renderer.host().serialize_inner(root), "A");
    assert_eq!(count(&log, "A:mounted"), 1);
    assert_eq!(count(&log, "A:activated"), 1);

    renderer.render(Some(kept(&b, None)), root).unwrap();
    assert_eq!(renderer.host().serialize_inner(root), "B");
    assert_eq!(count(&log, "A:deactivated"), 1);
    assert_eq!(count(&log, "A:unmounted"), 0);
    assert_eq!(count(&log, "B:mounted"), 1);

    renderer.render(Some(kept(&a, None)), root).unwrap();
    assert_eq!(renderer.host().serialize_inner(root), "A");
    assert_eq!(count(&log, "A:setup"), 1);
    assert_eq!(count(&log, "A:mounted"), 1);
    assert_eq!(count(&log, "A:activated"), 2);
    assert_eq!(count(&log, "B:deactivated"), 1);
}

/// Test that the state of a cached child survives deactivation.
#[test]
fn cached_child_keeps_its_state() {
    let (renderer, root) = setup();
    let log: Log = Rc::default();
    let clicks = Rc::new(RefCell::new(None::<Ref<i32>>));

    let c = clicks.clone();
    let counter = ComponentDef::new()
        .name("Counter")
        .setup(move |_, _| {
            let count = Ref::new(0);
            *c.borrow_mut() = Some(count.clone());
            SetupResult::render(move |_| text(count.get().to_string()))
        })
        .build();
    let other = tracked("Other", &log);

    renderer.render(Some(kept(&counter, None)), root).unwrap();
    if let Some(count) = clicks.borrow().as_ref() {
        count.set(5);
    }
    flush().unwrap();
    assert_eq!(renderer.host().serialize_inner(root), "5");

    renderer.render(Some(kept(&other, None)), root).unwrap();
    renderer.render(Some(kept(&counter, None)), root).unwrap();
    assert_eq!(renderer.host().serialize_inner(root), "5");
}

/// Test that `max` evicts the least recently used child with a real unmount.
#[test]
fn max_evicts_oldest_entry() {
    let (renderer, root) = setup();
    let log: Log = Rc::default();
    let a = tracked("A", &log);
    let b = tracked("B", &log);
    let max = || Some(Props::new().with("max", 1));

    renderer.render(Some(kept(&a, max())), root).unwrap();
    let instance_a = renderer
        .root(root)
        .and_then(|vnode| vnode.component())
        .and_then(|keep_alive| keep_alive.sub_tree())
        .and_then(|tree| tree.component())
        .expect("A is mounted");

    renderer.render(Some(kept(&b, max())), root).unwrap();

    assert_eq!(renderer.host().serialize_inner(root), "B");
    assert_eq!(count(&log, "A:unmounted"), 1);
    assert_eq!(count(&log, "A:deactivated"), 0);
    assert!(instance_a.is_unmounted());

    renderer.render(Some(kept(&a, max())), root).unwrap();
    assert_eq!(count(&log, "A:setup"), 2);
    assert_eq!(count(&log, "B:unmounted"), 1);
}

/// Test that excluded children are destroyed on every switch.
#[test]
fn exclude_skips_caching() {
    let (renderer, root) = setup();
    let log: Log = Rc::default();
    let a = tracked("A", &log);
    let b = tracked("B", &log);
    let props = || Some(Props::new().with("exclude", "B"));

    for child in [&a, &b, &a, &b] {
        renderer.render(Some(kept(child, props())), root).unwrap();
    }

    assert_eq!(count(&log, "A:setup"), 1);
    assert_eq!(count(&log, "B:setup"), 2);
    assert_eq!(count(&log, "B:unmounted"), 1);
    assert_eq!(count(&log, "B:activated"), 0);
}

/// Test that `include` accepts a comma separated list.
#[test]
fn include_list_selects_children() {
    let (renderer, root) = setup();
    let log: Log = Rc::default();
    let a = tracked("A", &log);
    let b = tracked("B", &log);
    let c = tracked("C", &log);
    let props = || Some(Props::new().with("include", "A,C"));

    for child in [&a, &b, &c, &a, &b, &c] {
        renderer.render(Some(kept(child, props())), root).unwrap();
    }

    assert_eq!(count(&log, "A:setup"), 1);
    assert_eq!(count(&log, "C:setup"), 1);
    assert_eq!(count(&log, "B:setup"), 2);
}

/// Test that unmounting the keep-alive tears down every cached child.
#[test]
fn unmount_destroys_cache() {
    let (renderer, root) = setup();
    let log: Log = Rc::default();
    let a = tracked("A", &log);
    let b = tracked("B", &log);

    renderer.render(Some(kept(&a, None)), root).unwrap();
    renderer.render(Some(kept(&b, None)), root).unwrap();
    renderer.render(None, root).unwrap();

    assert_eq!(renderer.host().serialize_inner(root), "");
    assert_eq!(count(&log, "A:unmounted"), 1);
    assert_eq!(count(&log, "B:unmounted"), 1);
    assert_eq!(count(&log, "B:deactivated"), 1);
}

/// Test that narrowing `include` after the fact evicts cached children
/// that no longer match, while the current child stays.
#[test]
fn include_change_prunes_cache() {
    let (renderer, root) = setup();
    let log: Log = Rc::default();
    let a = tracked("A", &log);
    let b = tracked("B", &log);

    renderer.render(Some(kept(&a, None)), root).unwrap();
    renderer.render(Some(kept(&b, None)), root).unwrap();
    assert_eq!(count(&log, "A:deactivated"), 1);
    assert_eq!(count(&log, "A:unmounted"), 0);

    renderer
        .render(Some(kept(&b, Some(Props::new().with("include", "B")))), root)
        .unwrap();
    flush().unwrap();

    assert_eq!(renderer.host().serialize_inner(root), "B");
    assert_eq!(count(&log, "A:unmounted"), 1);
    assert_eq!(count(&log, "B:unmounted"), 0);
    assert_eq!(log.borrow().last().map(String::as_str), Some("A:unmounted"));

    renderer.render(Some(kept(&a, Some(Props::new().with("include", "B")))), root).unwrap();
    assert_eq!(count(&log, "A:setup"), 2);
}
