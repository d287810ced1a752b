//! Integration Tests for Suspense
//!
//! Async components hand their settle handle to the test so it decides
//! when setup finishes.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use trellis_core::prelude::*;
use trellis_core::scheduler::advance_timers;

type SettleSlot = Rc<RefCell<Option<Settle<SetupResult>>>>;

fn async_component(name: &'static str) -> (Component, SettleSlot) {
    let slot: SettleSlot = Rc::new(RefCell::new(None));
    let s = slot.clone();
    let def = ComponentDef::new()
        .name(name)
        .async_setup(move |_, _| {
            let (pending, settle) = pending();
            *s.borrow_mut() = Some(settle);
            pending
        })
        .build();
    (def, slot)
}

fn settle_with_text(slot: &SettleSlot, content: &'static str) {
    let settle = slot.borrow_mut().take().expect("setup has not started");
    settle.resolve(SetupResult::render(move |_| text(content)));
}

fn setup() -> (Renderer<TestHost>, NodeHandle) {
    let renderer = Renderer::new(TestHost::new());
    let root = renderer.host().create_root();
    (renderer, root)
}

/// Test that the fallback shows until the async child settles, and that
/// `onResolve` fires once.
#[test]
fn fallback_until_resolved() {
    let (renderer, root) = setup();
    let (child, slot) = async_component("Async");
    let resolved = Rc::new(Cell::new(0));

    let r = resolved.clone();
    let props = Props::new().on("onResolve", move |_| r.set(r.get() + 1));
    let tree = suspense(Some(props), component(&child, None, ()), text("loading"));
    renderer.render(Some(tree), root).unwrap();

    assert_eq!(renderer.host().serialize_inner(root), "loading");
    assert_eq!(resolved.get(), 0);

    settle_with_text(&slot, "done");
    assert_eq!(renderer.host().serialize_inner(root), "loading");
    flush().unwrap();

    assert_eq!(renderer.host().serialize_inner(root), "done");
    assert_eq!(resolved.get(), 1);
}

/// Test that content without async dependencies resolves during mount.
#[test]
fn sync_content_resolves_immediately() {
    let (renderer, root) = setup();
    let resolved = Rc::new(Cell::new(0));

    let r = resolved.clone();
    let props = Props::new().on("onResolve", move |_| r.set(r.get() + 1));
    renderer
        .render(Some(suspense(Some(props), element("p", None, "ready"), text("loading"))), root)
        .unwrap();

    assert_eq!(renderer.host().serialize_inner(root), "<p>ready</p>");
    assert_eq!(resolved.get(), 1);
}

/// Test that mounted hooks inside a pending boundary wait for it to resolve.
#[test]
fn mounted_hooks_wait_for_resolution() {
    let (renderer, root) = setup();
    let (slow, slot) = async_component("Slow");
    let mounted = Rc::new(Cell::new(0));

    let m = mounted.clone();
    let eager = ComponentDef::new()
        .name("Eager")
        .setup(move |_, _| {
            let m = m.clone();
            on_mounted(move || m.set(m.get() + 1));
            SetupResult::render(|_| text("a"))
        })
        .build();

    let content = element("div", None, vec![component(&eager, None, ()), component(&slow, None, ())]);
    renderer.render(Some(suspense(None, content, text("loading"))), root).unwrap();
    assert_eq!(mounted.get(), 0);

    settle_with_text(&slot, "b");
    flush().unwrap();

    assert_eq!(mounted.get(), 1);
    assert_eq!(renderer.host().serialize_inner(root), "<div>ab</div>");
}

/// Test that all async dependencies must settle before the boundary
/// resolves.
#[test]
fn waits_for_every_dependency() {
    let (renderer, root) = setup();
    let (first, first_slot) = async_component("First");
    let (second, second_slot) = async_component("Second");

    let content = fragment(vec![component(&first, None, ()), component(&second, None, ())]);
    renderer.render(Some(suspense(None, content, text("loading"))), root).unwrap();

    settle_with_text(&first_slot, "1");
    flush().unwrap();
    assert_eq!(renderer.host().serialize_inner(root), "loading");

    settle_with_text(&second_slot, "2");
    flush().unwrap();
    assert_eq!(renderer.host().serialize_inner(root), "12");
}

/// Test that new pending content keeps the old content visible until the
/// timeout elapses, then shows the fallback.
#[test]
fn timeout_delays_fallback() {
    let (renderer, root) = setup();
    let (first, first_slot) = async_component("First");
    let (second, second_slot) = async_component("Second");
    let tree = |child: &Component| {
        suspense(Some(Props::new().with("timeout", 100)), component(child, None, ()), text("loading"))
    };

    renderer.render(Some(tree(&first)), root).unwrap();
    settle_with_text(&first_slot, "first");
    flush().unwrap();
    assert_eq!(renderer.host().serialize_inner(root), "first");

    renderer.render(Some(tree(&second)), root).unwrap();
    assert_eq!(renderer.host().serialize_inner(root), "first");

    advance_timers(Duration::from_millis(99));
    assert_eq!(renderer.host().serialize_inner(root), "first");
    advance_timers(Duration::from_millis(1));
    flush().unwrap();
    assert_eq!(renderer.host().serialize_inner(root), "loading");

    settle_with_text(&second_slot, "second");
    flush().unwrap();
    assert_eq!(renderer.host().serialize_inner(root), "second");
}

/// Test that a zero timeout shows the fallback as soon as content pends.
#[test]
fn zero_timeout_falls_back_at_once() {
    let (renderer, root) = setup();
    let (first, first_slot) = async_component("First");
    let (second, _second_slot) = async_component("Second");
    let tree = |child: &Component| {
        suspense(Some(Props::new().with("timeout", 0)), component(child, None, ()), text("loading"))
    };

    renderer.render(Some(tree(&first)), root).unwrap();
    settle_with_text(&first_slot, "first");
    flush().unwrap();

    renderer.render(Some(tree(&second)), root).unwrap();
    assert_eq!(renderer.host().serialize_inner(root), "loading");
}

/// Test that an unmounted boundary ignores a late settlement.
#[test]
fn late_settle_after_unmount_is_ignored() {
    let (renderer, root) = setup();
    let (child, slot) = async_component("Late");

    renderer
        .render(Some(suspense(None, component(&child, None, ()), text("loading"))), root)
        .unwrap();
    renderer.render(None, root).unwrap();

    settle_with_text(&slot, "late");
    flush().unwrap();
    assert_eq!(renderer.host().serialize_inner(root), "");
}

/// Test that a rejected async setup still counts as settled, so the
/// boundary resolves with the failed child rendering nothing.
#[test]
fn rejected_setup_still_resolves_boundary() {
    let (renderer, root) = setup();
    let (child, slot) = async_component("Failing");
    let resolved = Rc::new(Cell::new(0));

    let r = resolved.clone();
    let props = Props::new().on("onResolve", move |_| r.set(r.get() + 1));
    renderer
        .render(Some(suspense(Some(props), component(&child, None, ()), text("loading"))), root)
        .unwrap();

    let settle = slot.borrow_mut().take().expect("setup has not started");
    settle.reject("connection refused");
    flush().unwrap();

    assert_eq!(renderer.host().serialize_inner(root), "<!---->");
    assert_eq!(resolved.get(), 1);
}

/// Test that switching to different content while pending discards the
/// first attempt, so its late result never reaches the screen.
#[test]
fn switched_content_ignores_stale_settle() {
    let (renderer, root) = setup();
    let (stale, stale_slot) = async_component("Stale");
    let (fresh, fresh_slot) = async_component("Fresh");
    let resolved = Rc::new(Cell::new(0));

    let tree = |child: &Component| {
        let r = resolved.clone();
        let props = Props::new().on("onResolve", move |_| r.set(r.get() + 1));
        suspense(Some(props), component(child, None, ()), text("loading"))
    };

    renderer.render(Some(tree(&stale)), root).unwrap();
    renderer.render(Some(tree(&fresh)), root).unwrap();

    settle_with_text(&stale_slot, "stale");
    flush().unwrap();
    assert_eq!(renderer.host().serialize_inner(root), "loading");
    assert_eq!(resolved.get(), 0);

    settle_with_text(&fresh_slot, "fresh");
    flush().unwrap();
    assert_eq!(renderer.host().serialize_inner(root), "fresh");
    assert_eq!(resolved.get(), 1);
}
