//! Integration Tests for the Renderer
//!
//! These tests mount vnode trees into the in-memory host and check both the
//! resulting markup and the host operations the reconciler issued.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use trellis_core::prelude::*;
use trellis_core::renderer::test_host::NodeOp;

fn keyed_list(keys: &[i32]) -> VNode {
    let items = keys
        .iter()
        .map(|k| element("li", Some(Props::new().with("key", *k)), k.to_string()))
        .collect::<Vec<_>>();
    element("ul", None, items)
}

fn setup() -> (Renderer<TestHost>, NodeHandle) {
    let renderer = Renderer::new(TestHost::new());
    let root = renderer.host().create_root();
    (renderer, root)
}

/// Test that moving one keyed item to the front issues exactly one move.
#[test]
fn keyed_reorder_moves_one_node() {
    let (renderer, root) = setup();
    renderer.render(Some(keyed_list(&[1, 2, 3])), root).unwrap();
    assert_eq!(renderer.host().serialize_inner(root), "<ul><li>1</li><li>2</li><li>3</li></ul>");

    let ul = renderer.host().children(root)[0];
    let li3 = renderer.host().children(ul)[2];
    renderer.host().reset_ops();

    renderer.render(Some(keyed_list(&[3, 1, 2])), root).unwrap();

    assert_eq!(renderer.host().serialize_inner(root), "<ul><li>3</li><li>1</li><li>2</li></ul>");
    let ops = renderer.host().ops();
    let moves: Vec<&NodeOp> = ops.iter().filter(|op| op.is_move()).collect();
    assert_eq!(moves.len(), 1);
    assert!(matches!(moves[0], NodeOp::Move { node, .. } if *node == li3));
    assert!(!ops.iter().any(|op| op.is_create() || op.is_remove()));
}

/// Test that reversing a keyed list reuses every node.
#[test]
fn keyed_reversal_reuses_nodes() {
    let (renderer, root) = setup();
    let forward: Vec<i32> = (0..6).collect();
    let backward: Vec<i32> = forward.iter().rev().copied().collect();

    renderer.render(Some(keyed_list(&forward)), root).unwrap();
    renderer.host().reset_ops();
    renderer.render(Some(keyed_list(&backward)), root).unwrap();

    let ops = renderer.host().ops();
    let moves = ops.iter().filter(|op| op.is_move()).count();
    assert!(moves <= forward.len());
    assert!(!ops.iter().any(|op| op.is_create() || op.is_remove()));
    assert_eq!(
        renderer.host().serialize_inner(root),
        "<ul><li>5</li><li>4</li><li>3</li><li>2</li><li>1</li><li>0</li></ul>"
    );
}

/// Test that keyed insertions and removals only touch the changed items.
#[test]
fn keyed_insert_and_remove() {
    let (renderer, root) = setup();
    renderer.render(Some(keyed_list(&[1, 2, 3, 4])), root).unwrap();
    renderer.host().reset_ops();

    renderer.render(Some(keyed_list(&[1, 5, 3, 4])), root).unwrap();

    let ops = renderer.host().ops();
    assert_eq!(ops.iter().filter(|op| op.is_remove()).count(), 1);
    assert_eq!(ops.iter().filter(|op| op.is_move()).count(), 0);
    assert_eq!(
        renderer.host().serialize_inner(root),
        "<ul><li>1</li><li>5</li><li>3</li><li>4</li></ul>"
    );
}

/// Test that unchanged trees produce no host operations.
#[test]
fn identical_rerender_is_a_no_op() {
    let (renderer, root) = setup();
    let tree = || element("div", Some(Props::new().with("id", "a")), vec![text("x"), element("b", None, "y")]);
    renderer.render(Some(tree()), root).unwrap();
    renderer.host().reset_ops();

    renderer.render(Some(tree()), root).unwrap();
    assert!(renderer.host().ops().is_empty());
}

/// Test that props and text children are patched in place.
#[test]
fn props_and_text_are_patched() {
    let (renderer, root) = setup();
    renderer
        .render(Some(element("p", Some(Props::new().with("id", "a").with("hidden", true)), "one")), root)
        .unwrap();
    assert_eq!(renderer.host().serialize_inner(root), "<p id=\"a\" hidden>one</p>");

    renderer.host().reset_ops();
    renderer.render(Some(element("p", Some(Props::new().with("id", "b")), "two")), root).unwrap();

    assert_eq!(renderer.host().serialize_inner(root), "<p id=\"b\">two</p>");
    assert!(!renderer.host().ops().iter().any(|op| op.is_create()));
}

/// Test that a different tag replaces the element.
#[test]
fn type_change_replaces_node() {
    let (renderer, root) = setup();
    renderer.render(Some(element("p", None, "x")), root).unwrap();
    renderer.render(Some(element("span", None, "x")), root).unwrap();
    assert_eq!(renderer.host().serialize_inner(root), "<span>x</span>");
    assert_eq!(renderer.host().children(root).len(), 1);
}

/// Test that event listeners are bound and swapped on patch.
#[test]
fn listeners_receive_events() {
    let (renderer, root) = setup();
    let hits = Rc::new(Cell::new(0));

    let h = hits.clone();
    let button = element("button", Some(Props::new().on("onClick", move |_| h.set(h.get() + 1))), "go");
    renderer.render(Some(button), root).unwrap();

    let el = renderer.host().children(root)[0];
    renderer.host().dispatch(el, "onClick", &[]);
    renderer.host().dispatch(el, "onClick", &[]);
    assert_eq!(hits.get(), 2);

    let h = hits.clone();
    let button = element("button", Some(Props::new().on("onClick", move |_| h.set(h.get() + 10))), "go");
    renderer.render(Some(button), root).unwrap();
    renderer.host().dispatch(el, "onClick", &[]);
    assert_eq!(hits.get(), 12);
}

/// Test fragments mount between their anchors and unmount completely.
#[test]
fn fragment_mount_and_unmount() {
    let (renderer, root) = setup();
    renderer.render(Some(fragment(vec![text("a"), text("b")])), root).unwrap();
    assert_eq!(renderer.host().serialize_inner(root), "ab");

    renderer.render(Some(fragment(vec![text("a"), text("c"), text("d")])), root).unwrap();
    assert_eq!(renderer.host().serialize_inner(root), "acd");

    renderer.render(None, root).unwrap();
    assert_eq!(renderer.host().serialize_inner(root), "");
    assert!(renderer.host().children(root).is_empty());
    assert!(renderer.root(root).is_none());
}

/// Test that static content is inserted as-is.
#[test]
fn static_content_is_inserted() {
    let (renderer, root) = setup();
    let tree = element("div", None, vec![static_content("<b>bold</b><i>it</i>", 2), text("!")]);
    renderer.render(Some(tree), root).unwrap();
    assert_eq!(renderer.host().serialize_inner(root), "<div><b>bold</b><i>it</i>!</div>");
}

/// Test that teleported children follow the `disabled` flag and leave the
/// target on unmount.
#[test]
fn teleport_moves_children() {
    let (renderer, root) = setup();
    let modal = renderer.host().create_element("section");
    renderer.host().patch_prop(modal, "id", None, Some(&PropValue::from("modal")));

    let tree = |disabled| element("div", None, vec![teleport("#modal", disabled, vec![element("p", None, "hi")])]);

    renderer.render(Some(tree(false)), root).unwrap();
    assert_eq!(renderer.host().serialize_inner(modal), "<p>hi</p>");
    assert_eq!(renderer.host().serialize_inner(root), "<div></div>");

    renderer.render(Some(tree(true)), root).unwrap();
    assert_eq!(renderer.host().serialize_inner(modal), "");
    assert_eq!(renderer.host().serialize_inner(root), "<div><p>hi</p></div>");

    renderer.render(Some(tree(false)), root).unwrap();
    assert_eq!(renderer.host().serialize_inner(modal), "<p>hi</p>");

    renderer.render(None, root).unwrap();
    assert_eq!(renderer.host().serialize_inner(modal), "");
    assert_eq!(renderer.host().serialize_inner(root), "");
}

/// Test that a component re-renders when state it read changes.
#[test]
fn component_rerenders_on_state_change() {
    let (renderer, root) = setup();
    let count = Ref::new(0);

    let c = count.clone();
    let counter = ComponentDef::new()
        .name("Counter")
        .setup(move |_, _| {
            let c = c.clone();
            SetupResult::render(move |_| element("span", None, c.get().to_string()))
        })
        .build();

    renderer.render(Some(component(&counter, None, ())), root).unwrap();
    assert_eq!(renderer.host().serialize_inner(root), "<span>0</span>");

    count.set(1);
    count.set(2);
    assert_eq!(renderer.host().serialize_inner(root), "<span>0</span>");
    flush().unwrap();
    assert_eq!(renderer.host().serialize_inner(root), "<span>2</span>");
}

/// Test that declared props reach the child and undeclared ones fall
/// through to its root element.
#[test]
fn props_and_fallthrough_attrs() {
    let (renderer, root) = setup();
    let label = ComponentDef::new()
        .name("Label")
        .props(["text"])
        .setup(|props, _| {
            let props = props.clone();
            SetupResult::render(move |_| element("span", None, props.get("text").to_display_string()))
        })
        .build();

    let tree = |t: &str| component(&label, Some(Props::new().with("text", t).with("id", "l")), ());
    renderer.render(Some(tree("hello")), root).unwrap();
    assert_eq!(renderer.host().serialize_inner(root), "<span id=\"l\">hello</span>");

    renderer.render(Some(tree("bye")), root).unwrap();
    assert_eq!(renderer.host().serialize_inner(root), "<span id=\"l\">bye</span>");
}

/// Test that a parent re-renders before its child within one flush, and
/// that the child's update runs once.
#[test]
fn parent_updates_before_child() {
    let (renderer, root) = setup();
    let log = Rc::new(RefCell::new(Vec::new()));
    let show = Ref::new(true);
    let child_state = Ref::new(0);

    let child = {
        let (log, state) = (log.clone(), child_state.clone());
        ComponentDef::new()
            .name("Child")
            .setup(move |_, _| {
                let (log, state) = (log.clone(), state.clone());
                SetupResult::render(move |_| {
                    log.borrow_mut().push("child");
                    text(state.get().to_string())
                })
            })
            .build()
    };
    let parent = {
        let (log, show, child) = (log.clone(), show.clone(), child.clone());
        ComponentDef::new()
            .name("Parent")
            .setup(move |_, _| {
                let (log, show, child) = (log.clone(), show.clone(), child.clone());
                SetupResult::render(move |_| {
                    log.borrow_mut().push("parent");
                    if show.get() {
                        element("div", None, vec![component(&child, None, ())])
                    } else {
                        element("div", None, ())
                    }
                })
            })
            .build()
    };

    renderer.render(Some(component(&parent, None, ())), root).unwrap();
    assert_eq!(*log.borrow(), vec!["parent", "child"]);
    log.borrow_mut().clear();

    // The child is queued first but still runs after its parent.
    child_state.set(1);
    show.set(false);
    show.set(true);
    flush().unwrap();
    assert_eq!(*log.borrow(), vec!["parent", "child"]);
    assert_eq!(renderer.host().serialize_inner(root), "<div>1</div>");
    log.borrow_mut().clear();

    // A child removed by its parent's update never re-renders.
    child_state.set(2);
    show.set(false);
    flush().unwrap();
    assert_eq!(*log.borrow(), vec!["parent"]);
    assert_eq!(renderer.host().serialize_inner(root), "<div></div>");
}

/// Test lifecycle hook order across mount, update and unmount.
#[test]
fn lifecycle_hooks_run_in_order() {
    let (renderer, root) = setup();
    let log = Rc::new(RefCell::new(Vec::new()));
    let value = Ref::new(0);

    let def = {
        let (log, value) = (log.clone(), value.clone());
        ComponentDef::new()
            .setup(move |_, _| {
                let push = |name: &'static str| {
                    let log = log.clone();
                    move || log.borrow_mut().push(name)
                };
                on_before_mount(push("before_mount"));
                on_mounted(push("mounted"));
                on_before_update(push("before_update"));
                on_updated(push("updated"));
                on_before_unmount(push("before_unmount"));
                on_unmounted(push("unmounted"));
                let value = value.clone();
                SetupResult::render(move |_| text(value.get().to_string()))
            })
            .build()
    };

    renderer.render(Some(component(&def, None, ())), root).unwrap();
    assert_eq!(*log.borrow(), vec!["before_mount", "mounted"]);

    value.set(1);
    flush().unwrap();
    assert_eq!(*log.borrow(), vec!["before_mount", "mounted", "before_update", "updated"]);

    renderer.render(None, root).unwrap();
    assert_eq!(
        *log.borrow(),
        vec!["before_mount", "mounted", "before_update", "updated", "before_unmount", "unmounted"]
    );
}

/// Test that a render error is reported through the flush result.
#[test]
fn render_errors_surface_from_render() {
    let (renderer, root) = setup();
    let broken = ComponentDef::new()
        .setup(|_, _| SetupResult::render(|_| -> Result<VNode, &'static str> { Err("boom") }))
        .build();

    let result = renderer.render(Some(component(&broken, None, ())), root);
    assert!(result.is_err());
}

/// Test that a pre-flush watcher runs inline while its component is still
/// being set up, and is queued once the component is mounted.
#[test]
fn pre_watcher_runs_inline_before_mount() {
    let (renderer, root) = setup();
    let log = Rc::new(RefCell::new(Vec::<String>::new()));
    let source = Ref::new(Value::from(0));

    let (l, s) = (log.clone(), source.clone());
    let watcher = ComponentDef::new()
        .name("Watcher")
        .setup(move |_, _| {
            let sink = l.clone();
            watch(
                &s,
                move |new: &Value, _: &Value, _: &trellis_core::watch::OnCleanup| {
                    sink.borrow_mut().push(format!("changed to {}", new.to_display_string()));
                },
                WatchOptions::default(),
            );
            s.set(Value::from(1));
            l.borrow_mut().push("setup done".into());
            SetupResult::render(|_| text("ok"))
        })
        .build();

    renderer.render(Some(component(&watcher, None, ())), root).unwrap();
    assert_eq!(*log.borrow(), ["changed to 1", "setup done"]);

    source.set(Value::from(2));
    assert_eq!(log.borrow().len(), 2);
    flush().unwrap();
    assert_eq!(log.borrow().last().map(String::as_str), Some("changed to 2"));
}
