//! Server rendering and hydration integration tests
//!
//! Success Criteria:
//! 1. Hydrating server markup adopts every element without mutating the markup
//! 2. Hydrated trees behave like rendered ones (listeners, refs, updates)
//! 3. Structural divergence fails immediately, naming both nodes
//!
//! Test Categories:
//! - Agreement: 4 cases + 1 property
//! - Interactivity: 3 tests
//! - Error Path: 2 tests
//! - Edge Cases: 1 test

use proptest::prelude::*;
use rstest::*;
use std::cell::RefCell;
use std::rc::Rc;
use tiny_react_core::{
	Component, Error, Hooks, RefCallback, VNode, el, hydrate, render, render_to_string,
};
use tiny_react_dom::Node;

// ============================================================================
// Fixtures
// ============================================================================

#[fixture]
fn container() -> Node {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
	Node::element("main")
}

fn elements(node: &Node, out: &mut Vec<Node>) {
	for child in node.child_nodes() {
		if child.is_element() {
			out.push(child.clone());
		}
		elements(&child, out);
	}
}

fn all_elements(node: &Node) -> Vec<Node> {
	let mut out = Vec::new();
	elements(node, &mut out);
	out
}

/// Server-renders `vnode` into `container`, hydrates it and checks it against
/// a fresh client render.
fn assert_agreement(container: &Node, vnode: &VNode) {
	let html = render_to_string(vnode).unwrap();
	container.set_inner_html(&html).unwrap();
	let parsed = container.inner_html();
	let before = all_elements(container);

	let bundle = hydrate(vnode.clone(), container).unwrap();
	assert_eq!(container.inner_html(), parsed);
	let after = all_elements(container);
	assert_eq!(after.len(), before.len());
	assert!(after.iter().zip(&before).all(|(a, b)| a.ptr_eq(b)));
	let hosts = bundle.host_nodes();
	let children = container.child_nodes();
	assert_eq!(hosts.len(), children.len());
	assert!(hosts.iter().zip(&children).all(|(a, b)| a.ptr_eq(b)));

	let fresh = Node::element("main");
	let _fresh = render(vnode.clone(), &fresh, None).unwrap();
	assert_eq!(fresh.inner_html(), parsed);
}

// ============================================================================
// Agreement
// ============================================================================

/// Hydration of server markup reuses all elements
#[rstest]
#[case::nested(el("div").child("hello").child(el("span").child("world")).build())]
#[case::attributes(
	el("div")
		.prop("className", "a")
		.prop("id", "main")
		.child(el("input").prop("title", "t"))
		.build()
)]
#[case::adjacent_text(el("p").child("a").child("b").child(1).build())]
#[case::component(
	Component::new(|_: &(), _: &mut Hooks<'_>| Ok(el("b").child("c").build())).el(())
)]
fn test_hydrate_agrees_with_render(container: Node, #[case] vnode: VNode) {
	assert_agreement(&container, &vnode);
}

#[derive(Debug, Clone)]
enum Tree {
	Text(String),
	Tag(&'static str, Option<String>, Vec<Tree>),
}

impl Tree {
	fn to_vnode(&self) -> VNode {
		match self {
			Self::Text(data) => VNode::text(data.as_str()),
			Self::Tag(name, title, children) => {
				let mut tag = el(*name);
				if let Some(title) = title {
					tag = tag.prop("title", title.clone());
				}
				tag.children(children.iter().map(Tree::to_vnode)).build()
			}
		}
	}
}

fn tree() -> impl Strategy<Value = Tree> {
	let leaf = prop_oneof![
		"[a-z<>&\"' ]{1,8}".prop_map(Tree::Text),
		Just(Tree::Tag("input", None, Vec::new())),
	];
	leaf.prop_recursive(3, 24, 4, |inner| {
		(
			prop::sample::select(vec!["div", "span", "section", "ul", "article", "nav"]),
			proptest::option::of("[a-z &\"]{0,6}"),
			prop::collection::vec(inner, 0..4),
		)
			.prop_map(|(name, title, children)| Tree::Tag(name, title, children))
	})
}

proptest! {
	/// Hydrating the server rendering of any tree never fails and keeps every element
	#[test]
	fn prop_ssr_hydration_agreement(trees in prop::collection::vec(tree(), 0..4)) {
		let container = Node::element("main");
		let vnode = VNode::fragment(trees.iter().map(Tree::to_vnode));
		assert_agreement(&container, &vnode);
	}
}

// ============================================================================
// Interactivity
// ============================================================================

/// Listeners are attached to adopted elements
#[rstest]
fn test_hydrated_counter_is_interactive(container: Node) {
	let counter = Component::new(|_: &(), hooks: &mut Hooks<'_>| {
		let (count, set_count) = hooks.use_state(|| 0_i64)?;
		Ok(el("button")
			.on("click", move |_| set_count.update(|n| n + 1))
			.child(count)
			.build())
	});
	container
		.set_inner_html(&render_to_string(&counter.el(())).unwrap())
		.unwrap();
	let button = container.first_child().unwrap();

	let _bundle = hydrate(counter.el(()), &container).unwrap();
	button.dispatch_event("click");
	assert_eq!(container.inner_html(), "<button>1</button>");
	assert!(container.first_child().unwrap().ptr_eq(&button));
}

/// Refs receive the adopted element
#[rstest]
fn test_ref_receives_adopted_element(container: Node) {
	let seen = Rc::new(RefCell::new(None));
	let sink = Rc::clone(&seen);
	let node_ref = RefCallback::new(move |node| *sink.borrow_mut() = node.cloned());
	container.set_inner_html("<div>hello<span>world</span></div>").unwrap();

	let view = el("div")
		.node_ref(&node_ref)
		.child("hello")
		.child(el("span").child("world"));
	let _bundle = hydrate(view, &container).unwrap();
	assert_eq!(*seen.borrow(), container.first_child());
}

/// After hydration the bundle patches like any other
#[rstest]
fn test_render_after_hydrate(container: Node) {
	container.set_inner_html("<div>hello</div>").unwrap();
	let div = container.first_child().unwrap();

	let bundle = hydrate(el("div").child("hello"), &container).unwrap();
	let _bundle = render(el("div").child("bye"), &container, Some(bundle)).unwrap();
	assert_eq!(container.inner_html(), "<div>bye</div>");
	assert!(container.first_child().unwrap().ptr_eq(&div));
}

// ============================================================================
// Error Path
// ============================================================================

/// A tag mismatch names the actual and expected elements
#[rstest]
fn test_tag_mismatch(container: Node) {
	container.set_inner_html("<span></span>").unwrap();
	let err = hydrate(el("div"), &container).unwrap_err();
	assert_eq!(
		err,
		Error::HydrationMismatch {
			expected: "div".to_string(),
			actual: "SPAN".to_string(),
		}
	);
	let message = err.to_string();
	assert!(message.contains("SPAN") && message.contains("div"));
}

/// A missing text node is reported against the element found instead
#[rstest]
fn test_text_mismatch(container: Node) {
	container.set_inner_html("<div><span></span></div>").unwrap();
	let err = hydrate(el("div").child("hello"), &container).unwrap_err();
	assert_eq!(
		err,
		Error::HydrationMismatch {
			expected: "#text".to_string(),
			actual: "SPAN".to_string(),
		}
	);
}

// ============================================================================
// Edge Cases
// ============================================================================

/// Host nodes beyond the hydrated tree are left alone
#[rstest]
fn test_trailing_nodes_are_kept(container: Node) {
	container.set_inner_html("<b></b><i></i>").unwrap();
	let bundle = hydrate(el("b"), &container).unwrap();
	assert_eq!(container.inner_html(), "<b></b><i></i>");
	assert_eq!(bundle.host_nodes().len(), 1);
}
