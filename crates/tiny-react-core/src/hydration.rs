//! Hydration: attaching the engine to markup produced by server rendering.
//!
//! Hydration is an ordinary reconciliation pass against an empty bundle tree,
//! except that tag and text nodes adopt the next existing host node instead
//! of creating one. The first structural divergence aborts the pass with
//! [`Error::HydrationMismatch`]; nothing is repaired or skipped.

use tiny_react_dom::Node;

use crate::error::{Error, Result};

#[cfg(feature = "hydrate")]
use crate::bnode::BNode;
#[cfg(feature = "hydrate")]
use crate::reconciler::{self, Bundle};
#[cfg(feature = "hydrate")]
use crate::scheduler::UpdateQueue;
#[cfg(feature = "hydrate")]
use crate::vnode::VNode;

/// Attaches `vnode` to the existing children of `container`.
///
/// The returned bundle is a regular one: pass it to [`crate::render`] for
/// subsequent updates.
///
/// ```ignore
/// container.set_inner_html(&render_to_string(&view)?)?;
/// let bundle = hydrate(view, &container)?;
/// ```
#[cfg(feature = "hydrate")]
pub fn hydrate(vnode: impl Into<VNode>, container: &Node) -> Result<Bundle> {
	reconciler::run_pass(vnode.into(), BNode::Empty, container, UpdateQueue::new(), true)
}

fn next_host_node(hparent: &Node, pre_slot: Option<&Node>) -> Option<Node> {
	match pre_slot {
		Some(slot) => slot.next_sibling(),
		None => hparent.first_child(),
	}
}

fn describe(node: Option<&Node>) -> String {
	node.map_or_else(|| "null".to_string(), Node::node_name)
}

/// Adopts the element following `pre_slot`, which must be a `name` element.
pub(crate) fn adopt_element(name: &str, hparent: &Node, pre_slot: Option<&Node>) -> Result<Node> {
	let next = next_host_node(hparent, pre_slot);
	match next {
		Some(node) if node.local_name().is_some_and(|local| local.eq_ignore_ascii_case(name)) => {
			tracing::trace!(name, "adopted element");
			Ok(node)
		}
		other => Err(Error::HydrationMismatch {
			expected: name.to_string(),
			actual: describe(other.as_ref()),
		}),
	}
}

/// Adopts the text node following `pre_slot`.
///
/// Returns `None` for empty text, which has no counterpart in serialized
/// markup and is created fresh. A text node longer than `data` is split so
/// the remainder is left for the next sibling.
pub(crate) fn adopt_text(data: &str, hparent: &Node, pre_slot: Option<&Node>) -> Result<Option<Node>> {
	if data.is_empty() {
		return Ok(None);
	}
	let node = match next_host_node(hparent, pre_slot) {
		Some(node) if node.is_text() => node,
		other => {
			return Err(Error::HydrationMismatch {
				expected: "#text".to_string(),
				actual: describe(other.as_ref()),
			});
		}
	};
	let current = node.text_data().unwrap_or_default();
	if current.len() > data.len() && current.starts_with(data) {
		node.split_text(data.len())?;
	} else if current != data {
		tracing::trace!(expected = data, found = %current, "patched hydrated text");
		node.set_text_data(data)?;
	}
	Ok(Some(node))
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::{fixture, rstest};

	#[fixture]
	fn container() -> Node {
		Node::element("main")
	}

	#[rstest]
	fn test_adopt_element_matches_case_insensitively(container: Node) {
		container.set_inner_html("<DIV></DIV>").unwrap();
		let adopted = adopt_element("div", &container, None).unwrap();
		assert!(adopted.ptr_eq(&container.first_child().unwrap()));
	}

	#[rstest]
	fn test_adopt_element_after_slot(container: Node) {
		container.set_inner_html("<b></b><i></i>").unwrap();
		let first = container.first_child().unwrap();
		let adopted = adopt_element("i", &container, Some(&first)).unwrap();
		assert_eq!(adopted.node_name(), "I");
	}

	#[rstest]
	#[case("<span></span>", "SPAN")]
	#[case("text", "#text")]
	#[case("", "null")]
	fn test_adopt_element_mismatch(container: Node, #[case] html: &str, #[case] actual: &str) {
		container.set_inner_html(html).unwrap();
		let err = adopt_element("div", &container, None).unwrap_err();
		assert_eq!(
			err,
			Error::HydrationMismatch {
				expected: "div".into(),
				actual: actual.into(),
			}
		);
	}

	#[rstest]
	fn test_adopt_text_splits_merged_run(container: Node) {
		container.set_inner_html("<p>helloworld</p>").unwrap();
		let p = container.first_child().unwrap();
		let hello = adopt_text("hello", &p, None).unwrap().unwrap();
		assert_eq!(hello.text_data().as_deref(), Some("hello"));
		let world = adopt_text("world", &p, Some(&hello)).unwrap().unwrap();
		assert_eq!(world.text_data().as_deref(), Some("world"));
		assert_eq!(p.child_nodes().len(), 2);
	}

	#[rstest]
	fn test_adopt_text_patches_different_data(container: Node) {
		container.set_inner_html("stale").unwrap();
		let node = adopt_text("fresh", &container, None).unwrap().unwrap();
		assert_eq!(node.text_data().as_deref(), Some("fresh"));
	}

	#[rstest]
	fn test_adopt_empty_text_creates_fresh(container: Node) {
		container.set_inner_html("<b></b>").unwrap();
		assert!(adopt_text("", &container, None).unwrap().is_none());
	}

	#[rstest]
	fn test_adopt_text_rejects_element(container: Node) {
		container.set_inner_html("<b></b>").unwrap();
		let err = adopt_text("x", &container, None).unwrap_err();
		assert!(matches!(err, Error::HydrationMismatch { ref actual, .. } if actual == "B"));
	}
}
