//! Bundle nodes: the mutable tree that mirrors the last rendered [`VNode`]
//! tree and owns the live host handles.
//!
//! Children are owned by their parent through `Rc`; the parent link is a
//! [`Weak`] back-reference used only for upward traversal during localized
//! re-renders. Host-bearing variants are their own slot; fragments and
//! components cache the slot of their last non-empty child.
//!
//! [`VNode`]: crate::vnode::VNode

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tiny_react_dom::Node;

use crate::context::ContextMap;
use crate::hooks::HookContext;
use crate::scheduler::Instance;
use crate::vnode::{Key, Listener, VCustom, VFragment, VTag};

/// Bundle node for a host element.
#[derive(Debug)]
pub struct BTag {
	pub(crate) vnode: Rc<VTag>,
	pub(crate) hnode: Node,
	pub(crate) child: BNode,
	pub(crate) listeners: HashMap<String, Listener>,
	pub(crate) parent: Option<BParent>,
}

/// Bundle node for a text node.
#[derive(Debug)]
pub struct BText {
	pub(crate) data: Rc<str>,
	pub(crate) hnode: Node,
	pub(crate) parent: Option<BParent>,
}

/// Bundle node for a mounted function component.
pub struct BCustom {
	pub(crate) vnode: Rc<VCustom>,
	pub(crate) child: BNode,
	pub(crate) hooks: HookContext,
	pub(crate) slot: Option<Node>,
	/// `None` once unmounted.
	pub(crate) hparent: Option<Node>,
	/// Context map the component was rendered under (before its own provisions).
	pub(crate) contexts: ContextMap,
	pub(crate) instance: Rc<Instance>,
	pub(crate) parent: Option<BParent>,
}

impl std::fmt::Debug for BCustom {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BCustom")
			.field("vnode", &self.vnode)
			.field("child", &self.child)
			.field("slot", &self.slot)
			.finish_non_exhaustive()
	}
}

/// Bundle node for a fragment.
#[derive(Debug)]
pub struct BFragment {
	pub(crate) vnode: Rc<VFragment>,
	pub(crate) children: Vec<BNode>,
	pub(crate) slot: Option<Node>,
	pub(crate) parent: Option<BParent>,
}

/// Non-owning link to the parent bundle node.
#[derive(Debug, Clone)]
pub(crate) enum BParent {
	Tag(Weak<RefCell<BTag>>),
	Custom(Weak<RefCell<BCustom>>),
	Fragment(Weak<RefCell<BFragment>>),
}

/// Mutable bundle tree node.
#[derive(Debug, Clone, Default)]
pub enum BNode {
	/// Nothing mounted.
	#[default]
	Empty,
	/// Host element.
	Tag(Rc<RefCell<BTag>>),
	/// Text node.
	Text(Rc<RefCell<BText>>),
	/// Function component.
	Custom(Rc<RefCell<BCustom>>),
	/// Fragment.
	Fragment(Rc<RefCell<BFragment>>),
}

impl BNode {
	/// Last host node spanned by this subtree.
	pub fn slot(&self) -> Option<Node> {
		match self {
			Self::Empty => None,
			Self::Tag(t) => Some(t.borrow().hnode.clone()),
			Self::Text(t) => Some(t.borrow().hnode.clone()),
			Self::Custom(c) => c.borrow().slot.clone(),
			Self::Fragment(f) => f.borrow().slot.clone(),
		}
	}

	/// Host node of a tag or text bundle node.
	pub fn host_node(&self) -> Option<Node> {
		match self {
			Self::Tag(t) => Some(t.borrow().hnode.clone()),
			Self::Text(t) => Some(t.borrow().hnode.clone()),
			_ => None,
		}
	}

	/// Top-level host nodes of this subtree, in document order.
	pub fn host_nodes(&self) -> Vec<Node> {
		let mut out = Vec::new();
		self.collect_host_nodes(&mut out);
		out
	}

	fn collect_host_nodes(&self, out: &mut Vec<Node>) {
		match self {
			Self::Empty => {}
			Self::Tag(t) => out.push(t.borrow().hnode.clone()),
			Self::Text(t) => out.push(t.borrow().hnode.clone()),
			Self::Custom(c) => c.borrow().child.collect_host_nodes(out),
			Self::Fragment(f) => {
				for child in &f.borrow().children {
					child.collect_host_nodes(out);
				}
			}
		}
	}

	/// Sibling-matching key of the virtual node this bundle node was rendered from.
	pub fn key(&self) -> Option<Key> {
		match self {
			Self::Tag(t) => t.borrow().vnode.key.clone(),
			Self::Custom(c) => c.borrow().vnode.key.clone(),
			Self::Fragment(f) => f.borrow().vnode.key.clone(),
			Self::Empty | Self::Text(_) => None,
		}
	}

	/// Identity comparison.
	pub fn ptr_eq(&self, other: &BNode) -> bool {
		match (self, other) {
			(Self::Empty, Self::Empty) => true,
			(Self::Tag(a), Self::Tag(b)) => Rc::ptr_eq(a, b),
			(Self::Text(a), Self::Text(b)) => Rc::ptr_eq(a, b),
			(Self::Custom(a), Self::Custom(b)) => Rc::ptr_eq(a, b),
			(Self::Fragment(a), Self::Fragment(b)) => Rc::ptr_eq(a, b),
			_ => false,
		}
	}

	/// Child bundle nodes.
	pub fn children(&self) -> Vec<BNode> {
		match self {
			Self::Empty | Self::Text(_) => Vec::new(),
			Self::Tag(t) => vec![t.borrow().child.clone()],
			Self::Custom(c) => vec![c.borrow().child.clone()],
			Self::Fragment(f) => f.borrow().children.clone(),
		}
	}

	/// Short kind name for diagnostics.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Empty => "empty",
			Self::Tag(_) => "tag",
			Self::Text(_) => "text",
			Self::Custom(_) => "custom",
			Self::Fragment(_) => "fragment",
		}
	}

	pub(crate) fn parent(&self) -> Option<BParent> {
		match self {
			Self::Empty => None,
			Self::Tag(t) => t.borrow().parent.clone(),
			Self::Text(t) => t.borrow().parent.clone(),
			Self::Custom(c) => c.borrow().parent.clone(),
			Self::Fragment(f) => f.borrow().parent.clone(),
		}
	}

	pub(crate) fn set_parent(&self, parent: BParent) {
		let parent = Some(parent);
		match self {
			Self::Empty => {}
			Self::Tag(t) => t.borrow_mut().parent = parent,
			Self::Text(t) => t.borrow_mut().parent = parent,
			Self::Custom(c) => c.borrow_mut().parent = parent,
			Self::Fragment(f) => f.borrow_mut().parent = parent,
		}
	}
}

impl BParent {
	pub(crate) fn upgrade(&self) -> Option<BNode> {
		match self {
			Self::Tag(w) => w.upgrade().map(BNode::Tag),
			Self::Custom(w) => w.upgrade().map(BNode::Custom),
			Self::Fragment(w) => w.upgrade().map(BNode::Fragment),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::vnode::VNode;
	use rstest::rstest;

	fn text(data: &str) -> BNode {
		BNode::Text(Rc::new(RefCell::new(BText {
			data: data.into(),
			hnode: Node::text(data),
			parent: None,
		})))
	}

	fn fragment(children: Vec<BNode>) -> BNode {
		let slot = children.iter().rev().find_map(BNode::slot);
		let VNode::Fragment(vnode) = VNode::fragment(Vec::new()) else {
			unreachable!()
		};
		BNode::Fragment(Rc::new(RefCell::new(BFragment {
			vnode,
			children,
			slot,
			parent: None,
		})))
	}

	#[rstest]
	fn test_empty_has_no_slot() {
		assert!(BNode::Empty.slot().is_none());
		assert!(BNode::Empty.host_nodes().is_empty());
	}

	#[rstest]
	fn test_fragment_slot_is_last_non_empty_child() {
		let a = text("a");
		let b = text("b");
		let frag = fragment(vec![a.clone(), b.clone(), BNode::Empty]);
		assert_eq!(frag.slot(), b.slot());
		let hosts = frag.host_nodes();
		assert_eq!(hosts.len(), 2);
		assert_eq!(Some(&hosts[0]), a.slot().as_ref());
	}

	#[rstest]
	fn test_parent_link_is_weak() {
		let child = text("x");
		let parent = fragment(vec![child.clone()]);
		let BNode::Fragment(rc) = &parent else {
			unreachable!()
		};
		child.set_parent(BParent::Fragment(Rc::downgrade(rc)));
		assert!(child.parent().and_then(|p| p.upgrade()).is_some());
		drop(parent);
		assert!(child.parent().and_then(|p| p.upgrade()).is_none());
	}

	#[rstest]
	fn test_ptr_eq() {
		let a = text("a");
		assert!(a.ptr_eq(&a.clone()));
		assert!(!a.ptr_eq(&text("a")));
		assert!(BNode::Empty.ptr_eq(&BNode::Empty));
	}
}
