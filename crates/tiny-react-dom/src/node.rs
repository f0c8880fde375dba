//! Host nodes: an ordered mutable tree of elements and text nodes.
//!
//! [`Node`] is a cheap reference-counted handle. Cloning a handle never
//! clones the underlying node; equality is identity, so two handles compare
//! equal only when they point at the same host node.
//!
//! Children form a doubly linked sibling list. A parent owns its first child
//! and each child owns its next sibling; `parent`, `last_child` and
//! `previous_sibling` are weak. Navigation, insertion and removal are O(1).

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::DomError;
use crate::event::{Event, EventListener};
use crate::serialize;

/// Elements that never have children and serialize without a closing tag.
pub const VOID_ELEMENTS: &[&str] = &[
	"area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
	"track", "wbr",
];

/// Attribute a reflected property writes through to.
///
/// `ariaValueNow` reflects to `aria-value-now`.
pub fn reflected_attribute(property: &str) -> Option<String> {
	match property {
		"className" => Some("class".to_string()),
		"htmlFor" => Some("for".to_string()),
		"id" => Some("id".to_string()),
		_ => {
			let rest = property.strip_prefix("aria")?;
			if !rest.starts_with(|c: char| c.is_ascii_uppercase()) {
				return None;
			}
			let mut attr = String::from("aria");
			for c in rest.chars() {
				if c.is_ascii_uppercase() {
					attr.push('-');
				}
				attr.push(c.to_ascii_lowercase());
			}
			Some(attr)
		}
	}
}

/// Returns whether `tag` is a void element.
pub fn is_void_element(tag: &str) -> bool {
	VOID_ELEMENTS.contains(&tag)
}

/// A host property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
	/// String value.
	Text(String),
	/// Boolean value (e.g. `checked`).
	Bool(bool),
	/// Numeric value.
	Number(f64),
}

impl Property {
	/// Renders the value the way an attribute would hold it.
	pub fn to_attribute_value(&self) -> String {
		match self {
			Self::Text(s) => s.clone(),
			Self::Bool(b) => b.to_string(),
			Self::Number(n) => n.to_string(),
		}
	}
}

#[derive(Debug)]
pub(crate) enum NodeData {
	Element(ElementData),
	Text(String),
}

pub(crate) struct ElementData {
	pub(crate) tag: String,
	pub(crate) attributes: Vec<(String, String)>,
	pub(crate) properties: Vec<(String, Property)>,
	pub(crate) listeners: Vec<(String, EventListener)>,
}

impl fmt::Debug for ElementData {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ElementData")
			.field("tag", &self.tag)
			.field("attributes", &self.attributes)
			.field("properties", &self.properties)
			.field("listeners", &self.listeners.len())
			.finish()
	}
}

#[derive(Debug)]
pub(crate) struct NodeInner {
	pub(crate) data: RefCell<NodeData>,
	parent: RefCell<Weak<NodeInner>>,
	first_child: RefCell<Option<Node>>,
	last_child: RefCell<Weak<NodeInner>>,
	next_sibling: RefCell<Option<Node>>,
	previous_sibling: RefCell<Weak<NodeInner>>,
}

impl Drop for NodeInner {
	fn drop(&mut self) {
		// unlink iteratively so long sibling chains do not recurse
		let mut next = self.first_child.get_mut().take();
		while let Some(node) = next {
			next = node.0.next_sibling.borrow_mut().take();
			*node.0.previous_sibling.borrow_mut() = Weak::new();
		}
	}
}

fn downgrade(node: Option<&Rc<NodeInner>>) -> Weak<NodeInner> {
	node.map_or_else(Weak::new, Rc::downgrade)
}

/// Handle to a host node.
#[derive(Clone)]
pub struct Node(pub(crate) Rc<NodeInner>);

impl PartialEq for Node {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

impl Eq for Node {}

impl fmt::Debug for Node {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &*self.0.data.borrow() {
			NodeData::Element(el) => write!(f, "<{}>", el.tag),
			NodeData::Text(data) => write!(f, "#text({data:?})"),
		}
	}
}

impl Node {
	fn from_data(data: NodeData) -> Self {
		Self(Rc::new(NodeInner {
			data: RefCell::new(data),
			parent: RefCell::new(Weak::new()),
			first_child: RefCell::new(None),
			last_child: RefCell::new(Weak::new()),
			next_sibling: RefCell::new(None),
			previous_sibling: RefCell::new(Weak::new()),
		}))
	}

	/// Creates a detached element. The tag name is stored lowercased.
	pub fn element(tag: &str) -> Self {
		Self::from_data(NodeData::Element(ElementData {
			tag: tag.to_ascii_lowercase(),
			attributes: Vec::new(),
			properties: Vec::new(),
			listeners: Vec::new(),
		}))
	}

	/// Creates a detached text node.
	pub fn text(data: impl Into<String>) -> Self {
		Self::from_data(NodeData::Text(data.into()))
	}

	/// Identity comparison, equivalent to `==`.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		self == other
	}

	/// Returns `true` for element nodes.
	pub fn is_element(&self) -> bool {
		matches!(&*self.0.data.borrow(), NodeData::Element(_))
	}

	/// Returns `true` for text nodes.
	pub fn is_text(&self) -> bool {
		matches!(&*self.0.data.borrow(), NodeData::Text(_))
	}

	/// DOM-style node name: the uppercased tag for elements, `#text` for text.
	pub fn node_name(&self) -> String {
		match &*self.0.data.borrow() {
			NodeData::Element(el) => el.tag.to_ascii_uppercase(),
			NodeData::Text(_) => "#text".to_string(),
		}
	}

	/// Lowercase tag name, or `None` for text nodes.
	pub fn local_name(&self) -> Option<String> {
		match &*self.0.data.borrow() {
			NodeData::Element(el) => Some(el.tag.clone()),
			NodeData::Text(_) => None,
		}
	}

	// ------------------------------------------------------------------
	// tree structure
	// ------------------------------------------------------------------

	/// Parent node, if attached.
	pub fn parent_node(&self) -> Option<Node> {
		self.0.parent.borrow().upgrade().map(Node)
	}

	/// Snapshot of the child list.
	pub fn child_nodes(&self) -> Vec<Node> {
		let mut children = Vec::new();
		let mut next = self.first_child();
		while let Some(child) = next {
			next = child.next_sibling();
			children.push(child);
		}
		children
	}

	/// First child.
	pub fn first_child(&self) -> Option<Node> {
		self.0.first_child.borrow().clone()
	}

	/// Last child.
	pub fn last_child(&self) -> Option<Node> {
		self.0.last_child.borrow().upgrade().map(Node)
	}

	/// Following sibling.
	pub fn next_sibling(&self) -> Option<Node> {
		self.0.next_sibling.borrow().clone()
	}

	/// Preceding sibling.
	pub fn previous_sibling(&self) -> Option<Node> {
		self.0.previous_sibling.borrow().upgrade().map(Node)
	}

	/// Detaches the node from its parent. No-op when already detached.
	pub fn remove(&self) {
		let Some(parent) = self.parent_node() else {
			return;
		};
		tracing::trace!(node = ?self, parent = ?parent, "remove");
		let next = self.0.next_sibling.borrow_mut().take();
		let previous = self.0.previous_sibling.replace(Weak::new()).upgrade();
		match &next {
			Some(next) => *next.0.previous_sibling.borrow_mut() = downgrade(previous.as_ref()),
			None => *parent.0.last_child.borrow_mut() = downgrade(previous.as_ref()),
		}
		match previous {
			Some(previous) => *previous.next_sibling.borrow_mut() = next,
			None => *parent.0.first_child.borrow_mut() = next,
		}
		*self.0.parent.borrow_mut() = Weak::new();
	}

	/// Inserts `child` before `reference`, or appends when `reference` is `None`.
	///
	/// A child that is already attached anywhere is moved.
	pub fn insert_before(&self, child: &Node, reference: Option<&Node>) -> Result<(), DomError> {
		if reference.is_some_and(|r| r == child) {
			return Ok(());
		}
		if let Some(r) = reference
			&& r.parent_node().as_ref() != Some(self)
		{
			return Err(DomError::NotAChild {
				parent: self.node_name(),
			});
		}
		child.remove();
		tracing::trace!(node = ?child, parent = ?self, before = ?reference, "insert_before");
		let previous = match reference {
			Some(r) => {
				let previous = r.0.previous_sibling.borrow().upgrade();
				*r.0.previous_sibling.borrow_mut() = Rc::downgrade(&child.0);
				*child.0.next_sibling.borrow_mut() = Some(r.clone());
				previous
			}
			None => {
				let previous = self.0.last_child.borrow().upgrade();
				*self.0.last_child.borrow_mut() = Rc::downgrade(&child.0);
				previous
			}
		};
		*child.0.previous_sibling.borrow_mut() = downgrade(previous.as_ref());
		match previous {
			Some(previous) => *previous.next_sibling.borrow_mut() = Some(child.clone()),
			None => *self.0.first_child.borrow_mut() = Some(child.clone()),
		}
		*child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
		Ok(())
	}

	/// Appends `child` as the last child.
	pub fn append_child(&self, child: &Node) {
		// appending never needs a reference node, so this cannot fail
		let _ = self.insert_before(child, None);
	}

	/// Removes every child.
	pub fn clear_children(&self) {
		while let Some(child) = self.first_child() {
			child.remove();
		}
	}

	// ------------------------------------------------------------------
	// attributes and properties
	// ------------------------------------------------------------------

	fn with_element<R>(&self, f: impl FnOnce(&ElementData) -> R) -> Option<R> {
		match &*self.0.data.borrow() {
			NodeData::Element(el) => Some(f(el)),
			NodeData::Text(_) => None,
		}
	}

	fn with_element_mut<R>(
		&self,
		operation: &'static str,
		f: impl FnOnce(&mut ElementData) -> R,
	) -> Result<R, DomError> {
		match &mut *self.0.data.borrow_mut() {
			NodeData::Element(el) => Ok(f(el)),
			NodeData::Text(_) => Err(DomError::WrongNodeKind {
				operation,
				node: "#text".to_string(),
			}),
		}
	}

	/// Reads an attribute.
	pub fn get_attribute(&self, name: &str) -> Option<String> {
		let lowered = name.to_ascii_lowercase();
		let name = lowered.as_str();
		self.with_element(|el| {
			el.attributes
				.iter()
				.find(|(k, _)| k == name)
				.map(|(_, v)| v.clone())
		})
		.flatten()
	}

	/// Attribute names and values in insertion order.
	pub fn attributes(&self) -> Vec<(String, String)> {
		self.with_element(|el| el.attributes.clone())
			.unwrap_or_default()
	}

	/// Sets an attribute, keeping its position when it already exists.
	///
	/// Names are ASCII-lowercased, as in an HTML document.
	pub fn set_attribute(&self, name: &str, value: &str) -> Result<(), DomError> {
		let lowered = name.to_ascii_lowercase();
		let name = lowered.as_str();
		tracing::trace!(node = ?self, name, value, "set_attribute");
		self.with_element_mut("set_attribute", |el| {
			match el.attributes.iter_mut().find(|(k, _)| k == name) {
				Some((_, v)) => *v = value.to_string(),
				None => el.attributes.push((name.to_string(), value.to_string())),
			}
		})
	}

	/// Removes an attribute.
	pub fn remove_attribute(&self, name: &str) -> Result<(), DomError> {
		let lowered = name.to_ascii_lowercase();
		let name = lowered.as_str();
		tracing::trace!(node = ?self, name, "remove_attribute");
		self.with_element_mut("remove_attribute", |el| {
			el.attributes.retain(|(k, _)| k != name);
		})
	}

	/// Returns whether the element exposes `name` as a settable property.
	///
	/// Reflected properties (`className`, `id`, `htmlFor` and camel-cased
	/// `aria*` names) write through to their attribute. Form state (`value`,
	/// `checked`, `selected`, `disabled`) lives outside the attribute list and
	/// is not serialized.
	pub fn has_property(&self, name: &str) -> bool {
		if reflected_attribute(name).is_some() {
			return self.is_element();
		}
		self.with_element(|el| {
			let tag = el.tag.as_str();
			match name {
				"value" => matches!(tag, "input" | "textarea" | "select" | "option" | "button"),
				"checked" => tag == "input",
				"selected" => tag == "option",
				"disabled" => matches!(
					tag,
					"input" | "textarea" | "select" | "option" | "button" | "fieldset"
				),
				_ => false,
			}
		})
		.unwrap_or(false)
	}

	/// Sets a host property. Reflected properties write through to their attribute.
	pub fn set_property(&self, name: &str, value: Property) -> Result<(), DomError> {
		if let Some(attr) = reflected_attribute(name) {
			return self.set_attribute(&attr, &value.to_attribute_value());
		}
		tracing::trace!(node = ?self, name, ?value, "set_property");
		self.with_element_mut("set_property", |el| {
			match el.properties.iter_mut().find(|(k, _)| k == name) {
				Some((_, v)) => *v = value,
				None => el.properties.push((name.to_string(), value)),
			}
		})
	}

	/// Resets a property to its default: reflected properties drop their
	/// attribute, boolean properties become `false`, `value` becomes empty.
	pub fn clear_property(&self, name: &str) -> Result<(), DomError> {
		if let Some(attr) = reflected_attribute(name) {
			return self.remove_attribute(&attr);
		}
		let cleared = match name {
			"checked" | "selected" | "disabled" => Property::Bool(false),
			_ => Property::Text(String::new()),
		};
		self.set_property(name, cleared)
	}

	/// Reads a host property.
	pub fn property(&self, name: &str) -> Option<Property> {
		if let Some(attr) = reflected_attribute(name) {
			return self.get_attribute(&attr).map(Property::Text);
		}
		self.with_element(|el| {
			el.properties
				.iter()
				.find(|(k, _)| k == name)
				.map(|(_, v)| v.clone())
		})
		.flatten()
	}

	// ------------------------------------------------------------------
	// events
	// ------------------------------------------------------------------

	/// Registers a listener for `event`.
	pub fn add_event_listener(&self, event: &str, listener: EventListener) -> Result<(), DomError> {
		tracing::trace!(node = ?self, event, "add_event_listener");
		self.with_element_mut("add_event_listener", |el| {
			el.listeners.push((event.to_string(), listener));
		})
	}

	/// Unregisters a listener previously added for `event` (matched by identity).
	pub fn remove_event_listener(
		&self,
		event: &str,
		listener: &EventListener,
	) -> Result<(), DomError> {
		tracing::trace!(node = ?self, event, "remove_event_listener");
		self.with_element_mut("remove_event_listener", |el| {
			if let Some(index) = el
				.listeners
				.iter()
				.position(|(k, l)| k == event && Rc::ptr_eq(l, listener))
			{
				el.listeners.remove(index);
			}
		})
	}

	/// Number of listeners registered for `event`.
	pub fn listener_count(&self, event: &str) -> usize {
		self.with_element(|el| el.listeners.iter().filter(|(k, _)| k == event).count())
			.unwrap_or(0)
	}

	/// Invokes the listeners registered for `event` on this node, in registration order.
	///
	/// Listeners are snapshotted first, so a listener may freely mutate the tree.
	pub fn dispatch_event(&self, event: &str) -> usize {
		let listeners: Vec<EventListener> = self
			.with_element(|el| {
				el.listeners
					.iter()
					.filter(|(k, _)| k == event)
					.map(|(_, l)| Rc::clone(l))
					.collect()
			})
			.unwrap_or_default();
		let ev = Event::new(event, self.clone());
		for listener in &listeners {
			listener(&ev);
		}
		listeners.len()
	}

	// ------------------------------------------------------------------
	// text
	// ------------------------------------------------------------------

	/// Text data of a text node.
	pub fn text_data(&self) -> Option<String> {
		match &*self.0.data.borrow() {
			NodeData::Text(data) => Some(data.clone()),
			NodeData::Element(_) => None,
		}
	}

	/// Replaces the data of a text node.
	pub fn set_text_data(&self, value: &str) -> Result<(), DomError> {
		tracing::trace!(node = ?self, value, "set_text_data");
		match &mut *self.0.data.borrow_mut() {
			NodeData::Text(data) => {
				value.clone_into(data);
				Ok(())
			}
			NodeData::Element(el) => Err(DomError::WrongNodeKind {
				operation: "set_text_data",
				node: el.tag.to_ascii_uppercase(),
			}),
		}
	}

	/// Splits a text node at byte `offset`.
	///
	/// The receiver keeps the leading part; the trailing part becomes a new text
	/// node inserted right after it (when attached) and is returned.
	pub fn split_text(&self, offset: usize) -> Result<Node, DomError> {
		let tail = {
			let mut data = self.0.data.borrow_mut();
			let text = match &mut *data {
				NodeData::Text(text) => text,
				NodeData::Element(el) => {
					return Err(DomError::WrongNodeKind {
						operation: "split_text",
						node: el.tag.to_ascii_uppercase(),
					});
				}
			};
			if offset > text.len() || !text.is_char_boundary(offset) {
				return Err(DomError::InvalidOffset {
					offset,
					len: text.len(),
				});
			}
			text.split_off(offset)
		};
		let tail = Node::text(tail);
		if let Some(parent) = self.parent_node() {
			parent.insert_before(&tail, self.next_sibling().as_ref())?;
		}
		Ok(tail)
	}

	/// Concatenated text of all descendant text nodes.
	pub fn text_content(&self) -> String {
		match &*self.0.data.borrow() {
			NodeData::Text(data) => data.clone(),
			NodeData::Element(_) => self
				.child_nodes()
				.iter()
				.map(Node::text_content)
				.collect(),
		}
	}

	// ------------------------------------------------------------------
	// serialization
	// ------------------------------------------------------------------

	/// Serializes the node including its own tag.
	pub fn outer_html(&self) -> String {
		let mut out = String::new();
		serialize::write_node(self, &mut out);
		out
	}

	/// Serializes the children of the node.
	pub fn inner_html(&self) -> String {
		let mut out = String::new();
		for child in self.child_nodes() {
			serialize::write_node(&child, &mut out);
		}
		out
	}

	/// Replaces all children with the nodes parsed from `html`.
	pub fn set_inner_html(&self, html: &str) -> Result<(), DomError> {
		let nodes = crate::parser::parse_fragment(html)?;
		self.clear_children();
		for node in &nodes {
			self.append_child(node);
		}
		Ok(())
	}

	/// Depth-first search for the first descendant element with `tag`.
	pub fn find_element(&self, tag: &str) -> Option<Node> {
		for child in self.child_nodes() {
			if child.local_name().as_deref() == Some(tag) {
				return Some(child);
			}
			if let Some(found) = child.find_element(tag) {
				return Some(found);
			}
		}
		None
	}

	/// Every descendant element with `tag`, in document order.
	pub fn find_elements(&self, tag: &str) -> Vec<Node> {
		let mut found = Vec::new();
		for child in self.child_nodes() {
			if child.local_name().as_deref() == Some(tag) {
				found.push(child.clone());
			}
			found.extend(child.find_elements(tag));
		}
		found
	}
}
