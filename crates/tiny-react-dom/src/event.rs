//! Event objects and listener type.

use std::rc::Rc;

use crate::node::Node;

/// Listener callback registered on an element.
pub type EventListener = Rc<dyn Fn(&Event)>;

/// An event delivered to listeners by [`Node::dispatch_event`].
#[derive(Debug, Clone)]
pub struct Event {
	kind: String,
	target: Node,
}

impl Event {
	/// Creates an event of `kind` targeting `target`.
	pub fn new(kind: impl Into<String>, target: Node) -> Self {
		Self {
			kind: kind.into(),
			target,
		}
	}

	/// Event type, e.g. `click`.
	pub fn kind(&self) -> &str {
		&self.kind
	}

	/// The node the event was dispatched on.
	pub fn target(&self) -> &Node {
		&self.target
	}
}
