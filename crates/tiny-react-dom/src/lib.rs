//! Host backend for tiny-react.
//!
//! An ordered, mutable node tree with element and text primitives: the
//! operations a retained-mode renderer needs from its host (node creation,
//! attribute/property mutation, listener registration, ordered
//! insertion/removal) plus HTML serialization and a fragment parser so that
//! server-rendered markup can be loaded back for hydration.
//!
//! ## Example
//!
//! ```
//! use tiny_react_dom::Node;
//!
//! let root = Node::element("main");
//! root.set_inner_html("<p class=\"x\">hi</p>").unwrap();
//! assert_eq!(root.first_child().unwrap().node_name(), "P");
//! assert_eq!(root.inner_html(), "<p class=\"x\">hi</p>");
//! ```

#![warn(missing_docs)]

mod error;
mod event;
mod node;
pub mod parser;
pub mod serialize;

pub use error::DomError;
pub use event::{Event, EventListener};
pub use node::{Node, Property, VOID_ELEMENTS, is_void_element, reflected_attribute};
pub use parser::parse_fragment;
pub use serialize::escape_html;
