//! # tiny-react
//!
//! A minimal retained-mode UI engine.
//!
//! Components return immutable virtual trees. The engine diffs each new tree
//! against the previous one and patches a host tree in place, keeping host
//! nodes whose kind and key are unchanged.
//!
//! ## Crates
//!
//! - [`tiny_react_core`]: virtual nodes, the reconciler, hooks, context,
//!   server rendering and hydration (re-exported at the crate root)
//! - [`dom`]: the in-memory host tree rendered into
//!
//! ## Feature Flags
//!
//! - `ssr` (default): [`render_to_string`] and [`SsrRenderer`]
//! - `hydrate` (default): [`hydrate`] for adopting server-rendered markup
//!
//! ## Example
//!
//! ```ignore
//! use tiny_react::prelude::*;
//!
//! let greeting = Component::new(|name: &String, _: &mut Hooks<'_>| {
//!     Ok(el("p").child("hello ").child(name.clone()).build())
//! });
//!
//! let html = render_to_string(&greeting.el("world".to_string()))?;
//! let container = Node::element("main");
//! container.set_inner_html(&html)?;
//! let bundle = hydrate(greeting.el("world".to_string()), &container)?;
//! ```

#![warn(missing_docs)]

pub use tiny_react_core::*;

/// The host tree backend
pub use tiny_react_dom as dom;

/// Commonly used types for building components
pub mod prelude {
	pub use crate::dom::{Event, Node};
	pub use crate::{
		BNode, Bundle, Component, Context, Error, Hooks, Key, Listener, Ref, RefCallback,
		Result, SetState, VNode, cleanup, el, render,
	};

	#[cfg(feature = "hydrate")]
	pub use crate::hydrate;

	#[cfg(feature = "ssr")]
	pub use crate::{SsrOptions, SsrRenderer, render_to_string};
}
