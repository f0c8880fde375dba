//! tiny-react core - a retained-mode UI engine
//!
//! An immutable virtual tree ([`VNode`]) describes the UI for one pass. The
//! reconciler diffs it against the mutable bundle tree ([`BNode`]) of the
//! previous pass and patches the host tree with as few mutations as it can,
//! keeping host nodes whose kind and key are unchanged.
//!
//! ## Modules
//!
//! - [`vnode`]: virtual nodes, props, keys and function components
//! - [`bnode`]: the bundle tree bound to live host nodes
//! - [`hooks`]: positional state, memo, ref and effect hooks
//! - [`context`]: values provided to a subtree without threading props
//! - [`reconciler`]: `render` and the diff/patch algorithm
//! - [`ssr`]: rendering to an HTML string (feature `ssr`)
//! - `hydrate`: attaching to server-rendered markup (feature `hydrate`)
//!
//! ## Example
//!
//! ```ignore
//! use tiny_react_core::{Component, Hooks, el, render};
//! use tiny_react_dom::Node;
//!
//! let counter = Component::new(|start: &i64, hooks: &mut Hooks<'_>| {
//!     let (count, set_count) = hooks.use_state(|| *start)?;
//!     Ok(el("button")
//!         .on("click", move |_| set_count.update(|n| n + 1))
//!         .child(count)
//!         .build())
//! });
//!
//! let container = Node::element("main");
//! let bundle = render(counter.el(0), &container, None)?;
//! container.first_child().unwrap().dispatch_event("click");
//! assert_eq!(container.inner_html(), "<button>1</button>");
//! ```

#![warn(missing_docs)]

pub mod bnode;
pub mod context;
pub mod error;
pub mod hooks;
mod hydration;
pub mod reconciler;
mod scheduler;
#[cfg(feature = "ssr")]
pub mod ssr;
pub mod vnode;

pub use bnode::BNode;
pub use context::{Context, ContextId, ContextMap, ContextStore, ProviderProps};
pub use error::{Error, Result};
pub use hooks::{Cleanup, Dispatch, HookContext, Hooks, Ref, SetState, cleanup};
#[cfg(feature = "hydrate")]
pub use hydration::hydrate;
pub use reconciler::{Bundle, render};
#[cfg(feature = "ssr")]
pub use ssr::{SsrOptions, SsrRenderer, render_to_string};
pub use vnode::{
	Component, ComponentDef, EVENT_PREFIX, Key, Listener, PropValue, Props, RESERVED_PROPS,
	RefCallback, TagBuilder, VCustom, VFragment, VNode, VTag, el,
};
