//! Server-side rendering of a [`VNode`] tree to an HTML string.
//!
//! Rendering needs no host backend. Components run inside a throwaway hook
//! context: hooks return their initial values, providers are honoured, and
//! effects are recorded but never run since there is no commit phase.

use std::rc::Rc;

pub use tiny_react_dom::escape_html;
use tiny_react_dom::{is_void_element, reflected_attribute};

use crate::context::ContextMap;
use crate::error::Result;
use crate::hooks::{HookContext, Hooks};
use crate::scheduler::Instance;
use crate::vnode::{PropValue, RESERVED_PROPS, VCustom, VNode, VTag, listener_event};

/// Renders `vnode` to markup.
///
/// Adjacent text nodes are written back to back, so a text run may cover
/// several text nodes; hydration splits it again.
///
/// ```ignore
/// let html = render_to_string(&el("div").prop("className", "a").child("hi").build())?;
/// assert_eq!(html, r#"<div class="a">hi</div>"#);
/// ```
pub fn render_to_string(vnode: &VNode) -> Result<String> {
	tracing::debug!(kind = vnode.kind(), "render to string");
	let mut writer = Writer::default();
	writer.write_node(vnode, &ContextMap::default())?;
	Ok(writer.out)
}

/// Attribute name written for a prop: reflected names map to their attribute,
/// everything else is lowercased.
fn attribute_name(prop: &str) -> String {
	reflected_attribute(prop).unwrap_or_else(|| prop.to_ascii_lowercase())
}

#[derive(Default)]
struct Writer {
	out: String,
	/// `value` of each enclosing `select`, innermost last.
	selects: Vec<Option<String>>,
}

impl Writer {
	fn write_node(&mut self, vnode: &VNode, contexts: &ContextMap) -> Result<()> {
		match vnode {
			VNode::Empty => {}
			VNode::Text(data) => self.out.push_str(&escape_html(data)),
			VNode::Tag(vtag) => self.write_tag(vtag, contexts)?,
			VNode::Fragment(vfragment) => {
				for child in &vfragment.children {
					self.write_node(child, contexts)?;
				}
			}
			VNode::Custom(vcustom) => self.write_custom(vcustom, contexts)?,
		}
		Ok(())
	}

	fn write_custom(&mut self, vcustom: &Rc<VCustom>, contexts: &ContextMap) -> Result<()> {
		let instance = Instance::detached(vcustom.def.name());
		let mut hook_context = HookContext::default();
		let (vchild, child_contexts) = {
			let mut hooks = Hooks::new(&mut hook_context, &instance, contexts.clone());
			let vchild = (vcustom.def.render)(&*vcustom.props, &mut hooks)?;
			(vchild, hooks.into_contexts())
		};
		self.write_node(&vchild, &child_contexts)
	}

	fn write_tag(&mut self, vtag: &VTag, contexts: &ContextMap) -> Result<()> {
		let name = vtag.name.as_ref();
		let value = vtag.props.get("value").and_then(PropValue::to_attribute_value);

		self.out.push('<');
		self.out.push_str(name);
		if name == "option" && value.is_some() && self.selects.last().is_some_and(|v| *v == value) {
			self.out.push_str(" selected=\"true\"");
		}
		for (prop, prop_value) in vtag.props.iter() {
			if RESERVED_PROPS.contains(&prop) || listener_event(prop).is_some() {
				continue;
			}
			if prop == "value" && matches!(name, "textarea" | "select") {
				continue;
			}
			let Some(attr_value) = prop_value.to_attribute_value() else {
				continue;
			};
			self.out.push(' ');
			self.out.push_str(&attribute_name(prop));
			self.out.push_str("=\"");
			self.out.push_str(&escape_html(&attr_value));
			self.out.push('"');
		}
		if is_void_element(name) {
			self.out.push_str("/>");
			return Ok(());
		}
		self.out.push('>');

		match name {
			"textarea" if value.is_some() => {
				self.out.push_str(&escape_html(value.as_deref().unwrap_or_default()));
			}
			"select" => {
				self.selects.push(value);
				let written = self.write_node(&vtag.child, contexts);
				self.selects.pop();
				written?;
			}
			_ => self.write_node(&vtag.child, contexts)?,
		}

		self.out.push_str("</");
		self.out.push_str(name);
		self.out.push('>');
		Ok(())
	}
}

/// Options for full-page server rendering.
#[derive(Debug, Clone)]
pub struct SsrOptions {
	/// Language attribute of the `html` element.
	pub lang: String,
	/// Id of the element the markup is mounted in.
	pub root_id: String,
	/// Whether to emit `<!DOCTYPE html>`.
	pub doctype: bool,
}

impl Default for SsrOptions {
	fn default() -> Self {
		Self {
			lang: "en".to_string(),
			root_id: "app".to_string(),
			doctype: true,
		}
	}
}

impl SsrOptions {
	/// Creates new default options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the language.
	pub fn lang(mut self, lang: impl Into<String>) -> Self {
		self.lang = lang.into();
		self
	}

	/// Sets the id of the mount element.
	pub fn root_id(mut self, id: impl Into<String>) -> Self {
		self.root_id = id.into();
		self
	}

	/// Omits the doctype.
	pub fn no_doctype(mut self) -> Self {
		self.doctype = false;
		self
	}
}

/// Server renderer producing fragments or complete documents.
#[derive(Debug, Clone, Default)]
pub struct SsrRenderer {
	options: SsrOptions,
}

impl SsrRenderer {
	/// Creates a renderer with default options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a renderer with custom options.
	pub fn with_options(options: SsrOptions) -> Self {
		Self { options }
	}

	/// Rendering options.
	pub fn options(&self) -> &SsrOptions {
		&self.options
	}

	/// Renders `vnode` to markup, like [`render_to_string`].
	pub fn render(&self, vnode: &VNode) -> Result<String> {
		render_to_string(vnode)
	}

	/// Renders `vnode` into a complete HTML document.
	pub fn render_page(&self, vnode: &VNode) -> Result<String> {
		self.render_page_with_head(vnode, "")
	}

	/// Renders `vnode` into a complete HTML document, appending `head` (raw
	/// markup) to the document head.
	pub fn render_page_with_head(&self, vnode: &VNode, head: &str) -> Result<String> {
		let content = render_to_string(vnode)?;
		Ok(self.wrap_in_html(&content, head))
	}

	/// Wraps already rendered markup in a document.
	pub fn wrap_in_html(&self, content: &str, head: &str) -> String {
		let mut html = String::with_capacity(content.len() + head.len() + 256);

		if self.options.doctype {
			html.push_str("<!DOCTYPE html>\n");
		}
		html.push_str(&format!("<html lang=\"{}\">\n", escape_html(&self.options.lang)));

		html.push_str("<head>\n");
		html.push_str("<meta charset=\"UTF-8\">\n");
		html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
		html.push_str(head);
		html.push_str("</head>\n");

		html.push_str("<body>\n");
		html.push_str(&format!("<div id=\"{}\">", escape_html(&self.options.root_id)));
		html.push_str(content);
		html.push_str("</div>\n");
		html.push_str("</body>\n");
		html.push_str("</html>");
		html
	}
}
