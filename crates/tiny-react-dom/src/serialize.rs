//! HTML serialization of host nodes.

use crate::node::{Node, NodeData, is_void_element};

/// Escapes `& < > " '` for both text and attribute values.
pub fn escape_html(s: &str) -> String {
	let mut out = String::with_capacity(s.len());
	for c in s.chars() {
		match c {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' => out.push_str("&quot;"),
			'\'' => out.push_str("&#x27;"),
			_ => out.push(c),
		}
	}
	out
}

pub(crate) fn write_node(node: &Node, out: &mut String) {
	let tag = {
		let data = node.0.data.borrow();
		match &*data {
			NodeData::Text(text) => {
				out.push_str(&escape_html(text));
				return;
			}
			NodeData::Element(el) => {
				out.push('<');
				out.push_str(&el.tag);
				for (name, value) in &el.attributes {
					out.push(' ');
					out.push_str(name);
					out.push_str("=\"");
					out.push_str(&escape_html(value));
					out.push('"');
				}
				out.push('>');
				el.tag.clone()
			}
		}
	};
	if is_void_element(&tag) {
		return;
	}
	for child in node.child_nodes() {
		write_node(&child, out);
	}
	out.push_str("</");
	out.push_str(&tag);
	out.push('>');
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_serialize_nested() {
		let div = Node::element("div");
		div.set_attribute("class", "a").unwrap();
		div.append_child(&Node::text("hello"));
		let span = Node::element("span");
		span.append_child(&Node::text("world"));
		div.append_child(&span);

		assert_eq!(
			div.outer_html(),
			"<div class=\"a\">hello<span>world</span></div>"
		);
	}

	#[rstest]
	fn test_serialize_escapes() {
		let p = Node::element("p");
		p.set_attribute("title", "a \"b\" & c").unwrap();
		p.append_child(&Node::text("<x> & y"));

		assert_eq!(
			p.outer_html(),
			"<p title=\"a &quot;b&quot; &amp; c\">&lt;x&gt; &amp; y</p>"
		);
	}

	#[rstest]
	fn test_serialize_escapes_apostrophe() {
		let p = Node::element("p");
		p.set_attribute("title", "it's").unwrap();
		p.append_child(&Node::text("'"));
		assert_eq!(p.outer_html(), "<p title=\"it&#x27;s\">&#x27;</p>");
	}

	#[rstest]
	fn test_serialize_void() {
		let div = Node::element("div");
		div.append_child(&Node::element("br"));
		assert_eq!(div.outer_html(), "<div><br></div>");
	}
}
