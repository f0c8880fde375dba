//! HTML fragment parsing.
//!
//! Markup is parsed by `scraper` (html5ever) in a `<body>` context, so
//! malformed input is repaired the way a browser repairs it. The parsed tree
//! is then copied into detached host nodes. Comments and doctypes are dropped.

use scraper::{ElementRef, Html};

use crate::error::DomError;
use crate::node::Node;

/// Parses `html` into a list of detached top-level nodes.
pub fn parse_fragment(html: &str) -> Result<Vec<Node>, DomError> {
	let document = Html::parse_fragment(html);
	tracing::trace!(len = html.len(), "parse fragment");
	convert_children(document.root_element())
}

fn convert_children(element: ElementRef<'_>) -> Result<Vec<Node>, DomError> {
	let mut nodes = Vec::new();
	for child in element.children() {
		if let Some(text) = child.value().as_text() {
			nodes.push(Node::text(&**text));
		} else if let Some(child) = ElementRef::wrap(child) {
			nodes.push(convert_element(child)?);
		}
	}
	Ok(nodes)
}

fn convert_element(element: ElementRef<'_>) -> Result<Node, DomError> {
	let value = element.value();
	let node = Node::element(value.name());
	for (name, attribute) in value.attrs() {
		node.set_attribute(name, attribute)?;
	}
	for child in convert_children(element)? {
		node.append_child(&child);
	}
	Ok(node)
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn roundtrip(html: &str) -> String {
		let div = Node::element("div");
		div.set_inner_html(html).unwrap();
		div.inner_html()
	}

	#[rstest]
	#[case("<span></span>")]
	#[case("<div class=\"a\">hello<span>world</span></div>")]
	#[case("<ul><li>1</li><li>2</li></ul>")]
	#[case("<div><input><br></div>")]
	fn test_parse_serialize_roundtrip(#[case] html: &str) {
		assert_eq!(roundtrip(html), html);
	}

	#[rstest]
	fn test_parse_self_closing_void() {
		assert_eq!(roundtrip("<div><input/><br/></div>"), "<div><input><br></div>");
	}

	#[rstest]
	fn test_parse_attributes() {
		let nodes = parse_fragment("<input type=text disabled value='a &amp; b'>").unwrap();
		assert_eq!(nodes.len(), 1);
		let input = &nodes[0];
		assert_eq!(input.get_attribute("type").as_deref(), Some("text"));
		assert_eq!(input.get_attribute("disabled").as_deref(), Some(""));
		assert_eq!(input.get_attribute("value").as_deref(), Some("a & b"));
	}

	#[rstest]
	fn test_parse_decodes_text() {
		let nodes = parse_fragment("&lt;hehe /&gt;&#x27;&quot;&#39;").unwrap();
		assert_eq!(nodes.len(), 1);
		assert_eq!(nodes[0].text_data().as_deref(), Some("<hehe />'\"'"));
	}

	#[rstest]
	fn test_parse_skips_comments_and_doctype() {
		let nodes = parse_fragment("<!DOCTYPE html><!-- x --><p>a</p>").unwrap();
		assert_eq!(nodes.len(), 1);
		assert_eq!(nodes[0].node_name(), "P");
	}

	#[rstest]
	fn test_parse_keeps_lone_angle_bracket_as_text() {
		let nodes = parse_fragment("a < b").unwrap();
		assert_eq!(nodes.len(), 1);
		assert_eq!(nodes[0].text_data().as_deref(), Some("a < b"));
	}

	#[rstest]
	fn test_parse_lowercases_tag_names() {
		let nodes = parse_fragment("<DIV><SPAN>x</SPAN></DIV>").unwrap();
		assert_eq!(nodes[0].local_name().as_deref(), Some("div"));
		assert_eq!(nodes[0].outer_html(), "<div><span>x</span></div>");
	}

	#[rstest]
	#[case("<div><span></div>", "<div><span></span></div>")]
	#[case("<p>", "<p></p>")]
	#[case("<p>a<div>b</div>", "<p>a</p><div>b</div>")]
	fn test_parse_repairs_malformed_markup(#[case] html: &str, #[case] expected: &str) {
		assert_eq!(roundtrip(html), expected);
	}

	#[rstest]
	fn test_parsed_nodes_are_detached() {
		let nodes = parse_fragment("<b></b>text").unwrap();
		assert_eq!(nodes.len(), 2);
		assert!(nodes.iter().all(|node| node.parent_node().is_none()));
	}
}
