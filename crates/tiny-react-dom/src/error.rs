//! Errors raised by host tree operations.

/// Host tree error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
	/// `insert_before` was given a reference node that is not a child of the parent.
	#[error("reference node is not a child of <{parent}>")]
	NotAChild {
		/// Node name of the parent.
		parent: String,
	},
	/// An element-only operation was called on a text node, or vice versa.
	#[error("operation `{operation}` is not supported on {node}")]
	WrongNodeKind {
		/// The attempted operation.
		operation: &'static str,
		/// Node name of the receiver.
		node: String,
	},
	/// `split_text` offset is past the end or inside a UTF-8 sequence.
	#[error("invalid text offset {offset} for text of length {len}")]
	InvalidOffset {
		/// Requested byte offset.
		offset: usize,
		/// Byte length of the text data.
		len: usize,
	},
}
