//! Engine errors.

use tiny_react_dom::DomError;

/// Result alias used throughout the engine.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while rendering, committing or hydrating.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
	/// The server-rendered host tree does not have the expected shape.
	#[error("hydration mismatch: expected {expected}, found {actual}")]
	HydrationMismatch {
		/// What the virtual tree asked for (tag name or `#text`).
		expected: String,
		/// Node name found in the host tree, or `null` when it ran out.
		actual: String,
	},

	/// An `on*` prop carries a value that is not a listener.
	#[error("prop `{prop}` must be an event listener")]
	InvalidListener {
		/// The offending prop name.
		prop: String,
	},

	/// A component requested an update of itself (or an ancestor) while rendering.
	#[error("component `{component}` requested an update while rendering")]
	ReentrantUpdate {
		/// Diagnostic name of the component whose update was requested.
		component: &'static str,
	},

	/// A hook call landed on a slot created by a different kind of hook.
	#[error("hook #{index} changed between renders: expected {expected}, found {found}")]
	HookOrder {
		/// Position of the hook call within the render.
		index: usize,
		/// What the current call needs.
		expected: &'static str,
		/// What the slot holds.
		found: &'static str,
	},

	/// A render called a different number of hooks than the first render.
	#[error("component called {actual} hooks but its first render called {expected}")]
	HookCount {
		/// Hook count of the first render.
		expected: usize,
		/// Hook count of this render.
		actual: usize,
	},

	/// Props handed to a component are not of the type it was defined with.
	#[error("props passed to `{component}` have the wrong type")]
	PropsType {
		/// Diagnostic name of the component.
		component: &'static str,
	},

	/// Host tree operation failed.
	#[error(transparent)]
	Host(#[from] DomError),
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_hydration_mismatch_message() {
		let err = Error::HydrationMismatch {
			expected: "div".to_string(),
			actual: "SPAN".to_string(),
		};
		assert_eq!(err.to_string(), "hydration mismatch: expected div, found SPAN");
	}

	#[rstest]
	fn test_host_error_is_transparent() {
		let dom = DomError::InvalidOffset { offset: 9, len: 2 };
		let err: Error = dom.clone().into();
		assert_eq!(err.to_string(), dom.to_string());
	}
}
