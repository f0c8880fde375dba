//! Virtual nodes: the immutable description of UI for one render pass.
//!
//! A [`VNode`] is cheap to clone (every non-empty variant is behind an `Rc`)
//! and is never mutated once built. The reconciler pairs it with the
//! previous [`BNode`](crate::bnode::BNode) tree and discards it afterwards,
//! except for the copy each bundle node keeps to diff against next time.

use std::any::{Any, type_name};
use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use tiny_react_dom::{Event, EventListener, Node};

use crate::error::{Error, Result};
use crate::hooks::Hooks;

/// Prefix that marks a prop as an event listener (`onclick` → `click`).
pub const EVENT_PREFIX: &str = "on";

/// Prop names that are never forwarded to the host or emitted as attributes.
pub const RESERVED_PROPS: &[&str] = &["key", "ref", "children"];

/// Returns the event name for a listener prop, or `None` for ordinary props.
pub fn listener_event(prop: &str) -> Option<String> {
	prop.strip_prefix(EVENT_PREFIX)
		.map(str::to_ascii_lowercase)
}

/// Key used to match siblings across renders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
	/// String key.
	Str(Rc<str>),
	/// Numeric key.
	Num(i64),
}

impl From<&str> for Key {
	fn from(value: &str) -> Self {
		Self::Str(value.into())
	}
}

impl From<String> for Key {
	fn from(value: String) -> Self {
		Self::Str(value.into())
	}
}

impl From<i64> for Key {
	fn from(value: i64) -> Self {
		Self::Num(value)
	}
}

impl From<i32> for Key {
	fn from(value: i32) -> Self {
		Self::Num(value.into())
	}
}

impl From<usize> for Key {
	fn from(value: usize) -> Self {
		// keys beyond i64::MAX are not meaningful list positions
		Self::Num(i64::try_from(value).unwrap_or(i64::MAX))
	}
}

impl fmt::Display for Key {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Str(s) => f.write_str(s),
			Self::Num(n) => write!(f, "{n}"),
		}
	}
}

/// Event handler attached through an `on*` prop.
///
/// Equality is identity: two listeners are equal only when they share the
/// same allocation, so re-creating a closure on every render re-binds it.
#[derive(Clone)]
pub struct Listener(pub(crate) EventListener);

impl Listener {
	/// Wraps a closure.
	pub fn new(f: impl Fn(&Event) + 'static) -> Self {
		Self(Rc::new(f))
	}

	/// The host-level listener.
	pub fn as_event_listener(&self) -> &EventListener {
		&self.0
	}
}

impl PartialEq for Listener {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

impl fmt::Debug for Listener {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("Listener(..)")
	}
}

/// Ref callback invoked with the mounted element, and with `None` once it is detached.
#[derive(Clone)]
pub struct RefCallback(Rc<dyn Fn(Option<&Node>)>);

impl RefCallback {
	/// Wraps a closure.
	pub fn new(f: impl Fn(Option<&Node>) + 'static) -> Self {
		Self(Rc::new(f))
	}

	pub(crate) fn call(&self, node: Option<&Node>) {
		(self.0)(node);
	}
}

impl PartialEq for RefCallback {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

impl fmt::Debug for RefCallback {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("RefCallback(..)")
	}
}

/// Value of a tag prop.
#[derive(Debug, Clone)]
pub enum PropValue {
	/// String value.
	Str(Cow<'static, str>),
	/// Boolean value.
	Bool(bool),
	/// Integer value.
	Int(i64),
	/// Floating point value.
	Float(f64),
	/// Event listener; only valid for `on*` props.
	Listener(Listener),
}

impl PropValue {
	/// String form used for attributes and server-rendered markup.
	pub fn to_attribute_value(&self) -> Option<String> {
		match self {
			Self::Str(s) => Some(s.to_string()),
			Self::Bool(b) => Some(b.to_string()),
			Self::Int(n) => Some(n.to_string()),
			Self::Float(n) => Some(n.to_string()),
			Self::Listener(_) => None,
		}
	}
}

// identity semantics: floats compare bit-for-bit, listeners by allocation
impl PartialEq for PropValue {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Str(a), Self::Str(b)) => a == b,
			(Self::Bool(a), Self::Bool(b)) => a == b,
			(Self::Int(a), Self::Int(b)) => a == b,
			(Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
			(Self::Listener(a), Self::Listener(b)) => a == b,
			_ => false,
		}
	}
}

impl From<&'static str> for PropValue {
	fn from(value: &'static str) -> Self {
		Self::Str(Cow::Borrowed(value))
	}
}

impl From<String> for PropValue {
	fn from(value: String) -> Self {
		Self::Str(Cow::Owned(value))
	}
}

impl From<bool> for PropValue {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<i64> for PropValue {
	fn from(value: i64) -> Self {
		Self::Int(value)
	}
}

impl From<i32> for PropValue {
	fn from(value: i32) -> Self {
		Self::Int(value.into())
	}
}

impl From<f64> for PropValue {
	fn from(value: f64) -> Self {
		Self::Float(value)
	}
}

impl From<Listener> for PropValue {
	fn from(value: Listener) -> Self {
		Self::Listener(value)
	}
}

/// Ordered prop list of a tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Props(Vec<(Cow<'static, str>, PropValue)>);

impl Props {
	/// Creates an empty prop list.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets `name`, replacing an earlier value in place.
	pub fn insert(&mut self, name: impl Into<Cow<'static, str>>, value: impl Into<PropValue>) {
		let name = name.into();
		let value = value.into();
		match self.0.iter_mut().find(|(k, _)| *k == name) {
			Some((_, v)) => *v = value,
			None => self.0.push((name, value)),
		}
	}

	/// Looks up a prop.
	pub fn get(&self, name: &str) -> Option<&PropValue> {
		self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
	}

	/// Returns whether `name` is present.
	pub fn contains(&self, name: &str) -> bool {
		self.get(name).is_some()
	}

	/// Iterates props in insertion order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
		self.0.iter().map(|(k, v)| (k.as_ref(), v))
	}

	/// Number of props.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when there are no props.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl<K, V> FromIterator<(K, V)> for Props
where
	K: Into<Cow<'static, str>>,
	V: Into<PropValue>,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		let mut props = Self::new();
		for (k, v) in iter {
			props.insert(k, v);
		}
		props
	}
}

/// Host element description.
#[derive(Debug)]
pub struct VTag {
	/// Sibling-matching key.
	pub key: Option<Key>,
	/// Tag name, lowercase.
	pub name: Cow<'static, str>,
	/// Props, including `on*` listeners.
	pub props: Props,
	/// Optional ref callback.
	pub ref_callback: Option<RefCallback>,
	/// The single child; multiple children are wrapped in a fragment.
	pub child: VNode,
}

/// Ordered group of siblings without a wrapper element.
#[derive(Debug)]
pub struct VFragment {
	/// Sibling-matching key.
	pub key: Option<Key>,
	/// Children in document order.
	pub children: Vec<VNode>,
}

pub(crate) type RenderFn = dyn Fn(&dyn Any, &mut Hooks<'_>) -> Result<VNode>;
type PropsEq = fn(&dyn Any, &dyn Any) -> bool;

/// Type-erased component definition; its address is the component identity.
pub struct ComponentDef {
	name: &'static str,
	pub(crate) render: Box<RenderFn>,
	pub(crate) props_eq: Option<PropsEq>,
}

impl ComponentDef {
	/// Diagnostic name of the component.
	pub fn name(&self) -> &'static str {
		self.name
	}
}

impl fmt::Debug for ComponentDef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ComponentDef")
			.field("name", &self.name)
			.field("memo", &self.props_eq.is_some())
			.finish()
	}
}

/// Function component description.
pub struct VCustom {
	/// Sibling-matching key.
	pub key: Option<Key>,
	/// Type-erased props handed to the render function.
	pub props: Rc<dyn Any>,
	/// The component being rendered.
	pub def: Rc<ComponentDef>,
}

impl VCustom {
	/// Returns whether `other` renders the same component (same definition).
	pub fn same_component(&self, other: &VCustom) -> bool {
		Rc::ptr_eq(&self.def, &other.def)
	}
}

impl fmt::Debug for VCustom {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("VCustom")
			.field("key", &self.key)
			.field("component", &self.def.name)
			.finish()
	}
}

/// Immutable virtual node.
#[derive(Debug, Clone, Default)]
pub enum VNode {
	/// Renders nothing.
	#[default]
	Empty,
	/// Host element.
	Tag(Rc<VTag>),
	/// Text node.
	Text(Rc<str>),
	/// Function component.
	Custom(Rc<VCustom>),
	/// Fragment.
	Fragment(Rc<VFragment>),
}

impl VNode {
	/// Text node.
	pub fn text(data: impl Into<Rc<str>>) -> Self {
		Self::Text(data.into())
	}

	/// Unkeyed fragment.
	pub fn fragment(children: impl IntoIterator<Item = VNode>) -> Self {
		Self::Fragment(Rc::new(VFragment {
			key: None,
			children: children.into_iter().collect(),
		}))
	}

	/// Keyed fragment.
	pub fn keyed_fragment(key: impl Into<Key>, children: impl IntoIterator<Item = VNode>) -> Self {
		Self::Fragment(Rc::new(VFragment {
			key: Some(key.into()),
			children: children.into_iter().collect(),
		}))
	}

	/// Sibling-matching key, when the variant carries one.
	pub fn key(&self) -> Option<&Key> {
		match self {
			Self::Tag(t) => t.key.as_ref(),
			Self::Custom(c) => c.key.as_ref(),
			Self::Fragment(f) => f.key.as_ref(),
			Self::Empty | Self::Text(_) => None,
		}
	}

	/// Short kind name for diagnostics.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Empty => "empty",
			Self::Tag(_) => "tag",
			Self::Text(_) => "text",
			Self::Custom(_) => "custom",
			Self::Fragment(_) => "fragment",
		}
	}
}

impl From<&str> for VNode {
	fn from(value: &str) -> Self {
		Self::text(value)
	}
}

impl From<String> for VNode {
	fn from(value: String) -> Self {
		Self::text(value)
	}
}

impl From<i64> for VNode {
	fn from(value: i64) -> Self {
		Self::text(value.to_string())
	}
}

impl From<i32> for VNode {
	fn from(value: i32) -> Self {
		Self::text(value.to_string())
	}
}

impl From<Option<VNode>> for VNode {
	fn from(value: Option<VNode>) -> Self {
		value.unwrap_or_default()
	}
}

impl From<Vec<VNode>> for VNode {
	fn from(value: Vec<VNode>) -> Self {
		Self::fragment(value)
	}
}

impl From<TagBuilder> for VNode {
	fn from(value: TagBuilder) -> Self {
		value.build()
	}
}

/// Starts building a host element.
pub fn el(name: impl Into<Cow<'static, str>>) -> TagBuilder {
	TagBuilder {
		key: None,
		name: name.into(),
		props: Props::new(),
		ref_callback: None,
		children: Vec::new(),
	}
}

/// Builder for [`VTag`].
#[derive(Debug)]
pub struct TagBuilder {
	key: Option<Key>,
	name: Cow<'static, str>,
	props: Props,
	ref_callback: Option<RefCallback>,
	children: Vec<VNode>,
}

impl TagBuilder {
	/// Sets the key.
	pub fn key(mut self, key: impl Into<Key>) -> Self {
		self.key = Some(key.into());
		self
	}

	/// Sets a prop.
	pub fn prop(mut self, name: impl Into<Cow<'static, str>>, value: impl Into<PropValue>) -> Self {
		self.props.insert(name, value);
		self
	}

	/// Attaches a listener for `event` (stored as the `on{event}` prop).
	pub fn on(mut self, event: &str, listener: impl Fn(&Event) + 'static) -> Self {
		self.props
			.insert(format!("{EVENT_PREFIX}{event}"), Listener::new(listener));
		self
	}

	/// Attaches an existing listener, keeping its identity across renders.
	pub fn listener(mut self, event: &str, listener: &Listener) -> Self {
		self.props
			.insert(format!("{EVENT_PREFIX}{event}"), listener.clone());
		self
	}

	/// Sets the ref callback.
	pub fn node_ref(mut self, callback: &RefCallback) -> Self {
		self.ref_callback = Some(callback.clone());
		self
	}

	/// Appends one child.
	pub fn child(mut self, child: impl Into<VNode>) -> Self {
		self.children.push(child.into());
		self
	}

	/// Appends a list of children as one (possibly keyed) fragment child.
	pub fn children(mut self, children: impl IntoIterator<Item = VNode>) -> Self {
		self.children.push(VNode::fragment(children));
		self
	}

	/// Finishes the element. A single child is used as-is, several become a fragment.
	pub fn build(self) -> VNode {
		let mut children = self.children;
		let child = match children.len() {
			0 => VNode::Empty,
			1 => children.pop().unwrap_or_default(),
			_ => VNode::fragment(children),
		};
		VNode::Tag(Rc::new(VTag {
			key: self.key,
			name: self.name,
			props: self.props,
			ref_callback: self.ref_callback,
			child,
		}))
	}
}

/// Typed handle to a function component.
///
/// The handle's allocation is the component identity: clones are the same
/// component, while two `Component::new` calls with the same function are
/// different components and never reuse each other's state.
pub struct Component<P> {
	def: Rc<ComponentDef>,
	_props: PhantomData<fn(&P)>,
}

impl<P> Clone for Component<P> {
	fn clone(&self) -> Self {
		Self {
			def: Rc::clone(&self.def),
			_props: PhantomData,
		}
	}
}

impl<P> fmt::Debug for Component<P> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Component").field(&self.def.name).finish()
	}
}

impl<P: 'static> Component<P> {
	fn with_eq<F>(render: F, props_eq: Option<PropsEq>) -> Self
	where
		F: Fn(&P, &mut Hooks<'_>) -> Result<VNode> + 'static,
	{
		let name = type_name::<F>();
		let erased = move |props: &dyn Any, hooks: &mut Hooks<'_>| -> Result<VNode> {
			let props = props
				.downcast_ref::<P>()
				.ok_or(Error::PropsType { component: name })?;
			render(props, hooks)
		};
		Self {
			def: Rc::new(ComponentDef {
				name,
				render: Box::new(erased),
				props_eq,
			}),
			_props: PhantomData,
		}
	}

	/// Defines a component from its render function.
	pub fn new<F>(render: F) -> Self
	where
		F: Fn(&P, &mut Hooks<'_>) -> Result<VNode> + 'static,
	{
		Self::with_eq(render, None)
	}

	/// Component description with `props`.
	pub fn el(&self, props: P) -> VNode {
		self.build(None, props)
	}

	/// Keyed component description with `props`.
	pub fn keyed(&self, key: impl Into<Key>, props: P) -> VNode {
		self.build(Some(key.into()), props)
	}

	fn build(&self, key: Option<Key>, props: P) -> VNode {
		VNode::Custom(Rc::new(VCustom {
			key,
			props: Rc::new(props),
			def: Rc::clone(&self.def),
		}))
	}

	/// Diagnostic name (the render function's type name).
	pub fn name(&self) -> &'static str {
		self.def.name
	}
}

impl<P: PartialEq + 'static> Component<P> {
	/// Defines a memoized component: a re-render whose props compare equal to
	/// the previous ones skips the render function and keeps the subtree.
	pub fn memo<F>(render: F) -> Self
	where
		F: Fn(&P, &mut Hooks<'_>) -> Result<VNode> + 'static,
	{
		fn props_eq<P: PartialEq + 'static>(a: &dyn Any, b: &dyn Any) -> bool {
			match (a.downcast_ref::<P>(), b.downcast_ref::<P>()) {
				(Some(a), Some(b)) => a == b,
				_ => false,
			}
		}
		Self::with_eq(render, Some(props_eq::<P>))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_build_unwraps_single_child() {
		let node = el("div").child("hello").build();
		let VNode::Tag(tag) = node else {
			panic!("expected tag");
		};
		assert!(matches!(&tag.child, VNode::Text(t) if &**t == "hello"));
	}

	#[rstest]
	fn test_build_wraps_many_children() {
		let node = el("div").child("a").child(el("span")).build();
		let VNode::Tag(tag) = node else {
			panic!("expected tag");
		};
		let VNode::Fragment(fragment) = &tag.child else {
			panic!("expected fragment");
		};
		assert_eq!(fragment.children.len(), 2);
	}

	#[rstest]
	fn test_children_become_one_fragment_child() {
		let items = (0..1).map(|i| el("li").key(i).build());
		let node = el("ul").children(items).build();
		let VNode::Tag(tag) = node else {
			panic!("expected tag");
		};
		assert!(matches!(&tag.child, VNode::Fragment(f) if f.children.len() == 1));
	}

	#[rstest]
	fn test_props_insert_replaces_in_place() {
		let mut props = Props::new();
		props.insert("a", 1);
		props.insert("b", "x");
		props.insert("a", 2);
		let names: Vec<_> = props.iter().map(|(k, _)| k).collect();
		assert_eq!(names, ["a", "b"]);
		assert_eq!(props.get("a"), Some(&PropValue::Int(2)));
	}

	#[rstest]
	#[case(PropValue::Float(0.0), PropValue::Float(-0.0), false)]
	#[case(PropValue::Float(f64::NAN), PropValue::Float(f64::NAN), true)]
	#[case(PropValue::from("1"), PropValue::Int(1), false)]
	fn test_prop_value_identity(#[case] a: PropValue, #[case] b: PropValue, #[case] equal: bool) {
		assert_eq!(a == b, equal);
	}

	#[rstest]
	fn test_listener_identity() {
		let a = Listener::new(|_| {});
		let b = Listener::new(|_| {});
		assert_eq!(a, a.clone());
		assert_ne!(a, b);
	}

	#[rstest]
	fn test_component_identity() {
		fn view(_: &(), _: &mut Hooks<'_>) -> Result<VNode> {
			Ok(VNode::Empty)
		}
		let a = Component::new(view);
		let b = Component::new(view);
		let (VNode::Custom(x), VNode::Custom(y), VNode::Custom(z)) = (a.el(()), a.clone().el(()), b.el(())) else {
			panic!("expected custom nodes");
		};
		assert!(x.same_component(&y));
		assert!(!x.same_component(&z));
	}

	#[rstest]
	fn test_listener_event_name() {
		assert_eq!(listener_event("onClick").as_deref(), Some("click"));
		assert_eq!(listener_event("class"), None);
	}
}
