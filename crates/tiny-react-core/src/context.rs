//! Render-time context: values injected into a subtree without threading props.
//!
//! A [`Context`] renders as a transparent provider component. Each provider
//! instance owns a [`ContextStore`] holding the current value and the
//! components that read it. The provider pushes its store onto an immutable
//! [`ContextMap`] which the reconciler passes down the render call chain, so
//! the nearest enclosing provider shadows outer ones.
//!
//! Readers subscribe to the store. When the provided value changes, every
//! subscriber is queued for an update, which reaches components behind a
//! memoized parent that would otherwise skip their render.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Result;
use crate::hooks::{Hooks, cleanup};
use crate::scheduler::Instance;
use crate::vnode::{Component, Key, VNode};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identity of a [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
	fn next() -> Self {
		Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
	}
}

/// Immutable map of active context stores, shared copy-on-write.
#[derive(Clone, Default)]
pub struct ContextMap(Rc<HashMap<ContextId, Rc<dyn Any>>>);

impl ContextMap {
	/// Returns a map with `store` registered under `id`, shadowing an outer store.
	pub(crate) fn with(&self, id: ContextId, store: Rc<dyn Any>) -> Self {
		let mut map = (*self.0).clone();
		map.insert(id, store);
		Self(Rc::new(map))
	}

	pub(crate) fn get(&self, id: ContextId) -> Option<Rc<dyn Any>> {
		self.0.get(&id).cloned()
	}

	/// Number of active providers.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when no provider is active.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl fmt::Debug for ContextMap {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_set().entries(self.0.keys()).finish()
	}
}

/// Value and subscribers of one provider instance.
pub struct ContextStore<T> {
	value: RefCell<T>,
	subscribers: RefCell<Vec<Weak<Instance>>>,
}

impl<T: Clone + PartialEq + 'static> ContextStore<T> {
	fn new(value: T) -> Self {
		Self {
			value: RefCell::new(value),
			subscribers: RefCell::new(Vec::new()),
		}
	}

	/// Current value.
	pub fn value(&self) -> T {
		self.value.borrow().clone()
	}

	/// Number of live subscribers.
	pub fn subscriber_count(&self) -> usize {
		self.subscribers
			.borrow()
			.iter()
			.filter(|w| w.upgrade().is_some_and(|i| i.is_live()))
			.count()
	}

	fn subscribe(&self, instance: &Rc<Instance>) {
		let mut subscribers = self.subscribers.borrow_mut();
		subscribers.retain(|w| w.upgrade().is_some_and(|i| i.is_live()));
		if !subscribers
			.iter()
			.any(|w| std::ptr::eq(w.as_ptr(), Rc::as_ptr(instance)))
		{
			subscribers.push(Rc::downgrade(instance));
		}
	}

	/// Stores `value` and queues every subscriber when it differs from the current one.
	fn set(&self, value: T) {
		if *self.value.borrow() == value {
			return;
		}
		*self.value.borrow_mut() = value;
		let subscribers: Vec<_> = self
			.subscribers
			.borrow()
			.iter()
			.filter_map(Weak::upgrade)
			.collect();
		tracing::trace!(subscribers = subscribers.len(), "context value changed");
		for subscriber in subscribers {
			subscriber.request_update();
		}
	}

	fn clear(&self) {
		self.subscribers.borrow_mut().clear();
	}
}

/// Props of a context provider.
pub struct ProviderProps<T> {
	/// Value visible to the subtree.
	pub value: T,
	/// The subtree.
	pub children: VNode,
}

/// A context type: a default value plus the provider component.
///
/// ```ignore
/// let theme = Context::new("light");
/// let view = theme.provider("dark", app.el(()));
/// // inside a render function of `app`'s subtree:
/// let current = hooks.use_context(&theme);
/// ```
pub struct Context<T> {
	id: ContextId,
	default: T,
	provider: Component<ProviderProps<T>>,
}

impl<T: Clone> Clone for Context<T> {
	fn clone(&self) -> Self {
		Self {
			id: self.id,
			default: self.default.clone(),
			provider: self.provider.clone(),
		}
	}
}

impl<T: fmt::Debug> fmt::Debug for Context<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Context")
			.field("id", &self.id)
			.field("default", &self.default)
			.finish()
	}
}

impl<T: Clone + PartialEq + 'static> Context<T> {
	/// Creates a context whose readers see `default` outside any provider.
	pub fn new(default: T) -> Self {
		let id = ContextId::next();
		let provider = Component::new(move |props: &ProviderProps<T>, hooks: &mut Hooks<'_>| {
			let store = hooks.use_ref(|| Rc::new(ContextStore::new(props.value.clone())))?;
			let store = store.get();
			store.set(props.value.clone());
			let dropped = Rc::clone(&store);
			hooks.use_effect((), move || cleanup(move || dropped.clear()))?;
			hooks.contexts = hooks.contexts.with(id, store);
			Ok(props.children.clone())
		});
		Self {
			id,
			default,
			provider,
		}
	}

	/// Identity of this context.
	pub fn id(&self) -> ContextId {
		self.id
	}

	/// Value seen outside any provider.
	pub fn default_value(&self) -> &T {
		&self.default
	}

	/// Provides `value` to `children`.
	pub fn provider(&self, value: T, children: impl Into<VNode>) -> VNode {
		self.provider.el(ProviderProps {
			value,
			children: children.into(),
		})
	}

	/// Keyed provider.
	pub fn keyed_provider(&self, key: impl Into<Key>, value: T, children: impl Into<VNode>) -> VNode {
		self.provider.keyed(
			key,
			ProviderProps {
				value,
				children: children.into(),
			},
		)
	}
}

impl Hooks<'_> {
	/// Reads the value of the nearest enclosing provider of `context`, or its
	/// default value when there is none.
	///
	/// The component subscribes to that provider and re-renders whenever the
	/// provided value changes, even if its parent skipped rendering.
	pub fn use_context<T: Clone + PartialEq + 'static>(&mut self, context: &Context<T>) -> Result<T> {
		let Some(store) = self.contexts.get(context.id) else {
			return Ok(context.default.clone());
		};
		match store.downcast::<ContextStore<T>>() {
			Ok(store) => {
				store.subscribe(self.instance);
				Ok(store.value())
			}
			Err(_) => Ok(context.default.clone()),
		}
	}
}
