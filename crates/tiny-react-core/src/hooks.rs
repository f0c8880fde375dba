//! Positional hook engine.
//!
//! Every mounted component owns a [`HookContext`]: an ordered list of slots
//! visited by a cursor that restarts at zero on each render. Two primitive
//! slot kinds exist. Value slots hold boxed state (reducers, refs, memos)
//! and effect slots hold the last dependencies, the pending effect and the
//! cleanup of the previous run.
//!
//! Hooks are methods on the [`Hooks`] handle that the reconciler passes to
//! every render function, so there is no ambient "current component". A
//! render must call the same hooks in the same order every time; a slot
//! kind mismatch fails with [`Error::HookOrder`] and a different number of
//! hook calls fails with [`Error::HookCount`].
//!
//! # Example
//!
//! ```ignore
//! use tiny_react_core::{Component, Hooks, Result, VNode, el};
//!
//! let counter = Component::new(|step: &i64, hooks: &mut Hooks<'_>| -> Result<VNode> {
//!     let (count, set_count) = hooks.use_state(|| 0)?;
//!     let step = *step;
//!     Ok(el("button")
//!         .on("click", move |_| set_count.update(move |c| c + step))
//!         .child(count.to_string())
//!         .build())
//! });
//! ```

use std::any::{Any, type_name};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::context::ContextMap;
use crate::error::{Error, Result};
use crate::scheduler::Instance;

/// Cleanup returned by an effect.
pub type Cleanup = Box<dyn FnOnce()>;

type EffectFn = Box<dyn FnOnce() -> Option<Cleanup>>;

/// Wraps a closure as an effect cleanup.
pub fn cleanup(f: impl FnOnce() + 'static) -> Option<Cleanup> {
	Some(Box::new(f))
}

/// When an effect runs relative to the other effects of a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EffectPhase {
	/// Before every ordinary effect of the same commit.
	Layout,
	/// After all layout effects.
	Passive,
}

impl EffectPhase {
	fn hook_name(self) -> &'static str {
		match self {
			Self::Layout => "use_layout_effect",
			Self::Passive => "use_effect",
		}
	}
}

struct EffectSlot {
	phase: EffectPhase,
	deps: Option<Box<dyn Any>>,
	pending: Option<EffectFn>,
	cleanup: Option<Cleanup>,
}

enum HookSlot {
	Value(Rc<dyn Any>),
	Effect(EffectSlot),
}

impl HookSlot {
	fn describe(&self) -> &'static str {
		match self {
			Self::Value(_) => "value hook",
			Self::Effect(e) => e.phase.hook_name(),
		}
	}
}

/// Hook state of one component instance.
#[derive(Default)]
pub struct HookContext {
	slots: Vec<HookSlot>,
	cursor: usize,
	mounted: bool,
}

impl fmt::Debug for HookContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("HookContext")
			.field("slots", &self.slots.len())
			.field("mounted", &self.mounted)
			.finish()
	}
}

impl HookContext {
	pub(crate) fn begin(&mut self) {
		self.cursor = 0;
	}

	/// Closes a successful render, checking the hook count against the first render.
	pub(crate) fn finish(&mut self) -> Result<()> {
		if self.mounted && self.cursor != self.slots.len() {
			return Err(Error::HookCount {
				expected: self.slots.len(),
				actual: self.cursor,
			});
		}
		self.mounted = true;
		Ok(())
	}

	/// Forgets the slots of a first render that failed.
	pub(crate) fn abort(&mut self) {
		if !self.mounted {
			self.slots.clear();
		}
	}

	fn next_index(&mut self) -> Result<usize> {
		let index = self.cursor;
		if self.mounted && index >= self.slots.len() {
			return Err(Error::HookCount {
				expected: self.slots.len(),
				actual: index + 1,
			});
		}
		self.cursor += 1;
		Ok(index)
	}

	fn value_slot<V: 'static>(&mut self, init: impl FnOnce() -> V) -> Result<Rc<V>> {
		let index = self.next_index()?;
		if index == self.slots.len() {
			self.slots.push(HookSlot::Value(Rc::new(init())));
		}
		match &self.slots[index] {
			HookSlot::Value(value) => Rc::clone(value)
				.downcast::<V>()
				.map_err(|_| Error::HookOrder {
					index,
					expected: type_name::<V>(),
					found: "value hook of another type",
				}),
			other => Err(Error::HookOrder {
				index,
				expected: "value hook",
				found: other.describe(),
			}),
		}
	}

	fn effect_slot<D: PartialEq + 'static>(
		&mut self,
		phase: EffectPhase,
		deps: Option<D>,
		effect: EffectFn,
	) -> Result<()> {
		let index = self.next_index()?;
		if index == self.slots.len() {
			self.slots.push(HookSlot::Effect(EffectSlot {
				phase,
				deps: deps.map(|d| Box::new(d) as Box<dyn Any>),
				pending: Some(effect),
				cleanup: None,
			}));
			return Ok(());
		}
		let slot = match &mut self.slots[index] {
			HookSlot::Effect(slot) if slot.phase == phase => slot,
			other => {
				return Err(Error::HookOrder {
					index,
					expected: phase.hook_name(),
					found: other.describe(),
				});
			}
		};
		let unchanged = match (&slot.deps, &deps) {
			(Some(old), Some(new)) => {
				let old = old.downcast_ref::<D>().ok_or(Error::HookOrder {
					index,
					expected: type_name::<D>(),
					found: "dependencies of another type",
				})?;
				old == new
			}
			_ => false,
		};
		if !unchanged {
			slot.pending = Some(effect);
			slot.deps = deps.map(|d| Box::new(d) as Box<dyn Any>);
		}
		Ok(())
	}

	/// Takes the first pending effect of `phase` at or after slot `from`,
	/// together with the cleanup of its previous run.
	pub(crate) fn take_effect(
		&mut self,
		phase: EffectPhase,
		from: usize,
	) -> Option<(usize, EffectFn, Option<Cleanup>)> {
		self.slots
			.iter_mut()
			.enumerate()
			.skip(from)
			.find_map(|(index, slot)| match slot {
				HookSlot::Effect(e) if e.phase == phase => e
					.pending
					.take()
					.map(|effect| (index, effect, e.cleanup.take())),
				_ => None,
			})
	}

	pub(crate) fn store_cleanup(&mut self, index: usize, cleanup: Option<Cleanup>) {
		if let Some(HookSlot::Effect(e)) = self.slots.get_mut(index) {
			e.cleanup = cleanup;
		}
	}

	/// Drops pending effects of `phase` and takes their outstanding cleanups.
	pub(crate) fn take_cleanups(&mut self, phase: EffectPhase) -> Vec<Cleanup> {
		self.slots
			.iter_mut()
			.filter_map(|slot| match slot {
				HookSlot::Effect(e) if e.phase == phase => {
					e.pending = None;
					e.cleanup.take()
				}
				_ => None,
			})
			.collect()
	}
}

/// Mutable cell returned by [`Hooks::use_ref`]; identical across renders.
pub struct Ref<T>(Rc<RefCell<T>>);

impl<T> Clone for Ref<T> {
	fn clone(&self) -> Self {
		Self(Rc::clone(&self.0))
	}
}

impl<T> Ref<T> {
	/// Borrows the current value.
	pub fn borrow(&self) -> std::cell::Ref<'_, T> {
		self.0.borrow()
	}

	/// Mutably borrows the current value.
	pub fn borrow_mut(&self) -> std::cell::RefMut<'_, T> {
		self.0.borrow_mut()
	}

	/// Replaces the current value without re-rendering.
	pub fn set(&self, value: T) {
		*self.0.borrow_mut() = value;
	}

	/// Returns whether both handles point at the same cell.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

impl<T: Clone> Ref<T> {
	/// Clones the current value.
	pub fn get(&self) -> T {
		self.0.borrow().clone()
	}
}

impl<T: fmt::Debug> fmt::Debug for Ref<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Ref").field(&self.0.borrow()).finish()
	}
}

/// Sends actions to a reducer hook.
pub struct Dispatch<A>(Rc<dyn Fn(A)>);

impl<A> Clone for Dispatch<A> {
	fn clone(&self) -> Self {
		Self(Rc::clone(&self.0))
	}
}

impl<A> Dispatch<A> {
	/// Applies `action`; the component re-renders if the state changed.
	pub fn dispatch(&self, action: A) {
		(self.0)(action);
	}
}

impl<A> fmt::Debug for Dispatch<A> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("Dispatch(..)")
	}
}

enum StateAction<T> {
	Set(T),
	Update(Box<dyn FnOnce(&T) -> T>),
}

/// Setter returned by [`Hooks::use_state`].
pub struct SetState<T>(Dispatch<StateAction<T>>);

impl<T> Clone for SetState<T> {
	fn clone(&self) -> Self {
		Self(self.0.clone())
	}
}

impl<T: 'static> SetState<T> {
	/// Replaces the state.
	pub fn set(&self, value: T) {
		self.0.dispatch(StateAction::Set(value));
	}

	/// Computes the next state from the current one.
	pub fn update(&self, f: impl FnOnce(&T) -> T + 'static) {
		self.0.dispatch(StateAction::Update(Box::new(f)));
	}
}

impl<T> fmt::Debug for SetState<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("SetState(..)")
	}
}

/// Render-scoped hook handle passed to every component render function.
pub struct Hooks<'a> {
	pub(crate) ctx: &'a mut HookContext,
	pub(crate) instance: &'a Rc<Instance>,
	pub(crate) contexts: ContextMap,
}

impl<'a> Hooks<'a> {
	pub(crate) fn new(ctx: &'a mut HookContext, instance: &'a Rc<Instance>, contexts: ContextMap) -> Self {
		ctx.begin();
		Self {
			ctx,
			instance,
			contexts,
		}
	}

	/// Context map for the children of the component being rendered.
	pub(crate) fn into_contexts(self) -> ContextMap {
		self.contexts
	}

	/// Reducer state. `init` runs on the first render only.
	///
	/// Dispatching computes the next state with `reducer` and re-renders the
	/// component when it differs from the current state.
	pub fn use_reducer<S, A, R>(&mut self, reducer: R, init: impl FnOnce() -> S) -> Result<(S, Dispatch<A>)>
	where
		S: Clone + PartialEq + 'static,
		A: 'static,
		R: Fn(&S, A) -> S + 'static,
	{
		let cell = self.ctx.value_slot(|| RefCell::new(init()))?;
		let state = cell.borrow().clone();
		let instance = Rc::clone(self.instance);
		let dispatch = move |action: A| {
			let current = cell.borrow().clone();
			let next = reducer(&current, action);
			if next == current {
				return;
			}
			*cell.borrow_mut() = next;
			instance.request_update();
		};
		Ok((state, Dispatch(Rc::new(dispatch))))
	}

	/// Local state with a setter.
	pub fn use_state<T>(&mut self, init: impl FnOnce() -> T) -> Result<(T, SetState<T>)>
	where
		T: Clone + PartialEq + 'static,
	{
		let (state, dispatch) = self.use_reducer(
			|prev: &T, action: StateAction<T>| match action {
				StateAction::Set(value) => value,
				StateAction::Update(f) => f(prev),
			},
			init,
		)?;
		Ok((state, SetState(dispatch)))
	}

	/// Mutable cell that survives re-renders; writing to it does not re-render.
	pub fn use_ref<T: 'static>(&mut self, init: impl FnOnce() -> T) -> Result<Ref<T>> {
		let cell = self.ctx.value_slot(|| RefCell::new(init()))?;
		Ok(Ref(cell))
	}

	/// Caches `compute()` until `deps` changes.
	pub fn use_memo<T, D>(&mut self, deps: D, compute: impl FnOnce() -> T) -> Result<T>
	where
		T: Clone + 'static,
		D: PartialEq + 'static,
	{
		let cell = self.ctx.value_slot(|| RefCell::new(None::<(D, T)>))?;
		if let Some((old, value)) = &*cell.borrow()
			&& *old == deps
		{
			return Ok(value.clone());
		}
		let value = compute();
		*cell.borrow_mut() = Some((deps, value.clone()));
		Ok(value)
	}

	/// Keeps the first `callback` seen for the current `deps`.
	///
	/// Wrap closures in `Rc` (or a [`Listener`](crate::Listener)) to get a
	/// cheap clone that keeps its identity across renders.
	pub fn use_callback<F, D>(&mut self, deps: D, callback: F) -> Result<F>
	where
		F: Clone + 'static,
		D: PartialEq + 'static,
	{
		self.use_memo(deps, || callback)
	}

	/// Runs `effect` after the commit whenever `deps` changed since the last
	/// run. `()` as dependencies runs the effect once, after mount.
	///
	/// The cleanup of the previous run is called right before the next run
	/// and once more on unmount.
	pub fn use_effect<D: PartialEq + 'static>(
		&mut self,
		deps: D,
		effect: impl FnOnce() -> Option<Cleanup> + 'static,
	) -> Result<()> {
		self.ctx
			.effect_slot(EffectPhase::Passive, Some(deps), Box::new(effect))
	}

	/// Runs `effect` after every commit of this component.
	pub fn use_effect_each(&mut self, effect: impl FnOnce() -> Option<Cleanup> + 'static) -> Result<()> {
		self.ctx
			.effect_slot::<()>(EffectPhase::Passive, None, Box::new(effect))
	}

	/// Like [`Self::use_effect`], but runs before every ordinary effect of the commit.
	pub fn use_layout_effect<D: PartialEq + 'static>(
		&mut self,
		deps: D,
		effect: impl FnOnce() -> Option<Cleanup> + 'static,
	) -> Result<()> {
		self.ctx
			.effect_slot(EffectPhase::Layout, Some(deps), Box::new(effect))
	}

	/// Like [`Self::use_effect_each`], in the layout phase.
	pub fn use_layout_effect_each(&mut self, effect: impl FnOnce() -> Option<Cleanup> + 'static) -> Result<()> {
		self.ctx
			.effect_slot::<()>(EffectPhase::Layout, None, Box::new(effect))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::{fixture, rstest};

	struct Harness {
		ctx: HookContext,
		instance: Rc<Instance>,
	}

	impl Harness {
		fn render<T>(&mut self, f: impl FnOnce(&mut Hooks<'_>) -> Result<T>) -> Result<T> {
			let mut hooks = Hooks::new(&mut self.ctx, &self.instance, ContextMap::default());
			let out = f(&mut hooks)?;
			self.ctx.finish()?;
			Ok(out)
		}

		fn commit(&mut self) -> Vec<usize> {
			let mut ran = Vec::new();
			for phase in [EffectPhase::Layout, EffectPhase::Passive] {
				let mut from = 0;
				while let Some((index, effect, cleanup)) = self.ctx.take_effect(phase, from) {
					if let Some(c) = cleanup {
						c();
					}
					let next = effect();
					self.ctx.store_cleanup(index, next);
					ran.push(index);
					from = index + 1;
				}
			}
			ran
		}
	}

	#[fixture]
	fn harness() -> Harness {
		Harness {
			ctx: HookContext::default(),
			instance: Instance::detached("test"),
		}
	}

	#[rstest]
	fn test_state_persists_across_renders(mut harness: Harness) {
		let (value, set) = harness.render(|h| h.use_state(|| 1)).unwrap();
		assert_eq!(value, 1);
		set.set(5);
		let (value, _) = harness.render(|h| h.use_state(|| 1)).unwrap();
		assert_eq!(value, 5);
	}

	#[rstest]
	fn test_updater_sees_latest_state(mut harness: Harness) {
		let (_, set) = harness.render(|h| h.use_state(|| 1)).unwrap();
		set.update(|v| v + 1);
		set.update(|v| v * 10);
		let (value, _) = harness.render(|h| h.use_state(|| 0)).unwrap();
		assert_eq!(value, 20);
	}

	#[rstest]
	fn test_reducer(mut harness: Harness) {
		let reducer = |s: &Vec<&'static str>, a: &'static str| {
			let mut s = s.clone();
			s.push(a);
			s
		};
		let (_, dispatch) = harness.render(|h| h.use_reducer(reducer, Vec::new)).unwrap();
		dispatch.dispatch("a");
		dispatch.dispatch("b");
		let (state, _) = harness.render(|h| h.use_reducer(reducer, Vec::new)).unwrap();
		assert_eq!(state, ["a", "b"]);
	}

	#[rstest]
	fn test_ref_is_stable(mut harness: Harness) {
		let first = harness.render(|h| h.use_ref(|| 0)).unwrap();
		first.set(3);
		let second = harness.render(|h| h.use_ref(|| 0)).unwrap();
		assert!(first.ptr_eq(&second));
		assert_eq!(second.get(), 3);
	}

	#[rstest]
	fn test_memo_recomputes_on_dependency_change(mut harness: Harness) {
		let calls = Rc::new(RefCell::new(0));
		let run = |harness: &mut Harness, dep: i32| {
			let calls = Rc::clone(&calls);
			harness
				.render(|h| {
					h.use_memo(dep, move || {
						*calls.borrow_mut() += 1;
						dep * 2
					})
				})
				.unwrap()
		};
		assert_eq!(run(&mut harness, 1), 2);
		assert_eq!(run(&mut harness, 1), 2);
		assert_eq!(run(&mut harness, 2), 4);
		assert_eq!(*calls.borrow(), 2);
	}

	#[rstest]
	fn test_callback_keeps_identity_until_deps_change(mut harness: Harness) {
		let mut render = |dep: u8| {
			let callback: Rc<dyn Fn() -> u8> = Rc::new(move || dep);
			harness.render(|h| h.use_callback(dep, callback)).unwrap()
		};
		let first = render(1);
		let second = render(1);
		let third = render(2);
		assert!(Rc::ptr_eq(&first, &second));
		assert!(!Rc::ptr_eq(&second, &third));
		assert_eq!(third(), 2);
	}

	#[rstest]
	fn test_effect_once(mut harness: Harness) {
		for _ in 0..3 {
			harness.render(|h| h.use_effect((), || None)).unwrap();
			harness.commit();
		}
		harness.render(|h| h.use_effect((), || None)).unwrap();
		assert!(harness.commit().is_empty());
	}

	#[rstest]
	fn test_effect_each_runs_every_commit(mut harness: Harness) {
		let mut total = 0;
		for _ in 0..3 {
			harness.render(|h| h.use_effect_each(|| None)).unwrap();
			total += harness.commit().len();
		}
		assert_eq!(total, 3);
	}

	#[rstest]
	fn test_layout_effects_run_first(mut harness: Harness) {
		harness
			.render(|h| {
				h.use_effect((), || None)?;
				h.use_layout_effect((), || None)
			})
			.unwrap();
		assert_eq!(harness.commit(), [1, 0]);
	}

	#[rstest]
	fn test_cleanup_runs_before_next_effect(mut harness: Harness) {
		let log = Rc::new(RefCell::new(Vec::new()));
		for dep in [0, 0, 1] {
			let log = Rc::clone(&log);
			harness
				.render(move |h| {
					h.use_effect(dep, move || {
						log.borrow_mut().push(format!("effect {dep}"));
						cleanup(move || log.borrow_mut().push(format!("cleanup {dep}")))
					})
				})
				.unwrap();
			harness.commit();
		}
		for c in harness.ctx.take_cleanups(EffectPhase::Passive) {
			c();
		}
		assert_eq!(*log.borrow(), ["effect 0", "cleanup 0", "effect 1", "cleanup 1"]);
	}

	#[rstest]
	fn test_slot_kind_mismatch(mut harness: Harness) {
		harness.render(|h| h.use_state(|| 0).map(drop)).unwrap();
		let err = harness
			.render(|h| h.use_effect((), || None))
			.unwrap_err();
		assert!(matches!(err, Error::HookOrder { index: 0, .. }));
	}

	#[rstest]
	fn test_value_type_mismatch(mut harness: Harness) {
		harness.render(|h| h.use_state(|| 0_i32).map(drop)).unwrap();
		let err = harness
			.render(|h| h.use_state(|| "x").map(drop))
			.unwrap_err();
		assert!(matches!(err, Error::HookOrder { index: 0, .. }));
	}

	#[rstest]
	#[case::fewer(2, 1)]
	#[case::more(1, 2)]
	fn test_hook_count_mismatch(mut harness: Harness, #[case] first: usize, #[case] second: usize) {
		let render = |harness: &mut Harness, n: usize| {
			harness.render(|h| {
				for _ in 0..n {
					h.use_ref(|| ())?;
				}
				Ok(())
			})
		};
		render(&mut harness, first).unwrap();
		let err = render(&mut harness, second).unwrap_err();
		assert!(matches!(err, Error::HookCount { expected, .. } if expected == first));
	}
}
