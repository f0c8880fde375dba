//! Deferred work: the per-pass commit queue and the per-root update queue.
//!
//! A reconciliation pass collects ref callbacks and components with pending
//! effects into a [`CommitQueue`], which is flushed once the pass finished
//! mutating the host tree: refs first, then layout effects, then effects.
//!
//! State setters never re-render synchronously. They push the owning
//! component onto the root's [`UpdateQueue`], which is drained once per
//! external trigger (a setter called outside any pass, or the end of a
//! `render`/`hydrate` call). Work requested while draining joins the same
//! drain.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use crate::bnode::{BCustom, BTag};
use crate::error::Error;
use crate::hooks::EffectPhase;
use crate::reconciler;

/// Update handle shared by a mounted component and the setters it handed out.
///
/// Setters hold this handle rather than the bundle node, so requesting an
/// update never borrows the bundle tree.
pub(crate) struct Instance {
	name: &'static str,
	node: RefCell<Weak<RefCell<BCustom>>>,
	queue: Weak<UpdateQueue>,
	detached: bool,
	live: Cell<bool>,
	rendering: Cell<bool>,
	reentrant: Cell<bool>,
	rendered_at: Cell<u64>,
}

impl Instance {
	pub(crate) fn new(name: &'static str, queue: &Rc<UpdateQueue>) -> Rc<Self> {
		Rc::new(Self {
			name,
			node: RefCell::new(Weak::new()),
			queue: Rc::downgrade(queue),
			detached: false,
			live: Cell::new(true),
			rendering: Cell::new(false),
			reentrant: Cell::new(false),
			rendered_at: Cell::new(0),
		})
	}

	/// Instance for server rendering: update requests are ignored.
	pub(crate) fn detached(name: &'static str) -> Rc<Self> {
		Rc::new(Self {
			name,
			node: RefCell::new(Weak::new()),
			queue: Weak::new(),
			detached: true,
			live: Cell::new(true),
			rendering: Cell::new(false),
			reentrant: Cell::new(false),
			rendered_at: Cell::new(0),
		})
	}

	pub(crate) fn name(&self) -> &'static str {
		self.name
	}

	pub(crate) fn bind(&self, node: &Rc<RefCell<BCustom>>) {
		*self.node.borrow_mut() = Rc::downgrade(node);
	}

	pub(crate) fn node(&self) -> Option<Rc<RefCell<BCustom>>> {
		self.node.borrow().upgrade()
	}

	pub(crate) fn is_live(&self) -> bool {
		self.live.get()
	}

	pub(crate) fn kill(&self) {
		self.live.set(false);
	}

	/// Marks the start of a render stamped with `tick`.
	pub(crate) fn begin_render(&self, tick: u64) {
		self.rendering.set(true);
		self.reentrant.set(false);
		self.rendered_at.set(tick);
	}

	/// Marks the end of a render; returns whether an update was requested meanwhile.
	pub(crate) fn end_render(&self) -> bool {
		self.rendering.set(false);
		self.reentrant.replace(false)
	}

	/// Requests a re-render of this component.
	pub(crate) fn request_update(self: &Rc<Self>) {
		if self.detached {
			return;
		}
		if !self.live.get() {
			tracing::warn!(component = self.name, "update requested on an unmounted component");
			return;
		}
		if self.rendering.get() {
			self.reentrant.set(true);
			return;
		}
		let Some(queue) = self.queue.upgrade() else {
			return;
		};
		queue.push(Rc::clone(self));
		queue.drain();
	}
}

/// Per-root queue of components waiting for a localized re-render.
#[derive(Default)]
pub(crate) struct UpdateQueue {
	pending: RefCell<VecDeque<(Rc<Instance>, u64)>>,
	busy: Cell<bool>,
	clock: Cell<u64>,
	error: RefCell<Option<Error>>,
}

impl UpdateQueue {
	pub(crate) fn new() -> Rc<Self> {
		Rc::new(Self::default())
	}

	/// Next render timestamp.
	pub(crate) fn tick(&self) -> u64 {
		let next = self.clock.get() + 1;
		self.clock.set(next);
		next
	}

	fn push(&self, instance: Rc<Instance>) {
		let requested_at = self.clock.get();
		tracing::trace!(component = instance.name, requested_at, "update queued");
		self.pending.borrow_mut().push_back((instance, requested_at));
	}

	/// Enters a pass; the returned flag must be handed back to [`Self::leave`].
	pub(crate) fn enter(&self) -> bool {
		self.busy.replace(true)
	}

	pub(crate) fn leave(&self, was_busy: bool) {
		self.busy.set(was_busy);
	}

	/// Re-renders every queued component unless a pass or drain is already running.
	pub(crate) fn drain(self: &Rc<Self>) {
		if self.busy.get() {
			return;
		}
		self.busy.set(true);
		loop {
			let Some((instance, requested_at)) = self.pending.borrow_mut().pop_front() else {
				break;
			};
			if !instance.is_live() || instance.rendered_at.get() > requested_at {
				continue;
			}
			let Some(node) = instance.node() else {
				continue;
			};
			if let Err(err) = reconciler::update_custom(&node, self) {
				tracing::error!(component = instance.name, error = %err, "localized update failed");
				self.error.borrow_mut().get_or_insert(err);
			}
		}
		self.busy.set(false);
	}

	/// Takes the first error raised by a setter-triggered update.
	pub(crate) fn take_error(&self) -> Option<Error> {
		self.error.borrow_mut().take()
	}

	#[cfg(test)]
	pub(crate) fn pending_len(&self) -> usize {
		self.pending.borrow().len()
	}
}

/// Ref callbacks and effects collected during one pass.
#[derive(Default)]
pub(crate) struct CommitQueue {
	refs: Vec<Rc<RefCell<BTag>>>,
	effects: Vec<Rc<RefCell<BCustom>>>,
}

impl CommitQueue {
	pub(crate) fn push_ref(&mut self, tag: Rc<RefCell<BTag>>) {
		self.refs.push(tag);
	}

	pub(crate) fn push_effects(&mut self, custom: Rc<RefCell<BCustom>>) {
		self.effects.push(custom);
	}

	/// Runs refs, then layout effects, then effects, in collection order.
	pub(crate) fn flush(self) {
		tracing::trace!(refs = self.refs.len(), effects = self.effects.len(), "commit");
		for tag in self.refs {
			let (callback, hnode) = {
				let tag = tag.borrow();
				(tag.vnode.ref_callback.clone(), tag.hnode.clone())
			};
			if let Some(callback) = callback {
				callback.call(Some(&hnode));
			}
		}
		for phase in [EffectPhase::Layout, EffectPhase::Passive] {
			for custom in &self.effects {
				run_effects(custom, phase);
			}
		}
	}
}

fn run_effects(custom: &Rc<RefCell<BCustom>>, phase: EffectPhase) {
	let mut from = 0;
	loop {
		if !custom.borrow().instance.is_live() {
			return;
		}
		let job = custom.borrow_mut().hooks.take_effect(phase, from);
		let Some((index, effect, cleanup)) = job else {
			return;
		};
		if let Some(cleanup) = cleanup {
			cleanup();
		}
		let cleanup = effect();
		custom.borrow_mut().hooks.store_cleanup(index, cleanup);
		from = index + 1;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_tick_is_monotonic() {
		let queue = UpdateQueue::new();
		let a = queue.tick();
		let b = queue.tick();
		assert!(b > a);
	}

	#[rstest]
	fn test_enter_leave_restores_busy() {
		let queue = UpdateQueue::new();
		let outer = queue.enter();
		let inner = queue.enter();
		assert!(!outer);
		assert!(inner);
		queue.leave(inner);
		assert!(queue.busy.get());
		queue.leave(outer);
		assert!(!queue.busy.get());
	}

	#[rstest]
	fn test_request_while_busy_is_queued() {
		let queue = UpdateQueue::new();
		let instance = Instance::new("test", &queue);
		let was_busy = queue.enter();
		instance.request_update();
		instance.request_update();
		assert_eq!(queue.pending_len(), 2);
		queue.leave(was_busy);
		// nothing is bound, so draining just empties the queue
		queue.drain();
		assert_eq!(queue.pending_len(), 0);
	}

	#[rstest]
	fn test_request_while_rendering_is_flagged() {
		let queue = UpdateQueue::new();
		let instance = Instance::new("test", &queue);
		instance.begin_render(queue.tick());
		instance.request_update();
		assert_eq!(queue.pending_len(), 0);
		assert!(instance.end_render());
		assert!(!instance.end_render());
	}

	#[rstest]
	fn test_request_after_unmount_is_ignored() {
		let queue = UpdateQueue::new();
		let instance = Instance::new("test", &queue);
		instance.kill();
		let was_busy = queue.enter();
		instance.request_update();
		queue.leave(was_busy);
		assert_eq!(queue.pending_len(), 0);
	}

	#[rstest]
	fn test_detached_instance_ignores_requests() {
		let instance = Instance::detached("ssr");
		instance.request_update();
		assert!(instance.is_live());
	}
}
