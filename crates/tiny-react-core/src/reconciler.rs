//! The reconciler: diffs a new [`VNode`] tree against the previous [`BNode`]
//! tree and patches the host tree with as few mutations as it can.
//!
//! Nodes are reused when kind, key and identity match (tag name and ref
//! callback for tags, component definition for components). Insertion order
//! is derived from the *slot* of the preceding sibling: a host node is moved
//! only when it is not already right after that slot, so unmoved elements
//! keep their identity and any state attached to them outside the engine.

use std::cell::RefCell;
use std::collections::HashMap;
use std::mem;
use std::rc::Rc;

use tiny_react_dom::{Node, Property};

use crate::bnode::{BCustom, BFragment, BNode, BParent, BTag, BText};
use crate::context::ContextMap;
use crate::error::{Error, Result};
use crate::hooks::{EffectPhase, HookContext, Hooks};
use crate::hydration;
use crate::scheduler::{CommitQueue, Instance, UpdateQueue};
use crate::vnode::{Key, PropValue, Props, RESERVED_PROPS, VCustom, VFragment, VNode, VTag, listener_event};

/// State of one reconciliation pass.
pub(crate) struct Pass {
	pub(crate) commit: CommitQueue,
	pub(crate) queue: Rc<UpdateQueue>,
	pub(crate) hydrating: bool,
}

impl Pass {
	fn new(queue: &Rc<UpdateQueue>, hydrating: bool) -> Self {
		Self {
			commit: CommitQueue::default(),
			queue: Rc::clone(queue),
			hydrating,
		}
	}
}

/// A mounted tree: the root bundle node plus the update queue of its components.
///
/// Pass it back to [`render`] to patch the same tree.
pub struct Bundle {
	root: BNode,
	queue: Rc<UpdateQueue>,
}

impl Bundle {
	/// Root bundle node.
	pub fn root(&self) -> &BNode {
		&self.root
	}

	/// Top-level host nodes of the tree, in document order.
	pub fn host_nodes(&self) -> Vec<Node> {
		self.root.host_nodes()
	}

	/// Takes the first error raised by a setter-triggered re-render since the
	/// last call. Such errors cannot propagate to a caller and are held here.
	pub fn take_error(&self) -> Option<Error> {
		self.queue.take_error()
	}

	/// Unmounts the whole tree, running every outstanding effect cleanup.
	pub fn unmount(self) {
		tracing::debug!(kind = self.root.kind(), "unmount");
		unmount(&self.root);
	}
}

impl std::fmt::Debug for Bundle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Bundle").field("root", &self.root).finish_non_exhaustive()
	}
}

/// Renders `vnode` into `container`, patching `previous` when given.
///
/// Refs and effects run before this returns, followed by every update they
/// requested.
pub fn render(vnode: impl Into<VNode>, container: &Node, previous: Option<Bundle>) -> Result<Bundle> {
	let (root, queue) = match previous {
		Some(bundle) => (bundle.root, bundle.queue),
		None => (BNode::Empty, UpdateQueue::new()),
	};
	run_pass(vnode.into(), root, container, queue, false)
}

pub(crate) fn run_pass(
	vnode: VNode,
	root: BNode,
	container: &Node,
	queue: Rc<UpdateQueue>,
	hydrating: bool,
) -> Result<Bundle> {
	tracing::debug!(kind = vnode.kind(), hydrating, "render");
	let was_busy = queue.enter();
	let mut pass = Pass::new(&queue, hydrating);
	let root = match reconcile_node(vnode, root, container, None, &ContextMap::default(), &mut pass) {
		Ok(root) => root,
		Err(err) => {
			queue.leave(was_busy);
			return Err(err);
		}
	};
	pass.commit.flush();
	queue.leave(was_busy);
	queue.drain();
	Ok(Bundle { root, queue })
}

/// Re-renders one mounted component in place.
pub(crate) fn update_custom(bcustom: &Rc<RefCell<BCustom>>, queue: &Rc<UpdateQueue>) -> Result<()> {
	let (vcustom, hparent, contexts) = {
		let b = bcustom.borrow();
		let Some(hparent) = b.hparent.clone() else {
			return Ok(());
		};
		(Rc::clone(&b.vnode), hparent, b.contexts.clone())
	};
	tracing::debug!(component = vcustom.def.name(), "localized update");
	let node = BNode::Custom(Rc::clone(bcustom));
	let old_slot = node.slot();
	let pre_slot = find_previous_slot(&node);
	let mut pass = Pass::new(queue, false);
	let rendered = render_custom(bcustom, vcustom, &hparent, pre_slot, &contexts, &mut pass);
	if node.slot() != old_slot {
		update_parent_slot(&node);
	}
	rendered?;
	pass.commit.flush();
	Ok(())
}

pub(crate) fn reconcile_node(
	vnode: VNode,
	bnode: BNode,
	hparent: &Node,
	pre_slot: Option<Node>,
	contexts: &ContextMap,
	pass: &mut Pass,
) -> Result<BNode> {
	match vnode {
		VNode::Empty => {
			unmount(&bnode);
			Ok(BNode::Empty)
		}
		VNode::Text(data) => reconcile_text(data, bnode, hparent, pre_slot, pass),
		VNode::Tag(vtag) => reconcile_tag(vtag, bnode, hparent, pre_slot, contexts, pass),
		VNode::Fragment(vfragment) => reconcile_fragment(vfragment, bnode, hparent, pre_slot, contexts, pass),
		VNode::Custom(vcustom) => reconcile_custom(vcustom, bnode, hparent, pre_slot, contexts, pass),
	}
}

fn reconcile_text(
	data: Rc<str>,
	bnode: BNode,
	hparent: &Node,
	pre_slot: Option<Node>,
	pass: &mut Pass,
) -> Result<BNode> {
	if let BNode::Text(btext) = &bnode {
		let hnode = {
			let mut b = btext.borrow_mut();
			if b.data != data {
				b.hnode.set_text_data(&data)?;
				b.data = data;
			}
			b.hnode.clone()
		};
		place_child(&hnode, hparent, pre_slot.as_ref(), false)?;
		return Ok(bnode);
	}
	unmount(&bnode);
	let adopted = if pass.hydrating {
		hydration::adopt_text(&data, hparent, pre_slot.as_ref())?
	} else {
		None
	};
	let init = adopted.is_none();
	let hnode = adopted.unwrap_or_else(|| Node::text(&*data));
	place_child(&hnode, hparent, pre_slot.as_ref(), init)?;
	Ok(BNode::Text(Rc::new(RefCell::new(BText {
		data,
		hnode,
		parent: None,
	}))))
}

fn reusable_tag(bnode: &BNode, vtag: &VTag) -> Option<Rc<RefCell<BTag>>> {
	let BNode::Tag(btag) = bnode else {
		return None;
	};
	let b = btag.borrow();
	(b.vnode.key == vtag.key && b.vnode.ref_callback == vtag.ref_callback && b.vnode.name == vtag.name)
		.then(|| Rc::clone(btag))
}

fn reconcile_tag(
	vtag: Rc<VTag>,
	bnode: BNode,
	hparent: &Node,
	pre_slot: Option<Node>,
	contexts: &ContextMap,
	pass: &mut Pass,
) -> Result<BNode> {
	if let Some(btag) = reusable_tag(&bnode, &vtag) {
		let (hnode, old_vtag) = {
			let b = btag.borrow();
			(b.hnode.clone(), Rc::clone(&b.vnode))
		};
		if !Rc::ptr_eq(&old_vtag, &vtag) {
			reconcile_tag_props(&mut btag.borrow_mut(), &vtag.props, &old_vtag.props)?;
			let old_child = mem::take(&mut btag.borrow_mut().child);
			let child = reconcile_node(vtag.child.clone(), old_child, &hnode, None, contexts, pass)?;
			child.set_parent(BParent::Tag(Rc::downgrade(&btag)));
			let mut b = btag.borrow_mut();
			b.child = child;
			b.vnode = vtag;
		}
		place_child(&hnode, hparent, pre_slot.as_ref(), false)?;
		return Ok(bnode);
	}

	unmount(&bnode);
	let adopted = if pass.hydrating {
		Some(hydration::adopt_element(&vtag.name, hparent, pre_slot.as_ref())?)
	} else {
		None
	};
	let init = adopted.is_none();
	let hnode = adopted.unwrap_or_else(|| Node::element(&vtag.name));
	let btag = Rc::new(RefCell::new(BTag {
		vnode: Rc::clone(&vtag),
		hnode: hnode.clone(),
		child: BNode::Empty,
		listeners: HashMap::new(),
		parent: None,
	}));
	let child = reconcile_node(vtag.child.clone(), BNode::Empty, &hnode, None, contexts, pass)?;
	child.set_parent(BParent::Tag(Rc::downgrade(&btag)));
	{
		let mut b = btag.borrow_mut();
		b.child = child;
		reconcile_tag_props(&mut b, &vtag.props, &Props::new())?;
	}
	place_child(&hnode, hparent, pre_slot.as_ref(), init)?;
	if vtag.ref_callback.is_some() {
		pass.commit.push_ref(Rc::clone(&btag));
	}
	Ok(BNode::Tag(btag))
}

fn reconcile_tag_props(btag: &mut BTag, props: &Props, old: &Props) -> Result<()> {
	for (name, _) in old.iter() {
		if !props.contains(name) {
			set_tag_prop(btag, name, None)?;
		}
	}
	for (name, value) in props.iter() {
		if old.get(name) != Some(value) {
			set_tag_prop(btag, name, Some(value))?;
		}
	}
	Ok(())
}

fn set_tag_prop(btag: &mut BTag, name: &str, value: Option<&PropValue>) -> Result<()> {
	if RESERVED_PROPS.contains(&name) {
		return Ok(());
	}
	let hnode = &btag.hnode;

	if let Some(event) = listener_event(name) {
		if let Some(old) = btag.listeners.remove(&event) {
			hnode.remove_event_listener(&event, old.as_event_listener())?;
		}
		match value {
			None => {}
			Some(PropValue::Listener(listener)) => {
				hnode.add_event_listener(&event, Rc::clone(listener.as_event_listener()))?;
				btag.listeners.insert(event, listener.clone());
			}
			Some(_) => {
				return Err(Error::InvalidListener {
					prop: name.to_string(),
				});
			}
		}
		return Ok(());
	}

	if hnode.has_property(name) {
		match value {
			None => hnode.clear_property(name)?,
			Some(value) => hnode.set_property(name, to_property(value))?,
		}
		return Ok(());
	}

	match value.and_then(PropValue::to_attribute_value) {
		Some(value) => hnode.set_attribute(name, &value)?,
		None => hnode.remove_attribute(name)?,
	}
	Ok(())
}

fn to_property(value: &PropValue) -> Property {
	match value {
		PropValue::Bool(b) => Property::Bool(*b),
		// precision loss above 2^53 matches host number semantics
		PropValue::Int(n) => Property::Number(*n as f64),
		PropValue::Float(n) => Property::Number(*n),
		PropValue::Str(s) => Property::Text(s.to_string()),
		PropValue::Listener(_) => Property::Text(String::new()),
	}
}

fn reusable_fragment(bnode: &BNode, vfragment: &VFragment) -> Option<Rc<RefCell<BFragment>>> {
	let BNode::Fragment(bfragment) = bnode else {
		return None;
	};
	(bfragment.borrow().vnode.key == vfragment.key).then(|| Rc::clone(bfragment))
}

fn reconcile_fragment(
	vfragment: Rc<VFragment>,
	bnode: BNode,
	hparent: &Node,
	pre_slot: Option<Node>,
	contexts: &ContextMap,
	pass: &mut Pass,
) -> Result<BNode> {
	let (bfragment, old_children) = match reusable_fragment(&bnode, &vfragment) {
		Some(bfragment) => {
			let previous = mem::take(&mut bfragment.borrow_mut().children);
			let (aligned, removed) = align_children_by_key(&vfragment.children, previous);
			for child in &removed {
				unmount(child);
			}
			(bfragment, aligned)
		}
		None => {
			unmount(&bnode);
			let bfragment = Rc::new(RefCell::new(BFragment {
				vnode: Rc::clone(&vfragment),
				children: Vec::new(),
				slot: None,
				parent: None,
			}));
			(bfragment, Vec::new())
		}
	};

	let mut old_children = old_children;
	if old_children.len() > vfragment.children.len() {
		for excess in old_children.split_off(vfragment.children.len()) {
			unmount(&excess);
		}
	}

	let mut old_children = old_children.into_iter();
	let mut children = Vec::with_capacity(vfragment.children.len());
	let mut pre_slot = pre_slot;
	let mut slot = None;
	for vchild in &vfragment.children {
		let previous = old_children.next().unwrap_or_default();
		let child = reconcile_node(vchild.clone(), previous, hparent, pre_slot.clone(), contexts, pass)?;
		if let Some(child_slot) = child.slot() {
			pre_slot = Some(child_slot.clone());
			slot = Some(child_slot);
		}
		child.set_parent(BParent::Fragment(Rc::downgrade(&bfragment)));
		children.push(child);
	}

	{
		let mut b = bfragment.borrow_mut();
		b.children = children;
		b.slot = slot;
		b.vnode = vfragment;
	}
	Ok(BNode::Fragment(bfragment))
}

/// Pairs previous children with new positions by key.
///
/// Returns the aligned previous children (one per new child, `Empty` where
/// nothing matched) and the previous children left over. When the new
/// children are not all uniquely keyed, pairing is positional and nothing is
/// left over. Every previous child ends up in exactly one of the two lists.
fn align_children_by_key(vnodes: &[VNode], bnodes: Vec<BNode>) -> (Vec<BNode>, Vec<BNode>) {
	let mut positions: HashMap<&Key, usize> = HashMap::with_capacity(vnodes.len());
	for (index, vnode) in vnodes.iter().enumerate() {
		match vnode.key() {
			Some(key) if !positions.contains_key(key) => {
				positions.insert(key, index);
			}
			_ => return (bnodes, Vec::new()),
		}
	}

	let mut aligned = vec![BNode::Empty; vnodes.len()];
	let mut removed = Vec::new();
	for bnode in bnodes {
		// a key repeated in the previous list only keeps its first node
		if let Some(key) = bnode.key()
			&& let Some(&index) = positions.get(&key)
			&& matches!(aligned[index], BNode::Empty)
		{
			aligned[index] = bnode;
			continue;
		}
		removed.push(bnode);
	}
	(aligned, removed)
}

fn reusable_custom(bnode: &BNode, vcustom: &VCustom) -> Option<Rc<RefCell<BCustom>>> {
	let BNode::Custom(bcustom) = bnode else {
		return None;
	};
	let b = bcustom.borrow();
	(b.vnode.key == vcustom.key && b.vnode.same_component(vcustom)).then(|| Rc::clone(bcustom))
}

fn memo_hit(bcustom: &BCustom, vcustom: &VCustom) -> bool {
	vcustom
		.def
		.props_eq
		.is_some_and(|eq| eq(&*bcustom.vnode.props, &*vcustom.props))
}

fn reconcile_custom(
	vcustom: Rc<VCustom>,
	bnode: BNode,
	hparent: &Node,
	pre_slot: Option<Node>,
	contexts: &ContextMap,
	pass: &mut Pass,
) -> Result<BNode> {
	let bcustom = match reusable_custom(&bnode, &vcustom) {
		Some(bcustom) => {
			if memo_hit(&bcustom.borrow(), &vcustom) {
				tracing::trace!(component = vcustom.def.name(), "memo hit");
				let child = bcustom.borrow().child.clone();
				place_subtree(&child, hparent, pre_slot)?;
				let mut b = bcustom.borrow_mut();
				b.vnode = vcustom;
				b.hparent = Some(hparent.clone());
				b.contexts = contexts.clone();
				drop(b);
				return Ok(bnode);
			}
			bcustom
		}
		None => {
			unmount(&bnode);
			let instance = Instance::new(vcustom.def.name(), &pass.queue);
			let bcustom = Rc::new(RefCell::new(BCustom {
				vnode: Rc::clone(&vcustom),
				child: BNode::Empty,
				hooks: HookContext::default(),
				slot: None,
				hparent: Some(hparent.clone()),
				contexts: contexts.clone(),
				instance: Rc::clone(&instance),
				parent: None,
			}));
			instance.bind(&bcustom);
			bcustom
		}
	};
	render_custom(&bcustom, vcustom, hparent, pre_slot, contexts, pass)?;
	Ok(BNode::Custom(bcustom))
}

/// Invokes the render function of a component and reconciles its output.
fn render_custom(
	bcustom: &Rc<RefCell<BCustom>>,
	vcustom: Rc<VCustom>,
	hparent: &Node,
	pre_slot: Option<Node>,
	contexts: &ContextMap,
	pass: &mut Pass,
) -> Result<()> {
	let instance = Rc::clone(&bcustom.borrow().instance);
	let mut hook_context = mem::take(&mut bcustom.borrow_mut().hooks);
	instance.begin_render(pass.queue.tick());

	let rendered = {
		let mut hooks = Hooks::new(&mut hook_context, &instance, contexts.clone());
		(vcustom.def.render)(&*vcustom.props, &mut hooks).map(|vchild| (vchild, hooks.into_contexts()))
	};
	let rendered = rendered.and_then(|out| hook_context.finish().map(|()| out));
	if rendered.is_err() {
		hook_context.abort();
	}
	bcustom.borrow_mut().hooks = hook_context;
	let (vchild, child_contexts) = match rendered {
		Ok(out) => out,
		Err(err) => {
			instance.end_render();
			return Err(err);
		}
	};

	let old_child = mem::take(&mut bcustom.borrow_mut().child);
	let previous = old_child.clone();
	let child = reconcile_node(vchild, old_child, hparent, pre_slot, &child_contexts, pass);
	let reentrant = instance.end_render();
	let child = match child {
		Ok(child) => child,
		Err(err) => {
			// the failed subtree leaves the host; the next render starts over
			unmount(&previous);
			bcustom.borrow_mut().slot = None;
			return Err(err);
		}
	};

	child.set_parent(BParent::Custom(Rc::downgrade(bcustom)));
	{
		let mut b = bcustom.borrow_mut();
		b.slot = child.slot();
		b.child = child;
		b.vnode = vcustom;
		b.hparent = Some(hparent.clone());
		b.contexts = contexts.clone();
	}
	if reentrant {
		return Err(Error::ReentrantUpdate {
			component: instance.name(),
		});
	}
	pass.commit.push_effects(Rc::clone(bcustom));
	Ok(())
}

/// Positions `hnode` right after `pre_slot` (or first) within `hparent`.
fn place_child(hnode: &Node, hparent: &Node, pre_slot: Option<&Node>, init: bool) -> Result<()> {
	let slot_next = match pre_slot {
		Some(slot) => slot.next_sibling(),
		None => hparent.first_child(),
	};
	if init || slot_next.as_ref() != Some(hnode) {
		hparent.insert_before(hnode, slot_next.as_ref())?;
	}
	Ok(())
}

fn place_subtree(bnode: &BNode, hparent: &Node, mut pre_slot: Option<Node>) -> Result<()> {
	for hnode in bnode.host_nodes() {
		place_child(&hnode, hparent, pre_slot.as_ref(), false)?;
		pre_slot = Some(hnode);
	}
	Ok(())
}

/// Walks up to the nearest tag ancestor looking for the slot preceding `node`.
fn find_previous_slot(node: &BNode) -> Option<Node> {
	let mut child = node.clone();
	let mut parent = child.parent().and_then(|p| p.upgrade());
	while let Some(current) = parent {
		match &current {
			BNode::Tag(_) => return None,
			BNode::Fragment(bfragment) => {
				let mut slot = None;
				for sibling in &bfragment.borrow().children {
					if sibling.ptr_eq(&child) {
						if slot.is_some() {
							return slot;
						}
						break;
					}
					if let Some(sibling_slot) = sibling.slot() {
						slot = Some(sibling_slot);
					}
				}
			}
			_ => {}
		}
		parent = current.parent().and_then(|p| p.upgrade());
		child = current;
	}
	None
}

/// Recomputes cached slots of fragment and component ancestors up to the nearest tag.
fn update_parent_slot(node: &BNode) {
	let mut child = node.clone();
	let mut parent = child.parent().and_then(|p| p.upgrade());
	while let Some(current) = parent {
		match &current {
			BNode::Tag(_) => return,
			BNode::Custom(bcustom) => {
				let slot = child.slot();
				bcustom.borrow_mut().slot = slot;
			}
			BNode::Fragment(bfragment) => {
				let slot = bfragment
					.borrow()
					.children
					.iter()
					.rev()
					.find_map(BNode::slot);
				bfragment.borrow_mut().slot = slot;
			}
			_ => {}
		}
		parent = current.parent().and_then(|p| p.upgrade());
		child = current;
	}
}

/// Unmounts a subtree: runs effect cleanups, detaches host nodes, nulls refs.
pub(crate) fn unmount(bnode: &BNode) {
	unmount_node(bnode, false);
}

fn unmount_node(bnode: &BNode, skip_remove: bool) {
	match bnode {
		BNode::Empty => {}
		BNode::Tag(btag) => {
			let (child, hnode, ref_callback) = {
				let b = btag.borrow();
				(b.child.clone(), b.hnode.clone(), b.vnode.ref_callback.clone())
			};
			// the element detaches its whole subtree at once
			unmount_node(&child, true);
			if !skip_remove {
				hnode.remove();
			}
			if let Some(callback) = ref_callback {
				callback.call(None);
			}
		}
		BNode::Text(btext) => {
			if !skip_remove {
				btext.borrow().hnode.remove();
			}
		}
		BNode::Fragment(bfragment) => {
			let children = bfragment.borrow().children.clone();
			for child in &children {
				unmount_node(child, skip_remove);
			}
		}
		BNode::Custom(bcustom) => {
			let (instance, child, cleanups) = {
				let mut b = bcustom.borrow_mut();
				let mut cleanups = b.hooks.take_cleanups(EffectPhase::Layout);
				cleanups.extend(b.hooks.take_cleanups(EffectPhase::Passive));
				(Rc::clone(&b.instance), b.child.clone(), cleanups)
			};
			for cleanup in cleanups {
				cleanup();
			}
			instance.kill();
			bcustom.borrow_mut().hparent = None;
			unmount_node(&child, skip_remove);
		}
	}
}
