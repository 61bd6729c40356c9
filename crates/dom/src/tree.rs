//! Authoritative document tree.
//!
//! Nodes live in an arena keyed by [`NodeId`]; parent links are ids, not
//! owning pointers. A node is in exactly one parent's children list or in
//! none. Every invariant check runs before any state changes, so a rejected
//! mutation leaves the tree as it was.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::command::{self, Command, PropValue};
use crate::error::TreeError;
use crate::id::{NodeId, NodeIdGen};
use crate::mutation::{Applied, Mutation};

pub(crate) struct Node {
	pub(crate) tag: String,
	pub(crate) parent: Option<NodeId>,
	pub(crate) children: Vec<NodeId>,
	pub(crate) props: IndexMap<String, PropValue>,
	pub(crate) removed: bool,
}

impl Node {
	fn new(tag: String) -> Self {
		Self {
			tag,
			parent: None,
			children: Vec::new(),
			props: IndexMap::new(),
			removed: false,
		}
	}
}

/// One document: the root node, its descendants, and the page-level state.
pub struct Tree {
	nodes: HashMap<NodeId, Node>,
	ids: NodeIdGen,
	init: Command,
	title: Option<Command>,
}

impl Tree {
	/// Creates an empty document whose page is initialized with `style`.
	pub fn new(style: &str) -> Self {
		let mut nodes = HashMap::new();
		nodes.insert(NodeId::ROOT, Node::new("body".to_owned()));
		Self {
			nodes,
			ids: NodeIdGen::default(),
			init: command::render_init(style),
			title: None,
		}
	}

	pub(crate) fn node(&self, id: NodeId) -> Option<&Node> {
		self.nodes.get(&id)
	}

	pub(crate) fn init(&self) -> &Command {
		&self.init
	}

	/// Last title command, if a title was ever set.
	pub fn title(&self) -> Option<&Command> {
		self.title.as_ref()
	}

	/// Number of nodes ever created, root included.
	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	/// Always false: the root exists for the whole lifetime of the tree.
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	/// Ordered children of `id`; empty for unknown nodes.
	pub fn children(&self, id: NodeId) -> &[NodeId] {
		self.nodes.get(&id).map(|node| node.children.as_slice()).unwrap_or_default()
	}

	/// Parent of `id`, if it has one.
	pub fn parent(&self, id: NodeId) -> Option<NodeId> {
		self.nodes.get(&id).and_then(|node| node.parent)
	}

	/// Tag of `id`.
	pub fn tag(&self, id: NodeId) -> Option<&str> {
		self.nodes.get(&id).map(|node| node.tag.as_str())
	}

	/// Last value recorded for property `name` on `id`.
	pub fn property(&self, id: NodeId, name: &str) -> Option<&PropValue> {
		self.nodes.get(&id).and_then(|node| node.props.get(name))
	}

	/// True when `id` is the root or reaches it through an unbroken parent chain.
	pub fn is_attached(&self, id: NodeId) -> bool {
		let mut current = id;
		loop {
			if current.is_root() {
				return true;
			}
			match self.nodes.get(&current).and_then(|node| node.parent) {
				Some(parent) => current = parent,
				None => return false,
			}
		}
	}

	/// Renders the full state as one self-contained command.
	pub fn snapshot(&self) -> Command {
		command::render_snapshot(self)
	}

	/// Applies one mutation and returns the command describing its observable effect.
	pub fn apply(&mut self, mutation: Mutation) -> Result<Applied, TreeError> {
		match mutation {
			Mutation::Create { tag } => {
				let (id, command) = self.create_node(None, tag)?;
				Ok(Applied { command, created: Some(id) })
			}
			Mutation::Append { parent, child } => {
				self.check_append(parent, child)?;
				Ok(Applied {
					command: self.append(parent, child),
					created: None,
				})
			}
			Mutation::CreateAppend { parent, tag } => {
				let (id, command) = self.create_node(Some(parent), tag)?;
				Ok(Applied { command, created: Some(id) })
			}
			Mutation::Remove { node } => self.remove(node).map(|command| Applied { command, created: None }),
			Mutation::SetProperty { node, name, value } => self.set_property(node, name, value).map(|command| Applied { command, created: None }),
			Mutation::SetTitle { title } => {
				let cmd = command::render_title(&title);
				self.title = Some(cmd.clone());
				Ok(Applied {
					command: Some(cmd),
					created: None,
				})
			}
		}
	}

	/// Creates a node, attaching it to `parent` when one is given.
	///
	/// Returns the new id and the command describing the append, if it is
	/// observable.
	pub fn create_node(&mut self, parent: Option<NodeId>, tag: String) -> Result<(NodeId, Option<Command>), TreeError> {
		let Some(parent) = parent else {
			return Ok((self.create(tag), None));
		};
		let parent_node = self.nodes.get(&parent).ok_or(TreeError::UnknownNode(parent))?;
		if parent_node.removed {
			return Err(TreeError::Removed(parent));
		}
		let child = self.create(tag);
		Ok((child, self.append(parent, child)))
	}

	fn create(&mut self, tag: String) -> NodeId {
		let id = self.ids.next();
		self.nodes.insert(id, Node::new(tag));
		id
	}

	fn check_append(&self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
		if child.is_root() {
			return Err(TreeError::Root);
		}
		let parent_node = self.nodes.get(&parent).ok_or(TreeError::UnknownNode(parent))?;
		let child_node = self.nodes.get(&child).ok_or(TreeError::UnknownNode(child))?;
		if child_node.removed {
			return Err(TreeError::Removed(child));
		}
		if parent_node.removed {
			return Err(TreeError::Removed(parent));
		}
		if let Some(current) = child_node.parent {
			return Err(TreeError::AlreadyAttached { node: child, parent: current });
		}
		// `child` is detached, so it is an ancestor of `parent` only if the walk
		// up from `parent` runs into it.
		let mut cursor = Some(parent);
		while let Some(id) = cursor {
			if id == child {
				return Err(TreeError::Cycle { parent, child });
			}
			cursor = self.nodes.get(&id).and_then(|node| node.parent);
		}
		Ok(())
	}

	// Caller has validated both ids.
	fn append(&mut self, parent: NodeId, child: NodeId) -> Option<Command> {
		if let Some(node) = self.nodes.get_mut(&parent) {
			node.children.push(child);
		}
		if let Some(node) = self.nodes.get_mut(&child) {
			node.parent = Some(parent);
		}
		self.is_attached(parent).then(|| command::render_append(self, parent, child))
	}

	fn remove(&mut self, id: NodeId) -> Result<Option<Command>, TreeError> {
		if id.is_root() {
			return Err(TreeError::Root);
		}
		let node = self.nodes.get(&id).ok_or(TreeError::UnknownNode(id))?;
		if node.removed {
			return Err(TreeError::Removed(id));
		}
		let parent = node.parent.ok_or(TreeError::NotAttached(id))?;
		let index = self
			.nodes
			.get(&parent)
			.and_then(|p| p.children.iter().position(|&c| c == id))
			.ok_or(TreeError::NotAChild { node: id, parent })?;

		let was_attached = self.is_attached(id);
		if let Some(p) = self.nodes.get_mut(&parent) {
			p.children.remove(index);
		}
		if let Some(node) = self.nodes.get_mut(&id) {
			node.parent = None;
			node.removed = true;
		}
		Ok(was_attached.then(|| command::render_remove(id)))
	}

	fn set_property(&mut self, id: NodeId, name: String, value: PropValue) -> Result<Option<Command>, TreeError> {
		let attached = self.is_attached(id);
		let node = self.nodes.get_mut(&id).ok_or(TreeError::UnknownNode(id))?;
		let cmd = attached.then(|| command::render_set_property(id, &name, &value));
		node.props.insert(name, value);
		Ok(cmd)
	}
}
