//! Plain-data mutation requests interpreted by [`Tree::apply`](crate::Tree::apply).

use crate::command::{self, Command, PropValue};
use crate::error::EncodeError;
use crate::id::NodeId;

/// One structural or property change to a document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
	/// Record a new detached node.
	Create {
		/// Element tag.
		tag: String,
	},
	/// Attach a detached node as the last child of `parent`.
	Append {
		/// New parent.
		parent: NodeId,
		/// Node being attached.
		child: NodeId,
	},
	/// Create a node and attach it in one step.
	CreateAppend {
		/// New parent.
		parent: NodeId,
		/// Element tag.
		tag: String,
	},
	/// Detach a node from its parent for good.
	Remove {
		/// Node being removed.
		node: NodeId,
	},
	/// Record (and, when attached, publish) a property value.
	SetProperty {
		/// Target node.
		node: NodeId,
		/// Property name.
		name: String,
		/// New value.
		value: PropValue,
	},
	/// Replace the document title.
	SetTitle {
		/// New title.
		title: String,
	},
}

impl Mutation {
	/// Short operation name for logs.
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::Create { .. } => "create",
			Self::Append { .. } => "append",
			Self::CreateAppend { .. } => "create_append",
			Self::Remove { .. } => "remove",
			Self::SetProperty { .. } => "set_property",
			Self::SetTitle { .. } => "set_title",
		}
	}
}

/// Result of applying one mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Applied {
	/// Command to broadcast, absent when the change is not yet observable remotely.
	pub command: Option<Command>,
	/// Node created by this mutation, if any.
	pub created: Option<NodeId>,
}

impl Mutation {
	/// Checks the names this mutation would splice into command text.
	pub fn validate(&self) -> Result<(), EncodeError> {
		match self {
			Self::Create { tag } | Self::CreateAppend { tag, .. } => command::validate_tag(tag),
			Self::SetProperty { name, .. } => command::validate_name(name),
			Self::Append { .. } | Self::Remove { .. } | Self::SetTitle { .. } => Ok(()),
		}
	}
}
