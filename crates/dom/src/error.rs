//! Error types for the document core.

use thiserror::Error;

use crate::id::NodeId;

/// Structural invariant violations detected while applying a mutation.
///
/// These signal a defect in the calling code. The tree is left untouched when
/// one is returned, but the owning document stops serving afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
	/// The id does not name a node of this document.
	#[error("unknown node {0:?}")]
	UnknownNode(NodeId),

	/// The document root cannot be removed or re-parented.
	#[error("the document root cannot be moved or removed")]
	Root,

	/// The node has no parent to be removed from.
	#[error("node {0:?} is not attached to a parent")]
	NotAttached(NodeId),

	/// The node has already been removed and cannot be attached again.
	#[error("node {0:?} was removed and cannot be reused")]
	Removed(NodeId),

	/// The node already has a parent.
	#[error("node {node:?} already has parent {parent:?}")]
	AlreadyAttached {
		/// The node being appended.
		node: NodeId,
		/// Its current parent.
		parent: NodeId,
	},

	/// Appending would make a node its own ancestor.
	#[error("appending {child:?} under {parent:?} would create a cycle")]
	Cycle {
		/// The requested parent.
		parent: NodeId,
		/// The node being appended.
		child: NodeId,
	},

	/// The recorded parent does not list the node among its children.
	#[error("node {node:?} not found in the children of its parent {parent:?}")]
	NotAChild {
		/// The node being removed.
		node: NodeId,
		/// Its recorded parent.
		parent: NodeId,
	},
}

/// A value or name that cannot be rendered into command text.
#[derive(Debug, Error)]
pub enum EncodeError {
	/// The property value failed to serialize.
	#[error("failed to encode property value: {0}")]
	Json(#[from] serde_json::Error),

	/// The property name is not a script identifier.
	#[error("invalid property name: {0:?}")]
	InvalidName(String),

	/// The tag name is not a valid element tag.
	#[error("invalid tag: {0:?}")]
	InvalidTag(String),
}

/// Errors returned to callers of a [`DocumentHandle`](crate::DocumentHandle).
#[derive(Debug, Error)]
pub enum DocumentError {
	/// The document actor has stopped.
	#[error("document is closed")]
	Closed,

	/// The mutation violated a tree invariant; the document has stopped.
	#[error("tree invariant violated: {0}")]
	Invariant(#[from] TreeError),

	/// The mutation was rejected before reaching the tree.
	#[error(transparent)]
	Encode(#[from] EncodeError),
}

/// Result type for document operations.
pub type Result<T> = std::result::Result<T, DocumentError>;
