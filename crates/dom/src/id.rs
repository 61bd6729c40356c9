//! Node identity and the per-document identifier counter.

use std::fmt;

/// Identifier of one node within a single document.
///
/// The root is the distinguished value `0`; it stands for the implicit body of
/// the remote tree rather than a created node and renders as the empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
	/// The implicit root of the remote tree.
	pub const ROOT: Self = Self(0);

	/// Returns true for the document root.
	#[must_use]
	pub const fn is_root(self) -> bool {
		self.0 == 0
	}

	/// Raw counter value.
	#[must_use]
	pub const fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.is_root() { Ok(()) } else { write!(f, "{:x}", self.0) }
	}
}

/// Counter-based id generator owned by one document.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct NodeIdGen(u64);

impl NodeIdGen {
	/// Generates the next id. The first id handed out is `1`.
	#[allow(clippy::should_implement_trait, reason = "convention")]
	pub(crate) fn next(&mut self) -> NodeId {
		self.0 += 1;
		NodeId(self.0)
	}
}
