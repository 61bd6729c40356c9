//! Command text rendering.
//!
//! Every function here is pure: it reads the tree (or a single value) and
//! produces the script text the remote side evaluates. Commands are complete,
//! self-contained statements, so a subscriber can evaluate them one by one in
//! delivery order.
//!
//! Element references use `document.body` for the root and
//! `document.getElementById("<hex id>")` for created nodes.

use std::fmt::{self, Write as _};
use std::sync::Arc;

use serde::Serialize;

use crate::error::EncodeError;
use crate::id::NodeId;
use crate::tree::{Node, Tree};

/// One complete instruction for the remote interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command(Arc<str>);

impl Command {
	/// Wraps already-rendered command text.
	pub fn new(text: impl Into<Arc<str>>) -> Self {
		Self(text.into())
	}

	/// Command text.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for Command {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl AsRef<str> for Command {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

/// A property value recorded on a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropValue {
	/// A literal already encoded as JSON text.
	Json(String),
	/// A handler body, run with no arguments in the remote context.
	Function(String),
}

impl PropValue {
	/// Encodes any serializable value as a JSON literal.
	pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, EncodeError> {
		let text = serde_json::to_string(value)?;
		Ok(Self::Json(escape_line_separators(text)))
	}

	/// Wraps raw script as a handler body.
	pub fn function(body: impl Into<String>) -> Self {
		Self::Function(body.into())
	}

	fn write_to(&self, out: &mut String) {
		match self {
			Self::Json(text) => out.push_str(text),
			Self::Function(body) => {
				let _ = write!(out, "function() {{ {body} }}");
			}
		}
	}
}

// JSON permits raw U+2028/U+2029 inside strings; older script engines do not.
fn escape_line_separators(text: String) -> String {
	if !text.contains(['\u{2028}', '\u{2029}']) {
		return text;
	}
	text.replace('\u{2028}', "\\u2028").replace('\u{2029}', "\\u2029")
}

/// Checks that `name` can follow a `.` in a property assignment.
pub fn validate_name(name: &str) -> Result<(), EncodeError> {
	let mut chars = name.chars();
	let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
		&& chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
	if valid { Ok(()) } else { Err(EncodeError::InvalidName(name.to_owned())) }
}

/// Checks that `tag` names an element without escaping.
pub fn validate_tag(tag: &str) -> Result<(), EncodeError> {
	let mut chars = tag.chars();
	let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic()) && chars.all(|c| c.is_ascii_alphanumeric() || c == '-');
	if valid { Ok(()) } else { Err(EncodeError::InvalidTag(tag.to_owned())) }
}

fn json_string(text: &str) -> String {
	// Serializing a `str` cannot fail.
	escape_line_separators(serde_json::to_string(text).unwrap_or_default())
}

fn element_ref(id: NodeId) -> String {
	if id.is_root() {
		"document.body".to_owned()
	} else {
		format!("document.getElementById(\"{id}\")")
	}
}

/// Resets the remote page and installs the document style.
pub fn render_init(style: &str) -> Command {
	Command::new(format!(
		"document.getElementsByTagName(\"html\")[0].innerHTML = \"<head><style></style></head><body></body>\"; \
		 document.head.getElementsByTagName(\"style\")[0].innerHTML = {};",
		json_string(style)
	))
}

/// Sets the remote page title.
pub fn render_title(title: &str) -> Command {
	Command::new(format!("document.title = {};", json_string(title)))
}

/// Expression creating `id` with its id and every recorded property, children excluded.
pub(crate) fn render_create(tree: &Tree, id: NodeId) -> String {
	let mut out = String::new();
	write_create(tree, id, &mut out);
	out
}

fn write_create(tree: &Tree, id: NodeId, out: &mut String) {
	let Some(node) = tree.node(id) else {
		return;
	};
	let _ = write!(out, "(function() {{ var e = document.createElement(\"{}\"); e.id = \"{id}\";", node.tag);
	write_props(node, out);
	out.push_str(" return e; })()");
}

// Assigns every recorded property to the scope's `e`.
fn write_props(node: &Node, out: &mut String) {
	for (name, value) in &node.props {
		let _ = write!(out, " e.{name} = ");
		value.write_to(out);
		out.push(';');
	}
}

// Creates `id`, attaches it to the enclosing scope's `e`, then recurses so
// every parent is in place before its children.
fn write_recreate(tree: &Tree, id: NodeId, out: &mut String) {
	out.push_str("(function(parent) { var e = ");
	write_create(tree, id, out);
	out.push_str("; parent.appendChild(e);");
	for &child in tree.children(id) {
		out.push(' ');
		write_recreate(tree, child, out);
	}
	out.push_str(" })(e);");
}

/// Creates `child` (and any subtree it already carries) under `parent`.
pub(crate) fn render_append(tree: &Tree, parent: NodeId, child: NodeId) -> Command {
	let mut out = String::new();
	if tree.children(child).is_empty() {
		let _ = write!(out, "{}.appendChild({});", element_ref(parent), render_create(tree, child));
	} else {
		let _ = write!(out, "(function() {{ var e = {}; ", element_ref(parent));
		write_recreate(tree, child, &mut out);
		out.push_str(" })();");
	}
	Command::new(out)
}

/// Detaches and disposes of `id` on the remote side.
pub(crate) fn render_remove(id: NodeId) -> Command {
	Command::new(format!("{}.remove();", element_ref(id)))
}

/// Assigns one property on an attached node.
pub(crate) fn render_set_property(id: NodeId, name: &str, value: &PropValue) -> Command {
	let mut out = format!("{}.{name} = ", element_ref(id));
	value.write_to(&mut out);
	out.push(';');
	Command::new(out)
}

/// Rebuilds the whole remote page from the current tree.
pub(crate) fn render_snapshot(tree: &Tree) -> Command {
	let mut out = String::from(tree.init().as_str());
	if let Some(title) = tree.title() {
		out.push_str(title.as_str());
	}
	out.push_str("(function() { var e = document.body;");
	if let Some(root) = tree.node(NodeId::ROOT) {
		write_props(root, &mut out);
	}
	for &child in tree.children(NodeId::ROOT) {
		out.push(' ');
		write_recreate(tree, child, &mut out);
	}
	out.push_str(" })();");
	Command::new(out)
}

/// Handler body that reports `act` back through the client page's socket.
pub fn action_handler(act: &str) -> String {
	format!("webs.send(JSON.stringify({{\"Act\":{}}}));", json_string(act))
}
