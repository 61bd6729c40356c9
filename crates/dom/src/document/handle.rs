use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::commands::DocumentCmd;
use super::service::DocumentService;
use super::subscription::Subscription;
use crate::command::{PropValue, validate_name, validate_tag};
use crate::config::DocumentConfig;
use crate::error::{DocumentError, Result};
use crate::id::NodeId;
use crate::mutation::{Applied, Mutation};

/// Counts reported by [`DocumentHandle::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentStats {
	/// Currently registered subscribers.
	pub subscribers: usize,
	/// Nodes ever created, root included.
	pub nodes: usize,
}

/// Cloneable handle to a document actor.
///
/// Every method is a request to the actor and returns once it has been
/// processed; mutating calls return after their command has been handed to
/// every subscriber.
#[derive(Debug, Clone)]
pub struct DocumentHandle {
	tx: mpsc::Sender<DocumentCmd>,
	subscriber_buffer: usize,
}

impl DocumentHandle {
	pub(crate) fn new(tx: mpsc::Sender<DocumentCmd>, subscriber_buffer: usize) -> Self {
		Self { tx, subscriber_buffer }
	}

	/// Spawns a document actor on the current tokio runtime.
	///
	/// # Panics
	///
	/// Panics when called outside a tokio runtime.
	pub fn spawn(config: DocumentConfig) -> Self {
		DocumentService::start(config)
	}

	/// The implicit root of the remote tree.
	pub const fn body(&self) -> NodeId {
		NodeId::ROOT
	}

	/// True once the actor has stopped.
	pub fn is_closed(&self) -> bool {
		self.tx.is_closed()
	}

	async fn request<R>(&self, make: impl FnOnce(oneshot::Sender<R>) -> DocumentCmd) -> Result<R> {
		let (reply, rx) = oneshot::channel();
		self.tx.send(make(reply)).await.map_err(|_| DocumentError::Closed)?;
		rx.await.map_err(|_| DocumentError::Closed)
	}

	/// Applies one mutation and broadcasts its command.
	///
	/// Names are validated first; a rejected mutation never reaches the tree.
	pub async fn mutate(&self, mutation: Mutation) -> Result<Applied> {
		mutation.validate()?;
		let applied = self.request(|reply| DocumentCmd::Mutate { mutation, reply }).await??;
		Ok(applied)
	}

	async fn create(&self, parent: Option<NodeId>, tag: String) -> Result<NodeId> {
		validate_tag(&tag)?;
		let id = self.request(|reply| DocumentCmd::Create { parent, tag, reply }).await??;
		Ok(id)
	}

	/// Creates a detached element.
	pub async fn create_element(&self, tag: impl Into<String>) -> Result<NodeId> {
		self.create(None, tag.into()).await
	}

	/// Creates an element and appends it to `parent` in one step.
	pub async fn append_new(&self, parent: NodeId, tag: impl Into<String>) -> Result<NodeId> {
		self.create(Some(parent), tag.into()).await
	}

	/// Appends a detached element to `parent`.
	pub async fn append(&self, parent: NodeId, child: NodeId) -> Result<()> {
		self.mutate(Mutation::Append { parent, child }).await.map(drop)
	}

	/// Removes an element from its parent for good.
	pub async fn remove(&self, node: NodeId) -> Result<()> {
		self.mutate(Mutation::Remove { node }).await.map(drop)
	}

	/// Sets a property to any serializable value.
	pub async fn set<T: Serialize + ?Sized>(&self, node: NodeId, name: impl Into<String>, value: &T) -> Result<()> {
		let name = name.into();
		validate_name(&name)?;
		let value = PropValue::json(value)?;
		self.mutate(Mutation::SetProperty { node, name, value }).await.map(drop)
	}

	/// Sets a property to a handler running `body` with no arguments.
	pub async fn set_function(&self, node: NodeId, name: impl Into<String>, body: impl Into<String>) -> Result<()> {
		let value = PropValue::function(body);
		self.mutate(Mutation::SetProperty {
			node,
			name: name.into(),
			value,
		})
		.await
		.map(drop)
	}

	/// Sets the page title.
	pub async fn set_title(&self, title: impl Into<String>) -> Result<()> {
		self.mutate(Mutation::SetTitle { title: title.into() }).await.map(drop)
	}

	/// Registers a new subscriber whose first item is the current snapshot.
	pub async fn subscribe(&self) -> Result<Subscription> {
		let (tx, rx) = mpsc::channel(self.subscriber_buffer);
		let token = CancellationToken::new();
		let actor_token = token.clone();
		let id = self.request(|reply| DocumentCmd::Subscribe { tx, token: actor_token, reply }).await?;
		Ok(Subscription::new(id, rx, token, self.tx.downgrade()))
	}

	/// Returns current subscriber and node counts.
	pub async fn stats(&self) -> Result<DocumentStats> {
		self.request(|reply| DocumentCmd::Stats { reply }).await
	}

	/// Closes every subscriber stream and stops the actor.
	pub async fn shutdown(&self) {
		let _ = self.request(|reply| DocumentCmd::Shutdown { reply }).await;
	}
}
