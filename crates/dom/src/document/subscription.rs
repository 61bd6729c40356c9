use std::fmt;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::commands::DocumentCmd;
use crate::command::Command;

/// Identity of one registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub(crate) u64);

impl fmt::Display for SubscriberId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Ordered command stream for one observer of a document.
///
/// The first item is always the snapshot taken at registration; every later
/// item is the command of one mutation, in the order mutations were applied.
/// The stream ends when the subscriber is deregistered or the document stops.
///
/// Dropping the subscription cancels it without waiting.
#[derive(Debug)]
pub struct Subscription {
	rx: mpsc::Receiver<Command>,
	canceller: SubscriptionCanceller,
}

impl Subscription {
	pub(crate) fn new(id: SubscriberId, rx: mpsc::Receiver<Command>, token: CancellationToken, requests: mpsc::WeakSender<DocumentCmd>) -> Self {
		Self {
			rx,
			canceller: SubscriptionCanceller { id, token, requests },
		}
	}

	/// This subscriber's identity.
	pub fn id(&self) -> SubscriberId {
		self.canceller.id
	}

	/// Receives the next command, or `None` once the stream has ended.
	pub async fn recv(&mut self) -> Option<Command> {
		self.rx.recv().await
	}

	/// Takes an already delivered command without waiting.
	pub fn try_recv(&mut self) -> Option<Command> {
		self.rx.try_recv().ok()
	}

	/// Returns a cloneable handle that can cancel this subscription from elsewhere.
	pub fn canceller(&self) -> SubscriptionCanceller {
		self.canceller.clone()
	}

	/// Deregisters this subscriber.
	///
	/// Races the deregistration request against draining the stream and stops
	/// at whichever finishes first: the request being accepted, or the actor
	/// closing the stream. Neither side can end up waiting on the other.
	pub async fn cancel(mut self) {
		self.canceller.token.cancel();
		let Some(requests) = self.canceller.requests.upgrade() else {
			return;
		};
		let id = self.canceller.id;
		loop {
			tokio::select! {
				res = requests.send(DocumentCmd::Unsubscribe { id }) => {
					if res.is_err() {
						tracing::trace!(subscriber = %id, "subscription.cancel.document_closed");
					}
					break;
				}
				msg = self.rx.recv() => {
					if msg.is_none() {
						break;
					}
				}
			}
		}
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		self.canceller.token.cancel();
	}
}

/// Cloneable cancellation side of a [`Subscription`].
///
/// Safe to call from any number of tasks, concurrently with each other and
/// with an in-flight broadcast to the same subscriber. Does not keep the
/// document alive.
#[derive(Debug, Clone)]
pub struct SubscriptionCanceller {
	id: SubscriberId,
	token: CancellationToken,
	requests: mpsc::WeakSender<DocumentCmd>,
}

impl SubscriptionCanceller {
	/// The subscriber this handle cancels.
	pub fn id(&self) -> SubscriberId {
		self.id
	}

	/// True once any cancellation was requested.
	pub fn is_cancelled(&self) -> bool {
		self.token.is_cancelled()
	}

	/// Cancels the subscription and asks the actor to deregister it.
	///
	/// Any broadcast blocked on this subscriber is released immediately.
	pub async fn cancel(&self) {
		self.token.cancel();
		if let Some(requests) = self.requests.upgrade() {
			let _ = requests.send(DocumentCmd::Unsubscribe { id: self.id }).await;
		}
	}
}
