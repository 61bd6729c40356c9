use std::collections::BTreeMap;

use tokio::sync::{mpsc, oneshot};
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use super::commands::DocumentCmd;
use super::handle::{DocumentHandle, DocumentStats};
use super::subscription::SubscriberId;
use crate::command::Command;
use crate::config::{DeliveryPolicy, DocumentConfig};
use crate::error::TreeError;
use crate::tree::Tree;

struct Subscriber {
	tx: mpsc::Sender<Command>,
	token: CancellationToken,
}

/// Why a subscriber left the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Departure {
	Unsubscribed,
	Cancelled,
	StreamDropped,
	Evicted,
}

enum Delivery {
	Delivered,
	Failed(Departure),
}

/// Actor owning one document tree and its subscribers.
pub(crate) struct DocumentService {
	rx: mpsc::Receiver<DocumentCmd>,
	tree: Tree,
	subscribers: BTreeMap<SubscriberId, Subscriber>,
	next_subscriber: u64,
	delivery: DeliveryPolicy,
}

impl DocumentService {
	/// Spawns the document actor on the current tokio runtime.
	pub(crate) fn start(config: DocumentConfig) -> DocumentHandle {
		let (tx, rx) = mpsc::channel(config.mailbox_capacity);
		let service = Self {
			rx,
			tree: Tree::new(&config.style),
			subscribers: BTreeMap::new(),
			next_subscriber: 0,
			delivery: config.delivery,
		};
		tokio::spawn(service.run());
		DocumentHandle::new(tx, config.subscriber_buffer)
	}

	async fn run(mut self) {
		while let Some(cmd) = self.rx.recv().await {
			match cmd {
				DocumentCmd::Mutate { mutation, reply } => {
					let kind = mutation.kind();
					let result = self.tree.apply(mutation).map(|applied| {
						let command = applied.command.clone();
						(applied, command)
					});
					if !self.commit(kind, result, reply).await {
						break;
					}
				}
				DocumentCmd::Create { parent, tag, reply } => {
					let kind = if parent.is_some() { "create_append" } else { "create" };
					let result = self.tree.create_node(parent, tag);
					if !self.commit(kind, result, reply).await {
						break;
					}
				}
				DocumentCmd::Subscribe { tx, token, reply } => {
					let id = self.register(tx, token);
					let _ = reply.send(id);
				}
				DocumentCmd::Unsubscribe { id } => {
					if !self.depart(id, Departure::Unsubscribed) {
						tracing::trace!(subscriber = %id, "document.unsubscribe.unknown");
					}
				}
				DocumentCmd::Stats { reply } => {
					let _ = reply.send(DocumentStats {
						subscribers: self.subscribers.len(),
						nodes: self.tree.len(),
					});
				}
				DocumentCmd::Shutdown { reply } => {
					self.subscribers.clear();
					let _ = reply.send(());
					break;
				}
			}
		}

		// Dropping the senders ends every subscriber stream.
		self.subscribers.clear();
		tracing::debug!("document.stopped");
	}

	/// Broadcasts a successful change and replies. Returns false when the
	/// change violated an invariant and the document must stop.
	async fn commit<T>(
		&mut self,
		kind: &'static str,
		result: Result<(T, Option<Command>), TreeError>,
		reply: oneshot::Sender<Result<T, TreeError>>,
	) -> bool {
		match result {
			Ok((value, command)) => {
				if let Some(command) = &command {
					self.broadcast(command).await;
				}
				let _ = reply.send(Ok(value));
				true
			}
			Err(err) => {
				tracing::error!(mutation = kind, error = %err, "document.invariant_violation");
				let _ = reply.send(Err(err));
				false
			}
		}
	}

	fn register(&mut self, tx: mpsc::Sender<Command>, token: CancellationToken) -> SubscriberId {
		self.next_subscriber += 1;
		let id = SubscriberId(self.next_subscriber);
		// The stream is fresh and holds at least one slot.
		if tx.try_send(self.tree.snapshot()).is_err() {
			tracing::debug!(subscriber = %id, "document.subscribe.abandoned");
			return id;
		}
		self.subscribers.insert(id, Subscriber { tx, token });
		tracing::debug!(subscriber = %id, subscribers = self.subscribers.len(), "document.subscribe");
		id
	}

	fn depart(&mut self, id: SubscriberId, reason: Departure) -> bool {
		if self.subscribers.remove(&id).is_none() {
			return false;
		}
		if reason == Departure::Evicted {
			tracing::warn!(subscriber = %id, "document.subscriber.evicted");
		} else {
			tracing::debug!(subscriber = %id, ?reason, subscribers = self.subscribers.len(), "document.unsubscribe");
		}
		true
	}

	async fn broadcast(&mut self, command: &Command) {
		let mut departed = Vec::new();
		for (&id, subscriber) in &self.subscribers {
			let delivery = match self.delivery {
				DeliveryPolicy::Backpressure => deliver_blocking(subscriber, command).await,
				DeliveryPolicy::EvictSlow => deliver_nonblocking(subscriber, command),
			};
			if let Delivery::Failed(reason) = delivery {
				departed.push((id, reason));
			}
		}
		tracing::trace!(
			subscribers = self.subscribers.len(),
			departed = departed.len(),
			bytes = command.as_str().len(),
			"document.broadcast"
		);
		for (id, reason) in departed {
			self.depart(id, reason);
		}
	}
}

async fn deliver_blocking(subscriber: &Subscriber, command: &Command) -> Delivery {
	if subscriber.token.is_cancelled() {
		return Delivery::Failed(Departure::Cancelled);
	}
	tokio::select! {
		biased;
		_ = subscriber.token.cancelled() => Delivery::Failed(Departure::Cancelled),
		res = subscriber.tx.send(command.clone()) => match res {
			Ok(()) => Delivery::Delivered,
			Err(_) => Delivery::Failed(Departure::StreamDropped),
		},
	}
}

fn deliver_nonblocking(subscriber: &Subscriber, command: &Command) -> Delivery {
	if subscriber.token.is_cancelled() {
		return Delivery::Failed(Departure::Cancelled);
	}
	match subscriber.tx.try_send(command.clone()) {
		Ok(()) => Delivery::Delivered,
		Err(TrySendError::Full(_)) => Delivery::Failed(Departure::Evicted),
		Err(TrySendError::Closed(_)) => Delivery::Failed(Departure::StreamDropped),
	}
}
