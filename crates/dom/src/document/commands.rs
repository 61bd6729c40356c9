use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::handle::DocumentStats;
use super::subscription::SubscriberId;
use crate::command::Command;
use crate::error::TreeError;
use crate::id::NodeId;
use crate::mutation::{Applied, Mutation};

/// Requests for the document actor.
#[derive(Debug)]
pub(crate) enum DocumentCmd {
	/// Apply one mutation and broadcast its command.
	Mutate {
		/// The change to apply.
		mutation: Mutation,
		/// Reply sent after the broadcast has finished.
		reply: oneshot::Sender<Result<Applied, TreeError>>,
	},
	/// Create a node, optionally attached, and reply with its id.
	Create {
		/// Parent to attach to, if any.
		parent: Option<NodeId>,
		/// Element tag.
		tag: String,
		/// Reply sent after the broadcast has finished.
		reply: oneshot::Sender<Result<NodeId, TreeError>>,
	},
	/// Register a subscriber and hand it the current snapshot.
	Subscribe {
		/// Delivery side of the subscriber's stream.
		tx: mpsc::Sender<Command>,
		/// Fires when the subscriber gives up.
		token: CancellationToken,
		/// Reply with the assigned identity.
		reply: oneshot::Sender<SubscriberId>,
	},
	/// Deregister a subscriber; unknown ids are ignored.
	Unsubscribe {
		/// The subscriber leaving.
		id: SubscriberId,
	},
	/// Report current counts.
	Stats {
		/// Reply channel.
		reply: oneshot::Sender<DocumentStats>,
	},
	/// Close every stream and stop.
	Shutdown {
		/// Reply sent once all streams are closed.
		reply: oneshot::Sender<()>,
	},
}
