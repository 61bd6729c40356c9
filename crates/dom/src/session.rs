//! Transport boundary.
//!
//! A transport supplies a [`CommandSink`] per connection and runs
//! [`serve_session`] for it. The session subscribes, forwards every command
//! under a per-command deadline, and cancels the subscription on the way out,
//! whatever the reason. A failed or late write is never retried.

use async_trait::async_trait;
use thiserror::Error;

use crate::command::Command;
use crate::config::SessionConfig;
use crate::document::DocumentHandle;
use crate::error::Result;

/// Failure reported by a transport while writing one command.
#[derive(Debug, Error)]
pub enum SinkError {
	/// The underlying connection failed.
	#[error("sink I/O error: {0}")]
	Io(#[from] std::io::Error),
	/// The remote side went away.
	#[error("sink closed")]
	Closed,
}

/// Outbound half of one connection.
#[async_trait]
pub trait CommandSink: Send {
	/// Hands one command to the remote interpreter.
	async fn eval(&mut self, command: &Command) -> std::result::Result<(), SinkError>;
}

/// Why a session stopped forwarding.
#[derive(Debug)]
pub enum SessionEnd {
	/// The document closed the stream.
	Closed,
	/// The sink reported an error.
	SinkFailed(SinkError),
	/// The sink did not accept a command within the deadline.
	TimedOut,
}

/// Streams a document to `sink` until the stream ends or the sink fails.
pub async fn serve_session<S>(doc: &DocumentHandle, sink: &mut S, config: SessionConfig) -> Result<SessionEnd>
where
	S: CommandSink + ?Sized,
{
	let mut subscription = doc.subscribe().await?;
	let id = subscription.id();
	tracing::debug!(subscriber = %id, "session.start");

	let end = loop {
		let Some(command) = subscription.recv().await else {
			break SessionEnd::Closed;
		};
		match tokio::time::timeout(config.eval_timeout, sink.eval(&command)).await {
			Ok(Ok(())) => {}
			Ok(Err(err)) => {
				tracing::warn!(subscriber = %id, error = %err, "session.sink_failed");
				break SessionEnd::SinkFailed(err);
			}
			Err(_) => {
				tracing::warn!(subscriber = %id, timeout = ?config.eval_timeout, "session.eval_timeout");
				break SessionEnd::TimedOut;
			}
		}
	};

	subscription.cancel().await;
	tracing::debug!(subscriber = %id, end = ?end, "session.end");
	Ok(end)
}
