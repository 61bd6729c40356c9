//! Line-oriented stdio transport.
//!
//! Commands go out as one JSON string literal per line, so a command whose
//! text holds a newline still occupies exactly one line. Actions come in as
//! one JSON action object per line.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use webs_dom::{ActionMessage, Command, CommandSink, SinkError, decode_action};

/// Writes each command as one JSON-quoted line.
pub struct LineSink<W> {
	out: W,
}

impl<W> LineSink<W> {
	pub fn new(out: W) -> Self {
		Self { out }
	}
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> CommandSink for LineSink<W> {
	async fn eval(&mut self, command: &Command) -> Result<(), SinkError> {
		let mut line = serde_json::to_string(command.as_str()).map_err(std::io::Error::from)?;
		line.push('\n');
		self.out.write_all(line.as_bytes()).await?;
		self.out.flush().await?;
		Ok(())
	}
}

/// Forwards actions read from `input` until it closes or the page stops listening.
pub async fn forward_actions<R: AsyncRead + Unpin>(input: R, actions: mpsc::Sender<ActionMessage>) {
	let mut lines = BufReader::new(input).lines();
	loop {
		let line = match lines.next_line().await {
			Ok(Some(line)) => line,
			Ok(None) => break,
			Err(err) => {
				tracing::warn!(error = %err, "stdin read failed");
				break;
			}
		};
		if line.trim().is_empty() {
			continue;
		}
		match decode_action(line.as_bytes()) {
			Ok(action) => {
				if actions.send(action).await.is_err() {
					break;
				}
			}
			Err(err) => tracing::warn!(error = %err, "ignoring action"),
		}
	}
	tracing::debug!("action reader stopped");
}
