//! The counter page: a button, a count, and a ticking clock.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use webs_dom::{ActionMessage, DocumentHandle, NodeId, Result, action_handler};

pub const INCREMENT: &str = "increment-count";

/// Handles to the nodes the demo keeps updating.
#[derive(Debug)]
pub struct CounterPage {
	pub count_view: NodeId,
	pub clock: NodeId,
	pub count: u64,
}

impl CounterPage {
	pub async fn build(doc: &DocumentHandle, title: &str) -> Result<Self> {
		doc.set_title(title).await?;

		let p = doc.create_element("p").await?;
		doc.append(doc.body(), p).await?;

		let button = doc.create_element("button").await?;
		doc.set(button, "innerText", "+1").await?;
		doc.set_function(button, "onclick", action_handler(INCREMENT)).await?;
		doc.append(p, button).await?;

		let count_view = doc.create_element("span").await?;
		doc.set(count_view, "innerText", "0").await?;
		doc.set(count_view, "className", "count").await?;
		doc.append(p, count_view).await?;

		let clock = doc.append_new(p, "div").await?;

		Ok(Self { count_view, clock, count: 0 })
	}

	/// Bumps the counter and publishes the new value.
	pub async fn increment(&mut self, doc: &DocumentHandle) -> Result<()> {
		self.count += 1;
		doc.set(self.count_view, "innerText", &self.count.to_string()).await
	}
}

/// Writes the current time into `clock` every `period` until the document closes.
pub async fn run_clock(doc: DocumentHandle, clock: NodeId, period: Duration) {
	let mut ticks = tokio::time::interval(period);
	loop {
		ticks.tick().await;
		let secs = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default();
		if let Err(err) = doc.set(clock, "innerText", &format!("unix time {secs}")).await {
			tracing::debug!(error = %err, "clock stopped");
			return;
		}
	}
}

/// Applies actions from every connected client until all senders are gone.
pub async fn run_actions(doc: DocumentHandle, mut page: CounterPage, mut actions: mpsc::Receiver<ActionMessage>) {
	while let Some(action) = actions.recv().await {
		match action.act.as_str() {
			INCREMENT => {
				if let Err(err) = page.increment(&doc).await {
					tracing::warn!(error = %err, "increment failed");
					break;
				}
			}
			other => tracing::warn!(act = other, "unknown action"),
		}
	}
	tracing::debug!("action loop stopped");
}
