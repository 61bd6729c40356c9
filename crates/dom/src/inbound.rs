//! Decoding of actions reported by the remote page.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One user action, as sent by handlers built with [`action_handler`](crate::action_handler).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionMessage {
	/// Action name.
	#[serde(rename = "Act")]
	pub act: String,
}

/// An inbound message that could not be decoded.
#[derive(Debug, Error)]
pub enum InboundError {
	/// The payload is not a JSON action object.
	#[error("malformed action message: {0}")]
	Malformed(#[from] serde_json::Error),
}

/// Decodes one action message.
pub fn decode_action(data: &[u8]) -> Result<ActionMessage, InboundError> {
	Ok(serde_json::from_slice(data)?)
}
