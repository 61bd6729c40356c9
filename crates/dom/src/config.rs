//! Document and session configuration.

use std::time::Duration;

/// How the actor hands a command to each subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryPolicy {
	/// Wait for room in every subscriber's mailbox before moving on.
	///
	/// A stalled subscriber delays every other subscriber and the mutating
	/// caller until it drains, is cancelled, or drops its stream.
	#[default]
	Backpressure,
	/// Never wait; a subscriber whose mailbox is full is evicted and its
	/// stream ends.
	EvictSlow,
}

/// Settings for one document actor.
#[derive(Debug, Clone)]
pub struct DocumentConfig {
	pub(crate) style: String,
	pub(crate) mailbox_capacity: usize,
	pub(crate) subscriber_buffer: usize,
	pub(crate) delivery: DeliveryPolicy,
}

impl DocumentConfig {
	/// Sets the stylesheet installed by the init command.
	#[must_use]
	pub fn style(mut self, style: impl Into<String>) -> Self {
		self.style = style.into();
		self
	}

	/// Sets the request queue capacity of the actor.
	///
	/// # Panics
	///
	/// Panics if `capacity` is zero.
	#[must_use]
	pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
		assert!(capacity > 0, "mailbox capacity must be > 0");
		self.mailbox_capacity = capacity;
		self
	}

	/// Sets how many undelivered commands each subscriber may hold.
	///
	/// # Panics
	///
	/// Panics if `size` is zero; the snapshot needs one slot.
	#[must_use]
	pub fn subscriber_buffer(mut self, size: usize) -> Self {
		assert!(size > 0, "subscriber buffer must be > 0");
		self.subscriber_buffer = size;
		self
	}

	/// Sets the delivery policy.
	#[must_use]
	pub fn delivery(mut self, delivery: DeliveryPolicy) -> Self {
		self.delivery = delivery;
		self
	}
}

impl Default for DocumentConfig {
	fn default() -> Self {
		Self {
			style: String::new(),
			mailbox_capacity: 256,
			subscriber_buffer: 1,
			delivery: DeliveryPolicy::Backpressure,
		}
	}
}

/// Settings for one transport session.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
	/// Deadline for handing one command to the sink.
	pub eval_timeout: Duration,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			eval_timeout: Duration::from_secs(1),
		}
	}
}
