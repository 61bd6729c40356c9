//! Document actor: the single serialization point for one tree.
//!
//! The actor owns the [`Tree`](crate::Tree) and the subscriber set. Mutations,
//! registrations and deregistrations are requests processed one at a time, so
//! the tree needs no locks and every subscriber observes the same totally
//! ordered command stream.
//!
//! # Invariants
//!
//! - A mutation's broadcast completes before the next request is processed.
//! - A new subscriber's first item is a snapshot of the tree as of its
//!   registration; it never receives commands for earlier mutations.
//! - A subscriber leaves the set exactly once, through cancellation, eviction,
//!   or a dropped stream.
//! - An invariant violation stops the actor and closes every stream.

mod commands;
mod handle;
mod service;
mod subscription;

pub use handle::{DocumentHandle, DocumentStats};
pub use subscription::{SubscriberId, Subscription, SubscriptionCanceller};

#[cfg(test)]
mod tests;
