//! Server-side model of a remote UI tree, streamed to live observers.
//!
//! One [`DocumentHandle`] fronts an actor that owns the tree and the set of
//! subscribers. Mutations are applied one at a time; each produces at most one
//! [`Command`], handed to every current subscriber before the next request is
//! processed. A late subscriber receives a single snapshot command that
//! rebuilds the whole current page instead of the mutation history.
//!
//! * [`Tree`]: the node arena and mutation semantics, usable without the actor
//! * [`command`]: pure rendering of command text
//! * [`DocumentHandle`] / [`Subscription`]: the actor and its observers
//! * [`session`]: the boundary a transport plugs into
//! * [`client`]: the page a browser loads to run the command stream

#![warn(missing_docs)]

pub mod client;
pub mod command;
pub mod config;
mod document;
pub mod error;
mod id;
pub mod inbound;
mod mutation;
pub mod session;
mod tree;

pub use command::{Command, PropValue, action_handler};
pub use config::{DeliveryPolicy, DocumentConfig, SessionConfig};
pub use document::{DocumentHandle, DocumentStats, SubscriberId, Subscription, SubscriptionCanceller};
pub use error::{DocumentError, EncodeError, Result, TreeError};
pub use id::NodeId;
pub use inbound::{ActionMessage, decode_action};
pub use mutation::{Applied, Mutation};
pub use session::{CommandSink, SessionEnd, SinkError, serve_session};
pub use tree::Tree;
