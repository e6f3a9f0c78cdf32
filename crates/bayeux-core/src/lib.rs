//! The Bayeux broker: session lifecycle, channel dispatch, the long-poll
//! scheduler, the sweeper, and the acknowledged-messages extension.
//!
//! Transport-level concerns (cookies, HTTP status codes, request parsing)
//! are deliberately absent -- those live in the host binary. This crate
//! exposes [`Broker::process`] for one inbound message and
//! [`Broker::suspend_or_complete_connect`] for the long-poll hold decision;
//! everything else (registries, extensions, policy, the ack bolt-on) hangs
//! off those two entry points.

pub mod ack;
pub mod broker;
pub mod channel;
pub mod error;
pub mod extension;
pub mod listener;
pub mod options;
pub mod policy;
pub mod session;
pub mod time;
pub mod waiter;

pub use ack::AckSessionExtension;
pub use broker::{Broker, ConnectDecision};
pub use channel::{Channel, ChannelListener};
pub use error::BrokerError;
pub use extension::{ServerExtension, SessionExtension};
pub use listener::{BrokerEvent, BrokerListener};
pub use options::BrokerOptions;
pub use policy::{PermissivePolicy, Policy};
pub use session::Session;
pub use waiter::{LongPollWaiter, WaiterOutcome};
