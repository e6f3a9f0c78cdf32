//! Wire types for the Bayeux 1.0 publish/subscribe protocol.
//!
//! This crate covers the parts of the protocol that are pure data: message
//! shape, channel-name grammar and wildcard derivation, and the frozen error
//! code / advice vocabulary. It has no knowledge of sessions, transports, or
//! scheduling -- that lives in `bayeux-core`.

pub mod advice;
pub mod channel_name;
pub mod error_codes;
pub mod message;

pub use advice::Advice;
pub use channel_name::{ChannelKind, ChannelName, ChannelNameError};
pub use message::Message;
