//! Internal/pipeline failures.
//!
//! These surface when something has gone wrong at a level the Bayeux wire
//! protocol itself has no vocabulary for -- a malformed channel name reaching
//! code that assumed validation already happened, or a policy hook raising
//! instead of returning `Ok`/`Err(reason)`. Protocol-level denials (session
//! unknown, channel denied, ...) are *not* `BrokerError`s -- they are
//! ordinary successful replies with `error` set, per `SPEC_FULL.md` §7.

use bayeux_protocol::ChannelNameError;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("invalid channel name: {0}")]
    InvalidChannelName(#[from] ChannelNameError),
    #[error("policy hook failed: {0}")]
    Policy(String),
    #[error("server extension failed: {0}")]
    ServerExtension(String),
}
