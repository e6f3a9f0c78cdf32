//! Broker-level lifecycle events: `sessionAdded`, `sessionRemoved`,
//! `channelAdded`, `channelRemoved`, `subscribed`, `unsubscribed`.
//!
//! Events carry session/channel *ids* rather than `Arc<Session>`/owned
//! `Channel` handles so a listener cannot extend a session's or channel's
//! lifetime past removal (`SPEC_FULL.md` §9, "Cyclic references").

use bayeux_protocol::ChannelName;

#[derive(Debug, Clone)]
pub enum BrokerEvent {
    SessionAdded(String),
    /// `timeout = true` when the sweeper reaped the session, `false` when a
    /// client sent `/meta/disconnect`.
    SessionRemoved(String, bool),
    ChannelAdded(ChannelName),
    ChannelRemoved(ChannelName),
    Subscribed(String, ChannelName),
    Unsubscribed(String, ChannelName),
}

pub trait BrokerListener: Send + Sync {
    fn on_event(&self, event: &BrokerEvent);
}
