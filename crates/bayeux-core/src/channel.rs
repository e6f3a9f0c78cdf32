//! Channel registry entries: subscribers and message listeners.
//!
//! Dispatch (wildcard ancestor walk, veto, fan-out) lives in [`crate::broker`];
//! a `Channel` only holds the per-channel state the broker dispatches
//! against. Subscribers are tracked by session id rather than by `Arc<Session>`
//! to avoid a Channel <-> Session reference cycle (`SPEC_FULL.md` §9).

use std::collections::HashSet;
use std::sync::Arc;

use bayeux_protocol::{ChannelKind, ChannelName, Message};

/// A listener attached to a channel. All three hooks default to a
/// permissive/no-op body, mirroring the "a missing handler means permitted"
/// convention used for [`crate::policy::Policy`].
pub trait ChannelListener: Send + Sync {
    fn on_subscribed(&self, _channel: &ChannelName, _session_id: &str) {}
    fn on_unsubscribed(&self, _channel: &ChannelName, _session_id: &str) {}
    /// Returning `false` vetoes the publish and stops the ancestor-first walk.
    fn on_message(&self, _channel: &ChannelName, _message: &Message) -> bool {
        true
    }
}

pub struct Channel {
    name: ChannelName,
    kind: ChannelKind,
    subscribers: HashSet<String>,
    listeners: Vec<Arc<dyn ChannelListener>>,
}

impl Channel {
    pub fn new(name: ChannelName) -> Self {
        let kind = name.kind();
        Self {
            name,
            kind,
            subscribers: HashSet::new(),
            listeners: Vec::new(),
        }
    }

    pub fn name(&self) -> &ChannelName {
        &self.name
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn is_meta(&self) -> bool {
        matches!(self.kind, ChannelKind::Meta)
    }

    /// Adds a subscriber. No-op on meta channels (callers should check
    /// `is_meta`/handshaken state before calling -- see `broker::_subscribe`).
    pub fn subscribe(&mut self, session_id: &str) -> bool {
        self.subscribers.insert(session_id.to_owned())
    }

    /// Idempotent: removing an absent subscriber is not an error.
    pub fn unsubscribe(&mut self, session_id: &str) -> bool {
        self.subscribers.remove(session_id)
    }

    pub fn subscribers(&self) -> impl Iterator<Item = &str> {
        self.subscribers.iter().map(String::as_str)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn add_listener(&mut self, listener: Arc<dyn ChannelListener>) {
        self.listeners.push(listener);
    }

    /// A snapshot of listeners, safe to iterate while the channel itself is
    /// mutated concurrently (`SPEC_FULL.md` §5).
    pub fn listeners(&self) -> Vec<Arc<dyn ChannelListener>> {
        self.listeners.clone()
    }

    /// Eligible for sweep removal: non-meta, no subscribers, no listeners.
    pub fn is_sweepable(&self) -> bool {
        !self.is_meta() && self.subscribers.is_empty() && self.listeners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_channel_is_never_sweepable() {
        let mut c = Channel::new(ChannelName::new("/meta/connect").unwrap());
        assert!(!c.is_sweepable());
        c.subscribe("s1");
        c.unsubscribe("s1");
        assert!(!c.is_sweepable());
    }

    #[test]
    fn broadcast_channel_sweepable_once_empty() {
        let mut c = Channel::new(ChannelName::new("/foo").unwrap());
        assert!(c.is_sweepable());
        c.subscribe("s1");
        assert!(!c.is_sweepable());
        c.unsubscribe("s1");
        assert!(c.is_sweepable());
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let mut c = Channel::new(ChannelName::new("/foo").unwrap());
        assert!(!c.unsubscribe("ghost"));
        c.subscribe("s1");
        assert!(c.unsubscribe("s1"));
        assert!(!c.unsubscribe("s1"));
    }
}
