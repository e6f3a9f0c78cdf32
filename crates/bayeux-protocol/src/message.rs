//! The Bayeux message envelope.
//!
//! A [`Message`] caches its serialized JSON form lazily, on first call to
//! [`Message::serialize`]. Per the protocol's immutability-after-serialize
//! rule, later field mutations are *not* reflected in an already-computed
//! cache -- this is deliberate (see `spec.md` / `SPEC_FULL.md` §3/§9), not an
//! oversight.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::advice::Advice;
use crate::channel_name::ChannelName;

/// `subscription` may be a single channel name or a list of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Subscription {
    One(ChannelName),
    Many(Vec<ChannelName>),
}

impl Subscription {
    pub fn channels(&self) -> Vec<ChannelName> {
        match self {
            Subscription::One(c) => vec![c.clone()],
            Subscription::Many(cs) => cs.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Subscription::Many(v) if v.is_empty())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelName>,
    #[serde(rename = "clientId", skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<Subscription>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advice: Option<Advice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub successful: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(
        rename = "supportedConnectionTypes",
        skip_serializing_if = "Option::is_none"
    )]
    pub supported_connection_types: Option<Vec<String>>,
    #[serde(rename = "connectionType", skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<String>,

    /// Back-reference to the reply this inbound message accumulates, built
    /// fresh per request in the broker pipeline. Never serialized.
    #[serde(skip)]
    pub reply: Option<Box<Message>>,

    #[serde(skip)]
    cached_json: OnceLock<String>,
}

impl Clone for Message {
    fn clone(&self) -> Self {
        Self {
            channel: self.channel.clone(),
            client_id: self.client_id.clone(),
            id: self.id.clone(),
            data: self.data.clone(),
            subscription: self.subscription.clone(),
            ext: self.ext.clone(),
            advice: self.advice.clone(),
            successful: self.successful,
            error: self.error.clone(),
            version: self.version.clone(),
            supported_connection_types: self.supported_connection_types.clone(),
            connection_type: self.connection_type.clone(),
            reply: self.reply.clone(),
            // A clone starts with a fresh cache; nothing has been serialized
            // for it yet, so there is no staleness to preserve.
            cached_json: OnceLock::new(),
        }
    }
}

impl Message {
    pub fn new(channel: ChannelName) -> Self {
        Self {
            channel: Some(channel),
            ..Default::default()
        }
    }

    /// Build the `{id, channel}` reply skeleton attached to every inbound
    /// message at the start of the pipeline (`SPEC_FULL.md` §4.1 step 1).
    pub fn new_reply(id: Option<String>, channel: Option<ChannelName>) -> Self {
        Self {
            id,
            channel,
            ..Default::default()
        }
    }

    pub fn channel_name(&self) -> Option<&ChannelName> {
        self.channel.as_ref()
    }

    pub fn set_error(&mut self, code: &str) {
        self.successful = Some(false);
        self.error = Some(code.to_owned());
    }

    pub fn advice_mut(&mut self) -> &mut Advice {
        self.advice.get_or_insert_with(Advice::default)
    }

    /// Serialize to JSON, computing and caching the result on first call.
    /// Subsequent mutations of `self` do not invalidate the cache.
    pub fn serialize(&self) -> &str {
        self.cached_json
            .get_or_init(|| serde_json::to_string(self).expect("message fields are all JSON-safe"))
    }

    pub fn to_value(&self) -> Value {
        serde_json::from_str(self.serialize()).expect("cached form round-trips")
    }
}
