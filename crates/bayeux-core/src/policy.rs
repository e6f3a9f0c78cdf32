//! Pluggable security policy hooks.
//!
//! A missing override means "permitted" -- every method has a default body
//! returning `Ok(true)`. Policy exceptions (an `Err`) propagate as a pipeline
//! failure rather than being swallowed, per `SPEC_FULL.md` §9's note on the
//! asymmetric error-propagation between policy and session-extension
//! failures.

use async_trait::async_trait;
use bayeux_protocol::{ChannelName, Message};

use crate::session::Session;

#[async_trait]
pub trait Policy: Send + Sync {
    async fn can_handshake(&self, _message: &Message) -> Result<bool, String> {
        Ok(true)
    }

    async fn can_create(
        &self,
        _channel: &ChannelName,
        _session: Option<&Session>,
        _message: &Message,
    ) -> Result<bool, String> {
        Ok(true)
    }

    async fn can_subscribe(
        &self,
        _channel: &ChannelName,
        _session: &Session,
        _message: &Message,
    ) -> Result<bool, String> {
        Ok(true)
    }

    async fn can_publish(
        &self,
        _channel: &ChannelName,
        _session: Option<&Session>,
        _message: &Message,
    ) -> Result<bool, String> {
        Ok(true)
    }
}

/// The default policy: everything permitted. Used when the host does not
/// install one of its own.
pub struct PermissivePolicy;

#[async_trait]
impl Policy for PermissivePolicy {}
