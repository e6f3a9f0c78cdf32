//! Frozen Bayeux error code strings, `"code::tag"` per the wire spec.

pub const CHANNEL_MISSING: &str = "400::channel_missing";
pub const SESSION_UNKNOWN: &str = "402::session_unknown";
pub const HANDSHAKE_DENIED: &str = "403::handshake_denied";
pub const CHANNEL_DENIED: &str = "403::channel_denied";
pub const PUBLISH_DENIED: &str = "403::publish_denied";
pub const SUBSCRIBE_DENIED: &str = "403::subscribe_denied";
pub const SUBSCRIBE_FAILED: &str = "403::subscribe_failed";
pub const UNSUBSCRIBE_FAILED: &str = "403::unsubscribe_failed";
pub const SUBSCRIPTION_MISSING: &str = "403::subscription_missing";
pub const MESSAGE_DELETED: &str = "404::message_deleted";
