//! Wire-format tests: a `Message` must deserialize the shapes a real Bayeux
//! client sends and serialize back to the exact field set the protocol
//! expects, camelCase keys included.

use bayeux_protocol::message::Subscription;
use bayeux_protocol::{ChannelName, Message};

#[test]
fn handshake_request_deserializes() {
    let json = r#"{
        "channel": "/meta/handshake",
        "version": "1.0",
        "supportedConnectionTypes": ["long-polling"],
        "id": "1"
    }"#;
    let msg: Message = serde_json::from_str(json).unwrap();
    assert_eq!(msg.channel_name(), Some(&ChannelName::new("/meta/handshake").unwrap()));
    assert_eq!(msg.version.as_deref(), Some("1.0"));
    assert_eq!(msg.supported_connection_types, Some(vec!["long-polling".to_owned()]));
    assert_eq!(msg.id.as_deref(), Some("1"));
}

#[test]
fn handshake_reply_serializes_camel_case_fields() {
    let mut reply = Message::new_reply(Some("1".to_owned()), Some(ChannelName::new("/meta/handshake").unwrap()));
    reply.successful = Some(true);
    reply.client_id = Some("abc123".to_owned());
    reply.supported_connection_types = Some(vec!["long-polling".to_owned()]);
    let value = reply.to_value();
    assert_eq!(value["clientId"], "abc123");
    assert_eq!(value["supportedConnectionTypes"][0], "long-polling");
    assert!(value.get("client_id").is_none(), "must not leak the snake_case field name");
}

#[test]
fn error_reply_round_trips_through_json() {
    let mut reply = Message::new_reply(Some("2".to_owned()), Some(ChannelName::new("/meta/connect").unwrap()));
    reply.set_error(bayeux_protocol::error_codes::SESSION_UNKNOWN);
    let value = reply.to_value();
    assert_eq!(value["successful"], false);
    assert_eq!(value["error"], "402::session_unknown");
}

#[test]
fn subscribe_request_with_list_subscription_deserializes() {
    let json = r#"{"channel":"/meta/subscribe","clientId":"abc","subscription":["/foo","/bar"]}"#;
    let msg: Message = serde_json::from_str(json).unwrap();
    match msg.subscription {
        Some(Subscription::Many(channels)) => {
            assert_eq!(channels, vec![ChannelName::new("/foo").unwrap(), ChannelName::new("/bar").unwrap()]);
        }
        other => panic!("expected a list subscription, got {other:?}"),
    }
}

#[test]
fn a_full_message_array_deserializes() {
    let json = r#"[
        {"channel":"/meta/connect","clientId":"abc","connectionType":"long-polling"},
        {"channel":"/foo","data":{"x":1}}
    ]"#;
    let messages: Vec<Message> = serde_json::from_str(json).unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].channel_name().unwrap().as_str(), "/meta/connect");
    assert_eq!(messages[1].data.as_ref().unwrap()["x"], 1);
}
