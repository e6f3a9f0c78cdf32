//! A minimal Bayeux long-poll client for integration tests against
//! `bayeux-server`: issues `POST`s carrying a JSON message array and tracks
//! the browser cookie via `reqwest`'s own cookie jar, the same way a real
//! browser-hosted Bayeux client would.

use bayeux_protocol::message::Subscription;
use bayeux_protocol::{ChannelName, Message};
use reqwest::Client;

pub struct BayeuxTestClient {
    http: Client,
    base_url: String,
    client_id: Option<String>,
}

impl BayeuxTestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = Client::builder().cookie_store(true).build().expect("reqwest client should build");
        Self {
            http,
            base_url: base_url.into(),
            client_id: None,
        }
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Lets a test spawn a second client pointed at the same server and
    /// browser-less session (e.g. to race a duplicate `/meta/connect`).
    pub fn base_url(&self) -> String {
        self.base_url.clone()
    }

    pub fn set_client_id(&mut self, client_id: impl Into<String>) {
        self.client_id = Some(client_id.into());
    }

    async fn send(&self, messages: &[Message]) -> Vec<Message> {
        let response = self.http.post(&self.base_url).json(messages).send().await.expect("bayeux request should succeed");
        response.json::<Vec<Message>>().await.expect("bayeux response should be a JSON message array")
    }

    fn handshake_message(with_ack: bool) -> Message {
        let mut handshake = Message::new(ChannelName::new("/meta/handshake").expect("valid channel"));
        handshake.version = Some("1.0".to_owned());
        handshake.supported_connection_types = Some(vec!["long-polling".to_owned()]);
        if with_ack {
            handshake.ext = Some(serde_json::json!({ "ack": true }));
        }
        handshake
    }

    pub async fn handshake(&mut self) -> Message {
        let mut replies = self.send(&[Self::handshake_message(false)]).await;
        let reply = replies.remove(0);
        self.client_id = reply.client_id.clone();
        reply
    }

    /// Handshakes with `ext.ack=true`, activating the acknowledged-messages
    /// extension for this session (`SPEC_FULL.md` §4.7).
    pub async fn handshake_with_ack(&mut self) -> Message {
        let mut replies = self.send(&[Self::handshake_message(true)]).await;
        let reply = replies.remove(0);
        self.client_id = reply.client_id.clone();
        reply
    }

    fn connect_message(&self) -> Message {
        let mut connect = Message::new(ChannelName::new("/meta/connect").expect("valid channel"));
        connect.client_id = self.client_id.clone();
        connect.connection_type = Some("long-polling".to_owned());
        connect
    }

    /// Issues one `/meta/connect`. For a held connect this blocks until the
    /// server resumes (message arrival, timeout, or preemption).
    pub async fn connect(&self) -> Vec<Message> {
        self.send(&[self.connect_message()]).await
    }

    /// Like [`Self::connect`] but returns only the HTTP status code, for
    /// tests asserting on a preempted duplicate connect's empty-body
    /// response rather than its (absent) JSON.
    pub async fn connect_status(&self) -> u16 {
        let response = self.http.post(&self.base_url).json(&[self.connect_message()]).send().await.expect("bayeux request should succeed");
        response.status().as_u16()
    }

    pub async fn subscribe(&self, channel: &str) -> Message {
        let mut subscribe = Message::new(ChannelName::new("/meta/subscribe").expect("valid channel"));
        subscribe.client_id = self.client_id.clone();
        subscribe.subscription = Some(Subscription::One(ChannelName::new(channel).expect("valid channel")));
        self.send(&[subscribe]).await.remove(0)
    }

    pub async fn unsubscribe(&self, channel: &str) -> Message {
        let mut unsubscribe = Message::new(ChannelName::new("/meta/unsubscribe").expect("valid channel"));
        unsubscribe.client_id = self.client_id.clone();
        unsubscribe.subscription = Some(Subscription::One(ChannelName::new(channel).expect("valid channel")));
        self.send(&[unsubscribe]).await.remove(0)
    }

    pub async fn publish(&self, channel: &str, data: serde_json::Value) -> Message {
        let mut publish = Message::new(ChannelName::new(channel).expect("valid channel"));
        publish.client_id = self.client_id.clone();
        publish.data = Some(data);
        self.send(&[publish]).await.remove(0)
    }

    pub async fn disconnect(&mut self) -> Message {
        let mut disconnect = Message::new(ChannelName::new("/meta/disconnect").expect("valid channel"));
        disconnect.client_id = self.client_id.clone();
        let reply = self.send(&[disconnect]).await.remove(0);
        self.client_id = None;
        reply
    }
}
