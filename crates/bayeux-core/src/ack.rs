//! The acknowledged-messages extension: a per-session batched outbound log
//! with replay on reconnect (`SPEC_FULL.md` §4.7).
//!
//! Activated when a client sends `ext.ack=true` in `/meta/handshake`. Once
//! attached, broadcasts delivered to the session are tagged with the
//! currently-open batch number instead of leaving immediately; each
//! `/meta/connect` reply closes the current batch (recording its number in
//! `ext.ack` and advancing to the next one) and the host's HTTP transport
//! replaces the normally-drained queue with
//! [`AckSessionExtension::replay_since`] up to that batch, guaranteeing
//! at-least-once delivery across a broken connection.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use bayeux_protocol::Message;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::extension::SessionExtension;
use crate::session::Session;

const META_CONNECT: &str = "/meta/connect";

struct BatchQueueInner {
    /// The batch currently being filled. Starts at 0 so the first
    /// `/meta/connect` reply closes batch 0 (`ext.ack = 0`), matching
    /// `SPEC_FULL.md` §8 scenario 6 ("First connect (ack=-1) returns ack=0")
    /// -- the wire-observable value takes precedence over §4.7's looser
    /// prose ("monotonically increasing `batch`, initially 1").
    current_batch: i64,
    entries: VecDeque<(i64, Message)>,
}

/// Parallel sequences of stored outbound messages and their batch numbers.
pub struct BatchQueue {
    inner: Mutex<BatchQueueInner>,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BatchQueueInner {
                current_batch: 0,
                entries: VecDeque::new(),
            }),
        }
    }

    async fn store(&self, message: Message) -> i64 {
        let mut inner = self.inner.lock().await;
        let tag = inner.current_batch;
        inner.entries.push_back((tag, message));
        tag
    }

    /// Closes the currently-open batch (the tag new deliveries were just
    /// stamped with) and opens the next one.
    async fn close_and_advance(&self) -> i64 {
        let mut inner = self.inner.lock().await;
        let closed = inner.current_batch;
        inner.current_batch += 1;
        closed
    }

    /// Discards every stored message tagged with a batch `<= ack`.
    async fn acknowledge(&self, ack: i64) {
        self.inner.lock().await.entries.retain(|(tag, _)| *tag > ack);
    }

    async fn has_unacked(&self) -> bool {
        !self.inner.lock().await.entries.is_empty()
    }

    /// Every stored message tagged with a batch `<= batch`, oldest first --
    /// the replay set for a `/meta/connect` reply that just closed `batch`.
    pub async fn slice_to_batch(&self, batch: i64) -> Vec<Message> {
        self.inner
            .lock()
            .await
            .entries
            .iter()
            .filter(|(tag, _)| *tag <= batch)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl Default for BatchQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn ack_value(message: &Message) -> Option<i64> {
    message.ext.as_ref()?.get("ack")?.as_i64()
}

fn set_ack_value(message: &mut Message, value: Value) {
    let ext = message.ext.get_or_insert_with(|| serde_json::json!({}));
    if let Some(obj) = ext.as_object_mut() {
        obj.insert("ack".to_owned(), value);
    }
}

/// The per-session extension attached when a handshake requests `ext.ack`.
pub struct AckSessionExtension {
    queue: BatchQueue,
    /// `/meta/connect` reply id -> the batch that reply closed. Kept for
    /// diagnostics; replay itself only needs the batch number.
    connect_batches: Mutex<HashMap<String, i64>>,
}

impl AckSessionExtension {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            queue: BatchQueue::new(),
            connect_batches: Mutex::new(HashMap::new()),
        })
    }

    /// The replay set for a `/meta/connect` reply that closed `batch`, to be
    /// substituted for the session's normally-drained queue by the HTTP
    /// transport's response assembly.
    pub async fn replay_since(&self, batch: i64) -> Vec<Message> {
        self.queue.slice_to_batch(batch).await
    }
}

#[async_trait]
impl SessionExtension for AckSessionExtension {
    async fn incoming(&self, session: &Session, message: &mut Message) -> Result<bool, String> {
        if message.channel_name().map(bayeux_protocol::ChannelName::as_str) == Some(META_CONNECT) {
            if let Some(ack) = ack_value(message) {
                self.queue.acknowledge(ack).await;
                if self.queue.has_unacked().await && !session.has_queued_messages().await {
                    // Nothing queued, but unacked history remains: force an
                    // immediate return so the client gets the replay now
                    // instead of waiting out the full hold.
                    message.advice_mut().timeout = Some(0);
                }
            }
        }
        Ok(true)
    }

    async fn outgoing(
        &self,
        _sender: Option<&Session>,
        _session: &Session,
        message: &mut Message,
    ) -> Result<bool, String> {
        match message.channel_name().map(bayeux_protocol::ChannelName::as_str) {
            Some(META_CONNECT) => {
                let closed = self.queue.close_and_advance().await;
                set_ack_value(message, Value::from(closed));
                if let Some(id) = message.id.clone() {
                    self.connect_batches.lock().await.insert(id, closed);
                }
            }
            Some(_) => {
                self.queue.store(message.clone()).await;
            }
            None => {}
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bayeux_protocol::ChannelName;

    fn broadcast(channel: &str) -> Message {
        Message::new(ChannelName::new(channel).unwrap())
    }

    #[tokio::test]
    async fn acknowledge_discards_batches_up_to_and_including_n() {
        let queue = BatchQueue::new();
        queue.store(broadcast("/foo")).await; // batch 0
        queue.close_and_advance().await; // closes batch 0, opens 1
        queue.store(broadcast("/foo")).await; // batch 1
        assert_eq!(queue.slice_to_batch(1).await.len(), 2);
        queue.acknowledge(0).await;
        assert_eq!(queue.slice_to_batch(1).await.len(), 1);
        queue.acknowledge(1).await;
        assert!(!queue.has_unacked().await);
    }

    #[tokio::test]
    async fn connect_outgoing_stamps_and_advances_batch() {
        let ext = AckSessionExtension::new();
        let session = Session::new("s1".to_owned(), None);
        let mut connect_reply = broadcast(META_CONNECT);
        connect_reply.id = Some("r1".to_owned());
        ext.outgoing(None, &session, &mut connect_reply).await.unwrap();
        assert_eq!(ack_value(&connect_reply), Some(0));

        let mut second = broadcast(META_CONNECT);
        second.id = Some("r2".to_owned());
        ext.outgoing(None, &session, &mut second).await.unwrap();
        assert_eq!(ack_value(&second), Some(1));
    }

    #[tokio::test]
    async fn replay_since_returns_everything_up_to_the_closed_batch() {
        let ext = AckSessionExtension::new();
        let session = Session::new("s1".to_owned(), None);
        ext.outgoing(None, &session, &mut broadcast("/foo")).await.unwrap();
        ext.outgoing(None, &session, &mut broadcast("/bar")).await.unwrap();
        let mut connect_reply = broadcast(META_CONNECT);
        connect_reply.id = Some("r1".to_owned());
        ext.outgoing(None, &session, &mut connect_reply).await.unwrap();
        let batch = ack_value(&connect_reply).unwrap();
        assert_eq!(ext.replay_since(batch).await.len(), 2);
    }
}
