//! Per-client session state: handshake flag, outbound queue, batch depth,
//! expiration deadline, and the attached long-poll waiter.

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;

use bayeux_protocol::{ChannelName, Message};
use futures_util::FutureExt;
use rand::RngCore;
use tokio::sync::Mutex;

use crate::extension::{fold_session_outgoing, SessionExtension};
use crate::time::now_ms;
use crate::waiter::LongPollWaiter;

/// Generates a fresh 40-hex-character session id from 20 CSPRNG bytes.
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; 20];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

struct SessionInner {
    handshaken: bool,
    queue: VecDeque<Message>,
    subscriptions: HashSet<ChannelName>,
    extensions: Vec<Arc<dyn SessionExtension>>,
    batch_depth: u32,
    client_timeout: i64,
    client_interval: i64,
    schedule_time: i64,
    expire_time: i64,
    waiter: Option<Arc<LongPollWaiter>>,
    /// Set by the ack extension: suppress auto-flush on non-connect
    /// deliveries so broadcasts only leave via `/meta/connect` replay.
    meta_connect_delivery_only: bool,
}

pub struct Session {
    id: String,
    pub browser_id: Option<String>,
    inner: Mutex<SessionInner>,
}

impl Session {
    pub fn new(id: String, browser_id: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            id,
            browser_id,
            inner: Mutex::new(SessionInner {
                handshaken: false,
                queue: VecDeque::new(),
                subscriptions: HashSet::new(),
                extensions: Vec::new(),
                batch_depth: 0,
                client_timeout: -1,
                client_interval: -1,
                schedule_time: 0,
                expire_time: 0,
                waiter: None,
                meta_connect_delivery_only: false,
            }),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn is_handshaken(&self) -> bool {
        self.inner.lock().await.handshaken
    }

    pub async fn mark_handshaken(&self) {
        self.inner.lock().await.handshaken = true;
    }

    /// Clears handshake status and returns the subscription snapshot so the
    /// broker can unsubscribe each channel in turn.
    pub async fn clear_for_removal(&self) -> Vec<ChannelName> {
        let mut inner = self.inner.lock().await;
        inner.handshaken = false;
        inner.waiter = None;
        inner.subscriptions.drain().collect()
    }

    pub async fn add_subscription(&self, channel: ChannelName) {
        self.inner.lock().await.subscriptions.insert(channel);
    }

    pub async fn remove_subscription(&self, channel: &ChannelName) {
        self.inner.lock().await.subscriptions.remove(channel);
    }

    pub async fn add_extension(&self, extension: Arc<dyn SessionExtension>) {
        self.inner.lock().await.extensions.push(extension);
    }

    pub(crate) async fn extensions_snapshot(&self) -> Vec<Arc<dyn SessionExtension>> {
        self.inner.lock().await.extensions.clone()
    }

    pub async fn set_client_advice(&self, timeout: i64, interval: i64) {
        let mut inner = self.inner.lock().await;
        inner.client_timeout = timeout;
        inner.client_interval = interval;
    }

    pub async fn calculate_timeout(&self, server_default: i64) -> i64 {
        let t = self.inner.lock().await.client_timeout;
        if t >= 0 {
            t
        } else {
            server_default
        }
    }

    pub async fn calculate_interval(&self, server_default: i64) -> i64 {
        let i = self.inner.lock().await.client_interval;
        if i >= 0 {
            i
        } else {
            server_default
        }
    }

    pub async fn set_meta_connect_delivery_only(&self, value: bool) {
        self.inner.lock().await.meta_connect_delivery_only = value;
    }

    pub async fn meta_connect_delivery_only(&self) -> bool {
        self.inner.lock().await.meta_connect_delivery_only
    }

    /// Sets `scheduleTime = now`, `expireTime = now + interval + maxInterval`.
    pub async fn schedule_expiration(&self, default_interval: i64, max_interval: i64) {
        let mut inner = self.inner.lock().await;
        let interval = if inner.client_interval >= 0 {
            inner.client_interval
        } else {
            default_interval
        };
        let now = now_ms();
        inner.schedule_time = now;
        inner.expire_time = now + interval + max_interval;
    }

    /// `is_meta_connect = true`: clear `expireTime` so an in-flight connect
    /// is never reaped. Otherwise extend `expireTime` by the wall time spent
    /// in flight since the last schedule/cancel.
    pub async fn cancel_expiration(&self, is_meta_connect: bool) {
        let mut inner = self.inner.lock().await;
        if is_meta_connect {
            inner.expire_time = 0;
            return;
        }
        if inner.expire_time != 0 {
            let now = now_ms();
            let elapsed = now - inner.schedule_time;
            if elapsed > 0 {
                inner.expire_time += elapsed;
            }
            inner.schedule_time = now;
        }
    }

    pub async fn is_expired(&self, now: i64) -> bool {
        let inner = self.inner.lock().await;
        inner.expire_time != 0 && now > inner.expire_time
    }

    pub async fn set_waiter(&self, waiter: Option<Arc<LongPollWaiter>>) {
        self.inner.lock().await.waiter = waiter;
    }

    pub async fn take_waiter(&self) -> Option<Arc<LongPollWaiter>> {
        self.inner.lock().await.waiter.take()
    }

    pub async fn current_waiter(&self) -> Option<Arc<LongPollWaiter>> {
        self.inner.lock().await.waiter.clone()
    }

    pub async fn has_queued_messages(&self) -> bool {
        !self.inner.lock().await.queue.is_empty()
    }

    pub async fn is_batching(&self) -> bool {
        self.inner.lock().await.batch_depth > 0
    }

    pub async fn drain_queue(&self) -> Vec<Message> {
        self.inner.lock().await.queue.drain(..).collect()
    }

    /// Runs `sender`'s session-outgoing extensions, then this session's own,
    /// both of which may rewrite or veto the message. If it survives, it is
    /// serialized and appended to the queue; if `batchDepth == 0` (and
    /// delivery is not suppressed), the queue is flushed immediately.
    ///
    /// The two-pass outgoing fold (sender's chain, then the receiver's) is
    /// preserved verbatim per `SPEC_FULL.md` §9's Open Question 1.
    pub async fn deliver(self: &Arc<Self>, sender: Option<&Session>, mut message: Message) -> bool {
        if let Some(sender) = sender {
            let sender_exts = sender.extensions_snapshot().await;
            if !fold_session_outgoing(&sender_exts, Some(sender), self, &mut message).await {
                return false;
            }
        }
        let own_exts = self.extensions_snapshot().await;
        if !fold_session_outgoing(&own_exts, sender, self, &mut message).await {
            return false;
        }

        message.serialize();
        let should_flush = {
            let mut inner = self.inner.lock().await;
            inner.queue.push_back(message);
            inner.batch_depth == 0 && !inner.meta_connect_delivery_only
        };
        if should_flush {
            self.flush().await;
        }
        true
    }

    /// Resumes a held `/meta/connect` waiter, if any, so it can pick up the
    /// freshly queued message. A no-op while batching.
    pub async fn flush(self: &Arc<Self>) {
        let waiter = {
            let inner = self.inner.lock().await;
            if inner.batch_depth > 0 {
                return;
            }
            inner.waiter.clone()
        };
        if let Some(waiter) = waiter {
            waiter.resume_with_message();
        }
    }

    /// Runs `body`, suppressing queue flushes for its duration; flushes once
    /// on exit if the queue is non-empty -- even if `body` panics, matching
    /// the spec's "batch that throws still flushes" round-trip law.
    pub async fn batch<F, Fut, R>(self: &Arc<Self>, body: F) -> R
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        {
            self.inner.lock().await.batch_depth += 1;
        }
        let result = std::panic::AssertUnwindSafe(body()).catch_unwind().await;
        let should_flush = {
            let mut inner = self.inner.lock().await;
            inner.batch_depth = inner.batch_depth.saturating_sub(1);
            inner.batch_depth == 0 && !inner.queue.is_empty() && !inner.meta_connect_delivery_only
        };
        if should_flush {
            self.flush().await;
        }
        match result {
            Ok(value) => value,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bayeux_protocol::ChannelName;

    #[test]
    fn session_ids_are_forty_hex_chars() {
        let id = generate_session_id();
        assert_eq!(id.len(), 40);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn calculate_timeout_falls_back_to_server_default() {
        let session = Session::new("s1".to_owned(), None);
        assert_eq!(session.calculate_timeout(30_000).await, 30_000);
        session.set_client_advice(5_000, -1).await;
        assert_eq!(session.calculate_timeout(30_000).await, 5_000);
    }

    #[tokio::test]
    async fn cancel_expiration_meta_connect_clears_expire_time() {
        let session = Session::new("s1".to_owned(), None);
        session.schedule_expiration(0, 10_000).await;
        session.cancel_expiration(true).await;
        assert!(!session.is_expired(i64::MAX).await);
    }

    #[tokio::test]
    async fn batch_defers_flush_until_depth_reaches_zero() {
        let session = Session::new("s1".to_owned(), None);
        let msg = Message::new(ChannelName::new("/foo").unwrap());
        session
            .batch(|| async {
                session.deliver(None, msg).await;
                assert!(session.has_queued_messages().await);
            })
            .await;
        assert!(session.has_queued_messages().await);
        let drained = session.drain_queue().await;
        assert_eq!(drained.len(), 1);
    }

    #[tokio::test]
    async fn clear_for_removal_returns_subscription_snapshot() {
        let session = Session::new("s1".to_owned(), None);
        session.mark_handshaken().await;
        session.add_subscription(ChannelName::new("/foo").unwrap()).await;
        session.add_subscription(ChannelName::new("/bar").unwrap()).await;
        let subs = session.clear_for_removal().await;
        assert_eq!(subs.len(), 2);
        assert!(!session.is_handshaken().await);
    }
}
