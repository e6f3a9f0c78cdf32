//! The broker: channel/session registries, the message pipeline, the five
//! meta handlers, and the sweeper. Ties together every other module in this
//! crate (`SPEC_FULL.md` §4.1).
//!
//! The suspension decision for a held `/meta/connect` is deliberately *not*
//! made here -- `SPEC_FULL.md` §4.5 places that call in the HTTP transport,
//! after `process` has returned a successful connect reply. What the broker
//! does own is the state that decision needs: the per-browser hold count and
//! the waiter itself, exposed through [`Broker::suspend_or_complete_connect`].

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use bayeux_protocol::advice::Reconnect;
use bayeux_protocol::{error_codes, ChannelKind, ChannelName, Message};
use serde_json::Value;
use tokio::sync::{oneshot, Mutex, RwLock};

use crate::ack::AckSessionExtension;
use crate::channel::Channel;
use crate::error::BrokerError;
use crate::extension::{
    fold_server_incoming, fold_server_outgoing, fold_session_incoming, fold_session_outgoing, ServerExtension,
};
use crate::listener::{BrokerEvent, BrokerListener};
use crate::options::BrokerOptions;
use crate::policy::{PermissivePolicy, Policy};
use crate::session::{generate_session_id, Session};
use crate::time::now_ms;
use crate::waiter::{LongPollWaiter, WaiterOutcome};

#[derive(Default)]
struct BrowserState {
    sessions: HashSet<String>,
    active_holds: i64,
}

/// What the HTTP transport should do with a processed `/meta/connect`.
pub enum ConnectDecision {
    /// Suspend: await `rx` for the outcome, then call [`Broker::release_hold`]
    /// -- except when the outcome is `CancelledByDuplicate`, whose hold was
    /// already released by the preempting connect. `reply` is the connect
    /// reply as it stood at suspend time (`successful`, advice, and any
    /// `ext.ack` batch number already folded in) -- the transport reuses it
    /// once the hold resolves instead of reconstructing it from scratch.
    /// `waiter` lets the transport detect its own disconnect mid-hold and
    /// resolve the race itself rather than leaving it unsettled.
    Suspended {
        waiter: Arc<LongPollWaiter>,
        rx: oneshot::Receiver<WaiterOutcome>,
        reply: Message,
    },
    /// Complete the response immediately with this reply.
    Completed(Message),
}

pub struct Broker {
    options: BrokerOptions,
    policy: RwLock<Arc<dyn Policy>>,
    channels: RwLock<HashMap<ChannelName, Arc<Mutex<Channel>>>>,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    browsers: RwLock<HashMap<String, BrowserState>>,
    server_extensions: RwLock<Vec<Arc<dyn ServerExtension>>>,
    listeners: RwLock<Vec<Arc<dyn BrokerListener>>>,
    ack_extensions: RwLock<HashMap<String, Arc<AckSessionExtension>>>,
    sweeper: StdMutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Broker {
    pub fn new(options: BrokerOptions) -> Arc<Self> {
        let broker = Arc::new(Self {
            options,
            policy: RwLock::new(Arc::new(PermissivePolicy) as Arc<dyn Policy>),
            channels: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            browsers: RwLock::new(HashMap::new()),
            server_extensions: RwLock::new(Vec::new()),
            listeners: RwLock::new(Vec::new()),
            ack_extensions: RwLock::new(HashMap::new()),
            sweeper: StdMutex::new(None),
        });
        broker.start_sweeper();
        broker
    }

    pub fn options(&self) -> &BrokerOptions {
        &self.options
    }

    pub async fn set_policy(&self, policy: Arc<dyn Policy>) {
        *self.policy.write().await = policy;
    }

    async fn policy(&self) -> Arc<dyn Policy> {
        self.policy.read().await.clone()
    }

    pub async fn add_extension(&self, extension: Arc<dyn ServerExtension>) {
        self.server_extensions.write().await.push(extension);
    }

    pub async fn add_listener(&self, listener: Arc<dyn BrokerListener>) {
        self.listeners.write().await.push(listener);
    }

    async fn server_extensions_snapshot(&self) -> Vec<Arc<dyn ServerExtension>> {
        self.server_extensions.read().await.clone()
    }

    async fn fire(&self, event: BrokerEvent) {
        for listener in self.listeners.read().await.iter() {
            listener.on_event(&event);
        }
    }

    // -- registries ----------------------------------------------------

    pub async fn get_channel(&self, name: &ChannelName) -> Option<Arc<Mutex<Channel>>> {
        self.channels.read().await.get(name).cloned()
    }

    async fn create_channel(&self, name: ChannelName) -> Arc<Mutex<Channel>> {
        {
            let channels = self.channels.read().await;
            if let Some(existing) = channels.get(&name) {
                return existing.clone();
            }
        }
        let mut channels = self.channels.write().await;
        if let Some(existing) = channels.get(&name) {
            return existing.clone();
        }
        let channel = Arc::new(Mutex::new(Channel::new(name.clone())));
        channels.insert(name.clone(), channel.clone());
        drop(channels);
        self.fire(BrokerEvent::ChannelAdded(name)).await;
        channel
    }

    async fn resolve_channel(
        &self,
        name: &ChannelName,
        session: Option<&Session>,
        message: &Message,
    ) -> Result<Option<Arc<Mutex<Channel>>>, BrokerError> {
        if let Some(existing) = self.get_channel(name).await {
            return Ok(Some(existing));
        }
        let allowed = self
            .policy()
            .await
            .can_create(name, session, message)
            .await
            .map_err(BrokerError::Policy)?;
        if !allowed {
            return Ok(None);
        }
        Ok(Some(self.create_channel(name.clone()).await))
    }

    pub async fn get_session(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn sessions_for_browser(&self, browser_id: &str) -> Vec<Arc<Session>> {
        let ids: Vec<String> = {
            let browsers = self.browsers.read().await;
            browsers.get(browser_id).map(|b| b.sessions.iter().cloned().collect()).unwrap_or_default()
        };
        let sessions = self.sessions.read().await;
        ids.into_iter().filter_map(|id| sessions.get(&id).cloned()).collect()
    }

    async fn register_session(&self, session: Arc<Session>) {
        let id = session.id().to_owned();
        if let Some(browser_id) = &session.browser_id {
            let mut browsers = self.browsers.write().await;
            browsers.entry(browser_id.clone()).or_default().sessions.insert(id.clone());
        }
        self.sessions.write().await.insert(id.clone(), session);
        self.fire(BrokerEvent::SessionAdded(id)).await;
    }

    /// Removes a session, unsubscribing it from everything it was on.
    /// `timed_out` distinguishes sweeper reaping from `/meta/disconnect`.
    pub async fn remove_session(&self, id: &str, timed_out: bool) {
        let session = self.sessions.write().await.remove(id);
        let Some(session) = session else {
            return;
        };
        let subscriptions = session.clear_for_removal().await;
        for name in &subscriptions {
            if let Some(channel) = self.get_channel(name).await {
                channel.lock().await.unsubscribe(id);
            }
            self.fire(BrokerEvent::Unsubscribed(id.to_owned(), name.clone())).await;
        }
        if let Some(browser_id) = &session.browser_id {
            let mut browsers = self.browsers.write().await;
            if let Some(entry) = browsers.get_mut(browser_id) {
                entry.sessions.remove(id);
                if entry.sessions.is_empty() && entry.active_holds == 0 {
                    browsers.remove(browser_id);
                }
            }
        }
        self.ack_extensions.write().await.remove(id);
        self.fire(BrokerEvent::SessionRemoved(id.to_owned(), timed_out)).await;
    }

    pub async fn ack_extension(&self, session_id: &str) -> Option<Arc<AckSessionExtension>> {
        self.ack_extensions.read().await.get(session_id).cloned()
    }

    // -- message pipeline (SPEC_FULL.md §4.1) ---------------------------

    /// Runs one inbound message through the pipeline, returning its reply
    /// and the session it ended up associated with (a freshly created one
    /// for a successful handshake, `None` after a disconnect).
    ///
    /// `session` is resolved by the caller from `inbound.client_id`; pass
    /// `None` for `/meta/handshake` (it has none yet). `browser_id` is only
    /// consulted when handshake creates a new session.
    pub async fn process(
        self: &Arc<Self>,
        mut inbound: Message,
        session: Option<Arc<Session>>,
        browser_id: Option<String>,
    ) -> Result<(Message, Option<Arc<Session>>), BrokerError> {
        let reply_id = inbound.id.clone();
        let reply_channel = inbound.channel.clone();
        let mut reply = Message::new_reply(reply_id, reply_channel.clone());

        let channel_str = reply_channel.as_ref().map(ChannelName::as_str);
        let is_meta_connect = channel_str == Some("/meta/connect");
        let is_meta_handshake = channel_str == Some("/meta/handshake");

        if inbound.client_id.is_some() && session.is_none() {
            reply.set_error(error_codes::SESSION_UNKNOWN);
            if is_meta_handshake || is_meta_connect {
                let advice = reply.advice_mut();
                advice.reconnect = Some(Reconnect::Handshake);
                advice.interval = Some(0);
            }
            return Ok((reply, None));
        }

        let channel_name = match reply_channel {
            Some(c) => c,
            None => {
                reply.set_error(error_codes::CHANNEL_MISSING);
                return Ok((reply, session));
            }
        };

        if let Some(session) = &session {
            session.cancel_expiration(is_meta_connect).await;
        }

        let server_exts = self.server_extensions_snapshot().await;
        match fold_server_incoming(&server_exts, session.as_deref(), &mut inbound).await {
            Ok(true) => {}
            Ok(false) => {
                reply.set_error(error_codes::MESSAGE_DELETED);
                return Ok((reply, session));
            }
            Err(e) => return Err(BrokerError::ServerExtension(e)),
        }

        if let Some(session) = &session {
            let session_exts = session.extensions_snapshot().await;
            if !fold_session_incoming(&session_exts, session, &mut inbound).await {
                reply.set_error(error_codes::MESSAGE_DELETED);
                return Ok((reply, Some(session.clone())));
            }
        }

        let channel = match self.resolve_channel(&channel_name, session.as_deref(), &inbound).await? {
            Some(c) => c,
            None => {
                reply.set_error(error_codes::CHANNEL_DENIED);
                return Ok((reply, session));
            }
        };

        if !matches!(channel_name.kind(), ChannelKind::Meta) {
            let allowed = self
                .policy()
                .await
                .can_publish(&channel_name, session.as_deref(), &inbound)
                .await
                .map_err(BrokerError::Policy)?;
            if !allowed {
                reply.set_error(error_codes::PUBLISH_DENIED);
                return Ok((reply, session));
            }
        }

        reply.successful = Some(true);
        let new_session = self
            .publish(&channel_name, &channel, session, &inbound, &mut reply, browser_id)
            .await?;

        if let Some(session) = &new_session {
            let server_exts = self.server_extensions_snapshot().await;
            match fold_server_outgoing(&server_exts, None, session, &mut reply).await {
                Ok(true) => {}
                Ok(false) => reply.set_error(error_codes::MESSAGE_DELETED),
                Err(e) => return Err(BrokerError::ServerExtension(e)),
            }
            let session_exts = session.extensions_snapshot().await;
            if !fold_session_outgoing(&session_exts, None, session, &mut reply).await {
                reply.set_error(error_codes::MESSAGE_DELETED);
            }
        }

        Ok((reply, new_session))
    }

    /// `SPEC_FULL.md` §4.1 step 8: notify channel listeners ancestor-first,
    /// any veto aborting both dispatch and fan-out, then either run a meta
    /// handler or fan the message out to broadcast subscribers.
    async fn publish(
        self: &Arc<Self>,
        channel_name: &ChannelName,
        channel: &Arc<Mutex<Channel>>,
        session: Option<Arc<Session>>,
        inbound: &Message,
        reply: &mut Message,
        browser_id: Option<String>,
    ) -> Result<Option<Arc<Session>>, BrokerError> {
        if !self.notify_listeners(channel_name, inbound).await {
            return Ok(session);
        }

        if matches!(channel_name.kind(), ChannelKind::Meta) {
            self.dispatch_meta(channel_name.as_str(), session, inbound, reply, browser_id).await
        } else {
            self.fanout(channel, session.as_ref(), inbound).await?;
            Ok(session)
        }
    }

    async fn notify_listeners(&self, channel_name: &ChannelName, message: &Message) -> bool {
        let mut path = channel_name.wildcard_ancestors();
        path.push(channel_name.clone());
        for name in &path {
            if let Some(channel) = self.get_channel(name).await {
                let listeners = channel.lock().await.listeners();
                for listener in listeners {
                    if !listener.on_message(channel_name, message) {
                        return false;
                    }
                }
            }
        }
        true
    }

    async fn fanout(&self, channel: &Arc<Mutex<Channel>>, sender: Option<&Arc<Session>>, message: &Message) -> Result<(), BrokerError> {
        let subscriber_ids: Vec<String> = {
            let channel = channel.lock().await;
            channel.subscribers().map(String::from).collect()
        };
        for id in subscriber_ids {
            let Some(subscriber) = self.get_session(&id).await else {
                continue;
            };
            let mut outgoing = message.clone();
            let server_exts = self.server_extensions_snapshot().await;
            let allowed = fold_server_outgoing(&server_exts, sender.map(|s| s.as_ref()), &subscriber, &mut outgoing)
                .await
                .map_err(BrokerError::ServerExtension)?;
            if !allowed {
                continue;
            }
            subscriber.deliver(sender.map(|s| s.as_ref()), outgoing).await;
        }
        Ok(())
    }

    async fn dispatch_meta(
        self: &Arc<Self>,
        channel_str: &str,
        session: Option<Arc<Session>>,
        inbound: &Message,
        reply: &mut Message,
        browser_id: Option<String>,
    ) -> Result<Option<Arc<Session>>, BrokerError> {
        match channel_str {
            "/meta/handshake" => self.handle_handshake(inbound, reply, browser_id).await,
            "/meta/connect" => {
                self.handle_connect(session.as_ref(), inbound).await;
                Ok(session)
            }
            "/meta/subscribe" => {
                self.handle_subscribe(session.as_ref(), inbound, reply).await?;
                Ok(session)
            }
            "/meta/unsubscribe" => {
                self.handle_unsubscribe(session.as_ref(), inbound, reply).await;
                Ok(session)
            }
            "/meta/disconnect" => {
                if let Some(session) = session {
                    self.handle_disconnect(session).await;
                } else {
                    reply.successful = Some(true);
                }
                Ok(None)
            }
            // Not one of the five built-ins: no canonical handler, but
            // listeners/extensions have already run -- treat as a no-op.
            _ => Ok(session),
        }
    }

    async fn handle_handshake(
        self: &Arc<Self>,
        inbound: &Message,
        reply: &mut Message,
        browser_id: Option<String>,
    ) -> Result<Option<Arc<Session>>, BrokerError> {
        let allowed = self.policy().await.can_handshake(inbound).await.map_err(BrokerError::Policy)?;
        if !allowed {
            reply.set_error(error_codes::HANDSHAKE_DENIED);
            if reply.advice.is_none() {
                reply.advice_mut().reconnect = Some(Reconnect::None);
            }
            return Ok(None);
        }

        let session = Session::new(generate_session_id(), browser_id);
        session.mark_handshaken().await;

        if wants_ack(inbound) {
            let ack_extension = AckSessionExtension::new();
            session.add_extension(ack_extension.clone()).await;
            session.set_meta_connect_delivery_only(true).await;
            self.ack_extensions.write().await.insert(session.id().to_owned(), ack_extension);
            set_ack_bool(reply, true);
        }

        self.register_session(session.clone()).await;

        reply.client_id = Some(session.id().to_owned());
        reply.version = Some("1.0".to_owned());
        reply.supported_connection_types = Some(vec!["long-polling".to_owned()]);
        let advice = reply.advice_mut();
        advice.reconnect = Some(Reconnect::Retry);
        advice.timeout = Some(self.options.timeout_ms);
        advice.interval = Some(self.options.interval_ms);

        Ok(Some(session))
    }

    /// Captures the client's advertised timeout/interval for later use by
    /// `calculate_timeout`/`calculate_interval`. The reply itself was already
    /// marked `successful` by `process`; holding is decided by the transport.
    async fn handle_connect(&self, session: Option<&Arc<Session>>, inbound: &Message) {
        let Some(session) = session else {
            return;
        };
        let timeout = inbound.advice.as_ref().and_then(|a| a.timeout).unwrap_or(-1);
        let interval = inbound.advice.as_ref().and_then(|a| a.interval).unwrap_or(-1);
        session.set_client_advice(timeout, interval).await;
    }

    async fn handle_subscribe(self: &Arc<Self>, session: Option<&Arc<Session>>, inbound: &Message, reply: &mut Message) -> Result<(), BrokerError> {
        let Some(session) = session else {
            reply.set_error(error_codes::SUBSCRIBE_FAILED);
            return Ok(());
        };
        let Some(subscription) = &inbound.subscription else {
            reply.set_error(error_codes::SUBSCRIPTION_MISSING);
            return Ok(());
        };
        let channels = subscription.channels();
        if channels.is_empty() {
            reply.set_error(error_codes::SUBSCRIPTION_MISSING);
            return Ok(());
        }
        if !session.is_handshaken().await {
            reply.set_error(error_codes::SUBSCRIBE_FAILED);
            return Ok(());
        }

        let mut resolved = Vec::with_capacity(channels.len());
        for name in &channels {
            let channel = match self.resolve_channel(name, Some(session.as_ref()), inbound).await? {
                Some(c) => c,
                None => {
                    reply.set_error(error_codes::CHANNEL_DENIED);
                    return Ok(());
                }
            };
            let allowed = self
                .policy()
                .await
                .can_subscribe(name, session, inbound)
                .await
                .map_err(BrokerError::Policy)?;
            if !allowed {
                reply.set_error(error_codes::SUBSCRIBE_DENIED);
                return Ok(());
            }
            resolved.push((name.clone(), channel));
        }

        for (name, channel) in resolved {
            // `_subscribe` is a no-op on meta channels (`spec.md` §4.2) --
            // policy has already run, so this is silently skipped rather
            // than denied.
            if matches!(name.kind(), ChannelKind::Meta) {
                continue;
            }
            channel.lock().await.subscribe(session.id());
            session.add_subscription(name.clone()).await;
            self.fire(BrokerEvent::Subscribed(session.id().to_owned(), name)).await;
        }

        reply.subscription = inbound.subscription.clone();
        Ok(())
    }

    async fn handle_unsubscribe(&self, session: Option<&Arc<Session>>, inbound: &Message, reply: &mut Message) {
        let Some(session) = session else {
            reply.set_error(error_codes::UNSUBSCRIBE_FAILED);
            return;
        };
        let Some(subscription) = &inbound.subscription else {
            reply.set_error(error_codes::SUBSCRIPTION_MISSING);
            return;
        };
        // Unknown channels are silently skipped -- unsubscribe is idempotent.
        for name in subscription.channels() {
            if let Some(channel) = self.get_channel(&name).await {
                channel.lock().await.unsubscribe(session.id());
                session.remove_subscription(&name).await;
                self.fire(BrokerEvent::Unsubscribed(session.id().to_owned(), name.clone())).await;
                self.sweep_channel_if_empty(&name).await;
            }
        }
        reply.subscription = Some(subscription.clone());
    }

    async fn handle_disconnect(&self, session: Arc<Session>) {
        if let Some(waiter) = session.take_waiter().await {
            waiter.resume_with_message();
        }
        self.remove_session(session.id(), false).await;
    }

    async fn sweep_channel_if_empty(&self, name: &ChannelName) {
        let sweepable = match self.get_channel(name).await {
            Some(channel) => channel.lock().await.is_sweepable(),
            None => false,
        };
        if sweepable {
            self.channels.write().await.remove(name);
            self.fire(BrokerEvent::ChannelRemoved(name.clone())).await;
        }
    }

    // -- long-poll suspension (SPEC_FULL.md §4.4/§4.5) ------------------

    /// Decides whether to suspend a processed `/meta/connect` reply, per the
    /// conditions in §4.4. Called by the transport, not by `process` itself.
    pub async fn suspend_or_complete_connect(
        &self,
        session: &Arc<Session>,
        mut reply: Message,
        only_message_in_request: bool,
    ) -> ConnectDecision {
        if let Some(old) = session.take_waiter().await {
            old.cancel_duplicate();
            // Decrement the preempted hold right here rather than leaving it
            // to that request's own `release_hold` -- that only runs once its
            // task is rescheduled after this one, so `browser_cap_exceeded`
            // below would otherwise still see the stale count and wrongly
            // refuse to suspend the replacement connect.
            if let Some(browser_id) = &session.browser_id {
                self.decrement_browser_holds(browser_id).await;
            }
        }

        let no_queue_or_batching = !session.has_queued_messages().await || session.is_batching().await;
        if !(only_message_in_request && no_queue_or_batching && reply.successful.unwrap_or(false)) {
            return ConnectDecision::Completed(reply);
        }

        if let Some(browser_id) = session.browser_id.clone() {
            if self.browser_cap_exceeded(&browser_id).await {
                let advice = reply.advice_mut();
                advice.multiple_clients = Some(true);
                if self.options.multi_session_interval_ms > 0 {
                    advice.reconnect = Some(Reconnect::Retry);
                    advice.interval = Some(self.options.multi_session_interval_ms);
                } else {
                    reply.successful = Some(false);
                    reply.advice_mut().reconnect = Some(Reconnect::None);
                }
                return ConnectDecision::Completed(reply);
            }
        }

        let effective_timeout = session.calculate_timeout(self.options.timeout_ms).await;
        if effective_timeout <= 0 {
            return ConnectDecision::Completed(reply);
        }

        if let Some(browser_id) = &session.browser_id {
            self.increment_browser_holds(browser_id).await;
        }

        let (tx, rx) = oneshot::channel();
        let waiter = LongPollWaiter::new_armed(tx, Duration::from_millis(effective_timeout as u64));
        session.set_waiter(Some(waiter.clone())).await;
        ConnectDecision::Suspended { waiter, rx, reply }
    }

    /// Must be called exactly once by whichever task awaited a suspended
    /// connect's outcome -- except when that outcome is
    /// `CancelledByDuplicate`, whose hold was already released by the
    /// preempting `suspend_or_complete_connect` call above.
    pub async fn release_hold(&self, session: &Session) {
        if let Some(browser_id) = &session.browser_id {
            self.decrement_browser_holds(browser_id).await;
        }
    }

    async fn browser_cap_exceeded(&self, browser_id: &str) -> bool {
        if self.options.max_sessions_per_browser < 0 {
            return false;
        }
        let browsers = self.browsers.read().await;
        let holds = browsers.get(browser_id).map_or(0, |b| b.active_holds);
        holds >= self.options.max_sessions_per_browser
    }

    async fn increment_browser_holds(&self, browser_id: &str) {
        self.browsers.write().await.entry(browser_id.to_owned()).or_default().active_holds += 1;
    }

    async fn decrement_browser_holds(&self, browser_id: &str) {
        if let Some(entry) = self.browsers.write().await.get_mut(browser_id) {
            entry.active_holds = entry.active_holds.saturating_sub(1);
        }
    }

    // -- sweeper (SPEC_FULL.md §4.6) -------------------------------------

    fn start_sweeper(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let period = Duration::from_millis(self.options.sweep_period_ms);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let Some(broker) = weak.upgrade() else {
                    break;
                };
                broker.sweep_once().await;
            }
        });
        *self.sweeper.lock().expect("sweeper mutex poisoned") = Some(handle);
    }

    pub fn close(&self) {
        if let Some(handle) = self.sweeper.lock().expect("sweeper mutex poisoned").take() {
            handle.abort();
        }
    }

    async fn sweep_once(&self) {
        let now = now_ms();
        let mut expired = Vec::new();
        for (id, session) in self.sessions.read().await.iter() {
            if session.is_expired(now).await {
                expired.push((id.clone(), session.clone()));
            }
        }
        for (id, session) in expired {
            if let Some(waiter) = session.take_waiter().await {
                // A session being swept should have had its expiration
                // cancelled while a connect was in flight; a live waiter
                // here means the transport never finished releasing it.
                waiter.cancel_transport_error();
            }
            self.remove_session(&id, true).await;
        }

        let mut empty_channels = Vec::new();
        for (name, channel) in self.channels.read().await.iter() {
            if channel.lock().await.is_sweepable() {
                empty_channels.push(name.clone());
            }
        }
        for name in empty_channels {
            self.channels.write().await.remove(&name);
            self.fire(BrokerEvent::ChannelRemoved(name)).await;
        }
    }
}

fn wants_ack(message: &Message) -> bool {
    message.ext.as_ref().and_then(|ext| ext.get("ack")).and_then(Value::as_bool).unwrap_or(false)
}

fn set_ack_bool(message: &mut Message, value: bool) {
    let ext = message.ext.get_or_insert_with(|| serde_json::json!({}));
    if let Some(obj) = ext.as_object_mut() {
        obj.insert("ack".to_owned(), Value::Bool(value));
    }
}
