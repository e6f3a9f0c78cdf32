//! The single Bayeux transport endpoint: `POST /`.
//!
//! Implements `SPEC_FULL.md` §4.5's request handling: resolve the browser id
//! and (for the first message) its session, fold every message in the batch
//! through [`Broker::process`], hand a `/meta/connect` reply to
//! [`Broker::suspend_or_complete_connect`], and assemble the JSON array
//! response -- draining the session's queue ahead of the replies, with the
//! ack extension's replay substituted in when one is attached.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bayeux_core::{ConnectDecision, LongPollWaiter, Session, WaiterOutcome};
use bayeux_protocol::{ChannelName, Message};
use tokio::sync::oneshot;

use crate::cookie::{build_set_cookie, find_cookie, generate_browser_id};
use crate::http::response::bad_request;
use crate::state::AppState;

enum FoldFailure {
    /// Bad request: malformed batch shape (`SPEC_FULL.md` §7). HTTP 400.
    ProtocolViolation(String),
    /// Something failed at a level the wire protocol has no vocabulary for.
    /// HTTP 500, empty body (`SPEC_FULL.md` §7).
    Internal,
}

struct FoldOutcome {
    replies: Vec<Message>,
    session: Option<Arc<Session>>,
    send_queue: bool,
    schedule_expiration: bool,
    connect_hold: Option<(Arc<Session>, Arc<LongPollWaiter>, oneshot::Receiver<WaiterOutcome>, Message)>,
    new_browser_id: Option<String>,
    failure: Option<FoldFailure>,
}

/// Detects a client disconnecting out from under a held `/meta/connect`
/// (`SPEC_FULL.md` §4.4 path 4 / §7): axum drops this handler's future
/// without running it to completion when the underlying connection goes
/// away mid-await, so ordinary control flow after `rx.await` never executes.
/// Mirrors the drop-triggers-async-cleanup idiom (a "dropper" holding the
/// state to release in an `Option`, taken and spawned off on `Drop`) rather
/// than special-casing disconnects as an explicit branch.
struct ConnectHoldGuard {
    armed: Option<(AppState, Arc<Session>, Arc<LongPollWaiter>)>,
}

impl ConnectHoldGuard {
    fn new(state: AppState, session: Arc<Session>, waiter: Arc<LongPollWaiter>) -> Self {
        Self {
            armed: Some((state, session, waiter)),
        }
    }

    /// Call once the hold resolved through ordinary control flow, so `Drop`
    /// knows not to treat this as a disconnect.
    fn disarm(&mut self) {
        self.armed = None;
    }
}

impl Drop for ConnectHoldGuard {
    fn drop(&mut self) {
        let Some((state, session, waiter)) = self.armed.take() else {
            return;
        };
        waiter.cancel_transport_error();
        tokio::spawn(async move {
            state.broker.release_hold(&session).await;
            session.take_waiter().await;
            // Proceeds to ordinary expiration (`SPEC_FULL.md` §4.4 path 4)
            // instead of removing the session immediately -- the sweeper
            // reaps it once `expire_time` elapses.
            session.schedule_expiration(state.broker.options().interval_ms, state.broker.options().max_interval_ms).await;
        });
    }
}

pub async fn handle_bayeux(State(state): State<AppState>, method: Method, headers: HeaderMap, body: axum::body::Bytes) -> Response {
    // SPEC_FULL.md §6: only POST carries a Bayeux batch; every other method
    // is a bad request here rather than the framework's default 405.
    if method != Method::POST {
        return bad_request("only POST is accepted on the Bayeux transport endpoint");
    }

    let messages: Vec<Message> = match serde_json::from_slice(&body) {
        Ok(messages) => messages,
        Err(err) => return bad_request(format!("invalid JSON body: {err}")),
    };
    if messages.is_empty() {
        return bad_request("request body must be a non-empty JSON array");
    }

    let browser_id = headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|header| find_cookie(header, &state.transport.browser_cookie_name));

    let first_channel = messages[0].channel_name().map(ChannelName::as_str).map(str::to_owned);
    let is_connect_first = first_channel.as_deref() == Some("/meta/connect");
    let is_handshake_first = first_channel.as_deref() == Some("/meta/handshake");

    let initial_session = if is_handshake_first {
        None
    } else {
        match &messages[0].client_id {
            Some(client_id) => state.broker.get_session(client_id).await,
            None => None,
        }
    };

    // SPEC_FULL.md §4.5 step 3: a request that is not a bare /meta/connect
    // and already has a session batches its whole fold, so broadcasts
    // delivered mid-request don't flush until the response is assembled.
    let should_batch = !is_connect_first && initial_session.is_some();
    let outcome = if should_batch {
        let batching_session = initial_session.clone().expect("checked by should_batch");
        batching_session.batch(move || fold_messages(state.clone(), messages, initial_session, browser_id)).await
    } else {
        fold_messages(state.clone(), messages, initial_session, browser_id).await
    };

    let FoldOutcome {
        mut replies,
        mut session,
        send_queue,
        schedule_expiration,
        connect_hold,
        new_browser_id,
        failure,
    } = outcome;

    match failure {
        Some(FoldFailure::ProtocolViolation(message)) => return bad_request(message),
        Some(FoldFailure::Internal) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        None => {}
    }

    let mut status = StatusCode::OK;
    let mut final_connect_reply = None;

    if let Some((connect_session, waiter, rx, pending_reply)) = connect_hold {
        let mut guard = ConnectHoldGuard::new(state.clone(), connect_session.clone(), waiter);
        let outcome = rx.await;
        guard.disarm();
        match outcome {
            Ok(WaiterOutcome::CancelledByDuplicate) => {
                // The preempting connect already released this hold
                // synchronously (`Broker::suspend_or_complete_connect`) --
                // releasing it again here would double-decrement.
                let code = state.transport.duplicate_meta_connect_http_response_code;
                status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            }
            _ => {
                state.broker.release_hold(&connect_session).await;
                session = Some(connect_session);
                final_connect_reply = Some(pending_reply);
            }
        }
    }

    if status != StatusCode::OK {
        return status.into_response();
    }

    let mut body_messages = Vec::new();
    if send_queue {
        if let Some(session) = &session {
            let drained = match &final_connect_reply {
                Some(reply) => drain_for_response(&state, session, reply).await,
                None => session.drain_queue().await,
            };
            body_messages.extend(drained);
        }
    }
    body_messages.append(&mut replies);
    if let Some(reply) = final_connect_reply {
        body_messages.push(reply);
    }

    if schedule_expiration {
        if let Some(session) = &session {
            session.schedule_expiration(state.broker.options().interval_ms, state.broker.options().max_interval_ms).await;
        }
    }

    let mut response = Json(body_messages).into_response();
    if let Some(browser_id) = new_browser_id {
        let cookie = build_set_cookie(&state.transport, &browser_id);
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
    }
    response
}

/// Folds every message in a request through the broker, handling the
/// `/meta/connect` hold decision inline. Returns without a `connect_hold`
/// once a protocol violation or pipeline failure is hit.
async fn fold_messages(state: AppState, messages: Vec<Message>, mut session: Option<Arc<Session>>, browser_id: Option<String>) -> FoldOutcome {
    let message_count = messages.len();
    let mut replies = Vec::with_capacity(message_count);
    let mut send_queue = true;
    let mut schedule_expiration = false;
    let mut connect_hold = None;
    let mut new_browser_id = None;

    for (idx, message) in messages.into_iter().enumerate() {
        let channel = message.channel_name().map(ChannelName::as_str).map(str::to_owned);
        let is_handshake = channel.as_deref() == Some("/meta/handshake");
        let is_connect = channel.as_deref() == Some("/meta/connect");

        if is_handshake && idx > 0 {
            return FoldOutcome {
                replies,
                session,
                send_queue,
                schedule_expiration,
                connect_hold,
                new_browser_id,
                failure: Some(FoldFailure::ProtocolViolation(
                    "a /meta/handshake request must contain exactly one message".to_owned(),
                )),
            };
        }

        let resolved_session = if idx == 0 {
            session.clone()
        } else {
            match &message.client_id {
                Some(client_id) => state.broker.get_session(client_id).await,
                None => session.clone(),
            }
        };

        let request_browser_id = if is_handshake {
            let id = browser_id.clone().unwrap_or_else(generate_browser_id);
            if browser_id.is_none() {
                new_browser_id = Some(id.clone());
            }
            Some(id)
        } else {
            None
        };

        let (reply, resulting_session) = match state.broker.process(message, resolved_session, request_browser_id).await {
            Ok(pair) => pair,
            Err(err) => {
                tracing::error!(error = %err, "broker pipeline failure");
                return FoldOutcome {
                    replies,
                    session,
                    send_queue,
                    schedule_expiration,
                    connect_hold,
                    new_browser_id,
                    failure: Some(FoldFailure::Internal),
                };
            }
        };

        if is_handshake {
            send_queue = false;
            schedule_expiration = true;
            session = resulting_session;
            replies.push(reply);
        } else if is_connect {
            send_queue = true;
            schedule_expiration = true;
            match resulting_session {
                Some(connect_session) => {
                    session = Some(connect_session.clone());
                    let only_message_in_request = message_count == 1;
                    match state.broker.suspend_or_complete_connect(&connect_session, reply, only_message_in_request).await {
                        ConnectDecision::Suspended { waiter, rx, reply } => {
                            connect_hold = Some((connect_session, waiter, rx, reply));
                        }
                        ConnectDecision::Completed(completed_reply) => {
                            replies.push(completed_reply);
                        }
                    }
                }
                None => {
                    session = None;
                    replies.push(reply);
                }
            }
        } else {
            let suppress_flush_drain = match &resulting_session {
                Some(s) => s.meta_connect_delivery_only().await,
                None => false,
            };
            send_queue = !suppress_flush_drain;
            session = resulting_session;
            replies.push(reply);
        }
    }

    FoldOutcome {
        replies,
        session,
        send_queue,
        schedule_expiration,
        connect_hold,
        new_browser_id,
        failure: None,
    }
}

/// Substitutes the ack extension's replay set for the session's normally
/// drained queue when `connect_reply` closed a batch (`SPEC_FULL.md` §4.7).
///
/// The session's own queue is drained unconditionally -- `deliver` (see
/// `session.rs`) always pushes into it regardless of `metaConnectDeliveryOnly`,
/// so skipping the drain here would leave it growing without bound and
/// `has_queued_messages` permanently `true`. Its contents are discarded in
/// favor of the replay set, which is the authoritative record of what the
/// client has not yet acked.
async fn drain_for_response(state: &AppState, session: &Arc<Session>, connect_reply: &Message) -> Vec<Message> {
    let drained = session.drain_queue().await;
    let batch = connect_reply.ext.as_ref().and_then(|ext| ext.get("ack")).and_then(serde_json::Value::as_i64);
    if let Some(batch) = batch {
        if let Some(ack_extension) = state.broker.ack_extension(session.id()).await {
            return ack_extension.replay_since(batch).await;
        }
    }
    drained
}
