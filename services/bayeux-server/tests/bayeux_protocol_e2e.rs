//! End-to-end scenarios against a real running server (`SPEC_FULL.md` §8 /
//! `spec.md` §8). Each test binds an ephemeral port, spawns `axum::serve` in
//! the background, and drives it with `BayeuxTestClient`.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bayeux_core::BrokerOptions;
use bayeux_server::config::TransportOptions;
use bayeux_server::state::AppState;
use bayeux_test_support::BayeuxTestClient;

async fn spawn_server(broker_options: BrokerOptions, transport_options: TransportOptions) -> SocketAddr {
    let state = AppState::new(broker_options, transport_options);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, bayeux_server::build_router(state)).await.unwrap();
    });
    addr
}

fn client_for(addr: SocketAddr) -> BayeuxTestClient {
    BayeuxTestClient::new(format!("http://{addr}/"))
}

#[tokio::test]
async fn handshake_only_request_returns_clientid_and_advice() {
    let addr = spawn_server(BrokerOptions::default(), TransportOptions::default()).await;
    let mut client = client_for(addr);

    let reply = client.handshake().await;
    assert_eq!(reply.successful, Some(true));
    assert_eq!(reply.client_id.as_ref().map(String::len), Some(40));
    assert_eq!(
        reply.advice.as_ref().and_then(|a| a.reconnect),
        Some(bayeux_protocol::advice::Reconnect::Retry)
    );
}

#[tokio::test]
async fn held_connect_returns_on_timeout() {
    let mut options = BrokerOptions::default();
    options.timeout_ms = 1_500;
    let addr = spawn_server(options, TransportOptions::default()).await;
    let mut client = client_for(addr);
    client.handshake().await;

    let started = Instant::now();
    let replies = client.connect().await;
    let elapsed = started.elapsed();

    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].successful, Some(true));
    assert!(elapsed >= Duration::from_millis(700), "held connect returned too early: {elapsed:?}");
}

#[tokio::test]
async fn held_connect_wakes_on_publish() {
    let addr = spawn_server(BrokerOptions::default(), TransportOptions::default()).await;
    let mut client = client_for(addr);
    client.handshake().await;
    client.subscribe("/foo").await;

    let mut publisher = client_for(addr);
    publisher.handshake().await;

    let base_url = client.base_url();
    let connect_client_id = client.client_id().unwrap().to_owned();
    let held = tokio::spawn(async move {
        let mut c = BayeuxTestClient::new(base_url);
        c.set_client_id(connect_client_id);
        c.connect().await
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    publisher.publish("/foo", serde_json::json!("data")).await;

    let replies = held.await.unwrap();
    assert_eq!(replies.len(), 2, "queued message must precede the connect reply: {replies:?}");
    assert_eq!(replies[0].channel_name().unwrap().as_str(), "/foo");
    assert_eq!(replies[1].channel_name().unwrap().as_str(), "/meta/connect");
    assert_eq!(replies[1].successful, Some(true));
}

#[tokio::test]
async fn duplicate_connect_preempts_the_first() {
    let mut options = BrokerOptions::default();
    options.timeout_ms = 1_500;
    let mut transport = TransportOptions::default();
    transport.duplicate_meta_connect_http_response_code = 400;
    let addr = spawn_server(options, transport).await;
    let mut client = client_for(addr);
    client.handshake().await;

    let client_id = client.client_id().unwrap().to_owned();
    let first_base = client.base_url();
    let first = tokio::spawn({
        let client_id = client_id.clone();
        async move {
            let mut c = BayeuxTestClient::new(first_base);
            c.set_client_id(client_id);
            c.connect_status().await
        }
    });

    tokio::time::sleep(Duration::from_millis(200)).await;

    // The default maxSessionsPerBrowser=1 cap must not make this replacement
    // connect see the preempted hold as still active -- it should itself
    // suspend and return on timeout (scenario 4), not bounce off the cap.
    let mut second = client_for(addr);
    second.set_client_id(client_id);
    let started = Instant::now();
    let second_replies = second.connect().await;
    let elapsed = started.elapsed();

    let first_status = first.await.unwrap();
    assert_eq!(first_status, 400);
    assert_eq!(second_replies.len(), 1);
    assert_eq!(second_replies[0].successful, Some(true));
    assert!(elapsed >= Duration::from_millis(700), "replacement connect returned too early: {elapsed:?}");
}

#[tokio::test]
async fn disconnecting_a_held_connect_lets_the_sweeper_reap_the_session() {
    let mut options = BrokerOptions::default();
    // Long enough that only the client disconnect -- not the timer -- can
    // end the hold; short sweep/maxInterval so the reap is observable fast.
    options.timeout_ms = 30_000;
    options.sweep_period_ms = 200;
    options.max_interval_ms = 500;
    let addr = spawn_server(options, TransportOptions::default()).await;
    let mut client = client_for(addr);
    let handshake_reply = client.handshake().await;
    let client_id = handshake_reply.client_id.clone().unwrap();

    // A short client-side timeout simulates the browser going away mid-hold:
    // reqwest drops the connection, and axum drops the still-suspended
    // handler future out from under its `rx.await`.
    let short_lived = reqwest::Client::builder().timeout(Duration::from_millis(200)).build().unwrap();
    let body = serde_json::json!([{ "channel": "/meta/connect", "clientId": client_id, "connectionType": "long-polling" }]);
    let result = short_lived.post(format!("http://{addr}/")).json(&body).send().await;
    assert!(result.is_err(), "the short-timeout request should have been aborted client-side");

    tokio::time::sleep(Duration::from_millis(1_500)).await;

    let mut probe = client_for(addr);
    probe.set_client_id(client_id);
    let replies = probe.connect().await;
    assert_eq!(
        replies[0].error.as_deref(),
        Some(bayeux_protocol::error_codes::SESSION_UNKNOWN),
        "an orphaned hold must not pin the session alive forever"
    );
}

#[tokio::test]
async fn sweeper_expires_an_idle_session() {
    let mut options = BrokerOptions::default();
    options.sweep_period_ms = 300;
    options.max_interval_ms = 500;
    options.interval_ms = 0;
    let addr = spawn_server(options, TransportOptions::default()).await;
    let mut client = client_for(addr);
    let reply = client.handshake().await;
    let client_id = reply.client_id.clone().unwrap();

    tokio::time::sleep(Duration::from_millis(2_500)).await;

    let mut probe = client_for(addr);
    probe.set_client_id(client_id);
    let replies = probe.connect().await;
    assert_eq!(replies[0].error.as_deref(), Some(bayeux_protocol::error_codes::SESSION_UNKNOWN));
}

#[tokio::test]
async fn ack_extension_replays_unacked_messages_on_reconnect() {
    let mut options = BrokerOptions::default();
    options.timeout_ms = 800;
    let addr = spawn_server(options, TransportOptions::default()).await;
    let mut client = client_for(addr);
    client.handshake_with_ack().await;
    client.subscribe("/foo").await;

    let first_connect = client.connect().await;
    assert_eq!(first_connect[0].channel_name().unwrap().as_str(), "/meta/connect");
    let first_ack = first_connect[0].ext.as_ref().and_then(|e| e.get("ack")).and_then(serde_json::Value::as_i64);
    assert!(first_ack.is_some());

    let mut publisher = client_for(addr);
    publisher.handshake().await;
    publisher.publish("/foo", serde_json::json!("replayed")).await;

    let second_connect = client.connect().await;
    assert!(second_connect.iter().any(|m| m.channel_name().map(|c| c.as_str()) == Some("/foo")));
}

#[tokio::test]
async fn get_request_is_rejected_with_bad_request() {
    let addr = spawn_server(BrokerOptions::default(), TransportOptions::default()).await;
    let response = reqwest::Client::new().get(format!("http://{addr}/")).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn subscribe_then_unsubscribe_leaves_zero_subscribers() {
    let addr = spawn_server(BrokerOptions::default(), TransportOptions::default()).await;
    let mut client = client_for(addr);
    client.handshake().await;

    let sub_reply = client.subscribe("/foo").await;
    assert_eq!(sub_reply.successful, Some(true));

    let unsub_reply = client.unsubscribe("/foo").await;
    assert_eq!(unsub_reply.successful, Some(true));
}
