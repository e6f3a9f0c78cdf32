use std::env;

use bayeux_server::config::{broker_options_from_env, transport_options_from_env};
use bayeux_server::state::AppState;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    tracing_subscriber::fmt().with_env_filter(EnvFilter::new(log_level)).init();

    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned());

    let broker_options = broker_options_from_env();
    let transport_options = transport_options_from_env();
    info!(?broker_options, "broker configured");

    let state = AppState::new(broker_options, transport_options);
    let broker = state.broker.clone();
    let router = bayeux_server::build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await.expect("failed to bind");
    info!(addr = %bind_addr, "server listening");
    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await.expect("server error");
    broker.close();
    info!("server shut down gracefully");
}

/// Waits for SIGTERM or Ctrl-C (SIGINT) and returns to trigger graceful shutdown.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C, shutting down"); },
        _ = terminate => { info!("received SIGTERM, shutting down"); },
    }
}
