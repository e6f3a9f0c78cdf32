//! Broker-level configuration, matching `SPEC_FULL.md` §6's defaults table.
//!
//! Transport-only options (cookie name/flags, the duplicate-connect HTTP
//! status code) live in `services/bayeux-server`'s own config, since the
//! core has no notion of cookies or HTTP status codes.

#[derive(Debug, Clone)]
pub struct BrokerOptions {
    /// Max hold for `/meta/connect`, in ms.
    pub timeout_ms: i64,
    /// Pause between client connects, in ms.
    pub interval_ms: i64,
    /// Grace period added to `interval` before the sweeper expires a session.
    pub max_interval_ms: i64,
    /// Sweeper tick period, in ms.
    pub sweep_period_ms: u64,
    /// Concurrent suspended connects allowed per browser. `-1` = unlimited,
    /// `0` = forbid holding entirely.
    pub max_sessions_per_browser: i64,
    /// Retry hint (ms) advertised when the per-browser cap is hit.
    pub multi_session_interval_ms: i64,
}

impl Default for BrokerOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            interval_ms: 0,
            max_interval_ms: 10_000,
            sweep_period_ms: 997,
            max_sessions_per_browser: 1,
            multi_session_interval_ms: 2_000,
        }
    }
}
