//! Runtime configuration, read from environment variables.
//!
//! Broker-level knobs are also consulted under a `LONG_POLLING_JSON_<NAME>`
//! prefixed namespace (`SPEC_FULL.md` §6/§9), so a deployment sharing one
//! environment across several connector types can scope overrides to this
//! transport specifically; `lookup` walks the prefix list from general to
//! specific, letting the more specific key win.

use std::env;

use bayeux_core::BrokerOptions;

const PREFIXES: &[&str] = &["", "LONG_POLLING_JSON_"];

fn lookup(name: &str) -> Option<String> {
    let mut found = None;
    for prefix in PREFIXES {
        if let Ok(value) = env::var(format!("{prefix}{name}")) {
            found = Some(value);
        }
    }
    found
}

fn lookup_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    lookup(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

pub fn broker_options_from_env() -> BrokerOptions {
    let defaults = BrokerOptions::default();
    BrokerOptions {
        timeout_ms: lookup_parsed("TIMEOUT_MS", defaults.timeout_ms),
        interval_ms: lookup_parsed("INTERVAL_MS", defaults.interval_ms),
        max_interval_ms: lookup_parsed("MAX_INTERVAL_MS", defaults.max_interval_ms),
        sweep_period_ms: lookup_parsed("SWEEP_PERIOD_MS", defaults.sweep_period_ms),
        max_sessions_per_browser: lookup_parsed("MAX_SESSIONS_PER_BROWSER", defaults.max_sessions_per_browser),
        multi_session_interval_ms: lookup_parsed("MULTI_SESSION_INTERVAL_MS", defaults.multi_session_interval_ms),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub browser_cookie_name: String,
    pub browser_cookie_http_only: bool,
    pub browser_cookie_secure: bool,
    pub browser_cookie_same_site: Option<SameSite>,
    /// HTTP status returned to a `/meta/connect` request that got preempted
    /// by a newer one for the same session.
    pub duplicate_meta_connect_http_response_code: u16,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            browser_cookie_name: "BAYEUX_BROWSER".to_owned(),
            browser_cookie_http_only: true,
            browser_cookie_secure: false,
            browser_cookie_same_site: None,
            duplicate_meta_connect_http_response_code: 500,
        }
    }
}

pub fn transport_options_from_env() -> TransportOptions {
    let defaults = TransportOptions::default();
    let same_site = lookup("BROWSER_COOKIE_SAME_SITE").and_then(|v| match v.to_lowercase().as_str() {
        "strict" => Some(SameSite::Strict),
        "lax" => Some(SameSite::Lax),
        "none" => Some(SameSite::None),
        _ => None,
    });
    TransportOptions {
        browser_cookie_name: lookup("BROWSER_COOKIE_NAME").unwrap_or(defaults.browser_cookie_name),
        browser_cookie_http_only: lookup_parsed("BROWSER_COOKIE_HTTP_ONLY", defaults.browser_cookie_http_only),
        browser_cookie_secure: lookup_parsed("BROWSER_COOKIE_SECURE", defaults.browser_cookie_secure),
        browser_cookie_same_site: same_site.or(defaults.browser_cookie_same_site),
        duplicate_meta_connect_http_response_code: lookup_parsed(
            "DUPLICATE_META_CONNECT_HTTP_RESPONSE_CODE",
            defaults.duplicate_meta_connect_http_response_code,
        ),
    }
}
