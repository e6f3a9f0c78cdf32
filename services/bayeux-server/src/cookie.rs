//! Browser-id cookie: parsing the request `Cookie` header and building the
//! `Set-Cookie` response header for a freshly handshaken browser.

use rand::RngCore;

use crate::config::{SameSite, TransportOptions};

/// A fresh 40-hex-character browser id, generated the same way session ids
/// are (`bayeux_core::session::generate_session_id`) -- distinct CSPRNG draw,
/// same shape, no relation between the two namespaces.
pub fn generate_browser_id() -> String {
    let mut bytes = [0u8; 20];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn find_cookie(header: &str, name: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_owned())
}

pub fn build_set_cookie(options: &TransportOptions, browser_id: &str) -> String {
    let mut cookie = format!("{}={}; Path=/", options.browser_cookie_name, browser_id);
    if options.browser_cookie_http_only {
        cookie.push_str("; HttpOnly");
    }
    if options.browser_cookie_secure {
        cookie.push_str("; Secure");
    }
    match options.browser_cookie_same_site {
        Some(SameSite::Strict) => cookie.push_str("; SameSite=Strict"),
        Some(SameSite::Lax) => cookie.push_str("; SameSite=Lax"),
        Some(SameSite::None) => cookie.push_str("; SameSite=None"),
        None => {}
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_cookie_picks_the_named_pair_out_of_several() {
        let header = "other=1; BAYEUX_BROWSER=abc123; another=2";
        assert_eq!(find_cookie(header, "BAYEUX_BROWSER"), Some("abc123".to_owned()));
        assert_eq!(find_cookie(header, "missing"), None);
    }

    #[test]
    fn build_set_cookie_includes_http_only_by_default() {
        let options = TransportOptions::default();
        let cookie = build_set_cookie(&options, "abc123");
        assert!(cookie.starts_with("BAYEUX_BROWSER=abc123; Path=/"));
        assert!(cookie.contains("HttpOnly"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn generated_browser_ids_are_forty_hex_chars() {
        let id = generate_browser_id();
        assert_eq!(id.len(), 40);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
