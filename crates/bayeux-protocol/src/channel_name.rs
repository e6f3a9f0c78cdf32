//! Channel name validation and wildcard-ancestor derivation.

use std::fmt;
use std::str::FromStr;

/// Classification derived from a channel's name, per the Bayeux grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// `/meta/*` -- control channels. Never broadcasts.
    Meta,
    /// `/service/*` -- directed, not fanned out to subscribers.
    Service,
    /// Everything else -- fanned out to all subscribers.
    Broadcast,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChannelNameError {
    #[error("channel name must not be empty")]
    Empty,
    #[error("channel name must be an absolute path (start with '/')")]
    NotAbsolute,
    #[error("channel name must not be the bare root '/'")]
    BareRoot,
}

/// A validated, absolute Bayeux channel name, e.g. `/foo/bar`.
///
/// Never empty, never the bare root `/`. Segments are separated by `/` and
/// are not otherwise validated (the protocol leaves segment content to the
/// application).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelName(String);

impl ChannelName {
    pub fn new(raw: impl Into<String>) -> Result<Self, ChannelNameError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(ChannelNameError::Empty);
        }
        if !raw.starts_with('/') {
            return Err(ChannelNameError::NotAbsolute);
        }
        if raw == "/" {
            return Err(ChannelNameError::BareRoot);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    fn is_wildcard(&self) -> bool {
        matches!(self.segments().last(), Some("*") | Some("**"))
    }

    pub fn kind(&self) -> ChannelKind {
        if self.0.starts_with("/meta/") {
            ChannelKind::Meta
        } else if self.0.starts_with("/service/") {
            ChannelKind::Service
        } else {
            ChannelKind::Broadcast
        }
    }

    /// The wildcard parents of this channel, ancestor-first.
    ///
    /// For `/a/b/c` this is `[/**, /a/**, /a/b/**, /a/b/*]`. Channels that are
    /// themselves a wildcard (end in `*` or `**`) have no wildcard parents.
    pub fn wildcard_ancestors(&self) -> Vec<ChannelName> {
        if self.is_wildcard() {
            return Vec::new();
        }
        let segments: Vec<&str> = self.segments().collect();
        let mut out = Vec::with_capacity(segments.len());
        out.push(ChannelName("/**".to_owned()));
        for depth in 1..segments.len() {
            let prefix = segments[..depth].join("/");
            out.push(ChannelName(format!("/{prefix}/**")));
        }
        if segments.len() >= 2 {
            let prefix = segments[..segments.len() - 1].join("/");
            out.push(ChannelName(format!("/{prefix}/*")));
        } else {
            out.push(ChannelName(format!("/{}/*", segments[0])));
        }
        out
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ChannelName {
    type Err = ChannelNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ChannelName {
    type Error = ChannelNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ChannelName> for String {
    fn from(value: ChannelName) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_bare_root() {
        assert_eq!(ChannelName::new(""), Err(ChannelNameError::Empty));
        assert_eq!(ChannelName::new("/"), Err(ChannelNameError::BareRoot));
        assert_eq!(ChannelName::new("foo"), Err(ChannelNameError::NotAbsolute));
    }

    #[test]
    fn classifies_meta_service_broadcast() {
        assert_eq!(ChannelName::new("/meta/connect").unwrap().kind(), ChannelKind::Meta);
        assert_eq!(ChannelName::new("/service/foo").unwrap().kind(), ChannelKind::Service);
        assert_eq!(ChannelName::new("/foo/bar").unwrap().kind(), ChannelKind::Broadcast);
    }

    #[test]
    fn wildcard_ancestors_for_three_segments() {
        let name = ChannelName::new("/a/b/c").unwrap();
        let ancestors: Vec<String> = name.wildcard_ancestors().iter().map(|c| c.to_string()).collect();
        assert_eq!(ancestors, vec!["/**", "/a/**", "/a/b/**", "/a/b/*"]);
    }

    #[test]
    fn wildcard_ancestors_for_single_segment() {
        let name = ChannelName::new("/foo").unwrap();
        let ancestors: Vec<String> = name.wildcard_ancestors().iter().map(|c| c.to_string()).collect();
        assert_eq!(ancestors, vec!["/**", "/foo/*"]);
    }

    #[test]
    fn wildcard_channels_have_no_ancestors() {
        assert!(ChannelName::new("/a/b/*").unwrap().wildcard_ancestors().is_empty());
        assert!(ChannelName::new("/**").unwrap().wildcard_ancestors().is_empty());
    }
}
