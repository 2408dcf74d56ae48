use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored cookie.
///
/// `domain` is either a bare host (host-only cookie) or a domain starting
/// with `.`, which also matches every subdomain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieRecord {
    pub name:        String,
    pub value:       String,
    pub domain:      String,
    pub path:        String,
    pub max_age:     Option<i64>,
    pub expires:     Option<DateTime<Utc>>,
    pub secure:      bool,
    pub http_only:   bool,
    /// Ports the cookie is restricted to; empty means any port.
    pub ports:       Vec<u16>,
    pub discard:     bool,
    pub version:     Option<u32>,
    pub comment:     Option<String>,
    pub comment_url: Option<String>,
}

impl CookieRecord {
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name:        name.into(),
            value:       value.into(),
            domain:      domain.into().to_ascii_lowercase(),
            path:        "/".to_string(),
            max_age:     None,
            expires:     None,
            secure:      false,
            http_only:   false,
            ports:       Vec::new(),
            discard:     false,
            version:     None,
            comment:     None,
            comment_url: None,
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool { self.expires.is_some_and(|expires| expires <= now) }

    /// Session cookies and cookies flagged `Discard` end with the session.
    pub fn is_temporary(&self) -> bool { self.discard || self.expires.is_none() }

    pub fn matches_domain(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        match self.domain.strip_prefix('.') {
            Some(parent) => host == parent || host.ends_with(&self.domain),
            None => host == self.domain,
        }
    }

    /// RFC 6265 path-match.
    pub fn matches_path(&self, path: &str) -> bool {
        let path = if path.is_empty() { "/" } else { path };
        if path == self.path {
            return true;
        }
        path.starts_with(&self.path) && (self.path.ends_with('/') || path[self.path.len()..].starts_with('/'))
    }

    pub fn matches_port(&self, port: Option<u16>) -> bool {
        self.ports.is_empty() || port.is_some_and(|port| self.ports.contains(&port))
    }

    /// `name=value` as sent in a `Cookie` header.
    pub fn pair(&self) -> String { format!("{}={}", self.name, self.value) }

    pub(crate) fn same_identity(&self, other: &CookieRecord) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }
}
