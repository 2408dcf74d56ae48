use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use url::Url;

use super::Headers;
use crate::cache_control::CacheControl;
use crate::httpdate::parse_http_date;

/// Statuses a private cache may store.
const CACHEABLE_STATUSES: [u16; 6] = [200, 203, 206, 300, 301, 410];

/// Metadata reported by the transport alongside a response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferInfo {
    pub effective_url: Option<Url>,
    pub connect_time:  Option<Duration>,
    pub total_time:    Option<Duration>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status:   u16,
    reason:   String,
    headers:  Headers,
    body:     Bytes,
    info:     TransferInfo,
    previous: Option<Box<Response>>,
}

pub fn canonical_reason(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "Non-Authoritative Information",
        204 => "No Content",
        206 => "Partial Content",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "",
    }
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            reason: canonical_reason(status).to_string(),
            headers: Headers::new(),
            body: Bytes::new(),
            info: TransferInfo::default(),
            previous: None,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn status(&self) -> u16 { self.status }

    pub fn reason(&self) -> &str { &self.reason }

    pub fn headers(&self) -> &Headers { &self.headers }

    pub fn headers_mut(&mut self) -> &mut Headers { &mut self.headers }

    pub fn header(&self, name: &str) -> Option<&str> { self.headers.get(name) }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) { self.headers.set(name, value); }

    pub fn body(&self) -> &Bytes { &self.body }

    pub fn info(&self) -> &TransferInfo { &self.info }

    pub fn set_info(&mut self, info: TransferInfo) { self.info = info; }

    /// Response this one was redirected from, if any.
    pub fn previous(&self) -> Option<&Response> { self.previous.as_deref() }

    pub fn set_previous(&mut self, previous: Response) { self.previous = Some(Box::new(previous)); }

    /// Appends `previous` at the far end of the redirect chain.
    pub fn push_previous(&mut self, previous: Response) {
        match self.previous.as_deref_mut() {
            Some(next) => next.push_previous(previous),
            None => self.previous = Some(Box::new(previous)),
        }
    }

    /// Number of responses in the redirect chain behind this one.
    pub fn redirect_count(&self) -> usize {
        let mut count = 0;
        let mut current = self.previous();
        while let Some(response) = current {
            count += 1;
            current = response.previous();
        }
        count
    }

    pub fn is_informational(&self) -> bool { (100..200).contains(&self.status) }

    pub fn is_successful(&self) -> bool { (200..300).contains(&self.status) }

    pub fn is_redirect(&self) -> bool { (300..400).contains(&self.status) }

    pub fn is_client_error(&self) -> bool { (400..500).contains(&self.status) }

    pub fn is_server_error(&self) -> bool { (500..600).contains(&self.status) }

    pub fn is_error(&self) -> bool { self.is_client_error() || self.is_server_error() }

    pub fn cache_control(&self) -> CacheControl { CacheControl::from_values(self.headers.get_all("Cache-Control")) }

    pub fn date(&self) -> Option<DateTime<Utc>> { self.header("Date").and_then(parse_http_date) }

    pub fn expires(&self) -> Option<DateTime<Utc>> { self.header("Expires").and_then(parse_http_date) }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> { self.header("Last-Modified").and_then(parse_http_date) }

    /// Entity tag without its quotes or weak prefix.
    pub fn etag(&self) -> Option<&str> {
        self.header("ETag").map(|tag| {
            let tag = tag.trim();
            let tag = tag.strip_prefix("W/").unwrap_or(tag);
            tag.trim_matches('"')
        })
    }

    /// Age in seconds: the `Age` header when present, else `now - Date`.
    pub fn age_at(&self, now: DateTime<Utc>) -> Option<i64> {
        if let Some(age) = self.header("Age").and_then(|v| v.trim().parse::<i64>().ok()) {
            return Some(age);
        }
        self.date().map(|date| (now - date).num_seconds())
    }

    /// Freshness lifetime in seconds: `s-maxage`, then `max-age`, then
    /// `Expires` measured from `Date` (or from `now` without one).
    pub fn max_age_at(&self, now: DateTime<Utc>) -> Option<i64> {
        if let Some(lifetime) = self.cache_control().lifetime() {
            return Some(i64::try_from(lifetime).unwrap_or(i64::MAX));
        }
        let expires = self.expires()?;
        let origin = self.date().unwrap_or(now);
        Some((expires - origin).num_seconds())
    }

    /// Seconds left before the response goes stale; negative once stale.
    pub fn freshness_at(&self, now: DateTime<Utc>) -> Option<i64> {
        let max_age = self.max_age_at(now)?;
        Some(max_age - self.age_at(now).unwrap_or(0))
    }

    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> Option<bool> { self.freshness_at(now).map(|f| f > 0) }

    pub fn age(&self) -> Option<i64> { self.age_at(Utc::now()) }

    pub fn max_age(&self) -> Option<i64> { self.max_age_at(Utc::now()) }

    pub fn is_fresh(&self) -> Option<bool> { self.is_fresh_at(Utc::now()) }

    /// Whether a validator exists for a conditional request.
    pub fn can_validate(&self) -> bool { self.headers.contains("ETag") || self.headers.contains("Last-Modified") }

    /// Whether a private cache may store this response at all.
    pub fn is_cacheable(&self) -> bool {
        if !CACHEABLE_STATUSES.contains(&self.status) {
            return false;
        }
        let control = self.cache_control();
        if control.no_store {
            return false;
        }
        self.is_fresh() != Some(false) || self.can_validate()
    }
}
