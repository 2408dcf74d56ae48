use chrono::{DateTime, Utc};
use hitch_http::httpdate::fmt_http_date;
use hitch_http::{Headers, Response};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Headers a stored response never keeps.
pub const EXCLUDED_HEADERS: [&str; 10] = [
    "Connection",
    "Keep-Alive",
    "Proxy-Authenticate",
    "Proxy-Authorization",
    "TE",
    "Trailers",
    "Transfer-Encoding",
    "Upgrade",
    "Set-Cookie",
    "Set-Cookie2",
];

/// Serialized form of a cached response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub status:  u16,
    pub reason:  String,
    pub headers: Headers,
    pub body:    Vec<u8>,
}

impl CacheEntry {
    /// Snapshot of `response` without excluded headers, stamped with a
    /// `Date` header when it has none.
    pub fn from_response(response: &Response, now: DateTime<Utc>) -> Self {
        let mut headers = response.headers().clone();
        for name in EXCLUDED_HEADERS {
            headers.remove(name);
        }
        if !headers.contains("Date") {
            headers.set("Date", fmt_http_date(now));
        }
        Self {
            status: response.status(),
            reason: response.reason().to_string(),
            headers,
            body: response.body().to_vec(),
        }
    }

    pub fn into_response(self) -> Response {
        Response::new(self.status)
            .with_reason(self.reason)
            .with_headers(self.headers)
            .with_body(self.body)
    }

    pub fn encode(&self) -> Result<Vec<u8>> { Ok(postcard::to_allocvec(self)?) }

    pub fn decode(bytes: &[u8]) -> Result<Self> { Ok(postcard::from_bytes(bytes)?) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excluded_headers_are_dropped() {
        let response = Response::new(200)
            .with_header("Content-Type", "text/plain")
            .with_header("Set-Cookie", "id=1")
            .with_header("Connection", "keep-alive")
            .with_header("transfer-encoding", "chunked")
            .with_body("hello");

        let entry = CacheEntry::from_response(&response, Utc::now());
        for name in EXCLUDED_HEADERS {
            assert!(!entry.headers.contains(name), "{name} kept");
        }
        assert!(entry.headers.contains("Date"));
        assert_eq!(entry.headers.get("Content-Type"), Some("text/plain"));
    }

    #[test]
    fn test_codec_is_lossless() {
        let response = Response::new(203)
            .with_reason("Custom Reason")
            .with_header("Date", "Sun, 06 Nov 1994 08:49:37 GMT")
            .with_header("Vary", "Accept")
            .with_header("vary", "Accept-Language")
            .with_body(vec![0_u8, 159, 146, 150]);

        let entry = CacheEntry::from_response(&response, Utc::now());
        let decoded = CacheEntry::decode(&entry.encode().unwrap()).unwrap();
        assert_eq!(decoded, entry);

        let restored = decoded.into_response();
        assert_eq!(restored.status(), 203);
        assert_eq!(restored.reason(), "Custom Reason");
        assert_eq!(restored.headers().get_all("Vary").len(), 2);
        assert_eq!(restored.body().as_ref(), &[0_u8, 159, 146, 150]);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(CacheEntry::decode(&[0xff, 0xff, 0xff]).is_err());
    }
}
