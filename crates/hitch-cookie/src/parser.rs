//! `Set-Cookie` / `Set-Cookie2` header parsing.

use chrono::{DateTime, Duration, Utc};
use hitch_http::httpdate::parse_http_date;
use percent_encoding::percent_decode_str;

use crate::cookie::CookieRecord;
use crate::error::{CookieError, Result};

/// Parses one `Set-Cookie` header value received from `host` for a request
/// to `request_path`. Missing `Domain` yields a host-only cookie, missing
/// `Path` the RFC 6265 default path.
pub fn parse_set_cookie(header: &str, host: &str, request_path: &str, now: DateTime<Utc>) -> Result<CookieRecord> {
    let mut pieces = header.split(';').map(str::trim).filter(|piece| !piece.is_empty());
    let first = pieces.next().ok_or(CookieError::Empty)?;
    let (name, value) = first
        .split_once('=')
        .ok_or_else(|| CookieError::MissingValue(first.to_string()))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(CookieError::Invalid("name"));
    }

    let mut cookie = CookieRecord::new(name, decode(value), host);
    cookie.path = default_path(request_path);

    for piece in pieces {
        let (key, value) = match piece.split_once('=') {
            Some((key, value)) => (key.trim(), Some(decode(value))),
            None => (piece, None),
        };
        match key.to_ascii_lowercase().as_str() {
            "domain" => {
                if let Some(domain) = value.filter(|d| !d.is_empty()) {
                    cookie.domain = format!(".{}", domain.trim_start_matches('.').to_ascii_lowercase());
                }
            },
            "path" => {
                if let Some(path) = value.filter(|p| p.starts_with('/')) {
                    cookie.path = path;
                }
            },
            "max-age" => {
                if let Some(seconds) = value.and_then(|v| v.parse::<i64>().ok()) {
                    cookie.max_age = Some(seconds);
                    cookie.expires = Some(now + Duration::seconds(seconds));
                }
            },
            "expires" => {
                // Max-Age wins over Expires.
                if cookie.max_age.is_none() {
                    cookie.expires = value.as_deref().and_then(parse_http_date);
                }
            },
            "secure" => cookie.secure = true,
            "httponly" => cookie.http_only = true,
            "discard" => cookie.discard = true,
            "version" => cookie.version = value.and_then(|v| v.parse().ok()),
            "comment" => cookie.comment = value,
            "commenturl" | "comment-url" => cookie.comment_url = value,
            "port" => cookie.ports = value.map(|list| parse_ports(&list)).unwrap_or_default(),
            _ => {},
        }
    }

    Ok(cookie)
}

/// Parses a `Cookie` request header into name/value pairs.
pub fn parse_cookie_header(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .map(|(name, value)| (name.trim().to_string(), decode(value)))
        .collect()
}

fn decode(value: &str) -> String {
    let value = value.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}

fn parse_ports(list: &str) -> Vec<u16> { list.split(',').filter_map(|port| port.trim().parse().ok()).collect() }

fn default_path(request_path: &str) -> String {
    if !request_path.starts_with('/') {
        return "/".to_string();
    }
    match request_path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(index) => request_path[..index].to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(header: &str) -> CookieRecord { parse_set_cookie(header, "www.example.com", "/docs/page", Utc::now()).unwrap() }

    #[test]
    fn test_defaults_from_request() {
        let cookie = parse("sid=abc123");
        assert_eq!(cookie.name, "sid");
        assert_eq!(cookie.value, "abc123");
        assert_eq!(cookie.domain, "www.example.com");
        assert_eq!(cookie.path, "/docs");
        assert!(cookie.is_temporary());
    }

    #[test]
    fn test_attributes_are_case_insensitive() {
        let cookie = parse("lang=\"en%20US\"; DOMAIN=Example.com; path=/; SECURE; HttpOnly; Version=1; Port=\"80,8080\"");
        assert_eq!(cookie.value, "en US");
        assert_eq!(cookie.domain, ".example.com");
        assert_eq!(cookie.path, "/");
        assert!(cookie.secure);
        assert!(cookie.http_only);
        assert_eq!(cookie.version, Some(1));
        assert_eq!(cookie.ports, vec![80, 8080]);
    }

    #[test]
    fn test_max_age_sets_expiry() {
        let now = Utc::now();
        let cookie = parse_set_cookie("a=1; Max-Age=60; Expires=Thu, 01 Jan 1970 00:00:00 GMT", "h", "/", now).unwrap();
        assert_eq!(cookie.max_age, Some(60));
        assert_eq!(cookie.expires, Some(now + Duration::seconds(60)));
    }

    #[test]
    fn test_expires_attribute() {
        let cookie = parse("a=1; Expires=Wed, 21 Oct 2015 07:28:00 GMT");
        assert!(cookie.is_expired(Utc::now()));
    }

    #[test]
    fn test_rejects_malformed() {
        let now = Utc::now();
        assert!(matches!(parse_set_cookie("", "h", "/", now), Err(CookieError::Empty)));
        assert!(matches!(parse_set_cookie("novalue; Path=/", "h", "/", now), Err(CookieError::MissingValue(_))));
        assert!(matches!(parse_set_cookie("=x", "h", "/", now), Err(CookieError::Invalid("name"))));
    }

    #[test]
    fn test_cookie_header_pairs() {
        let pairs = parse_cookie_header("a=1; b=two%21");
        assert_eq!(pairs, vec![("a".to_string(), "1".to_string()), ("b".to_string(), "two!".to_string())]);
    }
}
