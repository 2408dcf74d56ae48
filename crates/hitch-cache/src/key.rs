//! Cache key computation.
//!
//! The key covers method, scheme, host, path, the query string and the
//! request headers, minus `Cache-Control` and anything named by the
//! request's `cache.key_filter` parameter (`header=H1,H2;query=Q1,Q2`).

use hitch_http::Request;
use sha2::{Digest, Sha256};

/// Parameter memoizing the computed key.
pub const KEY_PARAM: &str = "cache.key";
pub const KEY_FILTER_PARAM: &str = "cache.key_filter";

const KEY_PREFIX: &str = "hitch_";

/// Header and query names left out of the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFilter {
    headers: Vec<String>,
    query:   Vec<String>,
}

impl Default for KeyFilter {
    fn default() -> Self {
        Self {
            headers: vec!["cache-control".to_string()],
            query:   Vec::new(),
        }
    }
}

impl KeyFilter {
    /// Parses `header=H1,H2;query=Q1,Q2`. Unknown sections are ignored.
    pub fn parse(text: &str) -> Self {
        let mut filter = Self::default();
        for section in text.split(';') {
            let Some((kind, names)) = section.split_once('=') else {
                continue;
            };
            let names = names
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty());
            match kind.trim().to_ascii_lowercase().as_str() {
                "header" => filter
                    .headers
                    .extend(names.map(str::to_ascii_lowercase)),
                "query" => filter.query.extend(names.map(str::to_string)),
                _ => {},
            }
        }
        filter
    }

    pub fn excludes_header(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.headers.contains(&name)
    }

    pub fn excludes_query(&self, name: &str) -> bool { self.query.iter().any(|q| q == name) }
}

fn key_material(request: &Request) -> String {
    let filter = KeyFilter::parse(request.params().get(KEY_FILTER_PARAM).unwrap_or_default());

    let query = request
        .query_pairs()
        .into_iter()
        .filter(|(name, _)| !filter.excludes_query(name))
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut headers: Vec<String> = request
        .headers()
        .iter()
        .filter(|(name, _)| !filter.excludes_header(name))
        .map(|(name, values)| format!("{}={}", name.to_ascii_lowercase(), values.join(",")))
        .collect();
    headers.sort();

    let authority = match request.url().port() {
        Some(port) => format!("{}:{port}", request.host()),
        None => request.host().to_string(),
    };

    format!(
        "{}_{}&{}&{}&{}&{}",
        request.method(),
        request.scheme(),
        authority,
        request.path(),
        query,
        headers.join("&")
    )
}

/// Hashed cache key, memoized in the `cache.key` parameter.
pub fn cache_key(request: &mut Request) -> String {
    if let Some(key) = request.params().get(KEY_PARAM) {
        return key.to_string();
    }
    let digest = Sha256::digest(key_material(request).as_bytes());
    let key = format!("{KEY_PREFIX}{}", hex::encode(digest));
    request.params_mut().set(KEY_PARAM, key.clone());
    key
}

/// Unhashed, lowercased key for debugging. Never memoized.
pub fn raw_cache_key(request: &Request) -> String { format!("{KEY_PREFIX}{}", key_material(request)).to_ascii_lowercase() }

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: &str) -> Request {
        let mut request = Request::get(url).unwrap();
        request.set_header("Accept", "text/html");
        request
    }

    #[test]
    fn test_identical_requests_share_key() {
        let mut a = request("http://example.com/items?page=1");
        let mut b = request("http://example.com/items?page=1");

        let key = cache_key(&mut a);
        assert!(key.starts_with("hitch_"));
        assert_eq!(key.len(), "hitch_".len() + 64);
        assert_eq!(key, cache_key(&mut b));
    }

    #[test]
    fn test_cache_control_never_in_key() {
        let mut a = request("http://example.com/items");
        let mut b = request("http://example.com/items");
        b.set_header("Cache-Control", "no-cache");

        assert_eq!(cache_key(&mut a), cache_key(&mut b));
    }

    #[test]
    fn test_filtered_names_do_not_change_key() {
        let mut a = request("http://example.com/items?page=1&ts=100");
        let mut b = request("http://example.com/items?page=1&ts=200");
        b.set_header("X-Trace", "abc");
        for r in [&mut a, &mut b] {
            r.params_mut().set(KEY_FILTER_PARAM, "header=X-Trace; query=ts");
        }

        assert_eq!(cache_key(&mut a), cache_key(&mut b));
    }

    #[test]
    fn test_relevant_changes_change_key() {
        let mut base = request("http://example.com/items?page=1");
        let mut other_page = request("http://example.com/items?page=2");
        let mut other_header = request("http://example.com/items?page=1");
        other_header.set_header("Accept", "application/json");
        let mut head = request("http://example.com/items?page=1");
        head.set_method(hitch_http::Method::Head);

        let key = cache_key(&mut base);
        assert_ne!(key, cache_key(&mut other_page));
        assert_ne!(key, cache_key(&mut other_header));
        assert_ne!(key, cache_key(&mut head));
    }

    #[test]
    fn test_key_is_memoized_but_raw_is_not() {
        let mut request = request("http://example.com/items");
        let key = cache_key(&mut request);
        assert_eq!(request.params().get(KEY_PARAM), Some(key.as_str()));

        request.set_header("Accept", "changed");
        assert_eq!(cache_key(&mut request), key);
        assert!(raw_cache_key(&request).contains("accept=changed"));
        assert_eq!(
            raw_cache_key(&request),
            "hitch_get_http&example.com&/items&&accept=changed"
        );
    }

    #[test]
    fn test_filter_parsing() {
        let filter = KeyFilter::parse("header=A, b;query=q1,q2;bogus");
        assert!(filter.excludes_header("a"));
        assert!(filter.excludes_header("B"));
        assert!(filter.excludes_header("Cache-Control"));
        assert!(filter.excludes_query("q2"));
        assert!(!filter.excludes_query("Q1"));
    }
}
