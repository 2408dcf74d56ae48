//! HTTP Digest authentication (RFC 2617, MD5 with `qop=auth`).

use std::collections::HashMap;

use hitch_http::{Credentials, Event, Request, RequestState, Result, SendContext, Subscriber};
use md5::{Digest as _, Md5};
use tracing::{debug, warn};

use crate::error::AuthError;

/// Marks a request whose challenge was already answered.
#[derive(Debug, Clone, Copy, Default)]
struct Answered;

/// Parsed `WWW-Authenticate: Digest ...` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm:     String,
    pub nonce:     String,
    pub opaque:    Option<String>,
    pub algorithm: Option<String>,
    pub qop:       Vec<String>,
}

impl DigestChallenge {
    pub fn parse(header: &str) -> crate::error::Result<Self> {
        let params = header
            .trim()
            .strip_prefix("Digest")
            .ok_or_else(|| AuthError::Challenge(header.to_string()))?;
        let mut fields = HashMap::new();
        for (key, value) in split_params(params) {
            fields.insert(key.to_ascii_lowercase(), value);
        }
        let nonce = fields
            .remove("nonce")
            .ok_or_else(|| AuthError::Challenge("missing nonce".to_string()))?;
        Ok(Self {
            realm: fields.remove("realm").unwrap_or_default(),
            nonce,
            opaque: fields.remove("opaque"),
            algorithm: fields.remove("algorithm"),
            qop: fields
                .remove("qop")
                .map(|qop| qop.split(',').map(|q| q.trim().to_string()).collect())
                .unwrap_or_default(),
        })
    }

    fn supports_auth(&self) -> bool { self.qop.iter().any(|q| q.eq_ignore_ascii_case("auth")) }

    /// `Authorization` header value answering this challenge.
    pub fn answer(&self, credentials: &Credentials, method: &str, uri: &str, cnonce: &str) -> String {
        let ha1 = md5_hex(&format!("{}:{}:{}", credentials.username, self.realm, credentials.password));
        let ha2 = md5_hex(&format!("{method}:{uri}"));
        let nc = "00000001";

        let mut header = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{uri}\"",
            credentials.username, self.realm, self.nonce
        );
        if self.supports_auth() {
            let response = md5_hex(&format!("{ha1}:{}:{nc}:{cnonce}:auth:{ha2}", self.nonce));
            header.push_str(&format!(", response=\"{response}\", qop=auth, nc={nc}, cnonce=\"{cnonce}\""));
        } else {
            let response = md5_hex(&format!("{ha1}:{}:{ha2}", self.nonce));
            header.push_str(&format!(", response=\"{response}\""));
        }
        if let Some(algorithm) = &self.algorithm {
            header.push_str(&format!(", algorithm={algorithm}"));
        }
        if let Some(opaque) = &self.opaque {
            header.push_str(&format!(", opaque=\"{opaque}\""));
        }
        header
    }
}

fn md5_hex(input: &str) -> String { hex::encode(Md5::digest(input.as_bytes())) }

/// Splits `a="x, y", b=z` into pairs, honouring quotes.
fn split_params(input: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut rest = input.trim();
    while !rest.is_empty() {
        let Some(eq) = rest.find('=') else {
            break;
        };
        let key = rest[..eq].trim().trim_start_matches(',').trim().to_string();
        rest = rest[eq + 1..].trim_start();
        let value = if let Some(quoted) = rest.strip_prefix('"') {
            let end = quoted.find('"').unwrap_or(quoted.len());
            let value = quoted[..end].to_string();
            rest = quoted.get(end + 1..).unwrap_or_default();
            value
        } else {
            let end = rest.find(',').unwrap_or(rest.len());
            let value = rest[..end].trim().to_string();
            rest = &rest[end..];
            value
        };
        pairs.push((key, value));
        rest = rest.trim_start().trim_start_matches(',').trim_start();
    }
    pairs
}

/// Digest credentials plus a one-time answer to the server's challenge.
#[derive(Clone)]
pub struct DigestAuth {
    credentials: Credentials,
}

impl DigestAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::digest(username, password),
        }
    }
}

impl Subscriber for DigestAuth {
    fn name(&self) -> &'static str { "digest_auth" }

    fn subscribed_events(&self) -> Vec<(Event, i32)> {
        vec![(Event::CreateRequest, 0), (Event::Sent, 200), (Event::Clone, 0)]
    }

    fn on_create(&self, request: &mut Request) -> Result<()> {
        request.set_credentials(self.credentials.clone());
        Ok(())
    }

    fn on_clone(&self, request: &mut Request) -> Result<()> {
        request.extensions_mut().remove::<Answered>();
        Ok(())
    }

    fn on_sent(&self, ctx: &mut SendContext<'_>) -> Result<()> {
        let request = &mut *ctx.request;
        if request.extensions().contains::<Answered>() {
            return Ok(());
        }
        let Some(header) = request
            .response()
            .filter(|r| r.status() == 401)
            .and_then(|r| r.header("WWW-Authenticate"))
            .filter(|h| h.trim_start().starts_with("Digest"))
        else {
            return Ok(());
        };
        let challenge = match DigestChallenge::parse(header) {
            Ok(challenge) => challenge,
            Err(error) => {
                warn!(request = %request.id(), %error, "ignoring digest challenge");
                return Ok(());
            },
        };
        let credentials = request.credentials().cloned().unwrap_or_else(|| self.credentials.clone());

        let uri = match request.query() {
            Some(query) => format!("{}?{query}", request.path()),
            None => request.path().to_string(),
        };
        let cnonce = hex::encode(rand::random::<[u8; 8]>());
        let authorization = challenge.answer(&credentials, request.method().as_str(), &uri, &cnonce);

        debug!(request = %request.id(), realm = %challenge.realm, "answering digest challenge");
        request.set_header("Authorization", authorization);
        request.extensions_mut().insert(Answered);
        request.set_state(RequestState::Transfer);
        Ok(())
    }
}
