//! OAuth 1.0 request signing (RFC 5849).

use std::fmt;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hitch_http::{Event, Request, Result, SendContext, Subscriber};
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use sha1::{Digest as _, Sha1};
use sha2::Sha256;
use tracing::trace;

/// Characters left unescaped: RFC 3986 unreserved.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Signs late so the signature covers the final request.
const PRIORITY: i32 = -1000;

pub fn encode(value: &str) -> String { utf8_percent_encode(value, UNRESERVED).to_string() }

/// Produces `oauth_signature` from the signing key and base string.
pub trait Signer: Send + Sync {
    /// Value sent as `oauth_signature_method`.
    fn method(&self) -> &str;

    fn sign(&self, key: &str, base_string: &str) -> crate::error::Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SignatureMethod {
    #[default]
    #[serde(rename = "HMAC-SHA1")]
    HmacSha1,
    #[serde(rename = "HMAC-SHA256")]
    HmacSha256,
    #[serde(rename = "PLAINTEXT")]
    Plaintext,
}

impl Signer for SignatureMethod {
    fn method(&self) -> &str {
        match self {
            SignatureMethod::HmacSha1 => "HMAC-SHA1",
            SignatureMethod::HmacSha256 => "HMAC-SHA256",
            SignatureMethod::Plaintext => "PLAINTEXT",
        }
    }

    fn sign(&self, key: &str, base_string: &str) -> crate::error::Result<String> {
        let digest = match self {
            SignatureMethod::HmacSha1 => {
                let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())?;
                mac.update(base_string.as_bytes());
                mac.finalize().into_bytes().to_vec()
            },
            SignatureMethod::HmacSha256 => {
                let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes())?;
                mac.update(base_string.as_bytes());
                mac.finalize().into_bytes().to_vec()
            },
            SignatureMethod::Plaintext => return Ok(key.to_string()),
        };
        Ok(STANDARD.encode(digest))
    }
}

/// Where the protocol parameters go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    #[default]
    Header,
    Query,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    pub consumer_key:     String,
    pub consumer_secret:  String,
    pub token:            Option<String>,
    pub token_secret:     Option<String>,
    pub verifier:         Option<String>,
    pub realm:            Option<String>,
    pub version:          Option<String>,
    pub signature_method: SignatureMethod,
    pub placement:        Placement,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            consumer_key:     "anonymous".to_string(),
            consumer_secret:  "anonymous".to_string(),
            token:            None,
            token_secret:     None,
            verifier:         None,
            realm:            None,
            version:          Some("1.0".to_string()),
            signature_method: SignatureMethod::default(),
            placement:        Placement::default(),
        }
    }
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("consumer_key", &self.consumer_key)
            .field("token", &self.token)
            .field("signature_method", &self.signature_method)
            .field("placement", &self.placement)
            .finish_non_exhaustive()
    }
}

pub struct OAuth1 {
    config: OAuthConfig,
    signer: Arc<dyn Signer>,
}

impl OAuth1 {
    pub fn new(config: OAuthConfig) -> Self {
        let signer = Arc::new(config.signature_method);
        Self { config, signer }
    }

    #[must_use]
    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = signer;
        self
    }

    pub fn config(&self) -> &OAuthConfig { &self.config }

    /// Protocol parameters other than the signature, sorted by name.
    pub fn oauth_params(&self, timestamp: u64, nonce: &str) -> Vec<(String, String)> {
        let mut params = vec![
            ("oauth_consumer_key".to_string(), self.config.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), self.signer.method().to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
        ];
        let optional = [
            ("oauth_token", &self.config.token),
            ("oauth_verifier", &self.config.verifier),
            ("oauth_version", &self.config.version),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                params.push((name.to_string(), value.clone()));
            }
        }
        params.sort();
        params
    }

    /// `consumer_secret&token_secret`, both encoded.
    pub fn signing_key(&self) -> String {
        format!(
            "{}&{}",
            encode(&self.config.consumer_secret),
            encode(self.config.token_secret.as_deref().unwrap_or_default())
        )
    }

    /// Signature base string of `request` combined with `oauth_params`.
    pub fn string_to_sign(request: &Request, oauth_params: &[(String, String)]) -> String {
        let mut params: Vec<(String, String)> = request
            .url()
            .query_pairs()
            .chain(form_fields(request))
            .map(|(k, v)| (encode(&k), encode(&v)))
            .chain(oauth_params.iter().map(|(k, v)| (encode(k), encode(v))))
            .collect();
        params.sort();
        let normalized = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");

        let mut base_url = request.url().clone();
        base_url.set_query(None);
        base_url.set_fragment(None);

        format!(
            "{}&{}&{}",
            request.method().as_str().to_ascii_uppercase(),
            encode(base_url.as_str()),
            encode(&normalized)
        )
    }

    /// Signs `request` with the given timestamp and nonce.
    pub fn sign_with(&self, request: &mut Request, timestamp: u64, nonce: &str) -> Result<()> {
        if self.config.placement == Placement::Query {
            strip_oauth_query(request);
        }
        let mut params = self.oauth_params(timestamp, nonce);
        let base_string = Self::string_to_sign(request, &params);
        let signature = self.signer.sign(&self.signing_key(), &base_string)?;
        trace!(request = %request.id(), base_string, "signed request");
        params.push(("oauth_signature".to_string(), signature));
        params.sort();

        match self.config.placement {
            Placement::Header => {
                let mut fields: Vec<String> = Vec::with_capacity(params.len() + 1);
                if let Some(realm) = &self.config.realm {
                    fields.push(format!("realm=\"{}\"", encode(realm)));
                }
                fields.extend(params.iter().map(|(k, v)| format!("{k}=\"{}\"", encode(v))));
                request.set_header("Authorization", format!("OAuth {}", fields.join(", ")));
            },
            Placement::Query => {
                let mut url = request.url().clone();
                url.query_pairs_mut()
                    .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
                request.set_url(url);
            },
        }
        Ok(())
    }
}

/// Drops `oauth_*` pairs left in the query by an earlier signing pass.
fn strip_oauth_query(request: &mut Request) {
    if !request.url().query_pairs().any(|(k, _)| k.starts_with("oauth_")) {
        return;
    }
    let kept: Vec<(String, String)> = request
        .url()
        .query_pairs()
        .filter(|(k, _)| !k.starts_with("oauth_"))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let mut url = request.url().clone();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    request.set_url(url);
}

/// Body fields of a form-encoded request.
fn form_fields(request: &Request) -> Vec<(std::borrow::Cow<'_, str>, std::borrow::Cow<'_, str>)> {
    let is_form = request
        .header("Content-Type")
        .is_some_and(|ct| ct.to_ascii_lowercase().starts_with(FORM_CONTENT_TYPE));
    match request.body() {
        Some(body) if is_form => url::form_urlencoded::parse(body).collect(),
        _ => Vec::new(),
    }
}

/// Fresh per-request nonce: SHA-1 of the timestamp, URL and random bits.
pub fn generate_nonce(timestamp: u64, url: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(timestamp.to_string().as_bytes());
    hasher.update(url.as_bytes());
    hasher.update(rand::random::<u64>().to_le_bytes());
    hex::encode(hasher.finalize())
}

fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

impl Subscriber for OAuth1 {
    fn name(&self) -> &'static str { "oauth1" }

    fn subscribed_events(&self) -> Vec<(Event, i32)> { vec![(Event::BeforeSend, PRIORITY)] }

    fn on_before_send(&self, ctx: &mut SendContext<'_>) -> Result<()> {
        let timestamp = unix_timestamp();
        let nonce = generate_nonce(timestamp, ctx.request.url().as_str());
        self.sign_with(ctx.request, timestamp, &nonce)
    }
}

#[cfg(test)]
mod tests {
    use hitch_http::Method;

    use super::*;

    #[test]
    fn test_encode_unreserved() {
        assert_eq!(encode("a-b._~ c+d/é"), "a-b._~%20c%2Bd%2F%C3%A9");
    }

    #[test]
    fn test_rfc5849_signature() {
        // OAuth Core 1.0 appendix A.
        let mut request = Request::get("http://photos.example.net/photos?file=vacation.jpg&size=original").unwrap();
        let oauth = OAuth1::new(OAuthConfig {
            consumer_key: "dpf43f3p2l4k3l03".to_string(),
            consumer_secret: "kd94hf93k423kf44".to_string(),
            token: Some("nnch734d00sl2jdk".to_string()),
            token_secret: Some("pfkkdhi9sl3r4s00".to_string()),
            ..OAuthConfig::default()
        });

        let params = oauth.oauth_params(1191242096, "kllo9940pd9333jh");
        let base = OAuth1::string_to_sign(&request, &params);
        assert_eq!(
            base,
            "GET&http%3A%2F%2Fphotos.example.net%2Fphotos&file%3Dvacation.jpg%26oauth_consumer_key%3Ddpf43f3p2l4k3l03%26\
             oauth_nonce%3Dkllo9940pd9333jh%26oauth_signature_method%3DHMAC-SHA1%26oauth_timestamp%3D1191242096%26\
             oauth_token%3Dnnch734d00sl2jdk%26oauth_version%3D1.0%26size%3Doriginal"
        );

        oauth.sign_with(&mut request, 1191242096, "kllo9940pd9333jh").unwrap();
        let header = request.header("Authorization").unwrap();
        assert!(header.starts_with("OAuth oauth_consumer_key=\"dpf43f3p2l4k3l03\""));
        assert!(header.contains("oauth_signature=\"tR3%2BTy81lMeYAr%2FFid0kMTYa%2FWM%3D\""));
    }

    #[test]
    fn test_form_fields_are_signed() {
        let mut request = Request::parse(Method::Post, "http://example.com/update?a=b").unwrap();
        request
            .set_header("Content-Type", "application/x-www-form-urlencoded")
            .set_body("status=hello%20world");
        let base = OAuth1::string_to_sign(&request, &[]);
        assert_eq!(base, "POST&http%3A%2F%2Fexample.com%2Fupdate&a%3Db%26status%3Dhello%2520world");

        request.set_header("Content-Type", "application/json");
        let base = OAuth1::string_to_sign(&request, &[]);
        assert_eq!(base, "POST&http%3A%2F%2Fexample.com%2Fupdate&a%3Db");
    }

    #[test]
    fn test_query_placement_and_plaintext() {
        let mut request = Request::get("http://example.com/r").unwrap();
        let oauth = OAuth1::new(OAuthConfig {
            consumer_secret: "cs".to_string(),
            token_secret: Some("ts".to_string()),
            signature_method: SignatureMethod::Plaintext,
            placement: Placement::Query,
            ..OAuthConfig::default()
        });
        oauth.sign_with(&mut request, 1, "n").unwrap();
        let pairs = request.query_pairs();
        assert!(pairs.contains(&("oauth_signature".to_string(), "cs&ts".to_string())));
        assert!(pairs.contains(&("oauth_signature_method".to_string(), "PLAINTEXT".to_string())));
        assert_eq!(request.header("Authorization"), None);
    }

    #[test]
    fn test_resigning_replaces_query_parameters() {
        let oauth = OAuth1::new(OAuthConfig {
            placement: Placement::Query,
            ..OAuthConfig::default()
        });
        let mut resigned = Request::get("http://example.com/r?page=2").unwrap();
        oauth.sign_with(&mut resigned, 1, "first").unwrap();
        oauth.sign_with(&mut resigned, 2, "second").unwrap();

        let mut fresh = Request::get("http://example.com/r?page=2").unwrap();
        oauth.sign_with(&mut fresh, 2, "second").unwrap();

        assert_eq!(resigned.url(), fresh.url());
        let pairs = resigned.query_pairs();
        assert_eq!(pairs.iter().filter(|(k, _)| k == "oauth_signature").count(), 1);
        assert!(pairs.contains(&("page".to_string(), "2".to_string())));
        assert!(pairs.contains(&("oauth_nonce".to_string(), "second".to_string())));
    }

    #[test]
    fn test_nonce_is_fresh() {
        let a = generate_nonce(1, "http://example.com/");
        let b = generate_nonce(1, "http://example.com/");
        assert_eq!(a.len(), 40);
        assert_ne!(a, b);
    }
}
