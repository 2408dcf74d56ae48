//! Client configuration loaded from TOML or JSON.
//!
//! ```toml
//! base_url = "https://api.example.com/"
//! cookies = true
//!
//! [headers]
//! User-Agent = "hitch"
//!
//! [cache]
//! default_ttl = 600
//!
//! [retry]
//! max_retries = 2
//! codes = [500, 502, 503]
//!
//! [auth]
//! scheme = "basic"
//! username = "alice"
//! password = "secret"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use hitch_auth::OAuthConfig;
use hitch_batch::BatchOptions;
use hitch_cache::CacheOptions;
use hitch_redirect::RedirectOptions;
use hitch_retry::RetryOptions;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "lowercase")]
pub enum AuthConfig {
    Basic { username: String, password: String },
    Digest { username: String, password: String },
    OAuth1(OAuthConfig),
}

/// Plugins are enabled by the presence of their section, except redirects,
/// which are followed unless `follow_redirects` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url:         Option<String>,
    /// Headers added to every request.
    pub headers:          BTreeMap<String, String>,
    pub cache:            Option<CacheOptions>,
    pub retry:            Option<RetryOptions>,
    pub follow_redirects: bool,
    pub redirect:         RedirectOptions,
    pub cookies:          bool,
    pub batch:            Option<BatchOptions>,
    pub auth:             Option<AuthConfig>,
    /// Check `Content-MD5` of responses.
    pub verify_md5:       bool,
    /// Pause between pool polls while only backing-off requests remain.
    pub poll_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url:         None,
            headers:          BTreeMap::new(),
            cache:            None,
            retry:            None,
            follow_redirects: true,
            redirect:         RedirectOptions::default(),
            cookies:          false,
            batch:            None,
            auth:             None,
            verify_md5:       false,
            poll_interval_ms: 10,
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> { Ok(toml::from_str(s)?) }

    pub fn from_json_str(s: &str) -> Result<Self> { Ok(serde_json::from_str(s)?) }

    /// Reads a `.json` file as JSON and anything else as TOML.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }
}
