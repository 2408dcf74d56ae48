//! HTTP client core with pluggable caching, retries, redirects, cookies,
//! authentication and batching.
//!
//! Requests carry their own prioritized subscriber table; each plugin is a
//! [`Subscriber`] reacting to lifecycle events. [`Session::from_config`]
//! wires the plugins selected by a [`ClientConfig`] into a [`Client`].
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use hitch::{ClientConfig, MockTransport, Response, Session};
//!
//! let config = ClientConfig::from_toml_str("[cache]\ndefault_ttl = 60").unwrap();
//! let transport = Arc::new(MockTransport::always(Response::new(200)));
//! let session = Session::from_config(&config, transport).unwrap();
//! let response = session.execute(session.get("http://example.com/").unwrap()).unwrap();
//! assert_eq!(response.status(), 200);
//! ```

mod config;
mod error;
mod session;

pub use config::{AuthConfig, ClientConfig};
pub use error::{Error, Result};
pub use session::{Session, SessionBuilder};

pub use hitch_auth as auth;
pub use hitch_batch as batch;
pub use hitch_cache as cache;
pub use hitch_cookie as cookie;
pub use hitch_event as event;
pub use hitch_http as http;
pub use hitch_redirect as redirect;
pub use hitch_retry as retry;
pub use hitch_verify as verify;

pub use hitch_http::{
    Client, ClientBuilder, Event, Method, MockTransport, Request, Response, SharedRequest, Subscriber, Transport,
};
#[cfg(feature = "reqwest")]
pub use hitch_http::ReqwestTransport;
