//! Authentication plugins.
//!
//! [`BasicAuth`] and [`DigestAuth`] hand credentials to the transport when a
//! client creates a request; [`DigestAuth`] also answers one `401` digest
//! challenge per request. [`OAuth1`] signs each attempt right before it
//! leaves.

mod basic;
mod digest;
mod error;
mod oauth;

pub use basic::BasicAuth;
pub use digest::{DigestAuth, DigestChallenge};
pub use error::{AuthError, Result};
pub use oauth::{OAuth1, OAuthConfig, Placement, SignatureMethod, Signer, encode, generate_nonce};
