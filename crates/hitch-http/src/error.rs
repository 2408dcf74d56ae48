use std::fmt;

use crate::message::{Method, RequestId};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Classification of a failed transport call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Connect,
    Resolve,
    Timeout,
    Tls,
    Io,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connect => "connect",
            Self::Resolve => "resolve",
            Self::Timeout => "timeout",
            Self::Tls => "tls",
            Self::Io => "io",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Error raised by a [`Transport`](crate::Transport) instead of a response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    pub kind:    TransportErrorKind,
    /// Transport-specific numeric code, when the backend exposes one.
    pub code:    Option<i32>,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }
}

/// One request issued while following redirects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hop {
    pub method: Method,
    pub url:    url::Url,
    /// Status of the response this hop received, once known.
    pub status: Option<u16>,
}

impl fmt::Display for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)?;
        if let Some(status) = self.status {
            write!(f, " -> {status}")?;
        }
        Ok(())
    }
}

fn describe_hops(hops: &[Hop]) -> String {
    hops.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url:    String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("too many redirects ({} hops): {}", .hops.len(), describe_hops(.hops))]
    TooManyRedirects { hops: Vec<Hop> },

    #[error("integrity check failed: expected {expected}, got {actual}")]
    Integrity { expected: String, actual: String },

    #[error("subscriber '{subscriber}' failed: {source}")]
    Subscriber {
        subscriber: &'static str,
        #[source]
        source:     BoxError,
    },

    #[error("{} pooled request(s) failed", .failures.len())]
    Pool { failures: Vec<(RequestId, Error)> },
}

impl Error {
    pub fn subscriber(subscriber: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Subscriber {
            subscriber,
            source: source.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self { Self::Config(message.into()) }

    /// Hop history when this is a redirect-limit error.
    pub fn redirect_hops(&self) -> Option<&[Hop]> {
        match self {
            Self::TooManyRedirects { hops } => Some(hops),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
