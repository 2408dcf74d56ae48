use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hitch_http::{Headers, Request, TransportError};

/// Events published by the backoff plugin on its observer bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryEvent {
    /// A failed response is about to be retried.
    Retry,
    /// The transport raised an error; it is not retried.
    TransportFailure,
}

impl RetryEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryEvent::Retry => "retry",
            RetryEvent::TransportFailure => "transport-failure",
        }
    }
}

impl fmt::Display for RetryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Snapshot of a request at a retry decision.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryRecord {
    pub ts:               DateTime<Utc>,
    pub method:           String,
    pub url:              String,
    pub retries:          u32,
    pub delay:            Duration,
    pub status:           Option<u16>,
    pub phrase:           Option<String>,
    pub error_code:       Option<i32>,
    pub error:            Option<String>,
    pub connect_time:     Option<Duration>,
    pub total_time:       Option<Duration>,
    pub request_headers:  Headers,
    pub response_headers: Headers,
}

impl RetryRecord {
    pub fn from_request(request: &Request, retries: u32, delay: Duration) -> Self {
        let response = request.response();
        Self {
            ts: Utc::now(),
            method: request.method().to_string(),
            url: request.url().to_string(),
            retries,
            delay,
            status: response.map(|r| r.status()),
            phrase: response.map(|r| r.reason().to_string()),
            error_code: None,
            error: None,
            connect_time: response.and_then(|r| r.info().connect_time),
            total_time: response.and_then(|r| r.info().total_time),
            request_headers: request.headers().clone(),
            response_headers: response.map(|r| r.headers().clone()).unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn with_error(mut self, error: &TransportError) -> Self {
        self.error_code = error.code;
        self.error = Some(error.message.clone());
        self
    }

    /// Request header first, then response header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request_headers
            .get(name)
            .or_else(|| self.response_headers.get(name))
    }
}

pub trait RetryObserver: Send + Sync {
    fn on_retry(&self, _record: &RetryRecord) {}

    fn on_transport_failure(&self, _record: &RetryRecord) {}
}
