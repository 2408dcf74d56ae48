use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use url::Url;

use super::Transport;
use crate::error::{TransportError, TransportErrorKind};
use crate::message::{Headers, Method, Request, Response};

/// What a [`MockTransport`] received.
#[derive(Debug, Clone, PartialEq)]
pub struct SentRequest {
    pub method:  Method,
    pub url:     Url,
    pub headers: Headers,
    pub body:    Option<Bytes>,
}

impl SentRequest {
    pub fn header(&self, name: &str) -> Option<&str> { self.headers.get(name) }
}

#[derive(Default)]
struct State {
    queue:    VecDeque<Result<Response, TransportError>>,
    fallback: Option<Response>,
    sent:     Vec<SentRequest>,
}

/// Scripted transport answering from a queue and recording every request.
///
/// Queued replies are consumed in order; once the queue is empty the
/// fallback response (if any) is returned forever, otherwise an error.
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<State>,
}

impl MockTransport {
    pub fn new() -> Self { Self::default() }

    /// Transport that answers every request with `response`.
    pub fn always(response: Response) -> Self {
        let transport = Self::new();
        transport.lock().fallback = Some(response);
        transport
    }

    #[must_use]
    pub fn with(self, response: Response) -> Self {
        self.push(response);
        self
    }

    pub fn push(&self, response: Response) { self.lock().queue.push_back(Ok(response)); }

    pub fn push_error(&self, error: TransportError) { self.lock().queue.push_back(Err(error)); }

    pub fn set_fallback(&self, response: Response) { self.lock().fallback = Some(response); }

    pub fn sent(&self) -> Vec<SentRequest> { self.lock().sent.clone() }

    pub fn sent_count(&self) -> usize { self.lock().sent.len() }

    pub fn remaining(&self) -> usize { self.lock().queue.len() }

    fn lock(&self) -> MutexGuard<'_, State> { self.state.lock().unwrap_or_else(PoisonError::into_inner) }
}

impl Transport for MockTransport {
    fn send(&self, request: &Request) -> Result<Response, TransportError> {
        let mut state = self.lock();
        state.sent.push(SentRequest {
            method:  request.method().clone(),
            url:     request.url().clone(),
            headers: request.headers().clone(),
            body:    request.body().cloned(),
        });
        match state.queue.pop_front() {
            Some(reply) => reply,
            None => state.fallback.clone().ok_or_else(|| {
                TransportError::new(TransportErrorKind::Other, "mock transport has no queued response")
            }),
        }
    }
}
