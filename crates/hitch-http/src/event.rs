//! Typed lifecycle events and the subscriber contract.

use std::fmt;
use std::time::Instant;

use crate::error::{Result, TransportError};
use crate::lifecycle;
use crate::message::Request;
use crate::transport::Transport;

/// Lifecycle events a [`Subscriber`] can register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// Client-level: a request was built by a client.
    CreateRequest,
    /// Delivered to one subscriber as it is attached to a request.
    Attach,
    /// Delivered to one subscriber as it is detached from a request.
    Detach,
    BeforeSend,
    Sent,
    Exception,
    Poll,
    Clone,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateRequest => "client.create_request",
            Self::Attach => "event.attach",
            Self::Detach => "event.detach",
            Self::BeforeSend => "request.before_send",
            Self::Sent => "request.sent",
            Self::Exception => "request.exception",
            Self::Poll => "request.poll",
            Self::Clone => "request.clone",
        }
    }

    /// Events carried on a request's own bus.
    pub fn is_request_event(&self) -> bool {
        matches!(
            self,
            Self::BeforeSend | Self::Sent | Self::Exception | Self::Poll | Self::Clone
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Context of `request.before_send` and `request.sent`.
///
/// Gives access to the transport the request is travelling through so a
/// subscriber can issue sub-requests (revalidation, redirects) inline.
pub struct SendContext<'a> {
    pub request: &'a mut Request,
    transport:   &'a dyn Transport,
}

impl<'a> SendContext<'a> {
    pub fn new(request: &'a mut Request, transport: &'a dyn Transport) -> Self { Self { request, transport } }

    pub fn transport(&self) -> &'a dyn Transport { self.transport }

    /// Sends `request` through its full lifecycle on the same transport.
    pub fn send(&self, request: &mut Request) -> Result<()> { lifecycle::send(request, self.transport) }
}

/// Context of `request.poll`, raised for requests parked in a pool.
pub struct PollContext<'a> {
    pub request: &'a mut Request,
    now:         Instant,
    requeue:     bool,
}

impl<'a> PollContext<'a> {
    pub fn new(request: &'a mut Request, now: Instant) -> Self {
        Self {
            request,
            now,
            requeue: false,
        }
    }

    pub fn now(&self) -> Instant { self.now }

    /// Returns the request to the back of the pool's active queue.
    pub fn requeue(&mut self) { self.requeue = true; }

    pub fn is_requeued(&self) -> bool { self.requeue }
}

/// A plugin hooked into the request lifecycle.
///
/// Every hook defaults to a no-op; a subscriber only receives the events it
/// lists in [`subscribed_events`](Subscriber::subscribed_events), except
/// `on_attach` and `on_detach`, which always reach the subscriber being
/// attached or detached.
pub trait Subscriber: Send + Sync {
    /// Name of this subscriber for logs and error reports.
    fn name(&self) -> &'static str;

    /// `(event, priority)` pairs; higher priorities run first.
    fn subscribed_events(&self) -> Vec<(Event, i32)>;

    fn on_create(&self, _request: &mut Request) -> Result<()> { Ok(()) }

    fn on_attach(&self, _request: &mut Request) -> Result<()> { Ok(()) }

    fn on_detach(&self, _request: &mut Request) -> Result<()> { Ok(()) }

    fn on_before_send(&self, _ctx: &mut SendContext<'_>) -> Result<()> { Ok(()) }

    fn on_sent(&self, _ctx: &mut SendContext<'_>) -> Result<()> { Ok(()) }

    /// A transport error was raised. Assigning a response recovers.
    fn on_exception(&self, _request: &mut Request, _error: &TransportError) -> Result<()> { Ok(()) }

    fn on_poll(&self, _ctx: &mut PollContext<'_>) -> Result<()> { Ok(()) }

    /// The request is a fresh duplicate; reset per-request state here.
    fn on_clone(&self, _request: &mut Request) -> Result<()> { Ok(()) }
}
