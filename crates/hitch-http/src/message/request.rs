use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use hitch_event::EventBus;
use url::Url;

use super::{Extensions, Headers, Method, Params, Response};
use crate::cache_control::CacheControl;
use crate::error::{Error, Result};
use crate::event::{Event, Subscriber};
use crate::lifecycle;
use crate::pool::PoolHandle;
use crate::transport::Transport;

/// Registration table of a request or client.
pub type Subscribers = EventBus<Event, dyn Subscriber>;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a request. Duplicates get a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    fn next() -> Self { Self(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)) }

    pub fn get(&self) -> u64 { self.0 }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "#{}", self.0) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    New,
    /// Being sent, or flagged by a subscriber to be sent again.
    Transfer,
    Complete,
    Error,
}

/// How the current send attempt is being driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// Blocking, one request at a time.
    #[default]
    Direct,
    /// Inside a pool's poll loop; subscribers must not block.
    Pooled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    Basic,
    Digest,
}

/// Transport-level credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub scheme:   AuthScheme,
}

impl Credentials {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            scheme:   AuthScheme::Basic,
        }
    }

    pub fn digest(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            scheme: AuthScheme::Digest,
            ..Self::basic(username, password)
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("scheme", &self.scheme)
            .finish()
    }
}

/// An outbound HTTP call and everything attached to it.
///
/// A request owns its subscriber table. Cloning copies the table (the
/// subscribers themselves are shared), gives the copy a new identity and
/// drops the response; use [`Request::duplicate`] to also let subscribers
/// reset their state through `request.clone`.
pub struct Request {
    id:          RequestId,
    method:      Method,
    url:         Url,
    headers:     Headers,
    body:        Option<Bytes>,
    params:      Params,
    extensions:  Extensions,
    events:      Subscribers,
    response:    Option<Response>,
    state:       RequestState,
    mode:        DispatchMode,
    credentials: Option<Credentials>,
    pool:        Option<PoolHandle>,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            id: RequestId::next(),
            method,
            url,
            headers: Headers::new(),
            body: None,
            params: Params::new(),
            extensions: Extensions::new(),
            events: Subscribers::new(),
            response: None,
            state: RequestState::New,
            mode: DispatchMode::Direct,
            credentials: None,
            pool: None,
        }
    }

    pub fn parse(method: Method, url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|source| Error::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        Ok(Self::new(method, parsed))
    }

    pub fn get(url: &str) -> Result<Self> { Self::parse(Method::Get, url) }

    pub fn id(&self) -> RequestId { self.id }

    pub fn method(&self) -> &Method { &self.method }

    pub fn set_method(&mut self, method: Method) { self.method = method; }

    pub fn url(&self) -> &Url { &self.url }

    pub fn set_url(&mut self, url: Url) { self.url = url; }

    pub fn scheme(&self) -> &str { self.url.scheme() }

    pub fn host(&self) -> &str { self.url.host_str().unwrap_or_default() }

    pub fn port(&self) -> Option<u16> { self.url.port_or_known_default() }

    pub fn path(&self) -> &str { self.url.path() }

    pub fn query(&self) -> Option<&str> { self.url.query() }

    pub fn query_pairs(&self) -> Vec<(String, String)> { self.url.query_pairs().into_owned().collect() }

    pub fn headers(&self) -> &Headers { &self.headers }

    pub fn headers_mut(&mut self) -> &mut Headers { &mut self.headers }

    pub fn header(&self, name: &str) -> Option<&str> { self.headers.get(name) }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.set(name, value);
        self
    }

    pub fn body(&self) -> Option<&Bytes> { self.body.as_ref() }

    pub fn set_body(&mut self, body: impl Into<Bytes>) -> &mut Self {
        self.body = Some(body.into());
        self
    }

    pub fn take_body(&mut self) -> Option<Bytes> { self.body.take() }

    pub fn params(&self) -> &Params { &self.params }

    pub fn params_mut(&mut self) -> &mut Params { &mut self.params }

    pub fn extensions(&self) -> &Extensions { &self.extensions }

    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }

    pub fn events(&self) -> &Subscribers { &self.events }

    /// Request-level `Cache-Control` directives.
    pub fn cache_control(&self) -> CacheControl { CacheControl::from_values(self.headers.get_all("Cache-Control")) }

    /// Registers `subscriber` for its request-level events and notifies it
    /// with `event.attach`. Returns `false` when it was already attached.
    pub fn attach(&mut self, subscriber: Arc<dyn Subscriber>) -> Result<bool> {
        if self.events.is_attached(&*subscriber) {
            return Ok(false);
        }
        for (event, priority) in subscriber.subscribed_events() {
            if event.is_request_event() {
                self.events.attach(Arc::clone(&subscriber), event, priority);
            }
        }
        subscriber.on_attach(self)?;
        Ok(true)
    }

    /// Removes every registration of `subscriber`, notifying it with
    /// `event.detach`. Unknown subscribers are ignored.
    pub fn detach<T: ?Sized>(&mut self, subscriber: &T) -> Result<usize> {
        let target = self
            .events
            .subscribers()
            .into_iter()
            .find(|s| std::ptr::addr_eq(Arc::as_ptr(s), subscriber as *const T));
        let removed = self.events.detach(subscriber);
        if let Some(target) = target {
            target.on_detach(self)?;
        }
        Ok(removed)
    }

    pub fn response(&self) -> Option<&Response> { self.response.as_ref() }

    pub fn response_mut(&mut self) -> Option<&mut Response> { self.response.as_mut() }

    pub fn set_response(&mut self, response: Response) { self.response = Some(response); }

    pub fn take_response(&mut self) -> Option<Response> { self.response.take() }

    pub fn state(&self) -> RequestState { self.state }

    pub fn set_state(&mut self, state: RequestState) { self.state = state; }

    pub fn mode(&self) -> DispatchMode { self.mode }

    pub fn set_mode(&mut self, mode: DispatchMode) { self.mode = mode; }

    pub fn credentials(&self) -> Option<&Credentials> { self.credentials.as_ref() }

    pub fn set_credentials(&mut self, credentials: Credentials) { self.credentials = Some(credentials); }

    pub fn pool(&self) -> Option<&PoolHandle> { self.pool.as_ref() }

    pub fn set_pool(&mut self, pool: PoolHandle) { self.pool = Some(pool); }

    /// Clone that also raises `request.clone` on the copy.
    pub fn duplicate(&self) -> Result<Request> {
        let mut copy = self.clone();
        lifecycle::dispatch(&mut copy, Event::Clone, |subscriber, request| {
            subscriber.on_clone(request)
        })?;
        Ok(copy)
    }

    /// Sends through the full lifecycle and returns the final response.
    pub fn send(&mut self, transport: &dyn Transport) -> Result<&Response> {
        lifecycle::send(self, transport)?;
        self.response
            .as_ref()
            .ok_or_else(|| Error::config("request completed without a response"))
    }
}

impl Clone for Request {
    fn clone(&self) -> Self {
        Self {
            id:          RequestId::next(),
            method:      self.method.clone(),
            url:         self.url.clone(),
            headers:     self.headers.clone(),
            body:        self.body.clone(),
            params:      self.params.clone(),
            extensions:  self.extensions.clone(),
            events:      self.events.clone(),
            response:    None,
            state:       RequestState::New,
            mode:        DispatchMode::Direct,
            credentials: self.credentials.clone(),
            pool:        self.pool.clone(),
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("state", &self.state)
            .field("headers", &self.headers)
            .field("subscribers", &self.events)
            .finish_non_exhaustive()
    }
}
