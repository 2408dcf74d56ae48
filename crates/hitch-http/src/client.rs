//! Request factory carrying client-wide subscribers.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::event::{Event, Subscriber};
use crate::lifecycle;
use crate::message::{Headers, Method, Request, Response, Subscribers};
use crate::pool::{MultiPool, Pool, PoolHandle, SharedRequest, share};
use crate::sleeper::Sleeper;
use crate::transport::Transport;

/// Builds requests, attaches client subscribers to them and sends them.
///
/// Every subscriber added to the client is attached to each request the
/// client creates. Subscribers listening for `client.create_request` are
/// then notified with the finished request.
pub struct Client {
    transport: Arc<dyn Transport>,
    events:    Subscribers,
    base_url:  Option<Url>,
    headers:   Headers,
    pool:      PoolHandle,
}

impl Client {
    pub fn new(transport: Arc<dyn Transport>) -> Self { ClientBuilder::new(transport).build() }

    pub fn builder(transport: Arc<dyn Transport>) -> ClientBuilder { ClientBuilder::new(transport) }

    pub fn transport(&self) -> &Arc<dyn Transport> { &self.transport }

    pub fn events(&self) -> &Subscribers { &self.events }

    /// Default pool assigned to created requests.
    pub fn pool(&self) -> &PoolHandle { &self.pool }

    pub fn base_url(&self) -> Option<&Url> { self.base_url.as_ref() }

    pub fn add_subscriber(&mut self, subscriber: Arc<dyn Subscriber>) {
        let mut events = subscriber.subscribed_events();
        if events.is_empty() {
            events.push((Event::CreateRequest, 0));
        }
        for (event, priority) in events {
            self.events.attach(Arc::clone(&subscriber), event, priority);
        }
        debug!(subscriber = subscriber.name(), "client subscriber added");
    }

    /// Removes a client subscriber; already created requests keep it.
    pub fn remove_subscriber<T: ?Sized>(&mut self, subscriber: &T) -> usize { self.events.detach(subscriber) }

    fn resolve(&self, url: &str) -> Result<Url> {
        let parsed = match &self.base_url {
            Some(base) => base.join(url),
            None => Url::parse(url),
        };
        parsed.map_err(|source| Error::InvalidUrl {
            url: url.to_string(),
            source,
        })
    }

    /// Creates a request for `url`, resolved against the base URL.
    pub fn request(&self, method: Method, url: &str) -> Result<Request> {
        let mut request = Request::new(method, self.resolve(url)?);
        for (name, values) in self.headers.iter() {
            for value in values {
                request.headers_mut().append(name, value.as_str());
            }
        }
        request.set_pool(self.pool.clone());

        for subscriber in self.events.subscribers() {
            request.attach(subscriber)?;
        }
        for subscriber in self.events.listeners(&Event::CreateRequest) {
            subscriber.on_create(&mut request)?;
        }
        Ok(request)
    }

    pub fn get(&self, url: &str) -> Result<Request> { self.request(Method::Get, url) }

    pub fn head(&self, url: &str) -> Result<Request> { self.request(Method::Head, url) }

    pub fn delete(&self, url: &str) -> Result<Request> { self.request(Method::Delete, url) }

    pub fn post(&self, url: &str, body: impl Into<bytes::Bytes>) -> Result<Request> {
        let mut request = self.request(Method::Post, url)?;
        request.set_body(body);
        Ok(request)
    }

    pub fn put(&self, url: &str, body: impl Into<bytes::Bytes>) -> Result<Request> {
        let mut request = self.request(Method::Put, url)?;
        request.set_body(body);
        Ok(request)
    }

    pub fn send(&self, request: &mut Request) -> Result<()> { lifecycle::send(request, self.transport.as_ref()) }

    /// Sends `request` and returns its final response.
    pub fn execute(&self, mut request: Request) -> Result<Response> {
        self.send(&mut request)?;
        request
            .take_response()
            .ok_or_else(|| Error::config("request completed without a response"))
    }

    /// Sends several requests together through the client's pool.
    pub fn send_all(&self, requests: Vec<Request>) -> Result<Vec<SharedRequest>> {
        let shared: Vec<SharedRequest> = requests.into_iter().map(share).collect();
        self.pool.send_all(shared.clone())?;
        Ok(shared)
    }
}

pub struct ClientBuilder {
    transport:   Arc<dyn Transport>,
    subscribers: Vec<Arc<dyn Subscriber>>,
    base_url:    Option<Url>,
    headers:     Headers,
    pool:        Option<PoolHandle>,
    sleeper:     Option<Arc<dyn Sleeper>>,
    poll:        Option<Duration>,
}

impl ClientBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            subscribers: Vec::new(),
            base_url: None,
            headers: Headers::new(),
            pool: None,
            sleeper: None,
            poll: None,
        }
    }

    #[must_use]
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    #[must_use]
    pub fn subscriber(mut self, subscriber: Arc<dyn Subscriber>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Uses `pool` instead of a [`MultiPool`] over the client transport.
    #[must_use]
    pub fn pool(mut self, pool: Arc<dyn Pool>) -> Self {
        self.pool = Some(PoolHandle::new(pool));
        self
    }

    #[must_use]
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll = Some(interval);
        self
    }

    pub fn build(self) -> Client {
        let pool = self.pool.unwrap_or_else(|| {
            let mut pool = MultiPool::new(Arc::clone(&self.transport));
            if let Some(sleeper) = self.sleeper {
                pool = pool.with_sleeper(sleeper);
            }
            if let Some(interval) = self.poll {
                pool = pool.with_poll_interval(interval);
            }
            PoolHandle::new(Arc::new(pool))
        });
        let mut client = Client {
            transport: self.transport,
            events: Subscribers::new(),
            base_url: self.base_url,
            headers: self.headers,
            pool,
        };
        for subscriber in self.subscribers {
            client.add_subscriber(subscriber);
        }
        client
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::message::{Credentials, RequestState};
    use crate::pool::lock;
    use crate::transport::MockTransport;

    #[derive(Default)]
    struct Stamp {
        calls: Mutex<Vec<&'static str>>,
    }

    impl Subscriber for Stamp {
        fn name(&self) -> &'static str { "stamp" }

        fn subscribed_events(&self) -> Vec<(Event, i32)> { vec![(Event::CreateRequest, 0)] }

        fn on_attach(&self, _request: &mut Request) -> Result<()> {
            self.calls.lock().unwrap().push("attach");
            Ok(())
        }

        fn on_create(&self, request: &mut Request) -> Result<()> {
            self.calls.lock().unwrap().push("create");
            request.set_credentials(Credentials::basic("u", "p"));
            Ok(())
        }
    }

    #[test]
    fn test_request_factory() {
        let stamp = Arc::new(Stamp::default());
        let client = Client::builder(Arc::new(MockTransport::new()))
            .base_url(Url::parse("http://api.test/v1/").unwrap())
            .header("User-Agent", "hitch")
            .subscriber(stamp.clone())
            .build();

        let request = client.get("items?page=2").unwrap();
        assert_eq!(request.url().as_str(), "http://api.test/v1/items?page=2");
        assert_eq!(request.header("user-agent"), Some("hitch"));
        assert_eq!(request.pool(), Some(client.pool()));
        assert_eq!(request.credentials().unwrap().username, "u");
        assert_eq!(*stamp.calls.lock().unwrap(), vec!["attach", "create"]);
    }

    #[test]
    fn test_execute_returns_response() {
        let transport = Arc::new(MockTransport::new().with(Response::new(200).with_body("ok")));
        let client = Client::new(transport.clone());

        let response = client.execute(client.get("http://api.test/").unwrap()).unwrap();
        assert_eq!(response.body().as_ref(), b"ok");
        assert_eq!(transport.sent()[0].method, Method::Get);
    }

    #[test]
    fn test_send_all_through_pool() {
        let transport = Arc::new(MockTransport::always(Response::new(200)));
        let client = Client::new(transport.clone());
        let requests = vec![
            client.get("http://a.test/").unwrap(),
            client.get("http://b.test/").unwrap(),
        ];

        let sent = client.send_all(requests).unwrap();
        assert_eq!(transport.sent_count(), 2);
        assert!(sent.iter().all(|r| lock(r).state() == RequestState::Complete));
    }
}
