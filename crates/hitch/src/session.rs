//! A [`Client`] assembled from a [`ClientConfig`].

use std::sync::Arc;
use std::time::Duration;

use hitch_auth::{BasicAuth, DigestAuth, OAuth1};
use hitch_batch::BatchQueue;
use hitch_cache::{CachePlugin, CacheStore, MemoryStore};
use hitch_cookie::{CookieJar, CookiePlugin, MemoryCookieJar};
use hitch_http::{Client, ClientBuilder, Method, Request, Response, SharedRequest, Sleeper, Subscriber, Transport};
use hitch_redirect::RedirectPlugin;
use hitch_retry::{BackoffLogger, BackoffPlugin};
use hitch_verify::Md5Validator;
use tracing::debug;
use url::Url;

use crate::config::{AuthConfig, ClientConfig};
use crate::error::{Error, Result};

pub struct Session {
    client: Client,
    store:  Option<Arc<dyn CacheStore>>,
    jar:    Option<Arc<dyn CookieJar>>,
    batch:  Option<Arc<BatchQueue>>,
}

impl Session {
    pub fn from_config(config: &ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        SessionBuilder::new(config.clone(), transport).build()
    }

    pub fn builder(config: ClientConfig, transport: Arc<dyn Transport>) -> SessionBuilder {
        SessionBuilder::new(config, transport)
    }

    pub fn client(&self) -> &Client { &self.client }

    pub fn client_mut(&mut self) -> &mut Client { &mut self.client }

    pub fn cache_store(&self) -> Option<&Arc<dyn CacheStore>> { self.store.as_ref() }

    pub fn cookie_jar(&self) -> Option<&Arc<dyn CookieJar>> { self.jar.as_ref() }

    pub fn batch(&self) -> Option<&Arc<BatchQueue>> { self.batch.as_ref() }

    pub fn request(&self, method: Method, url: &str) -> Result<Request> { Ok(self.client.request(method, url)?) }

    pub fn get(&self, url: &str) -> Result<Request> { Ok(self.client.get(url)?) }

    /// Sends `request` and returns its final response.
    pub fn execute(&self, request: Request) -> Result<Response> { Ok(self.client.execute(request)?) }

    /// Queues `request` for the next flush.
    pub fn enqueue(&self, request: Request) -> Result<SharedRequest> {
        let batch = self.batch.as_ref().ok_or(Error::BatchDisabled)?;
        Ok(batch.enqueue(request)?)
    }

    pub fn flush(&self) -> Result<usize> {
        let batch = self.batch.as_ref().ok_or(Error::BatchDisabled)?;
        Ok(batch.flush()?)
    }
}

pub struct SessionBuilder {
    config:      ClientConfig,
    transport:   Arc<dyn Transport>,
    sleeper:     Option<Arc<dyn Sleeper>>,
    subscribers: Vec<Arc<dyn Subscriber>>,
}

impl SessionBuilder {
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            sleeper: None,
            subscribers: Vec::new(),
        }
    }

    /// Sleeper for retry backoff and pool polling.
    #[must_use]
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Extra client subscriber, added after the configured plugins.
    #[must_use]
    pub fn subscriber(mut self, subscriber: Arc<dyn Subscriber>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    pub fn build(self) -> Result<Session> {
        let config = self.config;
        let mut builder = ClientBuilder::new(self.transport)
            .poll_interval(Duration::from_millis(config.poll_interval_ms));
        if let Some(base_url) = &config.base_url {
            builder = builder.base_url(Url::parse(base_url)?);
        }
        for (name, value) in &config.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(sleeper) = &self.sleeper {
            builder = builder.sleeper(sleeper.clone());
        }

        let batch = match &config.batch {
            Some(options) => {
                let queue = BatchQueue::new(options.clone())?;
                builder = builder.subscriber(queue.clone());
                Some(queue)
            },
            None => None,
        };

        let jar = if config.cookies {
            let jar: Arc<dyn CookieJar> = Arc::new(MemoryCookieJar::new());
            builder = builder.subscriber(Arc::new(CookiePlugin::new(jar.clone())));
            Some(jar)
        } else {
            None
        };

        let store = match &config.cache {
            Some(options) => {
                let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new(options.capacity));
                let plugin = CachePlugin::new(store.clone()).with_default_ttl(options.default_ttl());
                builder = builder.subscriber(Arc::new(plugin));
                Some(store)
            },
            None => None,
        };

        if let Some(options) = &config.retry {
            let mut plugin = BackoffPlugin::from_options(options).with_observer(Arc::new(BackoffLogger::default()));
            if let Some(sleeper) = &self.sleeper {
                plugin = plugin.with_sleeper(sleeper.clone());
            }
            builder = builder.subscriber(Arc::new(plugin));
        }

        if config.follow_redirects {
            builder = builder.subscriber(Arc::new(RedirectPlugin::new(config.redirect.clone())));
        }

        if config.verify_md5 {
            builder = builder.subscriber(Arc::new(Md5Validator::new()));
        }

        if let Some(auth) = &config.auth {
            let plugin: Arc<dyn Subscriber> = match auth {
                AuthConfig::Basic { username, password } => Arc::new(BasicAuth::new(username, password)),
                AuthConfig::Digest { username, password } => Arc::new(DigestAuth::new(username, password)),
                AuthConfig::OAuth1(oauth) => Arc::new(OAuth1::new(oauth.clone())),
            };
            builder = builder.subscriber(plugin);
        }

        for subscriber in self.subscribers {
            builder = builder.subscriber(subscriber);
        }

        let client = builder.build();
        debug!(subscribers = client.events().subscribers().len(), "session ready");
        Ok(Session {
            client,
            store,
            jar,
            batch,
        })
    }
}
