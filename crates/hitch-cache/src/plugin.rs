//! Cache subscriber: serves stored responses before transfer and stores
//! cacheable responses after it.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hitch_http::{
    Event, MaxStale, Method, Request, Response, Result, SendContext, Subscriber,
};
use tracing::{debug, trace, warn};

use crate::entry::CacheEntry;
use crate::key::{KEY_PARAM, cache_key};
use crate::options::CacheOptions;
use crate::store::{CacheStore, MemoryStore};

/// Lifetime override in seconds; the stored response is tagged `X-Cache-Ttl`.
pub const OVERRIDE_TTL_PARAM: &str = "cache.override_ttl";
/// `accept` serves a cached response needing revalidation as is, `decline`
/// refetches it.
pub const REVALIDATE_PARAM: &str = "cache.revalidate";

const REFRESHED_HEADERS: [&str; 5] = ["Date", "Expires", "Cache-Control", "ETag", "Last-Modified"];

pub type CacheFilter = Arc<dyn Fn(&Request) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevalidatePolicy {
    Accept,
    Decline,
}

impl FromStr for RevalidatePolicy {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accept" => Ok(Self::Accept),
            "decline" => Ok(Self::Decline),
            _ => Err(()),
        }
    }
}

/// Per-request cache bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheState {
    pub key:     String,
    /// The response should be stored once it arrives.
    pub pending: bool,
    /// The response was served from the store.
    pub hit:     bool,
}

enum Satisfaction {
    Satisfied,
    /// Revalidation fetched a full response that is already on the request.
    Replaced,
    Unsatisfied,
}

enum Revalidation {
    Modified(Response),
    NotModified,
    Failed,
}

pub struct CachePlugin {
    store:       Arc<dyn CacheStore>,
    default_ttl: Duration,
    filter:      Option<CacheFilter>,
}

impl CachePlugin {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            default_ttl: CacheOptions::default().default_ttl(),
            filter: None,
        }
    }

    /// Plugin over a fresh [`MemoryStore`] sized by `options`.
    pub fn from_options(options: &CacheOptions) -> Self {
        Self::new(Arc::new(MemoryStore::new(options.capacity))).with_default_ttl(options.default_ttl())
    }

    #[must_use]
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Replaces the default GET/HEAD without `no-store` rule.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Fn(&Request) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> { &self.store }

    /// Whether this request takes part in caching at all.
    pub fn accepts(&self, request: &Request) -> bool {
        match &self.filter {
            Some(filter) => filter(request),
            None => request.method().is_cacheable() && !request.cache_control().no_store,
        }
    }

    /// Whether `request` was answered from the store.
    pub fn was_hit(request: &Request) -> bool { request.extensions().get::<CacheState>().is_some_and(|s| s.hit) }

    fn lookup(&self, key: &str) -> Result<Option<Response>> {
        let Some(bytes) = self.store.fetch(key)? else {
            return Ok(None);
        };
        match CacheEntry::decode(&bytes) {
            Ok(entry) => Ok(Some(entry.into_response())),
            Err(error) => {
                warn!(key, %error, "discarding undecodable cache entry");
                self.store.delete(key)?;
                Ok(None)
            },
        }
    }

    fn lifetime(&self, response: &Response) -> Duration {
        response
            .max_age()
            .and_then(|seconds| u64::try_from(seconds).ok())
            .filter(|seconds| *seconds > 0)
            .map_or(self.default_ttl, Duration::from_secs)
    }

    fn save(&self, key: &str, response: &Response, ttl: Duration) -> Result<()> {
        let bytes = CacheEntry::from_response(response, Utc::now()).encode()?;
        self.store.save(key, bytes, ttl)?;
        debug!(key, ttl = ttl.as_secs(), status = response.status(), "stored response");
        Ok(())
    }

    fn can_satisfy(&self, ctx: &mut SendContext<'_>, cached: &mut Response, key: &str) -> Result<Satisfaction> {
        let now = Utc::now();
        let request_control = ctx.request.cache_control();
        let age = cached.age_at(now).unwrap_or(0);

        if let Some(max_age) = request_control.max_age {
            if age > i64::try_from(max_age).unwrap_or(i64::MAX) {
                trace!(key, age, max_age, "cached response older than request max-age");
                return Ok(Satisfaction::Unsatisfied);
            }
        }

        let freshness = cached.freshness_at(now);
        if let (Some(min_fresh), Some(freshness)) = (request_control.min_fresh, freshness) {
            if freshness < i64::try_from(min_fresh).unwrap_or(i64::MAX) {
                return Ok(Satisfaction::Unsatisfied);
            }
        }

        let is_get = *ctx.request.method() == Method::Get;
        let mut revalidate = false;

        if let Some(freshness) = freshness.filter(|f| *f <= 0) {
            let staleness = -freshness;
            match request_control.max_stale {
                Some(MaxStale::Any) => {},
                Some(MaxStale::Seconds(limit)) => {
                    if staleness > i64::try_from(limit).unwrap_or(i64::MAX) {
                        return Ok(Satisfaction::Unsatisfied);
                    }
                },
                None if is_get && cached.can_validate() => revalidate = true,
                None => return Ok(Satisfaction::Unsatisfied),
            }
        }

        if is_get {
            let pragma_no_cache = ctx
                .request
                .headers()
                .get_all("Pragma")
                .iter()
                .any(|v| v.to_ascii_lowercase().contains("no-cache"));
            if pragma_no_cache
                || request_control.requires_revalidation()
                || cached.cache_control().requires_revalidation()
            {
                revalidate = true;
            }
        }

        if !revalidate {
            return Ok(Satisfaction::Satisfied);
        }

        let policy = ctx.request.params().parse::<RevalidatePolicy>(REVALIDATE_PARAM);
        match policy {
            Some(RevalidatePolicy::Accept) => Ok(Satisfaction::Satisfied),
            Some(RevalidatePolicy::Decline) => Ok(Satisfaction::Unsatisfied),
            None => match self.revalidate(ctx, cached, key)? {
                Revalidation::NotModified => Ok(Satisfaction::Satisfied),
                Revalidation::Failed => Ok(Satisfaction::Unsatisfied),
                Revalidation::Modified(response) => {
                    if response.is_successful() && response.is_cacheable() {
                        self.save(key, &response, self.lifetime(&response))?;
                    }
                    ctx.request.set_response(response);
                    Ok(Satisfaction::Replaced)
                },
            },
        }
    }

    /// Sends a conditional copy of the request without this plugin.
    /// Transport failures count as a failed revalidation.
    fn revalidate(&self, ctx: &mut SendContext<'_>, cached: &mut Response, key: &str) -> Result<Revalidation> {
        let mut conditional = ctx.request.duplicate()?;
        conditional.detach(self)?;
        conditional.headers_mut().remove("Pragma");
        conditional.headers_mut().remove("Cache-Control");
        if let Some(since) = cached.header("Last-Modified").or_else(|| cached.header("Date")) {
            conditional.set_header("If-Modified-Since", since.to_string());
        }
        if let Some(etag) = cached.etag() {
            conditional.set_header("If-None-Match", format!("\"{etag}\""));
        }

        if let Err(error) = ctx.send(&mut conditional) {
            warn!(key, %error, "revalidation failed");
            return Ok(Revalidation::Failed);
        }
        let Some(validation) = conditional.take_response() else {
            return Ok(Revalidation::Failed);
        };

        match validation.status() {
            200 => {
                debug!(key, "revalidation returned a new response");
                Ok(Revalidation::Modified(validation))
            },
            304 if validation.etag() == cached.etag() => {
                for name in REFRESHED_HEADERS {
                    let values = validation.headers().get_all(name);
                    if values.is_empty() {
                        continue;
                    }
                    cached.headers_mut().remove(name);
                    for value in values {
                        cached.headers_mut().append(name, value.as_str());
                    }
                }
                let age = cached
                    .date()
                    .map_or(0, |date| (Utc::now() - date).num_seconds().max(0));
                cached.set_header("Age", age.to_string());
                if cached.is_cacheable() {
                    self.save(key, cached, self.lifetime(cached))?;
                }
                debug!(key, "revalidated cached response");
                Ok(Revalidation::NotModified)
            },
            304 => {
                debug!(key, "revalidation ETag mismatch");
                Ok(Revalidation::Failed)
            },
            404 => {
                self.store.delete(key)?;
                debug!(key, "origin no longer has the resource; entry purged");
                Ok(Revalidation::Failed)
            },
            status => {
                debug!(key, status, "unexpected revalidation status");
                Ok(Revalidation::Failed)
            },
        }
    }
}

impl Subscriber for CachePlugin {
    fn name(&self) -> &'static str { "cache" }

    fn subscribed_events(&self) -> Vec<(Event, i32)> {
        vec![(Event::BeforeSend, -255), (Event::Sent, 255), (Event::Clone, 0)]
    }

    fn on_attach(&self, request: &mut Request) -> Result<()> {
        if !self.accepts(request) {
            trace!(request = %request.id(), "request not cacheable; detaching cache");
            request.detach(self)?;
        }
        Ok(())
    }

    fn on_clone(&self, request: &mut Request) -> Result<()> {
        request.params_mut().remove(KEY_PARAM);
        request.extensions_mut().remove::<CacheState>();
        Ok(())
    }

    fn on_before_send(&self, ctx: &mut SendContext<'_>) -> Result<()> {
        if !self.accepts(ctx.request) {
            return Ok(());
        }
        let key = cache_key(ctx.request);
        ctx.request.extensions_mut().insert(CacheState {
            key:     key.clone(),
            pending: true,
            hit:     false,
        });

        let Some(mut cached) = self.lookup(&key)? else {
            debug!(key, "cache miss");
            return Ok(());
        };
        let age = cached
            .date()
            .map_or(0, |date| (Utc::now() - date).num_seconds().max(0));
        cached.set_header("Age", age.to_string());
        cached.set_header("X-Cache-Key", key.clone());

        let outcome = self.can_satisfy(ctx, &mut cached, &key)?;
        let state = ctx.request.extensions_mut().get_or_default::<CacheState>();
        match outcome {
            Satisfaction::Satisfied => {
                state.pending = false;
                state.hit = true;
                debug!(key, "cache hit");
                ctx.request.set_response(cached);
            },
            Satisfaction::Replaced => state.pending = false,
            Satisfaction::Unsatisfied => debug!(key, "cached response cannot satisfy request"),
        }
        Ok(())
    }

    fn on_sent(&self, ctx: &mut SendContext<'_>) -> Result<()> {
        let key = match ctx.request.extensions_mut().get_mut::<CacheState>() {
            Some(state) if state.pending => {
                state.pending = false;
                state.key.clone()
            },
            _ => return Ok(()),
        };
        let override_ttl = ctx.request.params().parse::<u64>(OVERRIDE_TTL_PARAM);
        let Some(response) = ctx.request.response_mut() else {
            return Ok(());
        };
        if !response.is_successful() || !response.is_cacheable() {
            trace!(key, status = response.status(), "response not cacheable");
            return Ok(());
        }

        let ttl = match override_ttl {
            Some(seconds) => {
                response.set_header("X-Cache-Ttl", seconds.to_string());
                Duration::from_secs(seconds)
            },
            None => self.lifetime(response),
        };
        self.save(&key, response, ttl)
    }
}
