use std::sync::Arc;

use chrono::Utc;
use hitch_http::{Event, Result, SendContext, Subscriber};
use tracing::{debug, warn};

use crate::jar::{CookieJar, MemoryCookieJar};
use crate::parser::parse_set_cookie;

/// Set on a request to skip cookie handling for it.
pub const DISABLE_PARAM: &str = "cookies.disable";

const PRIORITY: i32 = 125;

/// Pairs this plugin wrote into the request's `Cookie` header. Carried onto
/// duplicates so resends and redirect hops replace them instead of stacking.
#[derive(Debug, Clone, Default)]
struct AddedCookies(Vec<String>);

/// Removes one occurrence of each previously added pair from `header`.
fn strip_added(header: &str, added: &[String]) -> Vec<String> {
    let mut pending: Vec<&str> = added.iter().map(String::as_str).collect();
    header
        .split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .filter(|pair| match pending.iter().position(|added| added == pair) {
            Some(index) => {
                pending.swap_remove(index);
                false
            },
            None => true,
        })
        .map(str::to_string)
        .collect()
}

/// Adds matching jar cookies to outgoing requests and stores cookies set by
/// responses.
pub struct CookiePlugin {
    jar: Arc<dyn CookieJar>,
}

impl CookiePlugin {
    pub fn new(jar: Arc<dyn CookieJar>) -> Self { Self { jar } }

    pub fn jar(&self) -> &Arc<dyn CookieJar> { &self.jar }
}

impl Default for CookiePlugin {
    fn default() -> Self { Self::new(Arc::new(MemoryCookieJar::new())) }
}

impl Subscriber for CookiePlugin {
    fn name(&self) -> &'static str { "cookie" }

    fn subscribed_events(&self) -> Vec<(Event, i32)> { vec![(Event::BeforeSend, PRIORITY), (Event::Sent, PRIORITY)] }

    fn on_before_send(&self, ctx: &mut SendContext<'_>) -> Result<()> {
        let request = &mut *ctx.request;
        if request.params().flag(DISABLE_PARAM) {
            return Ok(());
        }
        let secure = request.scheme() == "https";
        let port = request.port();
        let pairs: Vec<String> = self
            .jar
            .get_cookies(request.host(), request.path())
            .into_iter()
            .filter(|cookie| (secure || !cookie.secure) && cookie.matches_port(port))
            .map(|cookie| cookie.pair())
            .collect();

        let previous = request.extensions_mut().remove::<AddedCookies>().unwrap_or_default();
        if pairs.is_empty() && previous.0.is_empty() {
            return Ok(());
        }
        let mut header = match request.header("Cookie") {
            Some(existing) => strip_added(existing, &previous.0),
            None => Vec::new(),
        };

        debug!(request = %request.id(), count = pairs.len(), "adding cookies");
        header.extend(pairs.iter().cloned());
        if header.is_empty() {
            request.headers_mut().remove("Cookie");
        } else {
            request.set_header("Cookie", header.join("; "));
        }
        if !pairs.is_empty() {
            request.extensions_mut().insert(AddedCookies(pairs));
        }
        Ok(())
    }

    fn on_sent(&self, ctx: &mut SendContext<'_>) -> Result<()> {
        let request = &*ctx.request;
        if request.params().flag(DISABLE_PARAM) {
            return Ok(());
        }
        let Some(response) = request.response() else {
            return Ok(());
        };

        let host = request.host();
        let now = Utc::now();
        let headers = response
            .headers()
            .get_all("Set-Cookie")
            .iter()
            .chain(response.headers().get_all("Set-Cookie2"));
        for header in headers {
            let cookie = match parse_set_cookie(header, host, request.path(), now) {
                Ok(cookie) => cookie,
                Err(error) => {
                    warn!(%error, header, "ignoring malformed cookie");
                    continue;
                },
            };
            if !cookie.matches_domain(host) {
                warn!(domain = %cookie.domain, host, "rejecting cookie for foreign domain");
                continue;
            }
            if let Err(error) = self.jar.save(cookie) {
                warn!(%error, "cookie not stored");
            }
        }
        Ok(())
    }
}
