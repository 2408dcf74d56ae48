//! Follows `3xx` responses that carry a `Location` header.
//!
//! Each hop is a duplicate of the previous hop's request with this plugin
//! detached, sent through the same transport. The final response replaces
//! the original one and links the intermediate responses through
//! [`Response::previous`].

use hitch_http::{Error, Event, Hop, Method, Request, Response, Result, SendContext, Subscriber};
use tracing::debug;
use url::Url;

use crate::options::RedirectOptions;

pub const DISABLE_PARAM: &str = "redirect.disable";
pub const MAX_PARAM: &str = "redirect.max";
pub const STRICT_PARAM: &str = "redirect.strict";

const PRIORITY: i32 = 100;

const BODY_HEADERS: [&str; 3] = ["Content-Type", "Content-Length", "Content-MD5"];

#[derive(Debug, Clone, Default)]
pub struct RedirectPlugin {
    options: RedirectOptions,
}

fn is_redirect(response: &Response) -> bool { response.is_redirect() && response.headers().contains("Location") }

fn hop(request: &Request, response: &Response) -> Hop {
    Hop {
        method: request.method().clone(),
        url:    request.url().clone(),
        status: Some(response.status()),
    }
}

/// URL to send as `Referer`, without credentials or fragment.
fn referer(url: &Url) -> String {
    let mut url = url.clone();
    // Only fails for URLs that cannot carry credentials.
    let _ = url.set_username("");
    let _ = url.set_password(None);
    url.set_fragment(None);
    url.to_string()
}

impl RedirectPlugin {
    pub fn new(options: RedirectOptions) -> Self { Self { options } }

    pub fn options(&self) -> &RedirectOptions { &self.options }

    /// Builds the request for the hop after `source` received `response`.
    /// `None` when `Location` leaves the allowed protocols.
    fn next_request(&self, source: &Request, response: &Response, strict: bool) -> Result<Option<Request>> {
        let location = response.header("Location").unwrap_or_default();
        let target = source.url().join(location).map_err(|source| Error::InvalidUrl {
            url: location.to_string(),
            source,
        })?;
        if !self.options.allows(target.scheme()) {
            debug!(request = %source.id(), location = %target, "redirect to disallowed protocol");
            return Ok(None);
        }

        let mut next = source.duplicate()?;
        next.set_url(target);

        let converts = matches!(response.status(), 301..=303) && matches!(source.method(), Method::Post | Method::Put);
        if converts && !strict {
            next.set_method(Method::Get);
            next.take_body();
            for name in BODY_HEADERS {
                next.headers_mut().remove(name);
            }
        }

        if self.options.referer && (next.scheme() == "https" || next.scheme() == source.scheme()) {
            next.set_header("Referer", referer(source.url()));
        }
        Ok(Some(next))
    }
}

impl Subscriber for RedirectPlugin {
    fn name(&self) -> &'static str { "redirect" }

    fn subscribed_events(&self) -> Vec<(Event, i32)> { vec![(Event::Sent, PRIORITY)] }

    fn on_sent(&self, ctx: &mut SendContext<'_>) -> Result<()> {
        let params = ctx.request.params();
        if params.flag(DISABLE_PARAM) {
            return Ok(());
        }
        let max = params.parse::<u32>(MAX_PARAM).unwrap_or(self.options.max);
        let strict = params.parse::<bool>(STRICT_PARAM).unwrap_or(self.options.strict);

        let Some(mut last) = ctx.request.response().filter(|r| is_redirect(r)).cloned() else {
            return Ok(());
        };
        let mut hops = vec![hop(ctx.request, &last)];
        let mut source = ctx.request.duplicate()?;
        source.detach(self)?;

        let mut redirects = 0_u32;
        while is_redirect(&last) {
            let Some(mut next) = self.next_request(&source, &last, strict)? else {
                break;
            };
            redirects += 1;
            if redirects > max {
                debug!(request = %ctx.request.id(), hops = hops.len(), "too many redirects");
                return Err(Error::TooManyRedirects { hops });
            }

            debug!(
                request = %ctx.request.id(),
                status = last.status(),
                method = %next.method(),
                location = %next.url(),
                "following redirect"
            );
            ctx.send(&mut next)?;
            let Some(mut response) = next.take_response() else {
                return Err(Error::config("redirected request finished without a response"));
            };
            hops.push(hop(&next, &response));
            response.push_previous(last);
            last = response;
            source = next;
        }

        if redirects > 0 {
            ctx.request.set_response(last);
        }
        Ok(())
    }
}
