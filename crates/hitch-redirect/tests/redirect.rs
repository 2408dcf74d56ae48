use std::sync::Arc;

use hitch_http::{Error, Method, MockTransport, Request, Response};
use hitch_redirect::{DISABLE_PARAM, MAX_PARAM, RedirectOptions, RedirectPlugin};

fn redirect(status: u16, location: &str) -> Response { Response::new(status).with_header("Location", location) }

fn attach(mut request: Request, options: RedirectOptions) -> Request {
    request
        .attach(Arc::new(RedirectPlugin::new(options)))
        .unwrap();
    request
}

fn get(url: &str) -> Request { attach(Request::get(url).unwrap(), RedirectOptions::default()) }

fn post(url: &str, options: RedirectOptions) -> Request {
    let mut request = Request::parse(Method::Post, url).unwrap();
    request
        .set_body("name=value")
        .set_header("Content-Type", "application/x-www-form-urlencoded");
    attach(request, options)
}

#[test]
fn endless_redirects_stop_after_max_hops() {
    let transport = MockTransport::new();
    for i in 1..=10 {
        transport.push(redirect(301, &format!("/hop/{i}")));
    }

    let error = get("http://example.com/start").send(&transport).unwrap_err();

    assert_eq!(transport.sent_count(), 6);
    let hops = error.redirect_hops().unwrap();
    assert_eq!(hops.len(), 6);
    assert_eq!(hops[0].url.as_str(), "http://example.com/start");
    assert_eq!(hops[5].url.as_str(), "http://example.com/hop/5");
    assert!(hops.iter().all(|hop| hop.status == Some(301)));
    assert!(matches!(error, Error::TooManyRedirects { .. }));
}

#[test]
fn final_response_links_previous_responses() {
    let transport = MockTransport::new()
        .with(redirect(302, "http://example.com/b?x=1"))
        .with(redirect(301, "/c"))
        .with(Response::new(200).with_body("done"));

    let mut request = get("http://example.com/a");
    let response = request.send(&transport).unwrap();

    assert_eq!(response.body().as_ref(), b"done");
    assert_eq!(response.redirect_count(), 2);
    assert_eq!(response.previous().map(Response::status), Some(301));
    assert_eq!(response.previous().and_then(Response::previous).map(Response::status), Some(302));
    let urls: Vec<String> = transport.sent().iter().map(|s| s.url.to_string()).collect();
    assert_eq!(urls, vec!["http://example.com/a", "http://example.com/b?x=1", "http://example.com/c"]);
}

#[test]
fn post_becomes_get_unless_strict() {
    let transport = MockTransport::new()
        .with(redirect(302, "/next"))
        .with(Response::new(200));
    post("http://example.com/form", RedirectOptions::default())
        .send(&transport)
        .unwrap();
    let follow = &transport.sent()[1];
    assert_eq!(follow.method, Method::Get);
    assert!(follow.body.is_none());
    assert_eq!(follow.header("Content-Type"), None);

    let transport = MockTransport::new()
        .with(redirect(302, "/next"))
        .with(Response::new(200));
    let strict = RedirectOptions {
        strict: true,
        ..RedirectOptions::default()
    };
    post("http://example.com/form", strict).send(&transport).unwrap();
    let follow = &transport.sent()[1];
    assert_eq!(follow.method, Method::Post);
    assert_eq!(follow.body.as_deref(), Some(&b"name=value"[..]));
}

#[test]
fn temporary_redirect_keeps_method() {
    let transport = MockTransport::new()
        .with(redirect(307, "/next"))
        .with(Response::new(200));
    post("http://example.com/form", RedirectOptions::default())
        .send(&transport)
        .unwrap();
    assert_eq!(transport.sent()[1].method, Method::Post);
}

#[test]
fn referer_is_added_when_enabled() {
    let transport = MockTransport::new()
        .with(redirect(301, "https://example.com/secure"))
        .with(Response::new(200));
    let options = RedirectOptions {
        referer: true,
        ..RedirectOptions::default()
    };
    attach(Request::get("http://user:pw@example.com/page#top").unwrap(), options)
        .send(&transport)
        .unwrap();
    assert_eq!(transport.sent()[1].header("Referer"), Some("http://example.com/page"));
}

#[test]
fn referer_is_withheld_on_https_to_http_hop() {
    let transport = MockTransport::new()
        .with(redirect(302, "http://example.com/plain"))
        .with(Response::new(200));
    let options = RedirectOptions {
        referer: true,
        ..RedirectOptions::default()
    };
    attach(Request::get("https://example.com/secure").unwrap(), options)
        .send(&transport)
        .unwrap();
    assert_eq!(transport.sent()[1].url.as_str(), "http://example.com/plain");
    assert_eq!(transport.sent()[1].header("Referer"), None);
}

#[test]
fn disallowed_protocol_is_terminal() {
    let transport = MockTransport::always(redirect(302, "ftp://example.com/file"));
    let mut request = get("http://example.com/");
    assert_eq!(request.send(&transport).unwrap().status(), 302);
    assert_eq!(transport.sent_count(), 1);
}

#[test]
fn request_params_override_options() {
    let transport = MockTransport::always(redirect(301, "/loop"));
    let mut request = get("http://example.com/");
    request.params_mut().set(DISABLE_PARAM, "1");
    assert_eq!(request.send(&transport).unwrap().status(), 301);
    assert_eq!(transport.sent_count(), 1);

    let transport = MockTransport::always(redirect(301, "/loop"));
    let mut request = get("http://example.com/");
    request.params_mut().set(MAX_PARAM, "1");
    let error = request.send(&transport).unwrap_err();
    assert_eq!(error.redirect_hops().map(<[_]>::len), Some(2));
    assert_eq!(transport.sent_count(), 2);
}
