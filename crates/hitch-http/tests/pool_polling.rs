use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hitch_http::{
    DispatchMode, Event, MockTransport, MultiPool, PollContext, Pool, Request, RequestState, Response,
    Result, SendContext, Subscriber, TrackingSleeper, lock, share,
};

/// Flags a 503 for another attempt and requeues it on its second poll.
#[derive(Default)]
struct Deferred {
    polls: AtomicUsize,
}

impl Subscriber for Deferred {
    fn name(&self) -> &'static str { "deferred" }

    fn subscribed_events(&self) -> Vec<(Event, i32)> { vec![(Event::Sent, 0), (Event::Poll, 0)] }

    fn on_sent(&self, ctx: &mut SendContext<'_>) -> Result<()> {
        let failed = ctx.request.response().is_some_and(|r| r.status() == 503);
        if failed {
            assert_eq!(ctx.request.mode(), DispatchMode::Pooled);
            ctx.request.set_state(RequestState::Transfer);
        }
        Ok(())
    }

    fn on_poll(&self, ctx: &mut PollContext<'_>) -> Result<()> {
        if self.polls.fetch_add(1, Ordering::SeqCst) >= 1 {
            ctx.requeue();
        }
        Ok(())
    }
}

#[test]
fn parked_request_does_not_block_the_pool() {
    let transport = Arc::new(
        MockTransport::new()
            .with(Response::new(503))
            .with(Response::new(200))
            .with(Response::new(200)),
    );
    let sleeper = TrackingSleeper::new();
    let pool = MultiPool::new(transport.clone()).with_sleeper(Arc::new(sleeper.clone()));

    let deferred = Arc::new(Deferred::default());
    let mut first = Request::get("http://a.test/").unwrap();
    first.attach(deferred.clone()).unwrap();
    let first = share(first);
    let second = share(Request::get("http://b.test/").unwrap());

    pool.send_all(vec![first.clone(), second.clone()]).unwrap();

    let hosts: Vec<String> = transport
        .sent()
        .iter()
        .map(|r| r.url.host_str().unwrap().to_string())
        .collect();
    assert_eq!(hosts, vec!["a.test", "b.test", "a.test"]);
    assert_eq!(lock(&first).response().unwrap().status(), 200);
    assert_eq!(lock(&second).response().unwrap().status(), 200);
    assert_eq!(deferred.polls.load(Ordering::SeqCst), 2);
    assert_eq!(sleeper.calls().len(), 1);
}
