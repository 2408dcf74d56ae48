//! Request send lifecycle.
//!
//! One attempt runs `request.before_send`, the transport call (skipped when a
//! subscriber already assigned a response), then `request.sent`. A subscriber
//! that puts the request back into [`RequestState::Transfer`] during
//! `request.sent` asks for another attempt.

use std::time::Instant;

use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::event::{Event, PollContext, SendContext, Subscriber};
use crate::message::{Request, RequestState, Response};
use crate::transport::Transport;

/// Delivers `event` to the request's subscribers in priority order.
///
/// The listener list is captured before delivery, so subscribers may attach
/// or detach while it runs; changes apply to the next dispatch.
pub(crate) fn dispatch<F>(request: &mut Request, event: Event, mut deliver: F) -> Result<usize>
where
    F: FnMut(&dyn Subscriber, &mut Request) -> Result<()>,
{
    let listeners = request.events().listeners(&event);
    for subscriber in &listeners {
        trace!(
            request = %request.id(),
            event = %event,
            subscriber = subscriber.name(),
            "dispatch"
        );
        deliver(subscriber.as_ref(), request)?;
    }
    Ok(listeners.len())
}

fn dispatch_send(request: &mut Request, transport: &dyn Transport, event: Event) -> Result<usize> {
    dispatch(request, event, |subscriber, request| {
        let mut ctx = SendContext::new(request, transport);
        match event {
            Event::BeforeSend => subscriber.on_before_send(&mut ctx),
            _ => subscriber.on_sent(&mut ctx),
        }
    })
}

/// Sends `request` until no subscriber asks for another attempt.
pub fn send(request: &mut Request, transport: &dyn Transport) -> Result<()> {
    let mut attempts = 0_u32;
    loop {
        attempts += 1;
        prepare(request, transport)?;
        let resend = if request.response().is_some() {
            trace!(request = %request.id(), "answered before transfer");
            complete(request, transport)?
        } else {
            let result = transport.send(request);
            deliver(request, transport, result)?
        };
        if !resend {
            debug!(request = %request.id(), attempts, "request complete");
            return Ok(());
        }
    }
}

/// Starts an attempt: clears the previous response and runs
/// `request.before_send`.
pub(crate) fn prepare(request: &mut Request, transport: &dyn Transport) -> Result<()> {
    request.take_response();
    request.set_state(RequestState::Transfer);
    dispatch_send(request, transport, Event::BeforeSend)?;
    Ok(())
}

/// Hands a transport outcome to the request. Returns whether the request
/// was flagged for another attempt.
pub(crate) fn deliver(
    request: &mut Request,
    transport: &dyn Transport,
    result: std::result::Result<Response, TransportError>,
) -> Result<bool> {
    match result {
        Ok(response) => {
            request.set_response(response);
            complete(request, transport)
        },
        Err(error) => {
            debug!(request = %request.id(), %error, "transport error");
            request.set_state(RequestState::Error);
            dispatch(request, Event::Exception, |subscriber, request| {
                subscriber.on_exception(request, &error)
            })?;
            if request.response().is_some() {
                debug!(request = %request.id(), "transport error recovered by subscriber");
                complete(request, transport)
            } else {
                Err(error.into())
            }
        },
    }
}

/// Marks the request complete and runs `request.sent`.
pub(crate) fn complete(request: &mut Request, transport: &dyn Transport) -> Result<bool> {
    request.set_state(RequestState::Complete);
    dispatch_send(request, transport, Event::Sent)?;
    Ok(request.state() == RequestState::Transfer)
}

/// Raises `request.poll` for a parked request. Returns whether it should go
/// back to the active queue. Requests nobody polls are requeued at once.
pub(crate) fn poll(request: &mut Request, now: Instant) -> Result<bool> {
    if !request.events().has_listeners(&Event::Poll) {
        return Ok(true);
    }
    let mut requeue = false;
    dispatch(request, Event::Poll, |subscriber, request| {
        let mut ctx = PollContext::new(request, now);
        subscriber.on_poll(&mut ctx)?;
        requeue |= ctx.is_requeued();
        Ok(())
    })?;
    Ok(requeue)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::error::{Error, TransportErrorKind};
    use crate::transport::MockTransport;

    struct Recorder {
        name:     &'static str,
        priority: i32,
        log:      Arc<Mutex<Vec<String>>>,
    }

    impl Subscriber for Recorder {
        fn name(&self) -> &'static str { self.name }

        fn subscribed_events(&self) -> Vec<(Event, i32)> {
            vec![(Event::BeforeSend, self.priority), (Event::Sent, self.priority)]
        }

        fn on_before_send(&self, _ctx: &mut SendContext<'_>) -> Result<()> {
            self.log.lock().unwrap().push(format!("before:{}", self.name));
            Ok(())
        }

        fn on_sent(&self, ctx: &mut SendContext<'_>) -> Result<()> {
            let status = ctx.request.response().map(Response::status).unwrap_or_default();
            self.log.lock().unwrap().push(format!("sent:{}:{status}", self.name));
            Ok(())
        }
    }

    struct ShortCircuit;

    impl Subscriber for ShortCircuit {
        fn name(&self) -> &'static str { "short_circuit" }

        fn subscribed_events(&self) -> Vec<(Event, i32)> { vec![(Event::BeforeSend, 0)] }

        fn on_before_send(&self, ctx: &mut SendContext<'_>) -> Result<()> {
            ctx.request.set_response(Response::new(204));
            Ok(())
        }
    }

    /// Asks for one extra attempt after the first response.
    #[derive(Default)]
    struct ResendOnce {
        done: Mutex<bool>,
    }

    impl Subscriber for ResendOnce {
        fn name(&self) -> &'static str { "resend_once" }

        fn subscribed_events(&self) -> Vec<(Event, i32)> { vec![(Event::Sent, 0)] }

        fn on_sent(&self, ctx: &mut SendContext<'_>) -> Result<()> {
            let mut done = self.done.lock().unwrap();
            if !*done {
                *done = true;
                ctx.request.set_state(RequestState::Transfer);
            }
            Ok(())
        }
    }

    struct Recover;

    impl Subscriber for Recover {
        fn name(&self) -> &'static str { "recover" }

        fn subscribed_events(&self) -> Vec<(Event, i32)> { vec![(Event::Exception, 0)] }

        fn on_exception(&self, request: &mut Request, error: &TransportError) -> Result<()> {
            if error.kind == TransportErrorKind::Timeout {
                request.set_response(Response::new(504));
            }
            Ok(())
        }
    }

    #[test]
    fn test_subscribers_run_in_priority_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut request = Request::get("http://example.com/").unwrap();
        for (name, priority) in [("ten", 10), ("minus_five", -5), ("max", 255)] {
            request
                .attach(Arc::new(Recorder {
                    name,
                    priority,
                    log: Arc::clone(&log),
                }))
                .unwrap();
        }

        let transport = MockTransport::new().with(Response::new(200));
        send(&mut request, &transport).unwrap();

        assert_eq!(*log.lock().unwrap(), vec![
            "before:max",
            "before:ten",
            "before:minus_five",
            "sent:max:200",
            "sent:ten:200",
            "sent:minus_five:200",
        ]);
        assert_eq!(request.state(), RequestState::Complete);
    }

    #[test]
    fn test_response_assigned_before_send_skips_transport() {
        let mut request = Request::get("http://example.com/").unwrap();
        request.attach(Arc::new(ShortCircuit)).unwrap();
        let transport = MockTransport::new();

        assert_eq!(request.send(&transport).unwrap().status(), 204);
        assert_eq!(transport.sent_count(), 0);
    }

    #[test]
    fn test_transfer_state_resends() {
        let mut request = Request::get("http://example.com/").unwrap();
        request.attach(Arc::new(ResendOnce::default())).unwrap();
        let transport = MockTransport::new()
            .with(Response::new(500))
            .with(Response::new(200));

        assert_eq!(request.send(&transport).unwrap().status(), 200);
        assert_eq!(transport.sent_count(), 2);
    }

    #[test]
    fn test_transport_error_propagates() {
        let mut request = Request::get("http://example.com/").unwrap();
        let transport = MockTransport::new();
        transport.push_error(TransportError::new(TransportErrorKind::Connect, "refused"));

        let err = send(&mut request, &transport).unwrap_err();
        assert!(matches!(err, Error::Transport(ref e) if e.kind == TransportErrorKind::Connect));
        assert_eq!(request.state(), RequestState::Error);
    }

    #[test]
    fn test_exception_subscriber_can_recover() {
        let mut request = Request::get("http://example.com/").unwrap();
        request.attach(Arc::new(Recover)).unwrap();
        let transport = MockTransport::new();
        transport.push_error(TransportError::new(TransportErrorKind::Timeout, "slow"));

        assert_eq!(request.send(&transport).unwrap().status(), 504);
    }

    #[test]
    fn test_poll_without_listeners_requeues() {
        let mut request = Request::get("http://example.com/").unwrap();
        assert!(poll(&mut request, Instant::now()).unwrap());
    }
}
