//! Backoff subscriber: resends requests whose response is a failure.
//!
//! Direct requests pause on the [`Sleeper`] and resend at once. Pooled
//! requests record a wake-up instant instead and are requeued by
//! `request.poll` once it passes, so the pool keeps serving the others.

use std::sync::Arc;
use std::time::{Duration, Instant};

use hitch_event::EventBus;
use hitch_http::{
    DispatchMode, Event, PollContext, Request, RequestState, Result, SendContext, Sleeper, Subscriber,
    ThreadSleeper, TransportError,
};
use tracing::{debug, trace};

use crate::delay::{DelayFn, exponential_delay, millis};
use crate::options::RetryOptions;
use crate::policy::FailurePolicy;
use crate::record::{RetryEvent, RetryObserver, RetryRecord};

/// Per-request retry bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    pub count:   u32,
    /// When a pooled request may go back to the transport.
    pub wake_at: Option<Instant>,
}

pub type Observers = EventBus<RetryEvent, dyn RetryObserver>;

pub struct BackoffPlugin {
    max_retries: u32,
    policy:      FailurePolicy,
    delay:       DelayFn,
    sleeper:     Arc<dyn Sleeper>,
    observers:   Observers,
}

impl BackoffPlugin {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            policy: FailurePolicy::default(),
            delay: Arc::new(exponential_delay),
            sleeper: Arc::new(ThreadSleeper),
            observers: Observers::new(),
        }
    }

    pub fn from_options(options: &RetryOptions) -> Self {
        Self::new(options.max_retries)
            .with_policy(options.policy())
            .with_delay_fn(options.delay())
    }

    #[must_use]
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_delay_fn(mut self, delay: DelayFn) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Subscribes `observer` to both retry and transport-failure records.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observers
            .attach(observer.clone(), RetryEvent::Retry, 0);
        self.observers
            .attach(observer, RetryEvent::TransportFailure, 0);
        self
    }

    pub fn max_retries(&self) -> u32 { self.max_retries }

    pub fn observers(&self) -> &Observers { &self.observers }

    /// Retries performed so far for `request`.
    pub fn retry_count(request: &Request) -> u32 { request.extensions().get::<RetryState>().map_or(0, |s| s.count) }

    fn publish(&self, event: RetryEvent, record: &RetryRecord) {
        let delivered = self.observers.notify(&event, |observer| {
            match event {
                RetryEvent::Retry => observer.on_retry(record),
                RetryEvent::TransportFailure => observer.on_transport_failure(record),
            }
            Ok::<(), std::convert::Infallible>(())
        });
        if let Ok(count) = delivered {
            trace!(event = %event, observers = count, "published retry record");
        }
    }

    fn schedule(&self, request: &mut Request, count: u32, delay: Duration) {
        let record = RetryRecord::from_request(request, count, delay);
        self.publish(RetryEvent::Retry, &record);
        debug!(
            request = %request.id(),
            retry = count,
            delay_ms = millis(delay),
            status = record.status,
            "retrying"
        );

        match request.mode() {
            DispatchMode::Pooled => {
                request.extensions_mut().get_or_default::<RetryState>().wake_at = Some(Instant::now() + delay);
            },
            DispatchMode::Direct => self.sleeper.sleep(delay),
        }
        request.set_state(RequestState::Transfer);
    }
}

impl Default for BackoffPlugin {
    fn default() -> Self { Self::from_options(&RetryOptions::default()) }
}

impl Subscriber for BackoffPlugin {
    fn name(&self) -> &'static str { "backoff" }

    fn subscribed_events(&self) -> Vec<(Event, i32)> {
        vec![
            (Event::Sent, 0),
            (Event::Exception, 0),
            (Event::Poll, 0),
            (Event::Clone, 0),
        ]
    }

    fn on_attach(&self, request: &mut Request) -> Result<()> {
        request.extensions_mut().insert(RetryState::default());
        Ok(())
    }

    fn on_detach(&self, request: &mut Request) -> Result<()> {
        request.extensions_mut().remove::<RetryState>();
        Ok(())
    }

    fn on_clone(&self, request: &mut Request) -> Result<()> {
        request.extensions_mut().insert(RetryState::default());
        Ok(())
    }

    fn on_sent(&self, ctx: &mut SendContext<'_>) -> Result<()> {
        let request = &mut *ctx.request;
        let failed = request.response().is_some_and(|response| self.policy.is_failure(response));
        if !failed {
            request.extensions_mut().remove::<RetryState>();
            return Ok(());
        }

        let state = request.extensions_mut().get_or_default::<RetryState>();
        state.count += 1;
        let count = state.count;
        if count > self.max_retries {
            debug!(request = %request.id(), retries = self.max_retries, "retries exhausted");
            request.extensions_mut().remove::<RetryState>();
            return Ok(());
        }

        let delay = (self.delay)(count);
        self.schedule(request, count, delay);
        Ok(())
    }

    fn on_exception(&self, request: &mut Request, error: &TransportError) -> Result<()> {
        let record = RetryRecord::from_request(request, Self::retry_count(request), Duration::ZERO).with_error(error);
        self.publish(RetryEvent::TransportFailure, &record);
        Ok(())
    }

    fn on_poll(&self, ctx: &mut PollContext<'_>) -> Result<()> {
        let now = ctx.now();
        let Some(state) = ctx.request.extensions_mut().get_mut::<RetryState>() else {
            return Ok(());
        };
        match state.wake_at {
            Some(wake_at) if now >= wake_at => {
                state.wake_at = None;
                trace!(request = %ctx.request.id(), "backoff elapsed, requeueing");
                ctx.requeue();
            },
            _ => {},
        }
        Ok(())
    }
}
