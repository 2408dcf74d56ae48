//! Multiplexed sending of many requests.
//!
//! A [`Pool`] accepts shared requests and executes them together. The
//! provided [`MultiPool`] runs rounds over an active queue; requests that a
//! subscriber flags for another attempt are parked and polled with
//! `request.poll` until a subscriber requeues them, so one backing-off
//! request never blocks the others.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::lifecycle;
use crate::message::{DispatchMode, Request, RequestId};
use crate::sleeper::{Sleeper, ThreadSleeper};
use crate::transport::Transport;

/// A request shared between its owner and a queue or pool.
pub type SharedRequest = Arc<Mutex<Request>>;

pub fn share(request: Request) -> SharedRequest { Arc::new(Mutex::new(request)) }

/// Locks a shared request, recovering from poisoning.
pub fn lock(request: &SharedRequest) -> MutexGuard<'_, Request> { request.lock().unwrap_or_else(PoisonError::into_inner) }

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId(u64);

impl PoolId {
    pub fn next() -> Self { Self(NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed)) }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "pool-{}", self.0) }
}

pub trait Pool: Send + Sync {
    fn id(&self) -> PoolId;

    fn add(&self, request: SharedRequest);

    fn remove(&self, id: RequestId) -> Option<SharedRequest>;

    /// Executes every added request.
    fn send(&self) -> Result<()>;

    fn send_all(&self, requests: Vec<SharedRequest>) -> Result<()> {
        for request in requests {
            self.add(request);
        }
        self.send()
    }
}

/// Cloneable reference to a pool, compared by pool id.
#[derive(Clone)]
pub struct PoolHandle(Arc<dyn Pool>);

impl PoolHandle {
    pub fn new(pool: Arc<dyn Pool>) -> Self { Self(pool) }

    pub fn id(&self) -> PoolId { self.0.id() }

    pub fn pool(&self) -> &Arc<dyn Pool> { &self.0 }
}

impl std::ops::Deref for PoolHandle {
    type Target = dyn Pool;

    fn deref(&self) -> &Self::Target { &*self.0 }
}

impl PartialEq for PoolHandle {
    fn eq(&self, other: &Self) -> bool { self.id() == other.id() }
}

impl Eq for PoolHandle {}

impl fmt::Debug for PoolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.debug_tuple("PoolHandle").field(&self.id()).finish() }
}

/// Pool driving requests through a transport's `send_batch` in rounds.
pub struct MultiPool {
    id:            PoolId,
    transport:     Arc<dyn Transport>,
    sleeper:       Arc<dyn Sleeper>,
    poll_interval: Duration,
    pending:       Mutex<VecDeque<(RequestId, SharedRequest)>>,
}

impl MultiPool {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            id: PoolId::next(),
            transport,
            sleeper: Arc::new(ThreadSleeper),
            poll_interval: Duration::from_millis(10),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Pause between poll rounds while only parked requests remain.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn len(&self) -> usize { self.pending().len() }

    pub fn is_empty(&self) -> bool { self.pending().is_empty() }

    fn pending(&self) -> MutexGuard<'_, VecDeque<(RequestId, SharedRequest)>> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs one transfer round. Requests flagged for another attempt are
    /// pushed onto `parked`.
    fn run_round(
        &self,
        round: Vec<SharedRequest>,
        parked: &mut Vec<SharedRequest>,
        failures: &mut Vec<(RequestId, Error)>,
    ) {
        let transport = self.transport.as_ref();
        let mut guards: Vec<MutexGuard<'_, Request>> = round.iter().map(lock).collect();
        let mut live = vec![true; guards.len()];

        for (i, request) in guards.iter_mut().enumerate() {
            request.set_mode(DispatchMode::Pooled);
            if let Err(error) = lifecycle::prepare(request, transport) {
                failures.push((request.id(), error));
                live[i] = false;
            }
        }

        let outbound: Vec<usize> = (0..guards.len())
            .filter(|&i| live[i] && guards[i].response().is_none())
            .collect();
        let mut results = {
            let requests: Vec<&Request> = outbound.iter().map(|&i| &*guards[i]).collect();
            transport.send_batch(&requests).into_iter()
        };
        trace!(pool = %self.id, sent = outbound.len(), "round transferred");

        for (i, request) in guards.iter_mut().enumerate() {
            if !live[i] {
                continue;
            }
            let outcome = if outbound.contains(&i) {
                match results.next() {
                    Some(result) => lifecycle::deliver(request, transport, result),
                    None => Err(Error::config("transport returned fewer results than requests")),
                }
            } else {
                lifecycle::complete(request, transport)
            };
            match outcome {
                Ok(true) => parked.push(Arc::clone(&round[i])),
                Ok(false) => request.set_mode(DispatchMode::Direct),
                Err(error) => {
                    request.set_mode(DispatchMode::Direct);
                    failures.push((request.id(), error));
                },
            }
        }
    }
}

impl Pool for MultiPool {
    fn id(&self) -> PoolId { self.id }

    fn add(&self, request: SharedRequest) {
        let id = lock(&request).id();
        self.pending().push_back((id, request));
    }

    fn remove(&self, id: RequestId) -> Option<SharedRequest> {
        let mut pending = self.pending();
        let position = pending.iter().position(|(queued, _)| *queued == id)?;
        pending.remove(position).map(|(_, request)| request)
    }

    fn send(&self) -> Result<()> {
        let mut active: VecDeque<SharedRequest> = self.pending().drain(..).map(|(_, r)| r).collect();
        let mut parked: Vec<SharedRequest> = Vec::new();
        let mut failures: Vec<(RequestId, Error)> = Vec::new();
        debug!(pool = %self.id, requests = active.len(), "pool send");

        while !active.is_empty() || !parked.is_empty() {
            if !active.is_empty() {
                let round: Vec<SharedRequest> = active.drain(..).collect();
                self.run_round(round, &mut parked, &mut failures);
            }

            let now = Instant::now();
            let mut still_parked = Vec::with_capacity(parked.len());
            for shared in parked.drain(..) {
                let outcome = {
                    let mut request = lock(&shared);
                    lifecycle::poll(&mut request, now).map_err(|error| (request.id(), error))
                };
                match outcome {
                    Ok(true) => active.push_back(shared),
                    Ok(false) => still_parked.push(shared),
                    Err(failure) => {
                        warn!(pool = %self.id, request = %failure.0, "poll failed");
                        failures.push(failure);
                    },
                }
            }
            parked = still_parked;

            if active.is_empty() && !parked.is_empty() {
                self.sleeper.sleep(self.poll_interval);
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Pool { failures })
        }
    }
}
