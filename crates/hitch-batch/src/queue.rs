//! Queue collecting requests and flushing them pool by pool.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hitch_http::{
    Error, Event, Pool, PoolHandle, Request, RequestId, RequestState, Result, SendContext, SharedRequest, Subscriber,
    share,
};
use tracing::{debug, trace};

use crate::error::BatchError;
use crate::options::BatchOptions;

/// Runs before every other `request.before_send` subscriber.
const PRIORITY: i32 = 10_000;

struct Queued {
    id:      RequestId,
    pool:    PoolHandle,
    request: SharedRequest,
}

pub struct BatchQueue {
    options: BatchOptions,
    queue:   Mutex<Vec<Queued>>,
}

impl BatchQueue {
    pub fn new(options: BatchOptions) -> Result<Arc<Self>, BatchError> {
        if options.per_batch == 0 {
            return Err(BatchError::ZeroBatchSize);
        }
        Ok(Arc::new(Self {
            options,
            queue: Mutex::new(Vec::new()),
        }))
    }

    pub fn options(&self) -> &BatchOptions { &self.options }

    pub fn len(&self) -> usize { self.queue().len() }

    pub fn is_empty(&self) -> bool { self.queue().is_empty() }

    /// Ids of queued requests in queue order.
    pub fn queued(&self) -> Vec<RequestId> { self.queue().iter().map(|q| q.id).collect() }

    fn queue(&self) -> MutexGuard<'_, Vec<Queued>> { self.queue.lock().unwrap_or_else(PoisonError::into_inner) }

    /// Queues `request` and returns the handle the caller reads the
    /// response from. Requests that were already sent or have no pool are
    /// rejected here rather than at flush time.
    pub fn enqueue(self: &Arc<Self>, mut request: Request) -> Result<SharedRequest> {
        if request.state() != RequestState::New {
            return Err(BatchError::AlreadySent(request.id()).into());
        }
        let Some(pool) = request.pool().cloned() else {
            return Err(BatchError::NoPool(request.id()).into());
        };
        request.attach(self.clone())?;

        let id = request.id();
        let shared = share(request);
        let queued = {
            let mut queue = self.queue();
            queue.push(Queued {
                id,
                pool,
                request: Arc::clone(&shared),
            });
            queue.len()
        };
        trace!(request = %id, queued, "enqueued");

        let threshold = self.options.auto_flush_count;
        if threshold > 0 && queued >= threshold {
            debug!(queued, threshold, "auto flush");
            self.flush()?;
        }
        Ok(shared)
    }

    /// Sends every queued request. Requests sharing a pool go to that pool
    /// together, in queue order, in chunks of at most `per_batch`. Returns
    /// the number of requests sent.
    pub fn flush(&self) -> Result<usize> {
        let drained: Vec<Queued> = self.queue().drain(..).collect();
        let total = drained.len();

        let mut groups: Vec<(PoolHandle, Vec<SharedRequest>)> = Vec::new();
        for item in drained {
            match groups.iter_mut().find(|(pool, _)| *pool == item.pool) {
                Some((_, requests)) => requests.push(item.request),
                None => groups.push((item.pool, vec![item.request])),
            }
        }

        let mut failures = Vec::new();
        for (pool, requests) in groups {
            for chunk in requests.chunks(self.options.per_batch) {
                debug!(pool = %pool.id(), requests = chunk.len(), "flushing batch");
                match pool.send_all(chunk.to_vec()) {
                    Ok(()) => {},
                    Err(Error::Pool { failures: failed }) => failures.extend(failed),
                    Err(error) => return Err(error),
                }
            }
        }

        if failures.is_empty() {
            Ok(total)
        } else {
            Err(Error::Pool { failures })
        }
    }
}

impl Subscriber for BatchQueue {
    fn name(&self) -> &'static str { "batch" }

    fn subscribed_events(&self) -> Vec<(Event, i32)> { vec![(Event::BeforeSend, PRIORITY)] }

    fn on_before_send(&self, ctx: &mut SendContext<'_>) -> Result<()> {
        let id = ctx.request.id();
        let mut queue = self.queue();
        if let Some(position) = queue.iter().position(|q| q.id == id) {
            queue.remove(position);
            trace!(request = %id, "sent outside the batch, dequeued");
        }
        Ok(())
    }
}
