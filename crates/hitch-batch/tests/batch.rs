use std::sync::{Arc, Mutex};

use hitch_http::{
    MockTransport, MultiPool, Pool, PoolHandle, PoolId, Request, RequestId, Response, Result, SharedRequest, lock,
};
use hitch_batch::{BatchOptions, BatchQueue};

/// Records each submitted group instead of sending it.
struct RecordingPool {
    id:     PoolId,
    groups: Arc<Mutex<Vec<(PoolId, Vec<RequestId>)>>>,
}

impl Pool for RecordingPool {
    fn id(&self) -> PoolId { self.id }

    fn add(&self, _request: SharedRequest) {}

    fn remove(&self, _id: RequestId) -> Option<SharedRequest> { None }

    fn send(&self) -> Result<()> { Ok(()) }

    fn send_all(&self, requests: Vec<SharedRequest>) -> Result<()> {
        let ids = requests.iter().map(|r| lock(r).id()).collect();
        self.groups.lock().unwrap().push((self.id, ids));
        Ok(())
    }
}

fn recording(groups: &Arc<Mutex<Vec<(PoolId, Vec<RequestId>)>>>) -> PoolHandle {
    PoolHandle::new(Arc::new(RecordingPool {
        id:     PoolId::next(),
        groups: groups.clone(),
    }))
}

fn pooled(pool: &PoolHandle) -> Request {
    let mut request = Request::get("http://example.com/").unwrap();
    request.set_pool(pool.clone());
    request
}

#[test]
fn flush_groups_by_pool_in_queue_order() {
    let groups = Arc::new(Mutex::new(Vec::new()));
    let a = recording(&groups);
    let b = recording(&groups);
    let queue = BatchQueue::new(BatchOptions::default()).unwrap();

    let requests: Vec<Request> = [&a, &b, &a, &b, &a].into_iter().map(pooled).collect();
    let ids: Vec<RequestId> = requests.iter().map(Request::id).collect();
    for request in requests {
        queue.enqueue(request).unwrap();
    }

    assert_eq!(queue.flush().unwrap(), 5);
    assert!(queue.is_empty());
    let groups = groups.lock().unwrap().clone();
    assert_eq!(
        groups,
        vec![
            (a.id(), vec![ids[0], ids[2], ids[4]]),
            (b.id(), vec![ids[1], ids[3]]),
        ]
    );
}

#[test]
fn large_groups_are_split_by_per_batch() {
    let groups = Arc::new(Mutex::new(Vec::new()));
    let a = recording(&groups);
    let queue = BatchQueue::new(BatchOptions {
        auto_flush_count: 0,
        per_batch:        2,
    })
    .unwrap();
    for _ in 0..5 {
        queue.enqueue(pooled(&a)).unwrap();
    }

    queue.flush().unwrap();
    let sizes: Vec<usize> = groups.lock().unwrap().iter().map(|(_, ids)| ids.len()).collect();
    assert_eq!(sizes, vec![2, 2, 1]);
}

#[test]
fn reaching_the_threshold_flushes() {
    let groups = Arc::new(Mutex::new(Vec::new()));
    let a = recording(&groups);
    let queue = BatchQueue::new(BatchOptions {
        auto_flush_count: 3,
        per_batch:        50,
    })
    .unwrap();

    queue.enqueue(pooled(&a)).unwrap();
    queue.enqueue(pooled(&a)).unwrap();
    assert!(groups.lock().unwrap().is_empty());
    queue.enqueue(pooled(&a)).unwrap();

    assert_eq!(groups.lock().unwrap().len(), 1);
    assert!(queue.is_empty());
}

#[test]
fn invalid_requests_are_rejected_on_enqueue() {
    let queue = BatchQueue::new(BatchOptions::default()).unwrap();
    assert!(queue.enqueue(Request::get("http://example.com/").unwrap()).is_err());

    let transport = MockTransport::always(Response::new(200));
    let groups = Arc::new(Mutex::new(Vec::new()));
    let mut sent = pooled(&recording(&groups));
    sent.send(&transport).unwrap();
    assert!(queue.enqueue(sent).is_err());
    assert!(queue.is_empty());

    assert!(BatchQueue::new(BatchOptions {
        auto_flush_count: 0,
        per_batch:        0,
    })
    .is_err());
}

#[test]
fn request_sent_directly_leaves_the_queue() {
    let transport = Arc::new(MockTransport::always(Response::new(200)));
    let pool = PoolHandle::new(Arc::new(MultiPool::new(transport.clone())));
    let queue = BatchQueue::new(BatchOptions::default()).unwrap();

    let first = queue.enqueue(pooled(&pool)).unwrap();
    let second = queue.enqueue(pooled(&pool)).unwrap();
    lock(&first).send(transport.as_ref()).unwrap();
    assert_eq!(queue.len(), 1);

    assert_eq!(queue.flush().unwrap(), 1);
    assert_eq!(transport.sent_count(), 2);
    assert_eq!(lock(&second).response().map(Response::status), Some(200));
}
