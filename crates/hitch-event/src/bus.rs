use std::fmt;
use std::sync::Arc;

use tracing::trace;

/// One `(event, priority, subscriber)` entry of an [`EventBus`].
pub struct Registration<K, S: ?Sized> {
    event:      K,
    priority:   i32,
    subscriber: Arc<S>,
}

impl<K, S: ?Sized> Registration<K, S> {
    pub fn event(&self) -> &K { &self.event }

    pub fn priority(&self) -> i32 { self.priority }

    pub fn subscriber(&self) -> &Arc<S> { &self.subscriber }
}

impl<K: Clone, S: ?Sized> Clone for Registration<K, S> {
    fn clone(&self) -> Self {
        Self {
            event:      self.event.clone(),
            priority:   self.priority,
            subscriber: Arc::clone(&self.subscriber),
        }
    }
}

/// Registration table delivering events to subscribers by priority.
///
/// Subscribers are identified by the address of the value behind their
/// `Arc`, so `detach` accepts any reference to the subscriber, including
/// `self` from inside one of its own callbacks.
pub struct EventBus<K, S: ?Sized> {
    registrations: Vec<Registration<K, S>>,
}

impl<K, S: ?Sized> Default for EventBus<K, S> {
    fn default() -> Self {
        Self {
            registrations: Vec::new(),
        }
    }
}

impl<K: Clone, S: ?Sized> Clone for EventBus<K, S> {
    fn clone(&self) -> Self {
        Self {
            registrations: self.registrations.clone(),
        }
    }
}

impl<K: fmt::Debug, S: ?Sized> fmt::Debug for EventBus<K, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.registrations.iter().map(|r| (&r.event, r.priority)))
            .finish()
    }
}

fn same_subscriber<A: ?Sized, B: ?Sized>(a: &Arc<A>, b: &B) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), b as *const B)
}

impl<K: PartialEq + fmt::Debug, S: ?Sized> EventBus<K, S> {
    pub fn new() -> Self { Self::default() }

    /// Registers `subscriber` for `event` at `priority`.
    ///
    /// Returns `false` without changing anything when the same subscriber is
    /// already registered for that event.
    pub fn attach(&mut self, subscriber: Arc<S>, event: K, priority: i32) -> bool {
        let duplicate = self
            .registrations
            .iter()
            .any(|r| r.event == event && same_subscriber(&r.subscriber, &*subscriber));
        if duplicate {
            return false;
        }

        // First slot with a strictly lower priority keeps equal priorities in
        // attach order.
        let position = self
            .registrations
            .iter()
            .position(|r| r.priority < priority)
            .unwrap_or(self.registrations.len());

        trace!(event = ?event, priority, position, "attaching subscriber");
        self.registrations.insert(position, Registration {
            event,
            priority,
            subscriber,
        });
        true
    }

    /// Removes every registration of `subscriber` and returns how many were
    /// removed. Detaching an unknown subscriber is a no-op.
    pub fn detach<T: ?Sized>(&mut self, subscriber: &T) -> usize {
        let before = self.registrations.len();
        self.registrations
            .retain(|r| !same_subscriber(&r.subscriber, subscriber));
        let removed = before - self.registrations.len();
        if removed > 0 {
            trace!(removed, "detached subscriber");
        }
        removed
    }

    pub fn is_attached<T: ?Sized>(&self, subscriber: &T) -> bool {
        self.registrations
            .iter()
            .any(|r| same_subscriber(&r.subscriber, subscriber))
    }

    /// Priority `subscriber` was registered with for `event`.
    pub fn priority_of<T: ?Sized>(&self, subscriber: &T, event: &K) -> Option<i32> {
        self.registrations
            .iter()
            .find(|r| &r.event == event && same_subscriber(&r.subscriber, subscriber))
            .map(|r| r.priority)
    }

    /// Snapshot of the subscribers of `event` in delivery order.
    ///
    /// Callers that need to mutate the structure owning the bus while
    /// delivering take this snapshot first.
    pub fn listeners(&self, event: &K) -> Vec<Arc<S>> {
        self.registrations
            .iter()
            .filter(|r| &r.event == event)
            .map(|r| Arc::clone(&r.subscriber))
            .collect()
    }

    pub fn has_listeners(&self, event: &K) -> bool {
        self.registrations.iter().any(|r| &r.event == event)
    }

    /// Every distinct subscriber, ordered by its first registration.
    pub fn subscribers(&self) -> Vec<Arc<S>> {
        let mut seen: Vec<Arc<S>> = Vec::new();
        for registration in &self.registrations {
            if !seen
                .iter()
                .any(|s| same_subscriber(s, &*registration.subscriber))
            {
                seen.push(Arc::clone(&registration.subscriber));
            }
        }
        seen
    }

    pub fn registrations(&self) -> impl Iterator<Item = &Registration<K, S>> {
        self.registrations.iter()
    }

    pub fn len(&self) -> usize { self.registrations.len() }

    pub fn is_empty(&self) -> bool { self.registrations.is_empty() }

    pub fn clear(&mut self) { self.registrations.clear(); }

    /// Delivers `event` to each subscriber in order.
    ///
    /// The first error stops delivery and is returned to the caller; the
    /// remaining subscribers are not invoked. On success, returns the number
    /// of subscribers notified.
    pub fn notify<E, F>(&self, event: &K, mut handler: F) -> Result<usize, E>
    where
        F: FnMut(&S) -> Result<(), E>,
    {
        let mut delivered = 0;
        for registration in self.registrations.iter().filter(|r| &r.event == event) {
            trace!(event = ?event, priority = registration.priority, "notify");
            handler(&registration.subscriber)?;
            delivered += 1;
        }
        Ok(delivered)
    }
}
