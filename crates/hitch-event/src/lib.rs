//! Priority-ordered, synchronous publish/subscribe.
//!
//! An [`EventBus`] is a registration table keyed by an event type `K`. Each
//! registration carries a priority; subscribers of the same event are
//! delivered in descending priority order and, for equal priorities, in the
//! order they were attached. The bus holds no state between notifications.

mod bus;

pub use bus::{EventBus, Registration};
