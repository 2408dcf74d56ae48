//! Retry with truncated exponential backoff.
//!
//! [`BackoffPlugin`] resends requests whose response matches a
//! [`FailurePolicy`] (by default status 500 or 503) up to a retry limit.
//! Observers such as [`BackoffLogger`] receive a [`RetryRecord`] for every
//! retry and every raised transport error.

mod delay;
mod logger;
mod options;
mod plugin;
mod policy;
mod record;

pub use delay::{DelayFn, constant, exponential, exponential_delay, retry_delay};
pub use logger::{BackoffLogger, DEFAULT_TEMPLATE, LogSink, TracingSink, render};
pub use options::RetryOptions;
pub use plugin::{BackoffPlugin, Observers, RetryState};
pub use policy::{FailurePolicy, FailurePredicate};
pub use record::{RetryEvent, RetryObserver, RetryRecord};
