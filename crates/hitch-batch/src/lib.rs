//! Request batching.
//!
//! [`BatchQueue`] holds requests until a flush, then hands them to their
//! pools grouped by pool. A queued request sent some other way leaves the
//! queue on its own.

mod error;
mod options;
mod queue;

pub use error::BatchError;
pub use options::BatchOptions;
pub use queue::BatchQueue;
