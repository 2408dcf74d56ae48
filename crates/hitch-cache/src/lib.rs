//! Private, transparent HTTP cache for GET and HEAD requests.
//!
//! [`CachePlugin`] answers requests from a [`CacheStore`] when the stored
//! response can satisfy them, revalidates stale entries with a conditional
//! sub-request, and stores successful cacheable responses.

mod entry;
mod error;
mod key;
mod options;
mod plugin;
mod store;

pub use entry::{CacheEntry, EXCLUDED_HEADERS};
pub use error::{CacheError, Result};
pub use key::{KEY_FILTER_PARAM, KEY_PARAM, KeyFilter, cache_key, raw_cache_key};
pub use options::CacheOptions;
pub use plugin::{CacheFilter, CachePlugin, CacheState, OVERRIDE_TTL_PARAM, REVALIDATE_PARAM, RevalidatePolicy};
pub use store::{CacheStore, MemoryStore, StoreStats};
