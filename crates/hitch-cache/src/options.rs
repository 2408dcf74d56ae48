use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    /// Lifetime in seconds for responses without `max-age` or `Expires`.
    pub default_ttl: u64,
    /// Entry cap of the in-memory store.
    pub capacity:    usize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            default_ttl: 3600,
            capacity:    1024,
        }
    }
}

impl CacheOptions {
    pub fn default_ttl(&self) -> Duration { Duration::from_secs(self.default_ttl) }
}
