use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::delay::{DelayFn, exponential};
use crate::policy::FailurePolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    pub max_retries:   u32,
    /// Status codes treated as failures.
    pub codes:         Vec<u16>,
    /// Reason phrases treated as failures.
    pub phrases:       Vec<String>,
    /// Delay before retry `n` is `base_delay_ms * 2^n`.
    pub base_delay_ms: u64,
    pub max_delay_ms:  Option<u64>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries:   3,
            codes:         vec![500, 503],
            phrases:       Vec::new(),
            base_delay_ms: 1000,
            max_delay_ms:  None,
        }
    }
}

impl RetryOptions {
    pub fn policy(&self) -> FailurePolicy { FailurePolicy::codes(self.codes.iter().copied()).with_phrases(self.phrases.clone()) }

    pub fn delay(&self) -> DelayFn {
        exponential(
            Duration::from_millis(self.base_delay_ms),
            self.max_delay_ms.map(Duration::from_millis),
        )
    }
}
