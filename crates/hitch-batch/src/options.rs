use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Flush once this many requests are queued; `0` only flushes on demand.
    pub auto_flush_count: usize,
    /// Largest group handed to a pool at once.
    pub per_batch:        usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            auto_flush_count: 0,
            per_batch:        50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json() {
        let options: BatchOptions = serde_json::from_str(r#"{"auto_flush_count": 20}"#).unwrap();
        assert_eq!(options.auto_flush_count, 20);
        assert_eq!(options.per_batch, 50);
    }
}
