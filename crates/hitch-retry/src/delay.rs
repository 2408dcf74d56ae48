use std::sync::Arc;
use std::time::Duration;

/// Maps a retry number (1 for the first retry) to the pause before it.
pub type DelayFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// Exponential backoff: `base * 2^retry_count`.
///
/// ```
/// use std::time::Duration;
/// use hitch_retry::retry_delay;
///
/// assert_eq!(retry_delay(0, Duration::from_millis(100)), Duration::from_millis(100));
/// assert_eq!(retry_delay(2, Duration::from_millis(100)), Duration::from_millis(400));
/// ```
pub fn retry_delay(retry_count: u32, base: Duration) -> Duration {
    let multiplier = 2_u32.saturating_pow(retry_count);
    base.saturating_mul(multiplier)
}

/// Default delay: `2^retry` seconds, so retries 1, 2, 3 wait 2, 4, 8 s.
pub fn exponential_delay(retry: u32) -> Duration { retry_delay(retry, Duration::from_secs(1)) }

/// Delay function for `base * 2^retry`, truncated at `max` when given.
pub fn exponential(base: Duration, max: Option<Duration>) -> DelayFn {
    Arc::new(move |retry| {
        let delay = retry_delay(retry, base);
        max.map_or(delay, |max| delay.min(max))
    })
}

/// Same pause before every retry.
pub fn constant(delay: Duration) -> DelayFn { Arc::new(move |_| delay) }

/// Whole milliseconds of `delay`, saturating at `u64::MAX`.
pub(crate) fn millis(delay: Duration) -> u64 { u64::try_from(delay.as_millis()).unwrap_or(u64::MAX) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_default_sequence() {
        let delays: Vec<u64> = (1..=3).map(|n| exponential_delay(n).as_secs()).collect();
        assert_eq!(delays, vec![2, 4, 8]);
    }

    #[test]
    fn test_retry_delay_exponential_growth() {
        let base = Duration::from_millis(10);
        let delays: Vec<Duration> = (0..5).map(|i| retry_delay(i, base)).collect();
        for i in 1..delays.len() {
            assert_eq!(delays[i], delays[i - 1] * 2);
        }
    }

    #[test]
    fn test_retry_delay_overflow_protection() {
        let base = Duration::from_secs(u64::MAX / 2);
        assert!(retry_delay(2, base) > Duration::from_secs(0));
        assert_eq!(retry_delay(64, Duration::from_nanos(1)), Duration::from_nanos(u64::from(u32::MAX)));
    }

    #[test]
    fn test_truncated() {
        let delay = exponential(Duration::from_millis(500), Some(Duration::from_secs(3)));
        assert_eq!(delay(1), Duration::from_secs(1));
        assert_eq!(delay(2), Duration::from_secs(2));
        assert_eq!(delay(3), Duration::from_secs(3));
        assert_eq!(delay(10), Duration::from_secs(3));
    }

    #[test]
    fn test_constant() {
        let delay = constant(Duration::from_millis(250));
        assert_eq!(delay(1), delay(7));
    }
}
