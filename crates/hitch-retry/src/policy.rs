use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use hitch_http::Response;

pub type FailurePredicate = Arc<dyn Fn(&Response) -> bool + Send + Sync>;

/// Decides which responses count as failed attempts.
#[derive(Clone)]
pub struct FailurePolicy {
    codes:     BTreeSet<u16>,
    phrases:   Vec<String>,
    predicate: Option<FailurePredicate>,
}

impl FailurePolicy {
    pub fn codes(codes: impl IntoIterator<Item = u16>) -> Self {
        Self {
            codes:     codes.into_iter().collect(),
            phrases:   Vec::new(),
            predicate: None,
        }
    }

    /// Also fail on responses whose reason phrase matches, ignoring case.
    #[must_use]
    pub fn with_phrases(mut self, phrases: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.phrases.extend(phrases.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_predicate(mut self, predicate: impl Fn(&Response) -> bool + Send + Sync + 'static) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn is_failure(&self, response: &Response) -> bool {
        self.codes.contains(&response.status())
            || self
                .phrases
                .iter()
                .any(|phrase| phrase.eq_ignore_ascii_case(response.reason()))
            || self.predicate.as_ref().is_some_and(|predicate| predicate(response))
    }
}

impl Default for FailurePolicy {
    fn default() -> Self { Self::codes([500, 503]) }
}

impl fmt::Debug for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailurePolicy")
            .field("codes", &self.codes)
            .field("phrases", &self.phrases)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_codes() {
        let policy = FailurePolicy::default();
        assert!(policy.is_failure(&Response::new(500)));
        assert!(policy.is_failure(&Response::new(503)));
        assert!(!policy.is_failure(&Response::new(502)));
        assert!(!policy.is_failure(&Response::new(200)));
    }

    #[test]
    fn test_phrases_and_predicate() {
        let policy = FailurePolicy::codes([])
            .with_phrases(["Try Again Later"])
            .with_predicate(|response| response.header("Retry-After").is_some());
        assert!(policy.is_failure(&Response::new(200).with_reason("try again later")));
        assert!(policy.is_failure(&Response::new(429).with_header("Retry-After", "1")));
        assert!(!policy.is_failure(&Response::new(429)));
    }
}
