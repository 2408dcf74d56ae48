//! `Content-MD5` response validation.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hitch_http::{Event, Response, Result, SendContext, Subscriber};
use tracing::{debug, trace};

use crate::error::VerificationError;
use crate::hasher::{Hasher, Md5Hasher};

const PRIORITY: i32 = 150;

/// Fails requests whose response body does not match its `Content-MD5`.
///
/// Bodies with a `Content-Encoding` are skipped, since the header covers the
/// decoded entity, as are bodies larger than the optional size cutoff.
#[derive(Debug, Clone, Copy, Default)]
pub struct Md5Validator {
    max_body: Option<usize>,
}

impl Md5Validator {
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn with_max_body(mut self, bytes: usize) -> Self {
        self.max_body = Some(bytes);
        self
    }

    /// Checks `response`; `Ok` when it carries no checksum or is skipped.
    pub fn verify(&self, response: &Response) -> crate::error::Result<()> {
        let Some(expected) = response.header("Content-MD5") else {
            return Ok(());
        };
        if response.headers().contains("Content-Encoding") {
            trace!("skipping checksum of encoded body");
            return Ok(());
        }
        if self.max_body.is_some_and(|max| response.body().len() > max) {
            trace!(len = response.body().len(), "skipping checksum of large body");
            return Ok(());
        }

        let mut hasher = Md5Hasher::new();
        hasher.update(response.body());
        let actual = STANDARD.encode(hasher.finalize());
        if actual == expected.trim() {
            Ok(())
        } else {
            Err(VerificationError::Mismatch {
                expected: expected.trim().to_string(),
                actual,
            })
        }
    }
}

impl Subscriber for Md5Validator {
    fn name(&self) -> &'static str { "md5_validator" }

    fn subscribed_events(&self) -> Vec<(Event, i32)> { vec![(Event::Sent, PRIORITY)] }

    fn on_sent(&self, ctx: &mut SendContext<'_>) -> Result<()> {
        let Some(response) = ctx.request.response() else {
            return Ok(());
        };
        if let Err(error) = self.verify(response) {
            debug!(request = %ctx.request.id(), %error, "response failed integrity check");
            return Err(error.into());
        }
        Ok(())
    }
}
