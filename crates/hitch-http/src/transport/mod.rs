//! The raw HTTP send seam.

mod mock;
#[cfg(feature = "reqwest")]
mod reqwest_transport;

pub use mock::{MockTransport, SentRequest};
#[cfg(feature = "reqwest")]
pub use reqwest_transport::ReqwestTransport;

use crate::error::TransportError;
use crate::message::{Request, Response};

/// Performs the network exchange for a request.
///
/// Implementations see the request as prepared by subscribers and return the
/// raw response; redirects, retries and caching happen above this layer.
pub trait Transport: Send + Sync {
    fn send(&self, request: &Request) -> Result<Response, TransportError>;

    /// Sends several requests at once. The default sends them one by one;
    /// multiplexing backends override this.
    fn send_batch(&self, requests: &[&Request]) -> Vec<Result<Response, TransportError>> {
        requests.iter().map(|request| self.send(request)).collect()
    }
}
