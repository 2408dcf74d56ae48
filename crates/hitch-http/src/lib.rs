//! HTTP message model and subscriber pipeline.
//!
//! A [`Request`] carries its own subscriber table. Sending runs the request
//! through `request.before_send`, the [`Transport`], and `request.sent`;
//! subscribers (caching, retries, redirects, signing) observe and steer each
//! step. [`Client`] creates requests with its subscribers attached and
//! [`MultiPool`] sends many requests together.

pub mod cache_control;
pub mod client;
pub mod error;
pub mod event;
pub mod httpdate;
mod lifecycle;
pub mod message;
pub mod pool;
pub mod sleeper;
pub mod transport;

pub use cache_control::{CacheControl, MaxStale};
pub use client::{Client, ClientBuilder};
pub use error::{BoxError, Error, Hop, Result, TransportError, TransportErrorKind};
pub use event::{Event, PollContext, SendContext, Subscriber};
pub use lifecycle::send;
pub use message::{
    AuthScheme, Credentials, DispatchMode, Extensions, Headers, Method, Params, Request, RequestId,
    RequestState, Response, TransferInfo,
};
pub use pool::{MultiPool, Pool, PoolHandle, PoolId, SharedRequest, lock, share};
pub use sleeper::{Sleeper, ThreadSleeper, TrackingSleeper};
pub use transport::{MockTransport, SentRequest, Transport};
#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
