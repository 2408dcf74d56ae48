mod headers;
mod method;
mod params;
mod request;
mod response;

pub use headers::Headers;
pub use method::Method;
pub use params::{Extensions, Params};
pub use request::{AuthScheme, Credentials, DispatchMode, Request, RequestId, RequestState, Subscribers};
pub use response::{Response, TransferInfo, canonical_reason};
