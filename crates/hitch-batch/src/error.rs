use hitch_http::RequestId;

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("request {0} was already sent and cannot be batched")]
    AlreadySent(RequestId),

    #[error("request {0} has no pool to be sent through")]
    NoPool(RequestId),

    #[error("batch size must be greater than zero")]
    ZeroBatchSize,
}

impl From<BatchError> for hitch_http::Error {
    fn from(error: BatchError) -> Self { hitch_http::Error::config(error.to_string()) }
}
