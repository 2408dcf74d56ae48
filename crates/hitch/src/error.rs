use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] hitch_http::Error),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("invalid base URL: {0}")]
    BaseUrl(#[from] url::ParseError),

    #[error(transparent)]
    Batch(#[from] hitch_batch::BatchError),

    #[error("batching is not enabled for this session")]
    BatchDisabled,
}

pub type Result<T> = std::result::Result<T, Error>;
