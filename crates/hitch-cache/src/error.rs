#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache store error: {0}")]
    Store(String),

    #[error("cache entry encoding error: {0}")]
    Codec(#[from] postcard::Error),
}

pub type Result<T> = std::result::Result<T, CacheError>;

impl From<CacheError> for hitch_http::Error {
    fn from(error: CacheError) -> Self { hitch_http::Error::subscriber("cache", error) }
}
