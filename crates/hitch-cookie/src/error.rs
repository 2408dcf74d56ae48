#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    #[error("empty cookie header")]
    Empty,

    #[error("cookie pair '{0}' has no '='")]
    MissingValue(String),

    #[error("cookie requires a {0}")]
    Invalid(&'static str),

    #[error("cookie domain '{domain}' does not match host '{host}'")]
    ForeignDomain { domain: String, host: String },
}

pub type Result<T> = std::result::Result<T, CookieError>;

impl From<CookieError> for hitch_http::Error {
    fn from(error: CookieError) -> Self { hitch_http::Error::subscriber("cookie", error) }
}
