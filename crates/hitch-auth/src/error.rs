#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid signing key: {0}")]
    Key(#[from] hmac::digest::InvalidLength),

    #[error("malformed digest challenge: {0}")]
    Challenge(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;

impl From<AuthError> for hitch_http::Error {
    fn from(error: AuthError) -> Self { hitch_http::Error::subscriber("auth", error) }
}
