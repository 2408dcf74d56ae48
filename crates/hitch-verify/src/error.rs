#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    Mismatch { expected: String, actual: String },
}

pub type Result<T> = std::result::Result<T, VerificationError>;

impl From<VerificationError> for hitch_http::Error {
    fn from(error: VerificationError) -> Self {
        match error {
            VerificationError::Mismatch { expected, actual } => hitch_http::Error::Integrity { expected, actual },
        }
    }
}
