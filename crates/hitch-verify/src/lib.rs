//! Integrity checks for response bodies.

mod error;
mod hasher;
mod validator;

pub use error::{Result, VerificationError};
pub use hasher::{DigestHasher, Hasher, Md5Hasher};
pub use validator::Md5Validator;
