//! Crypto errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Malformed DIGEST-MD5 challenge: {0}")]
    MalformedChallenge(String),

    #[error("Server offers no supported quality of protection: {0}")]
    UnsupportedQop(String),

    #[error("Invalid NTLM message: {0}")]
    InvalidNtlmMessage(String),
}
