//! SASL and NTLM primitives for Dirbind

pub mod digest_md5;
pub mod error;
pub mod hash;
pub mod ntlm;

pub use digest_md5::{compute_digest_response, DigestChallenge, DigestPreferences};
pub use error::CryptoError;
pub use ntlm::{AuthenticateMessage, ChallengeMessage, NegotiateMessage, ResponseOptions};
