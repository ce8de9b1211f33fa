//! SASL mechanism setup
//!
//! Turns configured mechanism names into ready-to-use [`AuthDescriptor::Sasl`]
//! values: an initial credential plus a responder for server challenges.

use crate::ldap::types::{AuthDescriptor, ChallengeResponder, SaslAuth};
use dirbind_core::{Error, Result};
use dirbind_crypto::digest_md5::{compute_digest_response, DigestPreferences};
use dirbind_crypto::ntlm::{ChallengeMessage, NegotiateMessage, ResponseOptions};
use dirbind_crypto::hash::utf16le;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaslMechanism {
    DigestMd5,
    GssSpnego,
}

impl SaslMechanism {
    /// Look up a configured name; `DIGEST-MD5`, `digest_md5` and `Digest-Md5` are equivalent.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().replace('-', "_").as_str() {
            "digest_md5" => Some(SaslMechanism::DigestMd5),
            "gss_spnego" => Some(SaslMechanism::GssSpnego),
            _ => None,
        }
    }

    /// Name sent on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            SaslMechanism::DigestMd5 => "DIGEST-MD5",
            SaslMechanism::GssSpnego => "GSS-SPNEGO",
        }
    }

    fn setup(self, username: Option<&str>, password: Option<&str>, host: &str) -> Result<SaslAuth> {
        match self {
            SaslMechanism::DigestMd5 => {
                let prefs = DigestPreferences::new(
                    format!("ldap/{}", host),
                    username.unwrap_or_default(),
                    password.unwrap_or_default(),
                );
                Ok(SaslAuth {
                    mechanism: self.as_str().to_string(),
                    initial_credential: Vec::new(),
                    responder: Arc::new(DigestMd5Responder { prefs }),
                })
            }
            SaslMechanism::GssSpnego => {
                let (username, password) = match (username, password) {
                    (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => (u, p),
                    _ => {
                        return Err(Error::InvalidBindingInformation(
                            "GSS-SPNEGO requires both a username and a password".into(),
                        ))
                    }
                };
                Ok(SaslAuth {
                    mechanism: self.as_str().to_string(),
                    initial_credential: NegotiateMessage::new().serialize(),
                    responder: Arc::new(SpnegoResponder::new(username, password)),
                })
            }
        }
    }
}

impl fmt::Display for SaslMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build one SASL descriptor per supported mechanism, in the given order.
///
/// Unknown mechanism names are skipped. Missing GSS-SPNEGO credentials are an error.
pub fn negotiate(
    mechanisms: &[String],
    username: Option<&str>,
    password: Option<&str>,
    host: &str,
) -> Result<Vec<AuthDescriptor>> {
    let mut auths = Vec::new();
    for name in mechanisms {
        match SaslMechanism::from_name(name) {
            Some(mechanism) => {
                auths.push(AuthDescriptor::Sasl(mechanism.setup(username, password, host)?))
            }
            None => debug!("Skipping unsupported SASL mechanism {:?}", name),
        }
    }
    Ok(auths)
}

/// DIGEST-MD5 (RFC 2831) challenge responder
pub struct DigestMd5Responder {
    prefs: DigestPreferences,
}

impl ChallengeResponder for DigestMd5Responder {
    fn respond(&self, challenge: &[u8]) -> Result<Vec<u8>> {
        compute_digest_response(challenge, &self.prefs).map_err(|e| Error::Sasl(e.to_string()))
    }
}

impl fmt::Debug for DigestMd5Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestMd5Responder")
            .field("digest_uri", &self.prefs.digest_uri)
            .field("username", &self.prefs.username)
            .finish_non_exhaustive()
    }
}

/// GSS-SPNEGO responder answering an NTLM Type-2 challenge with a Type-3 message
pub struct SpnegoResponder {
    domain: Option<String>,
    user: String,
    password: String,
}

impl SpnegoResponder {
    /// `DOMAIN\user` names carry their own domain; with more separators the
    /// last segment is the user and the one before it the domain.
    pub fn new(username: &str, password: &str) -> Self {
        let mut segments = username.rsplit('\\');
        let user = segments.next().unwrap_or(username).to_string();
        let domain = segments.next().map(str::to_string);
        Self {
            domain,
            user,
            password: password.to_string(),
        }
    }
}

impl ChallengeResponder for SpnegoResponder {
    fn respond(&self, challenge: &[u8]) -> Result<Vec<u8>> {
        let mut message =
            ChallengeMessage::parse(challenge).map_err(|e| Error::Sasl(e.to_string()))?;

        if let Some(domain) = &self.domain {
            message.set_target_name(utf16le(domain));
        }

        let options = ResponseOptions::generate();
        Ok(message.response(&self.user, &self.password, &options).serialize())
    }
}

impl fmt::Debug for SpnegoResponder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpnegoResponder")
            .field("domain", &self.domain)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}
