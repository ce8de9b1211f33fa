//! Directory transport seam
//!
//! A [`DirectoryConnector`] opens one [`DirectorySession`] per endpoint. Sessions are
//! owned by a single call and closed before the next endpoint is tried.

use crate::ldap::types::{AuthDescriptor, DirectoryEntry, EndpointSpec, SearchRequest};
use async_trait::async_trait;
use dirbind_core::{Error, Result};
use tracing::debug;

/// Upper bound on server challenges answered in one SASL exchange
pub const MAX_SASL_ROUNDS: usize = 10;

/// Server reply to one SASL bind request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaslBindStep {
    /// The exchange finished; `true` if the server accepted the credentials
    Done(bool),
    /// saslBindInProgress with the server's challenge
    Challenge(Vec<u8>),
}

#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    /// Connect to the endpoint without binding.
    async fn connect(&self, endpoint: &EndpointSpec) -> Result<Box<dyn DirectorySession>>;

    /// Whether sessions from this connector can carry token-based SASL binds.
    fn supports_sasl(&self) -> bool {
        true
    }
}

#[async_trait]
pub trait DirectorySession: Send {
    async fn search(&mut self, request: &SearchRequest) -> Result<Vec<DirectoryEntry>>;

    /// Returns `Ok(false)` when the server rejects the credentials.
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<bool>;

    async fn sasl_bind(&mut self, mechanism: &str, credentials: &[u8]) -> Result<SaslBindStep>;

    async fn unbind(&mut self) -> Result<()>;
}

/// Authenticate a session with the given descriptor.
pub async fn perform_bind(
    session: &mut (dyn DirectorySession + '_),
    auth: &AuthDescriptor,
) -> Result<bool> {
    match auth {
        AuthDescriptor::Anonymous => session.simple_bind("", "").await,
        AuthDescriptor::Simple { username, password } => {
            session.simple_bind(username, password).await
        }
        AuthDescriptor::Sasl(sasl) => {
            debug!("Starting SASL {} exchange", sasl.mechanism);

            let mut step = session
                .sasl_bind(&sasl.mechanism, &sasl.initial_credential)
                .await?;

            for _ in 0..MAX_SASL_ROUNDS {
                match step {
                    SaslBindStep::Done(accepted) => return Ok(accepted),
                    SaslBindStep::Challenge(challenge) => {
                        let response = sasl.respond(&challenge)?;
                        step = session.sasl_bind(&sasl.mechanism, &response).await?;
                    }
                }
            }

            match step {
                SaslBindStep::Done(accepted) => Ok(accepted),
                SaslBindStep::Challenge(_) => Err(Error::Sasl(format!(
                    "{} exchange did not finish after {} challenges",
                    sasl.mechanism, MAX_SASL_ROUNDS
                ))),
            }
        }
    }
}
