//! Per-endpoint connection specs and scoped sessions

use crate::ldap::directory::{perform_bind, DirectoryConnector, DirectorySession};
use crate::ldap::types::{AuthDescriptor, DirectoryEntry, EndpointSpec, SearchRequest};
use dirbind_core::{Error, Result};
use std::sync::Arc;
use tracing::debug;

/// Holds one `EndpointSpec` per endpoint, in configuration order
pub struct ConnectionPool {
    endpoints: Vec<EndpointSpec>,
    connector: Arc<dyn DirectoryConnector>,
}

impl ConnectionPool {
    pub fn new(endpoints: Vec<EndpointSpec>, connector: Arc<dyn DirectoryConnector>) -> Self {
        Self {
            endpoints,
            connector,
        }
    }

    pub fn endpoints(&self) -> &[EndpointSpec] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn supports_sasl(&self) -> bool {
        self.connector.supports_sasl()
    }

    /// Connect to an endpoint and perform its service bind.
    ///
    /// The session is closed again if the service bind fails.
    pub async fn open(&self, index: usize) -> Result<Connection<'_>> {
        let endpoint = self
            .endpoints
            .get(index)
            .ok_or_else(|| Error::InvalidConfig(format!("no endpoint at index {}", index)))?;

        let session = self.connector.connect(endpoint).await?;
        let mut connection = Connection { endpoint, session };

        match connection.bind(&endpoint.auth).await {
            Ok(true) => Ok(connection),
            Ok(false) => {
                connection.close().await;
                Err(Error::Directory(format!(
                    "Service bind ({:?}) rejected by {}",
                    endpoint.method(),
                    endpoint.host()
                )))
            }
            Err(e) => {
                connection.close().await;
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

/// An open, service-bound session to one endpoint
pub struct Connection<'a> {
    endpoint: &'a EndpointSpec,
    session: Box<dyn DirectorySession>,
}

impl<'a> Connection<'a> {
    pub fn endpoint(&self) -> &'a EndpointSpec {
        self.endpoint
    }

    pub async fn search(&mut self, request: &SearchRequest) -> Result<Vec<DirectoryEntry>> {
        self.session.search(request).await
    }

    /// Re-authenticate the session, e.g. as an end user.
    pub async fn bind(&mut self, auth: &AuthDescriptor) -> Result<bool> {
        perform_bind(self.session.as_mut(), auth).await
    }

    pub async fn close(mut self) {
        if let Err(e) = self.session.unbind().await {
            debug!("Unbind from {} failed: {}", self.endpoint.host(), e);
        }
    }
}

impl std::fmt::Debug for Connection<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.endpoint.settings.url())
            .finish_non_exhaustive()
    }
}
