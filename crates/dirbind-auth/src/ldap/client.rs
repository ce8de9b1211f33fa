//! LDAP transport on top of ldap3
//!
//! Handles connections, simple binds and searches.
//! Supports LDAP, LDAPS (SSL), and STARTTLS connections.

use crate::ldap::directory::{DirectoryConnector, DirectorySession, SaslBindStep};
use crate::ldap::types::{DirectoryEntry, EndpointSpec, SearchRequest, SearchScope};
use async_trait::async_trait;
use dirbind_core::{Encryption, Error, Result, TransportConfig};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry, SearchOptions};
use std::time::Duration;
use tracing::debug;

// RC 4 = sizeLimitExceeded; the entries returned so far are still valid
const RC_SIZE_LIMIT_EXCEEDED: u32 = 4;

/// Opens ldap3 connections to configured endpoints
#[derive(Debug, Clone)]
pub struct Ldap3Connector {
    timeout: Duration,
    skip_tls_verify: bool,
}

impl Ldap3Connector {
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_seconds),
            skip_tls_verify: config.skip_tls_verify,
        }
    }
}

impl Default for Ldap3Connector {
    fn default() -> Self {
        Self::new(&TransportConfig::default())
    }
}

#[async_trait]
impl DirectoryConnector for Ldap3Connector {
    async fn connect(&self, endpoint: &EndpointSpec) -> Result<Box<dyn DirectorySession>> {
        let url = endpoint.settings.url();
        let settings = LdapConnSettings::new()
            .set_conn_timeout(self.timeout)
            .set_starttls(endpoint.encryption() == Encryption::StartTls)
            .set_no_tls_verify(self.skip_tls_verify);

        debug!("Connecting to LDAP server: {}", url);

        let (conn, ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| Error::Directory(format!("Failed to connect to {}: {}", url, e)))?;

        ldap3::drive!(conn);

        Ok(Box::new(Ldap3Session { ldap, url }))
    }

    // ldap3 only exposes EXTERNAL and GSSAPI binds, neither of which takes our tokens
    fn supports_sasl(&self) -> bool {
        false
    }
}

struct Ldap3Session {
    ldap: Ldap,
    url: String,
}

#[async_trait]
impl DirectorySession for Ldap3Session {
    async fn search(&mut self, request: &SearchRequest) -> Result<Vec<DirectoryEntry>> {
        let filter = request.filter.to_string();
        let attrs: Vec<&str> = request.attributes.iter().map(String::as_str).collect();

        let mut options = SearchOptions::new();
        if let Some(limit) = request.size_limit {
            options = options.sizelimit(limit);
        }

        debug!("Searching {} under {} with filter: {}", self.url, request.base, filter);

        let result = self
            .ldap
            .with_search_options(options)
            .search(&request.base, request.scope.into(), &filter, attrs)
            .await
            .map_err(|e| Error::Directory(format!("Search failed: {}", e)))?;

        let (entries, res) = (result.0, result.1);
        if res.rc != 0 && res.rc != RC_SIZE_LIMIT_EXCEEDED {
            return Err(Error::Directory(format!(
                "Search under {} failed with code {}: {}",
                request.base, res.rc, res.text
            )));
        }

        Ok(entries
            .into_iter()
            .map(|entry| SearchEntry::construct(entry).into())
            .collect())
    }

    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<bool> {
        let result = self
            .ldap
            .simple_bind(dn, password)
            .await
            .map_err(|e| Error::Directory(format!("Bind failed: {}", e)))?;

        if result.rc != 0 {
            // RC 49 = Invalid credentials
            debug!("Bind as {:?} on {} failed with code: {}", dn, self.url, result.rc);
        }
        Ok(result.rc == 0)
    }

    async fn sasl_bind(&mut self, mechanism: &str, _credentials: &[u8]) -> Result<SaslBindStep> {
        Err(Error::Directory(format!(
            "SASL {} binds are not available over the ldap3 transport ({})",
            mechanism, self.url
        )))
    }

    async fn unbind(&mut self) -> Result<()> {
        self.ldap
            .unbind()
            .await
            .map_err(|e| Error::Directory(format!("Unbind failed: {}", e)))
    }
}

impl From<SearchScope> for Scope {
    fn from(scope: SearchScope) -> Self {
        match scope {
            SearchScope::Base => Scope::Base,
            SearchScope::OneLevel => Scope::OneLevel,
            SearchScope::Subtree => Scope::Subtree,
        }
    }
}

impl From<SearchEntry> for DirectoryEntry {
    fn from(entry: SearchEntry) -> Self {
        Self {
            dn: entry.dn,
            attributes: entry.attrs,
        }
    }
}
