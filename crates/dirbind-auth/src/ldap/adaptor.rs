//! Multi-endpoint LDAP adaptor
//!
//! Endpoints are tried strictly in configuration order. Every session is opened,
//! service-bound, used and closed before the next endpoint is touched.

use crate::ldap::client::Ldap3Connector;
use crate::ldap::directory::DirectoryConnector;
use crate::ldap::pool::{Connection, ConnectionPool};
use crate::ldap::sasl;
use crate::ldap::strategy::select_auth;
use crate::ldap::types::*;
use dirbind_core::{DirbindConfig, Error, NameProc, RawConfiguration, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Receives errors swallowed while iterating over endpoints
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &Error, endpoint: usize);
}

/// Logs swallowed errors at `warn` level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, error: &Error, endpoint: usize) {
        warn!(endpoint, code = error.code(), "LDAP endpoint failed: {}", error);
    }
}

pub struct LdapAdaptor {
    pool: ConnectionPool,
    name_proc: NameProc,
    reporter: Arc<dyn ErrorReporter>,
}

impl LdapAdaptor {
    /// Normalize the configuration and select a service bind for every endpoint.
    ///
    /// Fails on missing keys, unknown connect methods, list length mismatches,
    /// unusable SASL credentials, or a SASL service bind the connector cannot carry.
    /// Nothing is contacted yet.
    pub fn new(config: &RawConfiguration, connector: Arc<dyn DirectoryConnector>) -> Result<Self> {
        let normalized = config.normalize()?;

        let endpoints = normalized
            .endpoints
            .into_iter()
            .map(|settings| {
                let auth = select_auth(&settings)?;
                debug!(
                    "Endpoint {} ({}) uses {:?} bind",
                    settings.index,
                    settings.url(),
                    auth.method()
                );
                Ok(EndpointSpec { settings, auth })
            })
            .collect::<Result<Vec<_>>>()?;

        if !connector.supports_sasl() {
            if let Some(endpoint) = endpoints.iter().find(|e| e.method() == BindMethod::Sasl) {
                return Err(Error::InvalidConfig(format!(
                    "endpoint {} ({}) needs a SASL service bind, which this transport cannot perform",
                    endpoint.index(),
                    endpoint.host()
                )));
            }
        }

        info!("LDAP adaptor configured with {} endpoint(s)", endpoints.len());

        Ok(Self {
            pool: ConnectionPool::new(endpoints, connector),
            name_proc: normalized.name_proc,
            reporter: Arc::new(TracingReporter),
        })
    }

    /// Build an adaptor that talks to real servers through ldap3.
    pub fn from_config(config: &DirbindConfig) -> Result<Self> {
        Self::new(&config.ldap, Arc::new(Ldap3Connector::new(&config.transport)))
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn endpoints(&self) -> &[EndpointSpec] {
        self.pool.endpoints()
    }

    /// Find the user's entry and bind as it, trying each endpoint until one succeeds.
    pub async fn bind_as(&self, request: &BindAsRequest) -> Option<DirectoryEntry> {
        if request.method == Some(BindMethod::Sasl) && !self.pool.supports_sasl() {
            let e = Error::InvalidConfig("SASL user binds are not supported by this transport".into());
            warn!(code = e.code(), "Refusing bind_as for {:?}: {}", request.identity, e);
            return None;
        }

        for index in 0..self.pool.len() {
            let mut connection = match self.pool.open(index).await {
                Ok(connection) => connection,
                Err(e) => {
                    self.reporter.report(&e, index);
                    continue;
                }
            };

            let outcome = self.search_and_bind(&mut connection, request).await;
            connection.close().await;

            match outcome {
                Ok(Some(entry)) => {
                    info!("Authenticated {} against endpoint {}", entry.dn, index);
                    return Some(entry);
                }
                Ok(None) => {}
                Err(e) => self.reporter.report(&e, index),
            }
        }

        debug!("Authentication of {:?} failed on every endpoint", request.identity);
        None
    }

    /// Run the search against each endpoint; true as soon as one search succeeds.
    pub async fn bind(&self, query: &SearchQuery) -> bool {
        for index in 0..self.pool.len() {
            match self.search_endpoint(index, query).await {
                Ok(_) => return true,
                Err(e) => self.reporter.report(&e, index),
            }
        }
        false
    }

    /// Run the search against every endpoint, one outcome per endpoint.
    pub async fn search(&self, query: &SearchQuery) -> Vec<SearchOutcome> {
        let mut outcomes = Vec::with_capacity(self.pool.len());
        for index in 0..self.pool.len() {
            match self.search_endpoint(index, query).await {
                Ok(entries) => outcomes.push(SearchOutcome::Entries(entries)),
                Err(e) => {
                    self.reporter.report(&e, index);
                    outcomes.push(SearchOutcome::Failed(e.to_string()));
                }
            }
        }
        outcomes
    }

    async fn search_endpoint(&self, index: usize, query: &SearchQuery) -> Result<Vec<DirectoryEntry>> {
        let mut connection = self.pool.open(index).await?;
        let filter = query.filter.clone().unwrap_or_else(Filter::match_all);
        let request = query.resolve(connection.endpoint(), filter);

        let result = connection.search(&request).await;
        connection.close().await;
        result
    }

    async fn search_and_bind(
        &self,
        connection: &mut Connection<'_>,
        request: &BindAsRequest,
    ) -> Result<Option<DirectoryEntry>> {
        let endpoint = connection.endpoint();
        let filter = match &request.query.filter {
            Some(filter) => filter.clone(),
            None => self.identity_filter(endpoint, &request.identity)?,
        };
        let search = request.query.resolve(endpoint, filter);

        let entry = match connection.search(&search).await?.into_iter().next() {
            Some(entry) if !entry.dn.is_empty() => entry,
            _ => {
                debug!("No entry matching {} on {}", search.filter, endpoint.host());
                return Ok(None);
            }
        };

        let password = request.password.resolve();
        if password.is_empty() {
            // An empty simple bind is an unauthenticated bind and would always succeed
            debug!("Refusing to bind as {} with an empty password", entry.dn);
            return Ok(None);
        }

        let auth = user_auth(endpoint, request.method, &entry.dn, password)?;
        if connection.bind(&auth).await? {
            Ok(Some(entry))
        } else {
            debug!("Bind as {} rejected by {}", entry.dn, endpoint.host());
            Ok(None)
        }
    }

    fn identity_filter(&self, endpoint: &EndpointSpec, identity: &str) -> Result<Filter> {
        let name = self.name_proc.apply(identity);
        match (&endpoint.settings.filter, &endpoint.settings.uid) {
            (Some(template), _) => Ok(Filter::from_template(template, &name)),
            (None, Some(uid)) => Ok(Filter::eq(uid.as_str(), name)),
            (None, None) => Err(Error::MissingKeys(vec!["uid or filter".into()])),
        }
    }
}

fn user_auth(
    endpoint: &EndpointSpec,
    method: Option<BindMethod>,
    dn: &str,
    password: String,
) -> Result<AuthDescriptor> {
    match method.unwrap_or_else(|| endpoint.method()) {
        BindMethod::Sasl => sasl::negotiate(
            &endpoint.settings.sasl_mechanisms,
            Some(dn),
            Some(&password),
            endpoint.host(),
        )?
        .into_iter()
        .next()
        .ok_or_else(|| {
            Error::Sasl(format!(
                "no supported SASL mechanism configured for {}",
                endpoint.host()
            ))
        }),
        BindMethod::Simple | BindMethod::Anonymous => Ok(AuthDescriptor::Simple {
            username: dn.to_string(),
            password,
        }),
    }
}

impl fmt::Debug for LdapAdaptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LdapAdaptor")
            .field("pool", &self.pool)
            .field("name_proc", &self.name_proc)
            .finish_non_exhaustive()
    }
}
