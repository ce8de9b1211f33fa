//! LDAP adaptor types
//!
//! Supports:
//! - Per-endpoint connection specs built from normalized settings
//! - Anonymous, simple and SASL bind descriptors
//! - Search queries and RFC 4515 filters

use dirbind_core::{Encryption, EndpointSettings, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Bind descriptors
// ============================================================================

/// How a connection authenticates itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindMethod {
    Anonymous,
    Simple,
    Sasl,
}

/// Answers one server challenge during a SASL exchange.
///
/// Implementations capture their credentials by value, have no side effects and
/// may be called any number of times.
pub trait ChallengeResponder: Send + Sync + fmt::Debug {
    fn respond(&self, challenge: &[u8]) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone)]
pub struct SaslAuth {
    /// Mechanism name as configured, e.g. `GSS-SPNEGO`
    pub mechanism: String,
    pub initial_credential: Vec<u8>,
    pub responder: Arc<dyn ChallengeResponder>,
}

impl SaslAuth {
    pub fn respond(&self, challenge: &[u8]) -> Result<Vec<u8>> {
        self.responder.respond(challenge)
    }
}

#[derive(Clone)]
pub enum AuthDescriptor {
    Anonymous,
    Simple { username: String, password: String },
    Sasl(SaslAuth),
}

impl AuthDescriptor {
    pub fn method(&self) -> BindMethod {
        match self {
            AuthDescriptor::Anonymous => BindMethod::Anonymous,
            AuthDescriptor::Simple { .. } => BindMethod::Simple,
            AuthDescriptor::Sasl(_) => BindMethod::Sasl,
        }
    }
}

impl fmt::Debug for AuthDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthDescriptor::Anonymous => f.write_str("Anonymous"),
            AuthDescriptor::Simple { username, .. } => f
                .debug_struct("Simple")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            AuthDescriptor::Sasl(sasl) => f.debug_tuple("Sasl").field(sasl).finish(),
        }
    }
}

// ============================================================================
// Endpoints
// ============================================================================

/// One configured directory server with its service credentials
#[derive(Debug, Clone)]
pub struct EndpointSpec {
    pub settings: EndpointSettings,
    pub auth: AuthDescriptor,
}

impl EndpointSpec {
    pub fn index(&self) -> usize {
        self.settings.index
    }

    pub fn host(&self) -> &str {
        &self.settings.host
    }

    pub fn port(&self) -> u16 {
        self.settings.port
    }

    pub fn base(&self) -> &str {
        &self.settings.base
    }

    pub fn encryption(&self) -> Encryption {
        self.settings.encryption
    }

    pub fn method(&self) -> BindMethod {
        self.auth.method()
    }
}

// ============================================================================
// Directory entries
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attributes: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, values: Vec<String>) -> Self {
        self.attributes.insert(name.into(), values);
        self
    }

    /// Get first value of an attribute
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .and_then(|v| v.first())
            .map(|s| s.as_str())
    }
}

/// Result of querying one endpoint in a fan-out search
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Entries(Vec<DirectoryEntry>),
    /// The endpoint failed; holds the error message
    Failed(String),
}

impl SearchOutcome {
    pub fn entries(&self) -> Option<&[DirectoryEntry]> {
        match self {
            SearchOutcome::Entries(entries) => Some(entries),
            SearchOutcome::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SearchOutcome::Failed(_))
    }
}

// ============================================================================
// Filters
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq { attribute: String, value: String },
    /// Pre-built filter string, used verbatim
    Raw(String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    /// Equality match; the value is escaped when rendered.
    pub fn eq(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Eq {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Use a filter string as given, adding the outer parentheses if missing.
    pub fn construct(filter: impl Into<String>) -> Self {
        let filter = filter.into();
        let trimmed = filter.trim();
        if trimmed.starts_with('(') {
            Filter::Raw(trimmed.to_string())
        } else {
            Filter::Raw(format!("({})", trimmed))
        }
    }

    /// Substitute an escaped username into a `%{username}` template.
    pub fn from_template(template: &str, username: &str) -> Self {
        let escaped = ldap3::ldap_escape(username);
        Filter::construct(template.replace(dirbind_core::config::USERNAME_PLACEHOLDER, &escaped))
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And(filters)
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Or(filters)
    }

    pub fn negate(filter: Filter) -> Self {
        Filter::Not(Box::new(filter))
    }

    pub fn match_all() -> Self {
        Filter::Raw("(objectClass=*)".to_string())
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Eq { attribute, value } => {
                write!(f, "({}={})", attribute, ldap3::ldap_escape(value.as_str()))
            }
            Filter::Raw(filter) => f.write_str(filter),
            Filter::And(filters) => {
                f.write_str("(&")?;
                for filter in filters {
                    write!(f, "{}", filter)?;
                }
                f.write_str(")")
            }
            Filter::Or(filters) => {
                f.write_str("(|")?;
                for filter in filters {
                    write!(f, "{}", filter)?;
                }
                f.write_str(")")
            }
            Filter::Not(filter) => write!(f, "(!{})", filter),
        }
    }
}

// ============================================================================
// Search queries
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    Base,
    OneLevel,
    #[default]
    Subtree,
}

/// Caller-supplied search arguments; unset fields fall back to endpoint defaults
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub base: Option<String>,
    pub filter: Option<Filter>,
    pub scope: SearchScope,
    /// Empty means all user attributes
    pub attributes: Vec<String>,
    pub size_limit: Option<i32>,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_scope(mut self, scope: SearchScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_attributes(mut self, attributes: Vec<String>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_size_limit(mut self, limit: i32) -> Self {
        self.size_limit = Some(limit);
        self
    }

    /// Fill in the endpoint base and the given filter.
    pub fn resolve(&self, endpoint: &EndpointSpec, filter: Filter) -> SearchRequest {
        SearchRequest {
            base: self
                .base
                .clone()
                .unwrap_or_else(|| endpoint.base().to_string()),
            scope: self.scope,
            filter,
            attributes: self.attributes.clone(),
            size_limit: self.size_limit,
        }
    }
}

/// A fully specified search sent to one endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub base: String,
    pub scope: SearchScope,
    pub filter: Filter,
    pub attributes: Vec<String>,
    pub size_limit: Option<i32>,
}

// ============================================================================
// Bind-as requests
// ============================================================================

/// The end user's password, possibly produced on demand
#[derive(Clone)]
pub enum Password {
    Plain(String),
    Deferred(Arc<dyn Fn() -> String + Send + Sync>),
}

impl Password {
    pub fn deferred<F>(f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Password::Deferred(Arc::new(f))
    }

    pub fn resolve(&self) -> String {
        match self {
            Password::Plain(password) => password.clone(),
            Password::Deferred(f) => f(),
        }
    }
}

impl From<&str> for Password {
    fn from(password: &str) -> Self {
        Password::Plain(password.to_string())
    }
}

impl From<String> for Password {
    fn from(password: String) -> Self {
        Password::Plain(password)
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Password::Plain(_) => f.write_str("Plain(<redacted>)"),
            Password::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Search-then-bind request for one end user
#[derive(Debug, Clone)]
pub struct BindAsRequest {
    pub identity: String,
    pub password: Password,
    /// Overrides the endpoint's configured bind method for the user bind only
    pub method: Option<BindMethod>,
    /// Search options; a filter set here replaces the default identity filter
    pub query: SearchQuery,
}

impl BindAsRequest {
    pub fn new(identity: impl Into<String>, password: impl Into<Password>) -> Self {
        Self {
            identity: identity.into(),
            password: password.into(),
            method: None,
            query: SearchQuery::default(),
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.query.filter = Some(filter);
        self
    }

    pub fn with_method(mut self, method: BindMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_query(mut self, query: SearchQuery) -> Self {
        self.query = query;
        self
    }
}
