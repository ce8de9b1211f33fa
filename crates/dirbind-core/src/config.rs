//! Configuration for Dirbind
//!
//! Directory settings arrive loosely typed: every key may be a single value shared by
//! all endpoints or a list holding one value per endpoint. [`RawConfiguration::normalize`]
//! turns that into one [`EndpointSettings`] record per configured host.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Placeholder substituted into filter templates.
pub const USERNAME_PLACEHOLDER: &str = "%{username}";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirbindConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub ldap: RawConfiguration,

    #[serde(default)]
    pub transport: TransportConfig,
}

impl DirbindConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::InvalidConfig(format!(
                "Failed to read config {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::InvalidConfig(format!("Failed to parse config: {}", e)))
    }

    /// Override settings from `DIRBIND_*` environment variables.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("DIRBIND_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("DIRBIND_LOG_FORMAT") {
            match format.to_ascii_lowercase().as_str() {
                "json" => self.logging.format = LogFormat::Json,
                "pretty" => self.logging.format = LogFormat::Pretty,
                other => tracing::warn!("Ignoring unknown DIRBIND_LOG_FORMAT {:?}", other),
            }
        }

        // Service credentials are usually injected as secrets rather than written to disk
        if let Some(bind_dn) = lookup("DIRBIND_LDAP_BIND_DN") {
            self.ldap.bind_dn = Some(OneOrMany::One(bind_dn));
        }
        if let Some(password) = lookup("DIRBIND_LDAP_PASSWORD") {
            self.ldap.password = Some(OneOrMany::One(password));
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Settings handed to the network transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Connection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Skip TLS certificate verification (not recommended for production)
    #[serde(default)]
    pub skip_tls_verify: bool,
}

fn default_timeout() -> u64 {
    10
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            skip_tls_verify: false,
        }
    }
}

// ============================================================================
// Raw directory configuration
// ============================================================================

/// A value given either once for every endpoint or once per endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: Clone> OneOrMany<T> {
    /// Expand to exactly `n` values, repeating a single value.
    pub fn broadcast(&self, key: &'static str, n: usize) -> Result<Vec<T>> {
        match self {
            OneOrMany::One(value) => Ok(vec![value.clone(); n]),
            OneOrMany::Many(values) if values.len() == n => Ok(values.clone()),
            OneOrMany::Many(values) => Err(Error::LengthMismatch {
                key,
                expected: n,
                found: values.len(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            OneOrMany::One(_) => 1,
            OneOrMany::Many(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for OneOrMany<String> {
    fn from(value: &str) -> Self {
        OneOrMany::One(value.to_string())
    }
}

impl From<String> for OneOrMany<String> {
    fn from(value: String) -> Self {
        OneOrMany::One(value)
    }
}

impl From<Vec<&str>> for OneOrMany<String> {
    fn from(values: Vec<&str>) -> Self {
        OneOrMany::Many(values.into_iter().map(String::from).collect())
    }
}

impl From<Vec<String>> for OneOrMany<String> {
    fn from(values: Vec<String>) -> Self {
        OneOrMany::Many(values)
    }
}

impl From<u16> for OneOrMany<u16> {
    fn from(value: u16) -> Self {
        OneOrMany::One(value)
    }
}

impl From<Vec<u16>> for OneOrMany<u16> {
    fn from(values: Vec<u16>) -> Self {
        OneOrMany::Many(values)
    }
}

impl From<bool> for OneOrMany<bool> {
    fn from(value: bool) -> Self {
        OneOrMany::One(value)
    }
}

impl From<Vec<bool>> for OneOrMany<bool> {
    fn from(values: Vec<bool>) -> Self {
        OneOrMany::Many(values)
    }
}

/// SASL mechanism preference, shared or per endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MechanismList {
    /// One mechanism list per endpoint
    PerEndpoint(Vec<Vec<String>>),
    /// One list shared by every endpoint
    Shared(Vec<String>),
    Single(String),
}

impl MechanismList {
    fn broadcast(&self, n: usize) -> Result<Vec<Vec<String>>> {
        match self {
            MechanismList::Single(name) => Ok(vec![vec![name.clone()]; n]),
            MechanismList::Shared(names) => Ok(vec![names.clone(); n]),
            // `[]` deserializes as an empty per-endpoint list; it means "no mechanisms"
            MechanismList::PerEndpoint(lists) if lists.is_empty() => Ok(vec![Vec::new(); n]),
            MechanismList::PerEndpoint(lists) if lists.len() == n => Ok(lists.clone()),
            MechanismList::PerEndpoint(lists) => Err(Error::LengthMismatch {
                key: "sasl_mechanisms",
                expected: n,
                found: lists.len(),
            }),
        }
    }
}

impl From<&str> for MechanismList {
    fn from(name: &str) -> Self {
        MechanismList::Single(name.to_string())
    }
}

impl From<Vec<&str>> for MechanismList {
    fn from(names: Vec<&str>) -> Self {
        MechanismList::Shared(names.into_iter().map(String::from).collect())
    }
}

impl From<Vec<Vec<&str>>> for MechanismList {
    fn from(lists: Vec<Vec<&str>>) -> Self {
        MechanismList::PerEndpoint(
            lists
                .into_iter()
                .map(|names| names.into_iter().map(String::from).collect())
                .collect(),
        )
    }
}

/// Transformation applied to the user-supplied identity before searching.
#[derive(Clone)]
pub struct NameProc(Arc<dyn Fn(&str) -> String + Send + Sync>);

impl NameProc {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn identity() -> Self {
        Self::new(|name| name.to_string())
    }

    pub fn apply(&self, name: &str) -> String {
        (self.0)(name)
    }
}

impl Default for NameProc {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Debug for NameProc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NameProc(..)")
    }
}

/// Directory settings exactly as configured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawConfiguration {
    pub host: Option<OneOrMany<String>>,
    pub port: Option<OneOrMany<u16>>,
    /// Transport encryption: plain, tls (STARTTLS) or ssl (LDAPS)
    pub method: Option<OneOrMany<String>>,
    pub bind_dn: Option<OneOrMany<String>>,
    pub password: Option<OneOrMany<String>>,
    pub try_sasl: Option<OneOrMany<bool>>,
    pub sasl_mechanisms: Option<MechanismList>,
    /// Identity attribute, e.g. `uid` or `sAMAccountName`
    pub uid: Option<OneOrMany<String>>,
    pub base: Option<OneOrMany<String>>,
    pub allow_anonymous: Option<OneOrMany<bool>>,
    /// Filter template containing `%{username}`
    pub filter: Option<OneOrMany<String>>,
    #[serde(skip)]
    pub name_proc: Option<NameProc>,
}

/// Required keys; inner slices are alternatives where any one suffices.
const MUST_HAVE_KEYS: &[&[&str]] = &[&["host"], &["port"], &["method"], &["uid", "filter"], &["base"]];

impl RawConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| Error::InvalidConfig(format!("Failed to parse directory settings: {}", e)))
    }

    pub fn host(mut self, host: impl Into<OneOrMany<String>>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: impl Into<OneOrMany<u16>>) -> Self {
        self.port = Some(port.into());
        self
    }

    pub fn method(mut self, method: impl Into<OneOrMany<String>>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn bind_dn(mut self, bind_dn: impl Into<OneOrMany<String>>) -> Self {
        self.bind_dn = Some(bind_dn.into());
        self
    }

    pub fn password(mut self, password: impl Into<OneOrMany<String>>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn try_sasl(mut self, try_sasl: impl Into<OneOrMany<bool>>) -> Self {
        self.try_sasl = Some(try_sasl.into());
        self
    }

    pub fn sasl_mechanisms(mut self, mechanisms: impl Into<MechanismList>) -> Self {
        self.sasl_mechanisms = Some(mechanisms.into());
        self
    }

    pub fn uid(mut self, uid: impl Into<OneOrMany<String>>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    pub fn base(mut self, base: impl Into<OneOrMany<String>>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn allow_anonymous(mut self, allow: impl Into<OneOrMany<bool>>) -> Self {
        self.allow_anonymous = Some(allow.into());
        self
    }

    pub fn filter(mut self, filter: impl Into<OneOrMany<String>>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn name_proc<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.name_proc = Some(NameProc::new(f));
        self
    }

    fn is_present(&self, key: &str) -> bool {
        match key {
            "host" => self.host.is_some(),
            "port" => self.port.is_some(),
            "method" => self.method.is_some(),
            "uid" => self.uid.is_some(),
            "filter" => self.filter.is_some(),
            "base" => self.base.is_some(),
            _ => false,
        }
    }

    /// Check that every required key (or one of its alternatives) is present.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<String> = MUST_HAVE_KEYS
            .iter()
            .filter(|names| names.iter().all(|name| !self.is_present(name)))
            .map(|names| names.join(" or "))
            .collect();

        if !missing.is_empty() {
            return Err(Error::MissingKeys(missing));
        }
        Ok(())
    }

    /// Expand into one settings record per endpoint, in configuration order.
    pub fn normalize(&self) -> Result<NormalizedConfiguration> {
        self.validate()?;

        let hosts = match &self.host {
            Some(OneOrMany::One(host)) => vec![host.clone()],
            Some(OneOrMany::Many(hosts)) => hosts.clone(),
            None => Vec::new(),
        };
        if hosts.is_empty() {
            return Err(Error::InvalidConfig("host list is empty".into()));
        }
        let n = hosts.len();

        let ports = required(&self.port, "port", n)?;
        let methods = required(&self.method, "method", n)?;
        let bases = required(&self.base, "base", n)?;
        let bind_dns = optional(&self.bind_dn, "bind_dn", n)?;
        let passwords = optional(&self.password, "password", n)?;
        let try_sasl = optional(&self.try_sasl, "try_sasl", n)?;
        let allow_anonymous = optional(&self.allow_anonymous, "allow_anonymous", n)?;
        let uids = optional(&self.uid, "uid", n)?;
        let filters = optional(&self.filter, "filter", n)?;
        let mechanisms = match &self.sasl_mechanisms {
            Some(list) => list.broadcast(n)?,
            None => vec![Vec::new(); n],
        };

        let mut endpoints = Vec::with_capacity(n);
        for (index, host) in hosts.into_iter().enumerate() {
            let uid = non_empty(&uids[index]);
            let filter = non_empty(&filters[index]);
            if uid.is_none() && filter.is_none() {
                return Err(Error::MissingKeys(vec!["uid or filter".into()]));
            }

            endpoints.push(EndpointSettings {
                index,
                host,
                port: ports[index],
                encryption: Encryption::from_method(&methods[index])?,
                base: bases[index].clone(),
                bind_dn: non_empty(&bind_dns[index]),
                password: non_empty(&passwords[index]),
                try_sasl: try_sasl[index].unwrap_or(false),
                allow_anonymous: allow_anonymous[index].unwrap_or(false),
                sasl_mechanisms: mechanisms[index].clone(),
                uid,
                filter,
            });
        }

        Ok(NormalizedConfiguration {
            endpoints,
            name_proc: self.name_proc.clone().unwrap_or_default(),
        })
    }
}

fn required<T: Clone>(value: &Option<OneOrMany<T>>, key: &'static str, n: usize) -> Result<Vec<T>> {
    match value {
        Some(value) => value.broadcast(key, n),
        None => Err(Error::MissingKeys(vec![key.to_string()])),
    }
}

fn optional<T: Clone>(
    value: &Option<OneOrMany<T>>,
    key: &'static str,
    n: usize,
) -> Result<Vec<Option<T>>> {
    match value {
        Some(value) => Ok(value.broadcast(key, n)?.into_iter().map(Some).collect()),
        None => Ok(vec![None; n]),
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

// ============================================================================
// Normalized configuration
// ============================================================================

/// Transport encryption for one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encryption {
    /// Plain LDAP
    None,
    /// LDAPS (TLS from the first byte)
    Tls,
    /// Plain LDAP upgraded with STARTTLS
    StartTls,
}

impl Encryption {
    /// Parse a configured connect method (case-insensitive).
    pub fn from_method(method: &str) -> Result<Self> {
        match method.to_ascii_lowercase().as_str() {
            "plain" => Ok(Encryption::None),
            "tls" => Ok(Encryption::StartTls),
            "ssl" => Ok(Encryption::Tls),
            _ => Err(Error::UnknownMethod(method.to_string())),
        }
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            Encryption::Tls => "ldaps",
            Encryption::None | Encryption::StartTls => "ldap",
        }
    }
}

/// Settings for one directory endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointSettings {
    /// Position in configuration order
    pub index: usize,
    pub host: String,
    pub port: u16,
    pub encryption: Encryption,
    pub base: String,
    pub bind_dn: Option<String>,
    pub password: Option<String>,
    pub try_sasl: bool,
    pub allow_anonymous: bool,
    pub sasl_mechanisms: Vec<String>,
    pub uid: Option<String>,
    pub filter: Option<String>,
}

impl EndpointSettings {
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.encryption.scheme(), self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct NormalizedConfiguration {
    pub endpoints: Vec<EndpointSettings>,
    pub name_proc: NameProc,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> RawConfiguration {
        RawConfiguration::new()
            .host("192.168.1.145")
            .method("plain")
            .base("dc=intridea, dc=com")
            .port(389)
            .uid("sAMAccountName")
    }

    #[test]
    fn test_missing_keys_are_listed() {
        let config = RawConfiguration::new().host("192.168.1.145").method("plain");
        let err = config.normalize().unwrap_err();
        assert_eq!(err.to_string(), "port, uid or filter, base MUST be provided");
        assert_eq!(err.code(), "ConfigurationError");
    }

    #[test]
    fn test_filter_satisfies_uid_group() {
        let mut config = base_config();
        config.uid = None;
        config.filter = Some("(mail=%{username})".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_method() {
        let config = base_config().method("myplain");
        match config.normalize() {
            Err(Error::UnknownMethod(method)) => assert_eq!(method, "myplain"),
            other => panic!("expected UnknownMethod, got {:?}", other),
        }
    }

    #[test]
    fn test_method_mapping() {
        assert_eq!(Encryption::from_method("PLAIN").unwrap(), Encryption::None);
        assert_eq!(Encryption::from_method("tls").unwrap(), Encryption::StartTls);
        assert_eq!(Encryption::from_method("ssl").unwrap(), Encryption::Tls);
        assert_eq!(Encryption::Tls.scheme(), "ldaps");
    }

    #[test]
    fn test_scalars_broadcast_to_single_endpoint() {
        let normalized = base_config().normalize().unwrap();
        assert_eq!(normalized.endpoints.len(), 1);

        let endpoint = &normalized.endpoints[0];
        assert_eq!(endpoint.host, "192.168.1.145");
        assert_eq!(endpoint.port, 389);
        assert_eq!(endpoint.base, "dc=intridea, dc=com");
        assert_eq!(endpoint.uid.as_deref(), Some("sAMAccountName"));
        assert!(!endpoint.allow_anonymous);
        assert!(!endpoint.try_sasl);
        assert!(endpoint.bind_dn.is_none());
        assert_eq!(endpoint.url(), "ldap://192.168.1.145:389");
        assert_eq!(normalized.name_proc.apply("Jane"), "Jane");
    }

    #[test]
    fn test_parallel_lists_keep_pairing() {
        let config = RawConfiguration::new()
            .host(vec!["192.168.1.145", "192.168.1.146"])
            .method(vec!["plain", "ssl"])
            .base(vec!["ou=int1, dc=intridea, dc=com", "ou=int2, dc=intridea, dc=com"])
            .port(vec![389, 636])
            .uid(vec!["sAMAccountName", "uid"])
            .bind_dn(vec!["bind_dn1", "bind_dn2"])
            .password(vec!["password1", "password2"]);

        let endpoints = config.normalize().unwrap().endpoints;
        assert_eq!(endpoints.len(), 2);

        assert_eq!(endpoints[0].index, 0);
        assert_eq!(endpoints[0].host, "192.168.1.145");
        assert_eq!(endpoints[0].base, "ou=int1, dc=intridea, dc=com");
        assert_eq!(endpoints[0].bind_dn.as_deref(), Some("bind_dn1"));
        assert_eq!(endpoints[0].uid.as_deref(), Some("sAMAccountName"));
        assert_eq!(endpoints[0].encryption, Encryption::None);

        assert_eq!(endpoints[1].index, 1);
        assert_eq!(endpoints[1].host, "192.168.1.146");
        assert_eq!(endpoints[1].port, 636);
        assert_eq!(endpoints[1].password.as_deref(), Some("password2"));
        assert_eq!(endpoints[1].uid.as_deref(), Some("uid"));
        assert_eq!(endpoints[1].encryption, Encryption::Tls);
    }

    #[test]
    fn test_length_mismatch_fails_fast() {
        let config = base_config()
            .host(vec!["a.example.com", "b.example.com"])
            .base(vec!["dc=a", "dc=b", "dc=c"]);

        match config.normalize() {
            Err(Error::LengthMismatch { key, expected, found }) => {
                assert_eq!(key, "base");
                assert_eq!(expected, 2);
                assert_eq!(found, 3);
            }
            other => panic!("expected LengthMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_mechanism_lists() {
        let two_hosts = base_config().host(vec!["a", "b"]);

        let shared = two_hosts.clone().sasl_mechanisms(vec!["DIGEST-MD5", "GSS-SPNEGO"]);
        let endpoints = shared.normalize().unwrap().endpoints;
        assert_eq!(endpoints[0].sasl_mechanisms, vec!["DIGEST-MD5", "GSS-SPNEGO"]);
        assert_eq!(endpoints[1].sasl_mechanisms, vec!["DIGEST-MD5", "GSS-SPNEGO"]);

        let per_endpoint = two_hosts
            .clone()
            .sasl_mechanisms(vec![vec!["GSS-SPNEGO"], vec!["DIGEST-MD5"]]);
        let endpoints = per_endpoint.normalize().unwrap().endpoints;
        assert_eq!(endpoints[0].sasl_mechanisms, vec!["GSS-SPNEGO"]);
        assert_eq!(endpoints[1].sasl_mechanisms, vec!["DIGEST-MD5"]);

        let wrong = two_hosts.sasl_mechanisms(vec![vec!["GSS-SPNEGO"]]);
        assert!(matches!(
            wrong.normalize(),
            Err(Error::LengthMismatch { key: "sasl_mechanisms", .. })
        ));
    }

    #[test]
    fn test_empty_credentials_are_absent() {
        let config = base_config().bind_dn("").password("secret");
        let endpoint = &config.normalize().unwrap().endpoints[0];
        assert!(endpoint.bind_dn.is_none());
        assert_eq!(endpoint.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_empty_uid_without_filter_is_missing() {
        let err = base_config().uid("").normalize().unwrap_err();
        assert!(matches!(&err, Error::MissingKeys(keys) if keys == &["uid or filter"]));
        assert_eq!(err.code(), "ConfigurationError");

        let mut config = base_config();
        config.uid = None;
        config.filter = Some(String::new().into());
        assert!(matches!(config.normalize(), Err(Error::MissingKeys(_))));

        // Only the endpoint with neither key set is rejected
        let mixed = base_config()
            .host(vec!["a", "b"])
            .uid(vec!["uid", ""])
            .filter(vec!["", "(mail=%{username})"]);
        assert!(mixed.normalize().is_ok());
    }

    #[test]
    fn test_name_proc_is_kept() {
        let config = base_config().name_proc(|name| name.split('@').next().unwrap_or(name).to_string());
        let normalized = config.normalize().unwrap();
        assert_eq!(normalized.name_proc.apply("jane@example.com"), "jane");
    }

    #[test]
    fn test_from_json_map() {
        let raw = RawConfiguration::from_json(serde_json::json!({
            "host": ["192.168.1.145", "192.168.1.146"],
            "method": "plain",
            "port": 389,
            "base": "dc=intridea, dc=com",
            "filter": "(mail=%{username})",
            "try_sasl": [true, false],
            "sasl_mechanisms": [["GSS-SPNEGO"], ["DIGEST-MD5"]]
        }))
        .unwrap();

        let endpoints = raw.normalize().unwrap().endpoints;
        assert_eq!(endpoints.len(), 2);
        assert!(endpoints[0].try_sasl);
        assert!(!endpoints[1].try_sasl);
        assert_eq!(endpoints[1].filter.as_deref(), Some("(mail=%{username})"));
        assert_eq!(endpoints[1].sasl_mechanisms, vec!["DIGEST-MD5"]);
    }

    #[test]
    fn test_toml_file_layout() {
        let config = DirbindConfig::from_toml_str(
            r#"
            [logging]
            level = "debug"
            format = "json"

            [ldap]
            host = ["dc1.example.com", "dc2.example.com"]
            port = 389
            method = "tls"
            base = "dc=example,dc=com"
            uid = "sAMAccountName"
            sasl_mechanisms = "DIGEST-MD5"

            [transport]
            timeout_seconds = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.transport.timeout_seconds, 3);
        assert!(!config.transport.skip_tls_verify);

        let endpoints = config.ldap.normalize().unwrap().endpoints;
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[1].encryption, Encryption::StartTls);
        assert_eq!(endpoints[1].sasl_mechanisms, vec!["DIGEST-MD5"]);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = DirbindConfig::default();
        config.apply_overrides(|name| match name {
            "DIRBIND_LOG_LEVEL" => Some("trace".to_string()),
            "DIRBIND_LDAP_BIND_DN" => Some("cn=svc,dc=example,dc=com".to_string()),
            "DIRBIND_LDAP_PASSWORD" => Some("s3cret".to_string()),
            _ => None,
        });

        assert_eq!(config.logging.level, "trace");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(
            config.ldap.bind_dn,
            Some(OneOrMany::One("cn=svc,dc=example,dc=com".to_string()))
        );
        assert_eq!(config.ldap.password, Some(OneOrMany::One("s3cret".to_string())));
    }

    #[test]
    fn test_missing_config_file() {
        let err = DirbindConfig::from_file("/nonexistent/dirbind.toml").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
