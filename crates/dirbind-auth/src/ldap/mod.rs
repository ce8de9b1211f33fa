//! LDAP authentication module
//!
//! Binds end users against one or more directory servers:
//! - Per-endpoint bind strategy (anonymous, simple, SASL)
//! - DIGEST-MD5 and GSS-SPNEGO (NTLMv2) SASL exchanges
//! - Search-then-bind with first-success-wins across endpoints
//! - TLS/STARTTLS support through ldap3

mod adaptor;
mod client;
mod directory;
mod pool;
pub mod sasl;
pub mod strategy;
mod types;

#[cfg(test)]
mod testing;

pub use adaptor::{ErrorReporter, LdapAdaptor, TracingReporter};
pub use client::Ldap3Connector;
pub use directory::{perform_bind, DirectoryConnector, DirectorySession, SaslBindStep, MAX_SASL_ROUNDS};
pub use pool::{Connection, ConnectionPool};
pub use sasl::SaslMechanism;
pub use types::*;
