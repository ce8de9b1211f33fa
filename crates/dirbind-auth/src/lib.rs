//! Directory authentication for Dirbind

pub mod ldap;

pub use ldap::{
    AuthDescriptor, BindAsRequest, BindMethod, ChallengeResponder, ConnectionPool,
    DirectoryConnector, DirectoryEntry, DirectorySession, EndpointSpec, ErrorReporter,
    Filter, LdapAdaptor, Ldap3Connector, Password, SaslAuth, SaslMechanism, SearchOutcome,
    SearchQuery, SearchRequest, SearchScope, TracingReporter,
};
