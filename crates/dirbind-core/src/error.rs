//! Error types for Dirbind

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Configuration Errors
    #[error("{} MUST be provided", .0.join(", "))]
    MissingKeys(Vec<String>),

    #[error("{0:?} is not one of the available connect methods: plain, tls, ssl")]
    UnknownMethod(String),

    #[error("{key} has {found} values but {expected} endpoints are configured")]
    LengthMismatch {
        key: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Authentication Setup Errors
    #[error("Invalid binding information: {0}")]
    InvalidBindingInformation(String),

    // Directory Protocol Errors
    #[error("Directory error: {0}")]
    Directory(String),

    #[error("SASL exchange failed: {0}")]
    Sasl(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Broad classes of failure, used to decide whether an error is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Raised at construction; the deployment must be fixed.
    Configuration,
    /// Raised while preparing SASL credentials.
    AuthenticationSetup,
    /// Raised by one directory endpoint; recoverable.
    DirectoryProtocol,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingKeys(_)
            | Error::UnknownMethod(_)
            | Error::LengthMismatch { .. }
            | Error::InvalidConfig(_) => ErrorKind::Configuration,

            Error::InvalidBindingInformation(_) => ErrorKind::AuthenticationSetup,

            Error::Directory(_) | Error::Sasl(_) => ErrorKind::DirectoryProtocol,

            Error::Io(_) | Error::Other(_) => ErrorKind::Internal,
        }
    }

    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Configuration => "ConfigurationError",
            ErrorKind::AuthenticationSetup => "AuthenticationSetupError",
            ErrorKind::DirectoryProtocol => "DirectoryProtocolError",
            ErrorKind::Internal => "InternalError",
        }
    }

    /// Whether the adaptor may swallow this error and move on to the next endpoint.
    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::DirectoryProtocol
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keys_message() {
        let err = Error::MissingKeys(vec!["port".into(), "uid or filter".into()]);
        assert_eq!(err.to_string(), "port, uid or filter MUST be provided");
        assert_eq!(err.code(), "ConfigurationError");
    }

    #[test]
    fn test_unknown_method_message() {
        let err = Error::UnknownMethod("myplain".into());
        assert_eq!(
            err.to_string(),
            "\"myplain\" is not one of the available connect methods: plain, tls, ssl"
        );
    }

    #[test]
    fn test_error_kinds() {
        assert!(Error::Directory("timeout".into()).is_recoverable());
        assert!(!Error::InvalidBindingInformation("no password".into()).is_recoverable());
        assert_eq!(
            Error::InvalidBindingInformation(String::new()).kind(),
            ErrorKind::AuthenticationSetup
        );
    }
}
