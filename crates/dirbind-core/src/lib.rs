//! Dirbind Core Library
//!
//! Error taxonomy, configuration model and logging setup shared by the Dirbind crates.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{
    DirbindConfig, Encryption, EndpointSettings, MechanismList, NameProc,
    NormalizedConfiguration, OneOrMany, RawConfiguration, TransportConfig,
};
pub use error::{Error, ErrorKind, Result};

/// Dirbind version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

