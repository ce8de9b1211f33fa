//! Service bind selection for one endpoint

use crate::ldap::sasl;
use crate::ldap::types::AuthDescriptor;
use dirbind_core::{EndpointSettings, Result};
use tracing::debug;

/// Choose how an endpoint's service connection authenticates.
///
/// SASL wins when enabled and any configured mechanism is supported, even if anonymous
/// access is allowed. Otherwise the connection is anonymous unless both credentials
/// are present and anonymous access is not allowed.
pub fn select_auth(settings: &EndpointSettings) -> Result<AuthDescriptor> {
    if settings.try_sasl {
        let auths = sasl::negotiate(
            &settings.sasl_mechanisms,
            settings.bind_dn.as_deref(),
            settings.password.as_deref(),
            &settings.host,
        )?;

        if let Some(auth) = auths.into_iter().next() {
            return Ok(auth);
        }
        debug!(
            "No supported SASL mechanism for {}, falling back",
            settings.host
        );
    }

    match (&settings.bind_dn, &settings.password) {
        (Some(username), Some(password)) if !settings.allow_anonymous => {
            Ok(AuthDescriptor::Simple {
                username: username.clone(),
                password: password.clone(),
            })
        }
        _ => Ok(AuthDescriptor::Anonymous),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ldap::types::BindMethod;
    use dirbind_core::{Encryption, Error};

    fn settings() -> EndpointSettings {
        EndpointSettings {
            index: 0,
            host: "192.168.1.145".into(),
            port: 389,
            encryption: Encryption::None,
            base: "dc=intridea, dc=com".into(),
            bind_dn: None,
            password: None,
            try_sasl: false,
            allow_anonymous: false,
            sasl_mechanisms: Vec::new(),
            uid: Some("sAMAccountName".into()),
            filter: None,
        }
    }

    fn with_credentials() -> EndpointSettings {
        EndpointSettings {
            bind_dn: Some("bind_dn".into()),
            password: Some("password".into()),
            ..settings()
        }
    }

    #[test]
    fn test_anonymous_without_credentials() {
        assert_eq!(select_auth(&settings()).unwrap().method(), BindMethod::Anonymous);

        let half = EndpointSettings {
            bind_dn: Some("bind_dn".into()),
            ..settings()
        };
        assert_eq!(select_auth(&half).unwrap().method(), BindMethod::Anonymous);
    }

    #[test]
    fn test_simple_with_credentials() {
        match select_auth(&with_credentials()).unwrap() {
            AuthDescriptor::Simple { username, password } => {
                assert_eq!(username, "bind_dn");
                assert_eq!(password, "password");
            }
            other => panic!("expected simple bind, got {:?}", other),
        }
    }

    #[test]
    fn test_allow_anonymous_wins_over_credentials() {
        let settings = EndpointSettings {
            allow_anonymous: true,
            ..with_credentials()
        };
        assert_eq!(select_auth(&settings).unwrap().method(), BindMethod::Anonymous);
    }

    #[test]
    fn test_sasl_wins_over_anonymous() {
        let settings = EndpointSettings {
            try_sasl: true,
            allow_anonymous: true,
            sasl_mechanisms: vec!["DIGEST-MD5".into()],
            ..with_credentials()
        };
        match select_auth(&settings).unwrap() {
            AuthDescriptor::Sasl(sasl) => {
                assert_eq!(sasl.mechanism, "DIGEST-MD5");
                assert!(sasl.initial_credential.is_empty());
            }
            other => panic!("expected SASL, got {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_sasl_falls_back() {
        let settings = EndpointSettings {
            try_sasl: true,
            sasl_mechanisms: vec!["PLAIN".into()],
            ..with_credentials()
        };
        assert_eq!(select_auth(&settings).unwrap().method(), BindMethod::Simple);
    }

    #[test]
    fn test_gss_spnego_without_password_fails() {
        let settings = EndpointSettings {
            try_sasl: true,
            sasl_mechanisms: vec!["GSS-SPNEGO".into()],
            bind_dn: Some("bind_dn".into()),
            ..settings()
        };
        assert!(matches!(
            select_auth(&settings),
            Err(Error::InvalidBindingInformation(_))
        ));
    }
}
