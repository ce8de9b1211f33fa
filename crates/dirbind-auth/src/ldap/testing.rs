//! In-memory directory used by the unit tests

use crate::ldap::directory::{DirectoryConnector, DirectorySession, SaslBindStep};
use crate::ldap::types::{DirectoryEntry, EndpointSpec, SearchRequest};
use async_trait::async_trait;
use dirbind_core::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Connect(String),
    Search {
        host: String,
        base: String,
        filter: String,
    },
    SimpleBind {
        host: String,
        dn: String,
        password: String,
    },
    SaslBind {
        host: String,
        mechanism: String,
        credentials: Vec<u8>,
    },
    Unbind(String),
}

/// Scripted behaviour of one directory server
#[derive(Debug, Clone)]
pub struct ScriptedEndpoint {
    connect_error: Option<String>,
    search_error: Option<String>,
    entries: Vec<DirectoryEntry>,
    accepted: Vec<(String, String)>,
    sasl_challenges: Vec<Vec<u8>>,
    sasl_accepts: bool,
}

impl ScriptedEndpoint {
    /// Accepts anonymous binds and any SASL exchange; searches find nothing.
    pub fn new() -> Self {
        Self {
            connect_error: None,
            search_error: None,
            entries: Vec::new(),
            accepted: vec![(String::new(), String::new())],
            sasl_challenges: Vec::new(),
            sasl_accepts: true,
        }
    }

    pub fn accept(mut self, dn: &str, password: &str) -> Self {
        self.accepted.push((dn.to_string(), password.to_string()));
        self
    }

    pub fn reject_anonymous(mut self) -> Self {
        self.accepted.retain(|(dn, _)| !dn.is_empty());
        self
    }

    pub fn entries(mut self, entries: Vec<DirectoryEntry>) -> Self {
        self.entries = entries;
        self
    }

    pub fn search_error(mut self, message: &str) -> Self {
        self.search_error = Some(message.to_string());
        self
    }

    pub fn connect_error(mut self, message: &str) -> Self {
        self.connect_error = Some(message.to_string());
        self
    }

    /// Every SASL exchange sees these challenges in order, then the verdict.
    pub fn sasl(mut self, challenges: Vec<Vec<u8>>, accepts: bool) -> Self {
        self.sasl_challenges = challenges;
        self.sasl_accepts = accepts;
        self
    }
}

#[derive(Debug, Default)]
pub struct ScriptedDirectory {
    endpoints: HashMap<String, ScriptedEndpoint>,
    calls: Arc<Mutex<Vec<Call>>>,
    no_sasl: bool,
}

impl ScriptedDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint(mut self, host: &str, script: ScriptedEndpoint) -> Self {
        self.endpoints.insert(host.to_string(), script);
        self
    }

    /// Behave like a transport that cannot carry SASL binds.
    pub fn without_sasl(mut self) -> Self {
        self.no_sasl = true;
        self
    }

    /// Open a session directly, bypassing the connector.
    pub fn session(&self, host: &str) -> Box<dyn DirectorySession> {
        Box::new(ScriptedSession {
            host: host.to_string(),
            script: self
                .endpoints
                .get(host)
                .cloned()
                .unwrap_or_else(ScriptedEndpoint::new),
            calls: self.calls.clone(),
            round: 0,
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| predicate(*call)).count()
    }

    pub fn searches(&self) -> Vec<(String, String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Search { host, base, filter } => Some((host, base, filter)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl DirectoryConnector for ScriptedDirectory {
    async fn connect(&self, endpoint: &EndpointSpec) -> Result<Box<dyn DirectorySession>> {
        let host = endpoint.host().to_string();
        self.calls.lock().push(Call::Connect(host.clone()));

        match self.endpoints.get(&host) {
            None => Err(Error::Directory(format!("no route to {}", host))),
            Some(script) => match &script.connect_error {
                Some(message) => Err(Error::Directory(message.clone())),
                None => Ok(self.session(&host)),
            },
        }
    }

    fn supports_sasl(&self) -> bool {
        !self.no_sasl
    }
}

struct ScriptedSession {
    host: String,
    script: ScriptedEndpoint,
    calls: Arc<Mutex<Vec<Call>>>,
    round: usize,
}

#[async_trait]
impl DirectorySession for ScriptedSession {
    async fn search(&mut self, request: &SearchRequest) -> Result<Vec<DirectoryEntry>> {
        self.calls.lock().push(Call::Search {
            host: self.host.clone(),
            base: request.base.clone(),
            filter: request.filter.to_string(),
        });

        if let Some(message) = &self.script.search_error {
            return Err(Error::Directory(message.clone()));
        }

        let mut entries = self.script.entries.clone();
        if let Some(limit) = request.size_limit.filter(|limit| *limit > 0) {
            entries.truncate(limit as usize);
        }
        Ok(entries)
    }

    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<bool> {
        self.calls.lock().push(Call::SimpleBind {
            host: self.host.clone(),
            dn: dn.to_string(),
            password: password.to_string(),
        });

        Ok(self
            .script
            .accepted
            .iter()
            .any(|(d, p)| d == dn && p == password))
    }

    async fn sasl_bind(&mut self, mechanism: &str, credentials: &[u8]) -> Result<SaslBindStep> {
        self.calls.lock().push(Call::SaslBind {
            host: self.host.clone(),
            mechanism: mechanism.to_string(),
            credentials: credentials.to_vec(),
        });

        if let Some(challenge) = self.script.sasl_challenges.get(self.round) {
            self.round += 1;
            return Ok(SaslBindStep::Challenge(challenge.clone()));
        }

        self.round = 0;
        Ok(SaslBindStep::Done(self.script.sasl_accepts))
    }

    async fn unbind(&mut self) -> Result<()> {
        self.calls.lock().push(Call::Unbind(self.host.clone()));
        Ok(())
    }
}
