//! Client configuration.
//!
//! The authentication type is kept as a raw string so a configuration can
//! be loaded from JSON without validation; `CiviClient::new` is the single
//! place where it is checked.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Everything a `CiviClient` needs apart from its transport.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// One of `basic`, `bearer_api_key`, `bearer_jwt`.
    pub authentication_type: String,
    /// Credential for the chosen authentication type.
    pub authentication_key: String,
    /// Extra headers sent with every request. These win over the default and
    /// authentication headers on a name clash.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl ClientConfig {
    pub fn new(authentication_type: impl Into<String>, authentication_key: impl Into<String>) -> Self {
        Self {
            authentication_type: authentication_type.into(),
            authentication_key: authentication_key.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("authentication_type", &self.authentication_type)
            .field("authentication_key", &"<redacted>")
            .field("headers", &self.headers)
            .finish()
    }
}
