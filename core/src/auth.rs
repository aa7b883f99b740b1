//! Authentication modes accepted by the CiviCRM API4 AJAX endpoint.
//!
//! # Design
//! The set of modes is closed: CiviCRM's `authx` extension only understands
//! basic tokens, API keys and JWTs. Adding a mode is a code change, so the
//! scheme selection is an exhaustive `match` rather than a lookup table.
//! Both bearer variants send the same `Bearer` scheme; the server tells them
//! apart by the shape of the credential.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Header carrying the credential on every request.
pub const AUTH_HEADER: &str = "X-Civi-Auth";

/// One of the credential schemes the client can authenticate with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    Basic,
    BearerApiKey,
    BearerJwt,
}

impl AuthMode {
    /// Every supported mode.
    pub const ALL: [AuthMode; 3] = [AuthMode::Basic, AuthMode::BearerApiKey, AuthMode::BearerJwt];

    /// Wire name of the mode, as accepted by [`AuthMode::from_str`].
    pub fn as_str(self) -> &'static str {
        match self {
            AuthMode::Basic => "basic",
            AuthMode::BearerApiKey => "bearer_api_key",
            AuthMode::BearerJwt => "bearer_jwt",
        }
    }

    /// HTTP authorization scheme sent in front of the credential.
    pub fn scheme(self) -> &'static str {
        match self {
            AuthMode::Basic => "Basic",
            AuthMode::BearerApiKey | AuthMode::BearerJwt => "Bearer",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMode {
    type Err = ConfigError;

    /// Exact, case-sensitive match against the wire names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuthMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| ConfigError::InvalidAuthenticationType(s.to_string()))
    }
}

/// Returns true iff `mode` is exactly one of `basic`, `bearer_api_key` or
/// `bearer_jwt`.
pub fn is_valid_mode(mode: &str) -> bool {
    mode.parse::<AuthMode>().is_ok()
}

/// Value of the [`AUTH_HEADER`] header for `credential` under `mode`.
pub fn header_value(mode: AuthMode, credential: &str) -> String {
    format!("{} {credential}", mode.scheme())
}

/// An authentication mode paired with its opaque credential.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    mode: AuthMode,
    key: String,
}

impl Credentials {
    pub fn new(mode: AuthMode, key: impl Into<String>) -> Self {
        Self {
            mode,
            key: key.into(),
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn header_value(&self) -> String {
        header_value(self.mode, &self.key)
    }
}

// Keep keys out of logs and panic messages.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("mode", &self.mode)
            .field("key", &"<redacted>")
            .finish()
    }
}
