//! Error types for the CiviCRM API client.
//!
//! # Design
//! Failures fall into three groups with different lifetimes. `ConfigError`
//! can only happen while constructing a client, `RequestError` while turning
//! an entity/action call into an `HttpRequest`, and anything the transport
//! reports is handed back through `ClientError::Transport` exactly as the
//! transport produced it. Nothing here is retried.

use thiserror::Error;

/// Errors raised while constructing a `CiviClient`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The authentication type is not one of `basic`, `bearer_api_key`,
    /// `bearer_jwt`.
    #[error("Invalid authentication type {0}.")]
    InvalidAuthenticationType(String),

    /// A JSON client configuration could not be parsed.
    #[error("invalid client configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors raised while building an `HttpRequest`, before any I/O.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The action requires parameters and the params map is empty.
    #[error("This request requires parameters but none have been provided.")]
    MissingParams,

    /// The params envelope could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors returned by `CiviClient` operations.
///
/// `E` is the transport's own error type. It is stored untouched, and both
/// `Display` and `source()` delegate to it.
#[derive(Debug, Error)]
pub enum ClientError<E> {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Transport(E),
}

impl<E> ClientError<E> {
    /// The transport error, if the failure came from the transport.
    pub fn into_transport(self) -> Option<E> {
        match self {
            ClientError::Transport(err) => Some(err),
            ClientError::Request(_) => None,
        }
    }

    pub fn is_missing_params(&self) -> bool {
        matches!(self, ClientError::Request(RequestError::MissingParams))
    }
}
