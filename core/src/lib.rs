//! Synchronous client core for the CiviCRM API4 AJAX endpoint.
//!
//! # Overview
//! Turns entity/action calls such as "get Contact" into `HttpRequest`
//! values, attaches the `X-Civi-Auth` and AJAX headers, and hands the result
//! to an injected [`Transport`]. The transport's response is returned as-is.
//!
//! # Design
//! - `auth` validates the three authentication modes and derives the header
//!   scheme from a closed enum.
//! - `request` builds method, path and `params` query with no I/O.
//! - `CiviClient` computes its headers per call and holds no mutable state.
//! - Network I/O, TLS and retries belong to the transport.
//!
//! ```
//! use civicrm_core::{CiviClient, ClientConfig, HttpRequest, Params, Transport};
//!
//! #[derive(Debug)]
//! struct Dry;
//!
//! impl Transport for Dry {
//!     type Response = String;
//!     type Error = std::convert::Infallible;
//!
//!     fn send(&self, request: HttpRequest) -> Result<String, Self::Error> {
//!         Ok(format!("{} {}", request.method, request.uri()))
//!     }
//! }
//!
//! let client = CiviClient::new(Dry, ClientConfig::new("bearer_api_key", "key")).unwrap();
//! let sent = client.get("Contact", Params::new()).unwrap();
//! assert_eq!(sent, "GET /civicrm/ajax/api4/Contact/get");
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod request;
pub mod transport;

pub use auth::{header_value, is_valid_mode, AuthMode, Credentials, AUTH_HEADER};
pub use client::{CiviClient, DEFAULT_HEADERS, VERSION};
pub use config::ClientConfig;
pub use error::{ClientError, ConfigError, RequestError};
pub use http::{HttpMethod, HttpRequest};
pub use request::{build, method_for_action, ActionRequest, Params, BASE_ENDPOINT};
pub use transport::Transport;
