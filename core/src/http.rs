//! HTTP request descriptor handed to the transport.
//!
//! # Design
//! Requests are plain data. The core builds an `HttpRequest` and the
//! injected transport performs the actual I/O, so request construction stays
//! deterministic and can be tested without a network. The path is relative
//! to the CiviCRM site root; the transport decides which host to talk to.
//!
//! All fields use owned types (`String`, `Vec`) so a request can be moved
//! into the transport without lifetime concerns.

use std::fmt;

/// HTTP method for a request. API4 only ever needs GET and POST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request described as plain data.
///
/// Built by `ActionRequest::build` without headers; `CiviClient` fills in
/// `headers` before passing it to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    /// Already-encoded query string, without the leading `?`.
    pub query: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    /// Path and query joined into a request target.
    pub fn uri(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{query}", self.path),
            None => self.path.clone(),
        }
    }

    /// First header value whose name matches `name`, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}
