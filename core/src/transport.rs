//! The seam between request building and network I/O.
//!
//! The client never opens a connection itself. Whatever implements
//! `Transport` owns the host, TLS, timeouts and retries, and chooses its own
//! response and error types; `CiviClient` returns both untouched.

use crate::http::HttpRequest;

/// Executes a fully built `HttpRequest`.
pub trait Transport {
    type Response;
    type Error;

    fn send(&self, request: HttpRequest) -> Result<Self::Response, Self::Error>;
}

impl<T: Transport + ?Sized> Transport for &T {
    type Response = T::Response;
    type Error = T::Error;

    fn send(&self, request: HttpRequest) -> Result<Self::Response, Self::Error> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    type Response = T::Response;
    type Error = T::Error;

    fn send(&self, request: HttpRequest) -> Result<Self::Response, Self::Error> {
        (**self).send(request)
    }
}
