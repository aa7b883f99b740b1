//! Entity/action client for the CiviCRM API4 AJAX endpoint.
//!
//! # Design
//! `CiviClient` holds its credentials, custom headers and an injected
//! `Transport`, and carries no mutable state between calls. Every action
//! method funnels into `request`, which builds the `HttpRequest`, attaches a
//! header list computed fresh for that call, and hands it to the transport.
//! The transport's response and error come back unmodified.

use tracing::{debug, warn};

use crate::auth::{AuthMode, Credentials, AUTH_HEADER};
use crate::config::ClientConfig;
use crate::error::{ClientError, ConfigError, RequestError};
use crate::http::HttpRequest;
use crate::request::{ActionRequest, Params};
use crate::transport::Transport;

/// Crate version, for user agents and diagnostics.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Header every AJAX call carries so CiviCRM treats it as an API request.
pub const DEFAULT_HEADERS: [(&str, &str); 1] = [("X-Requested-With", "XMLHttpRequest")];

/// Synchronous client for the CiviCRM API4 AJAX endpoint.
#[derive(Debug, Clone)]
pub struct CiviClient<T> {
    transport: T,
    credentials: Credentials,
    custom_headers: Vec<(String, String)>,
}

impl<T: Transport> CiviClient<T> {
    /// Fails if `config.authentication_type` is not a known mode.
    pub fn new(transport: T, config: ClientConfig) -> Result<Self, ConfigError> {
        let mode: AuthMode = config.authentication_type.parse()?;
        Ok(Self {
            transport,
            credentials: Credentials::new(mode, config.authentication_key),
            custom_headers: config.headers.into_iter().collect(),
        })
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.credentials.mode()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn get_actions(&self, entity: &str, params: Params) -> Result<T::Response, ClientError<T::Error>> {
        self.request(entity, "getactions", params, false)
    }

    pub fn get_fields(&self, entity: &str, params: Params) -> Result<T::Response, ClientError<T::Error>> {
        self.request(entity, "getfields", params, false)
    }

    pub fn get(&self, entity: &str, params: Params) -> Result<T::Response, ClientError<T::Error>> {
        self.request(entity, "get", params, false)
    }

    /// CiviCRM accepts `create` without params and stores an empty record,
    /// so params are not required here.
    pub fn create(&self, entity: &str, params: Params) -> Result<T::Response, ClientError<T::Error>> {
        self.request(entity, "create", params, false)
    }

    pub fn update(&self, entity: &str, params: Params) -> Result<T::Response, ClientError<T::Error>> {
        self.request(entity, "update", params, true)
    }

    pub fn save(&self, entity: &str, params: Params) -> Result<T::Response, ClientError<T::Error>> {
        self.request(entity, "save", params, true)
    }

    pub fn delete(&self, entity: &str, params: Params) -> Result<T::Response, ClientError<T::Error>> {
        self.request(entity, "delete", params, true)
    }

    pub fn replace(&self, entity: &str, params: Params) -> Result<T::Response, ClientError<T::Error>> {
        self.request(entity, "replace", params, true)
    }

    /// Run any action on any entity, including custom actions that only some
    /// CiviCRM sites provide.
    pub fn request(
        &self,
        entity: &str,
        action: &str,
        params: Params,
        requires_params: bool,
    ) -> Result<T::Response, ClientError<T::Error>> {
        let request = self.build_request(entity, action, params, requires_params)?;
        debug!(entity, action, method = %request.method, "sending api4 request");
        self.transport.send(request).map_err(ClientError::Transport)
    }

    /// The request `request` would send, without sending it.
    pub fn build_request(
        &self,
        entity: &str,
        action: &str,
        params: Params,
        requires_params: bool,
    ) -> Result<HttpRequest, RequestError> {
        let mut request = ActionRequest::new(entity, action, params)
            .requires_params(requires_params)
            .build()
            .inspect_err(|err| warn!(entity, action, error = %err, "api4 request not built"))?;
        request.headers = self.headers_to_send();
        Ok(request)
    }

    /// Headers for one request: the defaults, then the auth header, then
    /// custom headers. Later entries replace earlier ones with the same name.
    pub fn headers_to_send(&self) -> Vec<(String, String)> {
        let mut headers: Vec<(String, String)> = DEFAULT_HEADERS
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        merge_header(&mut headers, AUTH_HEADER, self.credentials.header_value());
        for (name, value) in &self.custom_headers {
            merge_header(&mut headers, name, value.clone());
        }
        headers
    }
}

/// Insert or replace `name`, comparing names case-insensitively.
fn merge_header(headers: &mut Vec<(String, String)>, name: &str, value: String) {
    match headers.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(name)) {
        Some(entry) => *entry = (name.to_string(), value),
        None => headers.push((name.to_string(), value)),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use serde_json::json;

    use super::*;
    use crate::http::HttpMethod;

    /// Records every request and answers with a canned status.
    #[derive(Debug, Default)]
    struct Recorder {
        sent: RefCell<Vec<HttpRequest>>,
        fail: bool,
    }

    #[derive(Debug, PartialEq)]
    struct Refused;

    impl Transport for Recorder {
        type Response = u16;
        type Error = Refused;

        fn send(&self, request: HttpRequest) -> Result<u16, Refused> {
            self.sent.borrow_mut().push(request);
            if self.fail {
                Err(Refused)
            } else {
                Ok(200)
            }
        }
    }

    fn client(mode: &str) -> CiviClient<Recorder> {
        CiviClient::new(Recorder::default(), ClientConfig::new(mode, "testKey")).unwrap()
    }

    fn params(value: serde_json::Value) -> Params {
        value.as_object().cloned().unwrap()
    }

    fn last_sent(client: &CiviClient<Recorder>) -> HttpRequest {
        client.transport().sent.borrow().last().cloned().unwrap()
    }

    #[test]
    fn invalid_mode_is_rejected() {
        let err = CiviClient::new(Recorder::default(), ClientConfig::new("wrong", "testKey")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAuthenticationType(ref m) if m == "wrong"));
    }

    #[test]
    fn valid_modes_are_accepted() {
        for mode in ["basic", "bearer_api_key", "bearer_jwt"] {
            assert!(CiviClient::new(Recorder::default(), ClientConfig::new(mode, "k")).is_ok());
        }
    }

    #[test]
    fn auth_mode_reflects_config() {
        assert_eq!(client("basic").auth_mode(), AuthMode::Basic);
        assert_eq!(client("bearer_api_key").auth_mode(), AuthMode::BearerApiKey);
        assert_eq!(client("bearer_jwt").auth_mode(), AuthMode::BearerJwt);
    }

    #[test]
    fn version_matches_package() {
        assert_eq!(VERSION, "1.0.0");
    }

    #[test]
    fn basic_client_sends_basic_auth() {
        let headers = client("basic").headers_to_send();
        assert_eq!(
            headers,
            vec![
                ("X-Requested-With".to_string(), "XMLHttpRequest".to_string()),
                ("X-Civi-Auth".to_string(), "Basic testKey".to_string()),
            ]
        );
    }

    #[test]
    fn jwt_client_sends_bearer_auth() {
        let c = client("bearer_jwt");
        let req = c.build_request("Contact", "get", Params::new(), false).unwrap();
        assert_eq!(req.header("X-Civi-Auth"), Some("Bearer testKey"));
    }

    #[test]
    fn custom_headers_are_added() {
        let config = ClientConfig::new("basic", "testKey").with_header("Authorization", "Bearer 1234");
        let c = CiviClient::new(Recorder::default(), config).unwrap();
        let headers = c.headers_to_send();
        assert_eq!(headers.len(), 3);
        assert_eq!(headers[2], ("Authorization".to_string(), "Bearer 1234".to_string()));
    }

    #[test]
    fn custom_headers_override_defaults_and_auth() {
        let config = ClientConfig::new("basic", "testKey")
            .with_header("x-civi-auth", "Bearer override")
            .with_header("X-Requested-With", "civicrm-core");
        let c = CiviClient::new(Recorder::default(), config).unwrap();
        let req = c.build_request("Contact", "get", Params::new(), false).unwrap();
        assert_eq!(req.headers.len(), 2);
        assert_eq!(req.header("X-Civi-Auth"), Some("Bearer override"));
        assert_eq!(req.header("X-Requested-With"), Some("civicrm-core"));
    }

    #[test]
    fn headers_are_stable_across_calls() {
        let c = client("bearer_api_key");
        assert_eq!(c.headers_to_send(), c.headers_to_send());
        c.get("Contact", Params::new()).unwrap();
        c.get("Contact", Params::new()).unwrap();
        let sent = c.transport().sent.borrow();
        assert_eq!(sent[0], sent[1]);
    }

    #[test]
    fn action_methods_map_to_actions() {
        let c = client("basic");
        let p = params(json!({"id": 1}));
        c.get_actions("Contact", Params::new()).unwrap();
        c.get_fields("Contact", Params::new()).unwrap();
        c.get("Contact", Params::new()).unwrap();
        c.create("Contact", Params::new()).unwrap();
        c.update("Contact", p.clone()).unwrap();
        c.save("Contact", p.clone()).unwrap();
        c.delete("Contact", p.clone()).unwrap();
        c.replace("Contact", p).unwrap();

        let sent = c.transport().sent.borrow();
        let targets: Vec<(HttpMethod, &str)> = sent.iter().map(|r| (r.method, r.path.as_str())).collect();
        assert_eq!(
            targets,
            vec![
                (HttpMethod::Get, "/civicrm/ajax/api4/Contact/getactions"),
                (HttpMethod::Get, "/civicrm/ajax/api4/Contact/getfields"),
                (HttpMethod::Get, "/civicrm/ajax/api4/Contact/get"),
                (HttpMethod::Post, "/civicrm/ajax/api4/Contact/create"),
                (HttpMethod::Post, "/civicrm/ajax/api4/Contact/update"),
                (HttpMethod::Post, "/civicrm/ajax/api4/Contact/save"),
                (HttpMethod::Post, "/civicrm/ajax/api4/Contact/delete"),
                (HttpMethod::Post, "/civicrm/ajax/api4/Contact/replace"),
            ]
        );
    }

    #[test]
    fn mutating_actions_require_params() {
        let c = client("basic");
        assert!(c.update("Contact", Params::new()).unwrap_err().is_missing_params());
        assert!(c.save("Contact", Params::new()).unwrap_err().is_missing_params());
        assert!(c.delete("Contact", Params::new()).unwrap_err().is_missing_params());
        assert!(c.replace("Contact", Params::new()).unwrap_err().is_missing_params());
        assert!(c.transport().sent.borrow().is_empty());
    }

    #[test]
    fn create_allows_empty_params() {
        let c = client("basic");
        assert_eq!(c.create("Contact", Params::new()).unwrap(), 200);
        assert!(last_sent(&c).query.is_none());
    }

    #[test]
    fn request_passes_custom_action_through() {
        let c = client("basic");
        c.request("Contact", "merge", params(json!({"id": 2})), true).unwrap();
        let req = last_sent(&c);
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "/civicrm/ajax/api4/Contact/merge");
        assert!(req.query.is_some());
        assert_eq!(req.header("X-Civi-Auth"), Some("Basic testKey"));
    }

    #[test]
    fn transport_error_is_returned_unchanged() {
        let transport = Recorder {
            fail: true,
            ..Recorder::default()
        };
        let c = CiviClient::new(transport, ClientConfig::new("basic", "k")).unwrap();
        let err = c.get("Contact", Params::new()).unwrap_err();
        assert_eq!(err.into_transport(), Some(Refused));
    }

    #[test]
    fn borrowed_transport_works() {
        let recorder = Recorder::default();
        let c = CiviClient::new(&recorder, ClientConfig::new("basic", "k")).unwrap();
        c.get("Contact", Params::new()).unwrap();
        assert_eq!(recorder.sent.borrow().len(), 1);
    }
}
