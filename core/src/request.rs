//! Turns an entity/action call into an API4 `HttpRequest`.
//!
//! # Design
//! API4 exposes every action at `/civicrm/ajax/api4/{Entity}/{action}` and
//! takes its arguments as a single `params` query parameter holding
//! URL-encoded JSON. Read-only actions go out as GET and everything else as
//! POST. The method choice is a case-insensitive substring test for `get`,
//! so actions such as `budget` also resolve to GET.
//!
//! Encoding is `application/x-www-form-urlencoded` style (space becomes `+`),
//! which is what the endpoint decodes. Object keys are written sorted at every
//! depth, so the same params always produce the same query.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{json, Map, Value};
use url::form_urlencoded;

use crate::error::RequestError;
use crate::http::{HttpMethod, HttpRequest};

/// Root of the API4 AJAX endpoint, relative to the site root.
pub const BASE_ENDPOINT: &str = "/civicrm/ajax/api4";

/// Parameters for a single action, sent as `{"values": params}`.
pub type Params = Map<String, Value>;

/// A single entity/action call waiting to be built.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    entity: String,
    action: String,
    params: Params,
    requires_params: bool,
}

impl ActionRequest {
    pub fn new(entity: impl Into<String>, action: impl Into<String>, params: Params) -> Self {
        Self {
            entity: entity.into(),
            action: action.into(),
            params,
            requires_params: false,
        }
    }

    /// Mark whether building must fail when no params were given.
    pub fn requires_params(mut self, requires_params: bool) -> Self {
        self.requires_params = requires_params;
        self
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    /// Produce the request descriptor. Headers are left empty.
    pub fn build(&self) -> Result<HttpRequest, RequestError> {
        if self.requires_params && self.params.is_empty() {
            return Err(RequestError::MissingParams);
        }

        let method = method_for_action(&self.action);
        let path = format!(
            "{BASE_ENDPOINT}/{}/{}",
            urlencode(&self.entity),
            urlencode(&self.action)
        );
        let query = if self.params.is_empty() {
            None
        } else {
            Some(encode_params(&self.params)?)
        };

        Ok(HttpRequest {
            method,
            path,
            query,
            headers: Vec::new(),
        })
    }
}

/// Build a request for `action` on `entity` in one call.
pub fn build(
    entity: &str,
    action: &str,
    params: Params,
    requires_params: bool,
) -> Result<HttpRequest, RequestError> {
    ActionRequest::new(entity, action, params)
        .requires_params(requires_params)
        .build()
}

/// GET when the action name contains `get` in any case, POST otherwise.
pub fn method_for_action(action: &str) -> HttpMethod {
    if action.to_ascii_lowercase().contains("get") {
        HttpMethod::Get
    } else {
        HttpMethod::Post
    }
}

/// `params=<encoded {"values": params}>`
fn encode_params(params: &Params) -> Result<String, RequestError> {
    let json = serde_json::to_string(&Canonical(&json!({ "values": params })))?;
    Ok(format!("params={}", urlencode(&json)))
}

/// Serializes a JSON value with object keys sorted at every depth, whatever
/// ordering `serde_json::Map` uses in this build.
struct Canonical<'a>(&'a Value);

impl Serialize for Canonical<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(map) => {
                let mut entries: Vec<(&String, &Value)> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                let mut out = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    out.serialize_entry(key, &Canonical(value))?;
                }
                out.end()
            }
            Value::Array(items) => serializer.collect_seq(items.iter().map(Canonical)),
            other => other.serialize(serializer),
        }
    }
}

fn urlencode(s: &str) -> String {
    form_urlencoded::byte_serialize(s.as_bytes()).collect()
}
