use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;

pub const API4_ROUTE: &str = "/civicrm/ajax/api4/{entity}/{action}";

/// Actions the mock answers, as reported by `getactions`.
pub const ACTIONS: [&str; 8] = [
    "get",
    "getactions",
    "getfields",
    "create",
    "update",
    "save",
    "delete",
    "replace",
];

pub type Record = Map<String, Value>;

/// In-memory records keyed by entity name, then id.
#[derive(Debug, Default)]
pub struct Store {
    next_id: u64,
    entities: BTreeMap<String, BTreeMap<u64, Record>>,
}

impl Store {
    fn table(&mut self, entity: &str) -> &mut BTreeMap<u64, Record> {
        self.entities.entry(entity.to_string()).or_default()
    }

    pub fn insert(&mut self, entity: &str, mut values: Record) -> Value {
        self.next_id += 1;
        let id = self.next_id;
        values.insert("id".to_string(), json!(id));
        self.table(entity).insert(id, values.clone());
        Value::Object(values)
    }

    pub fn get(&self, entity: &str, id: Option<u64>) -> Vec<Value> {
        let Some(table) = self.entities.get(entity) else {
            return Vec::new();
        };
        table
            .iter()
            .filter(|(key, _)| id.map_or(true, |id| **key == id))
            .map(|(_, record)| Value::Object(record.clone()))
            .collect()
    }

    pub fn update(&mut self, entity: &str, id: u64, values: Record) -> Option<Value> {
        let record = self.table(entity).get_mut(&id)?;
        for (key, value) in values {
            record.insert(key, value);
        }
        record.insert("id".to_string(), json!(id));
        Some(Value::Object(record.clone()))
    }

    pub fn delete(&mut self, entity: &str, id: u64) -> bool {
        self.table(entity).remove(&id).is_some()
    }

    /// Drop every record of `entity` and store `values` as the only one.
    pub fn replace(&mut self, entity: &str, values: Record) -> Value {
        self.table(entity).clear();
        self.insert(entity, values)
    }

    /// Field names seen on any record of `entity`, always including `id`.
    pub fn fields(&self, entity: &str) -> Vec<String> {
        let mut names: Vec<String> = vec!["id".to_string()];
        for record in self.entities.get(entity).into_iter().flat_map(BTreeMap::values) {
            for key in record.keys() {
                if !names.contains(key) {
                    names.push(key.clone());
                }
            }
        }
        names
    }
}

pub type Db = Arc<RwLock<Store>>;

#[derive(Debug, Deserialize)]
pub struct Api4Query {
    pub params: Option<String>,
}

/// Error body in the shape CiviCRM uses for failed API4 calls.
#[derive(Debug)]
pub struct ApiFailure {
    pub status: StatusCode,
    pub message: String,
}

impl ApiFailure {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let body = json!({
            "error_code": self.status.as_u16(),
            "error_message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route(API4_ROUTE, get(api4).post(api4))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn api4(
    State(db): State<Db>,
    method: Method,
    headers: HeaderMap,
    Path((entity, action)): Path<(String, String)>,
    Query(query): Query<Api4Query>,
) -> Result<Json<Value>, ApiFailure> {
    check_headers(&headers)?;
    let values = match query.params.as_deref() {
        Some(raw) => decode_values(raw)?,
        None => Record::new(),
    };
    let normalized = action.to_ascii_lowercase();
    if method == Method::GET && !normalized.starts_with("get") {
        return Err(ApiFailure::new(
            StatusCode::METHOD_NOT_ALLOWED,
            "SECURITY: All requests that modify the database must be http POST, not GET.",
        ));
    }
    debug!(%method, %entity, %action, "api4 call");

    let values: Vec<Value> = match normalized.as_str() {
        "get" => db.read().await.get(&entity, record_id(&values)),
        "getactions" => ACTIONS.iter().map(|name| json!({ "name": name })).collect(),
        "getfields" => db
            .read()
            .await
            .fields(&entity)
            .into_iter()
            .map(|name| json!({ "name": name }))
            .collect(),
        "create" => vec![db.write().await.insert(&entity, values)],
        "save" => {
            let mut store = db.write().await;
            match record_id(&values) {
                Some(id) => vec![store
                    .update(&entity, id, values)
                    .ok_or_else(|| not_found(&entity, id))?],
                None => vec![store.insert(&entity, values)],
            }
        }
        "update" => {
            let id = required_id(&values)?;
            let record = db.write().await.update(&entity, id, values);
            vec![record.ok_or_else(|| not_found(&entity, id))?]
        }
        "delete" => {
            let id = required_id(&values)?;
            if !db.write().await.delete(&entity, id) {
                return Err(not_found(&entity, id));
            }
            vec![json!({ "id": id })]
        }
        "replace" => vec![db.write().await.replace(&entity, values)],
        _ => {
            return Err(ApiFailure::new(
                StatusCode::NOT_FOUND,
                format!("Api4 {entity}.{action} not found"),
            ))
        }
    };

    Ok(Json(json!({
        "entity": entity,
        "action": action,
        "version": 4,
        "count": values.len(),
        "values": values,
    })))
}

fn check_headers(headers: &HeaderMap) -> Result<(), ApiFailure> {
    let ajax = headers
        .get("x-requested-with")
        .and_then(|value| value.to_str().ok());
    if ajax != Some("XMLHttpRequest") {
        return Err(ApiFailure::new(
            StatusCode::FORBIDDEN,
            "SECURITY ALERT: Ajax requests can only be issued by javascript clients.",
        ));
    }
    let auth = headers
        .get("x-civi-auth")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let credential = auth
        .strip_prefix("Basic ")
        .or_else(|| auth.strip_prefix("Bearer "))
        .unwrap_or_default();
    if credential.is_empty() {
        return Err(ApiFailure::new(StatusCode::UNAUTHORIZED, "Authorization failed"));
    }
    Ok(())
}

/// Parse the decoded `params` query value, which must be `{"values": {...}}`.
pub fn decode_values(raw: &str) -> Result<Record, ApiFailure> {
    let parsed: Value = serde_json::from_str(raw)
        .map_err(|e| ApiFailure::new(StatusCode::BAD_REQUEST, format!("params is not JSON: {e}")))?;
    match parsed.get("values") {
        Some(Value::Object(values)) => Ok(values.clone()),
        _ => Err(ApiFailure::new(
            StatusCode::BAD_REQUEST,
            "params must be an object with a \"values\" object",
        )),
    }
}

fn record_id(values: &Record) -> Option<u64> {
    match values.get("id")? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn required_id(values: &Record) -> Result<u64, ApiFailure> {
    record_id(values).ok_or_else(|| ApiFailure::new(StatusCode::BAD_REQUEST, "Parameter \"id\" is required."))
}

fn not_found(entity: &str, id: u64) -> ApiFailure {
    ApiFailure::new(StatusCode::NOT_FOUND, format!("{entity} {id} not found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn insert_assigns_increasing_ids() {
        let mut store = Store::default();
        let first = store.insert("Contact", record(json!({"first_name": "Ada"})));
        let second = store.insert("Activity", Record::new());
        assert_eq!(first["id"], 1);
        assert_eq!(first["first_name"], "Ada");
        assert_eq!(second["id"], 2);
    }

    #[test]
    fn get_filters_by_entity_and_id() {
        let mut store = Store::default();
        store.insert("Contact", Record::new());
        store.insert("Contact", Record::new());
        store.insert("Activity", Record::new());
        assert_eq!(store.get("Contact", None).len(), 2);
        assert_eq!(store.get("Contact", Some(2)).len(), 1);
        assert!(store.get("Contact", Some(3)).is_empty());
        assert!(store.get("Unknown", None).is_empty());
    }

    #[test]
    fn update_merges_fields_and_keeps_id() {
        let mut store = Store::default();
        store.insert("Contact", record(json!({"first_name": "Ada", "last_name": "L"})));
        let updated = store
            .update("Contact", 1, record(json!({"id": 1, "last_name": "Lovelace"})))
            .unwrap();
        assert_eq!(updated, json!({"id": 1, "first_name": "Ada", "last_name": "Lovelace"}));
        assert!(store.update("Contact", 9, Record::new()).is_none());
    }

    #[test]
    fn delete_reports_missing_records() {
        let mut store = Store::default();
        store.insert("Contact", Record::new());
        assert!(store.delete("Contact", 1));
        assert!(!store.delete("Contact", 1));
    }

    #[test]
    fn replace_leaves_single_record() {
        let mut store = Store::default();
        store.insert("Tag", record(json!({"name": "a"})));
        store.insert("Tag", record(json!({"name": "b"})));
        store.replace("Tag", record(json!({"name": "c"})));
        let tags = store.get("Tag", None);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0]["name"], "c");
    }

    #[test]
    fn fields_collect_record_keys() {
        let mut store = Store::default();
        store.insert("Contact", record(json!({"first_name": "Ada"})));
        assert_eq!(store.fields("Contact"), vec!["id", "first_name"]);
        assert_eq!(store.fields("Unknown"), vec!["id"]);
    }

    #[test]
    fn decode_values_requires_envelope() {
        let values = decode_values(r#"{"values":{"id":1}}"#).unwrap();
        assert_eq!(values["id"], 1);
        assert_eq!(decode_values(r#"{"id":1}"#).unwrap_err().status, StatusCode::BAD_REQUEST);
        assert_eq!(decode_values("not json").unwrap_err().status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn record_id_accepts_strings() {
        assert_eq!(record_id(&record(json!({"id": "7"}))), Some(7));
        assert_eq!(record_id(&record(json!({"id": 7}))), Some(7));
        assert_eq!(record_id(&Record::new()), None);
    }
}
