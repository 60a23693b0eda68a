//! In-memory imitation of the Rally `/slm/webservice` API.
//!
//! Covers what the connector needs: Basic-auth gate, security token,
//! create/read/update/delete by object reference, and paged queries with a
//! single `(Field = "value")` condition. Failures are reported the way the
//! real service does it, inside a 200 envelope.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde_json::{Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const API_VERSION: &str = "v2.0";
pub const SECURITY_TOKEN: &str = "mock-security-token";
pub const MAX_PAGE_SIZE: usize = 2000;
const FIRST_OBJECT_ID: u64 = 1000;

#[derive(Clone, Debug)]
pub struct StoredObject {
    pub type_path: String,
    pub workspace: Option<String>,
    pub fields: Map<String, Value>,
}

#[derive(Debug, Default)]
pub struct Store {
    next_id: u64,
    objects: BTreeMap<u64, StoredObject>,
}

impl Store {
    fn allocate_id(&mut self) -> u64 {
        let id = FIRST_OBJECT_ID + self.next_id;
        self.next_id += 1;
        id
    }
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route("/slm/webservice/{version}/{*path}", any(dispatch))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

enum Target {
    Collection,
    Create,
    Object(u64),
}

async fn dispatch(
    State(db): State<Db>,
    method: Method,
    Path((version, path)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    if version != API_VERSION {
        return (StatusCode::NOT_FOUND, format!("Unknown API version {version}")).into_response();
    }
    if !has_basic_auth(&headers) {
        return (StatusCode::UNAUTHORIZED, "Authentication required").into_response();
    }

    let path = path.trim_matches('/').to_lowercase();
    if path == "security/authorize" {
        if method != Method::GET {
            return StatusCode::METHOD_NOT_ALLOWED.into_response();
        }
        let mut extra = Map::new();
        extra.insert("SecurityToken".to_string(), Value::from(SECURITY_TOKEN));
        return envelope("OperationResult", &[], &[], extra);
    }

    if method != Method::GET && params.get("key").map(String::as_str) != Some(SECURITY_TOKEN) {
        return error("Not authorized to perform action: Invalid key");
    }

    let (type_path, target) = match path.rsplit_once('/') {
        Some((ty, "create")) => (ty, Target::Create),
        Some((ty, last)) => match last.parse::<u64>() {
            Ok(id) => (ty, Target::Object(id)),
            Err(_) => (path.as_str(), Target::Collection),
        },
        None if path == "create" => return error("Cannot create an object without a type"),
        None => (path.as_str(), Target::Collection),
    };

    let base = base_url(&headers);
    let workspace = params.get("workspace").cloned();
    match target {
        Target::Collection if method == Method::GET => query(&db, type_path, &params).await,
        Target::Create if method == Method::PUT => {
            create(&db, &base, type_path, workspace, &body).await
        }
        Target::Object(id) if method == Method::GET => read(&db, type_path, id).await,
        Target::Object(id) if method == Method::POST => update(&db, type_path, id, &body).await,
        Target::Object(id) if method == Method::DELETE => delete(&db, type_path, id).await,
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

async fn query(db: &Db, type_path: &str, params: &HashMap<String, String>) -> Response {
    let condition = match params.get("query").filter(|q| !q.is_empty()) {
        Some(raw) => match parse_condition(raw) {
            Some(condition) => Some(condition),
            None => return error(&format!("Could not parse: Cannot parse expression \"{raw}\"")),
        },
        None => None,
    };
    let start: usize = params.get("start").and_then(|s| s.parse().ok()).unwrap_or(1).max(1);
    let requested: usize = params.get("pagesize").and_then(|s| s.parse().ok()).unwrap_or(20);

    let mut warnings = Vec::new();
    let page_size = if requested > MAX_PAGE_SIZE {
        warnings.push(format!(
            "The maximum pagesize is {MAX_PAGE_SIZE}. Pagesize has been reset to {MAX_PAGE_SIZE}."
        ));
        MAX_PAGE_SIZE
    } else {
        requested
    };

    let workspace = params.get("workspace");
    let store = db.read().await;
    let matching: Vec<Value> = store
        .objects
        .values()
        .filter(|o| o.type_path == type_path)
        .filter(|o| match (workspace, &o.workspace) {
            (Some(wanted), Some(actual)) => wanted == actual,
            _ => true,
        })
        .filter(|o| match &condition {
            Some((field, value)) => o.fields.get(field).map(render) == Some(value.clone()),
            None => true,
        })
        .map(|o| Value::Object(o.fields.clone()))
        .collect();

    let total = matching.len();
    let results: Vec<Value> = matching.into_iter().skip(start - 1).take(page_size).collect();

    let mut extra = Map::new();
    extra.insert("TotalResultCount".to_string(), Value::from(total));
    extra.insert("StartIndex".to_string(), Value::from(start));
    extra.insert("PageSize".to_string(), Value::from(page_size));
    extra.insert("Results".to_string(), Value::Array(results));
    let warnings: Vec<&str> = warnings.iter().map(String::as_str).collect();
    envelope("QueryResult", &[], &warnings, extra)
}

async fn create(
    db: &Db,
    base: &str,
    type_path: &str,
    workspace: Option<String>,
    body: &str,
) -> Response {
    let Some(content) = content(body) else {
        return error("Cannot parse object to create: missing Content");
    };

    let mut store = db.write().await;
    let id = store.allocate_id();
    let mut fields = content;
    fields.insert("ObjectID".to_string(), Value::from(id));
    fields.insert("ObjectUUID".to_string(), Value::from(Uuid::new_v4().to_string()));
    fields.insert("_ref".to_string(), Value::from(format!("{base}/{type_path}/{id}")));
    fields.insert("_type".to_string(), Value::from(type_name(type_path)));
    store.objects.insert(
        id,
        StoredObject {
            type_path: type_path.to_string(),
            workspace,
            fields: fields.clone(),
        },
    );

    let mut extra = Map::new();
    extra.insert("Object".to_string(), Value::Object(fields));
    envelope("CreateResult", &[], &[], extra)
}

async fn read(db: &Db, type_path: &str, id: u64) -> Response {
    let store = db.read().await;
    match store.objects.get(&id).filter(|o| o.type_path == type_path) {
        Some(object) => {
            let mut wrapper = Map::new();
            wrapper.insert(type_name(type_path), Value::Object(object.fields.clone()));
            Json(Value::Object(wrapper)).into_response()
        }
        None => error("Cannot find object to read"),
    }
}

async fn update(db: &Db, type_path: &str, id: u64, body: &str) -> Response {
    let Some(content) = content(body) else {
        return error("Cannot parse object to update: missing Content");
    };

    let mut store = db.write().await;
    let Some(object) = store.objects.get_mut(&id).filter(|o| o.type_path == type_path) else {
        return error("Cannot find object to update");
    };
    for (key, value) in content {
        if key != "ObjectID" && !key.starts_with('_') {
            object.fields.insert(key, value);
        }
    }

    let mut extra = Map::new();
    extra.insert("Object".to_string(), Value::Object(object.fields.clone()));
    envelope("OperationResult", &[], &[], extra)
}

async fn delete(db: &Db, type_path: &str, id: u64) -> Response {
    let mut store = db.write().await;
    let exists = store.objects.get(&id).is_some_and(|o| o.type_path == type_path);
    if !exists {
        return error("Cannot find object to delete");
    }
    store.objects.remove(&id);
    envelope("OperationResult", &[], &[], Map::new())
}

fn has_basic_auth(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Basic ") && v.len() > "Basic ".len())
}

fn base_url(headers: &HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{host}/slm/webservice/{API_VERSION}")
}

/// The `Content` object of a create/update body.
fn content(body: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(body).ok()? {
        Value::Object(mut map) => match map.remove("Content")? {
            Value::Object(content) => Some(content),
            _ => None,
        },
        _ => None,
    }
}

/// Parse `(Field = "value")` or `(Field = value)`.
pub fn parse_condition(raw: &str) -> Option<(String, String)> {
    let inner = raw.trim().strip_prefix('(')?.strip_suffix(')')?;
    let (field, value) = inner.split_once(" = ")?;
    let field = field.trim();
    if field.is_empty() || field.contains(char::is_whitespace) {
        return None;
    }
    let value = value.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    Some((field.to_string(), value.to_string()))
}

/// `hierarchicalrequirement` -> `HierarchicalRequirement`,
/// `portfolioitem/feature` -> `PortfolioItem/Feature`.
pub fn type_name(type_path: &str) -> String {
    type_path
        .split('/')
        .map(|segment| match segment {
            "hierarchicalrequirement" => "HierarchicalRequirement".to_string(),
            "portfolioitem" => "PortfolioItem".to_string(),
            other => {
                let mut chars = other.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn envelope(kind: &str, errors: &[&str], warnings: &[&str], extra: Map<String, Value>) -> Response {
    let mut inner = Map::new();
    inner.insert("Errors".to_string(), Value::from(errors.to_vec()));
    inner.insert("Warnings".to_string(), Value::from(warnings.to_vec()));
    inner.extend(extra);
    let mut outer = Map::new();
    outer.insert(kind.to_string(), Value::Object(inner));
    Json(Value::Object(outer)).into_response()
}

fn error(message: &str) -> Response {
    envelope("OperationResult", &[message], &[], Map::new())
}
