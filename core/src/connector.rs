//! The Rally web-service connector.
//!
//! # Design
//! `Connector` builds one `HttpRequest` per call from its immutable config,
//! its current scope and, for mutating calls, the cached security token, then
//! hands it to the transport and classifies the answer. Scope and token are
//! read when a call is made, so changing the workspace affects every later
//! call. The token sits behind a mutex held across fetch-and-store: concurrent
//! first callers wait for a single authorize request instead of racing.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, trace};

use crate::config::ConnectorConfig;
use crate::error::{RallyError, Result};
use crate::http::{HttpMethod, HttpRequest, Transport};
use crate::response::classify;
use crate::transport::UreqTransport;
use crate::types::{append_key, object_ref, with_params, FindQuery};

const AUTHORIZE_PATH: &str = "security/authorize";
const CONTENT_TYPE: &str = "text/javascript";

/// Request body shape for create and update.
#[derive(Serialize)]
struct ContentBody<'a, F: ?Sized> {
    #[serde(rename = "Content")]
    content: &'a F,
}

pub struct Connector<T = UreqTransport> {
    config: ConnectorConfig,
    transport: T,
    authorization: String,
    workspace: Option<String>,
    project: Option<u64>,
    security_token: Mutex<Option<String>>,
}

impl Connector<UreqTransport> {
    /// Connector talking to the service over HTTPS with its own agent.
    pub fn new(config: ConnectorConfig) -> Self {
        let transport = UreqTransport::new(&config);
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> Connector<T> {
    pub fn with_transport(config: ConnectorConfig, transport: T) -> Self {
        let credentials = format!("{}:{}", config.username, config.password);
        let authorization = format!("Basic {}", STANDARD.encode(credentials));
        Self {
            config,
            transport,
            authorization,
            workspace: None,
            project: None,
            security_token: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Scope later requests to a workspace, given as its reference URL.
    pub fn set_workspace(&mut self, workspace_ref: impl Into<String>) {
        self.workspace = Some(workspace_ref.into());
    }

    pub fn clear_workspace(&mut self) {
        self.workspace = None;
    }

    pub fn workspace(&self) -> Option<&str> {
        self.workspace.as_deref()
    }

    /// Restrict later `find` calls to a project id.
    pub fn set_project(&mut self, project: u64) {
        self.project = Some(project);
    }

    pub fn clear_project(&mut self) {
        self.project = None;
    }

    pub fn project(&self) -> Option<u64> {
        self.project
    }

    /// Path of an object or object type, e.g. `/hierarchicalrequirement/42`.
    pub fn object_ref(&self, object: &str, id: Option<&str>) -> String {
        object_ref(object, id)
    }

    /// Query objects of a type. Returns the unwrapped `QueryResult`.
    #[instrument(skip(self, query))]
    pub fn find(&self, object: &str, query: &FindQuery) -> Result<Value> {
        let path = object_ref(object, None);
        let path = with_params(&path, query.params(self.project), self.workspace())?;
        self.execute(HttpMethod::Get, &path, None)
    }

    /// Read one object. The service answers `{"<Type>": {...}}`; the inner
    /// object is returned.
    #[instrument(skip_all, fields(object = %object, id = %id))]
    pub fn get(&self, object: &str, id: impl fmt::Display) -> Result<Value> {
        let path = self.scoped_ref(object, &id.to_string())?;
        match self.execute(HttpMethod::Get, &path, None)? {
            Value::Object(map) => map
                .into_iter()
                .next()
                .map(|(_, value)| value)
                .ok_or(RallyError::MissingField("object")),
            _ => Err(RallyError::MissingField("object")),
        }
    }

    /// GET a `_ref` or other link returned by the service.
    ///
    /// Absolute `http(s)` URLs are used verbatim; anything else is resolved
    /// against the base URL.
    #[instrument(skip(self))]
    pub fn get_by_url(&self, url: &str) -> Result<Value> {
        if url.starts_with("https://") || url.starts_with("http://") {
            self.send(HttpMethod::Get, url.to_string(), None, true)
        } else {
            self.execute(HttpMethod::Get, url, None)
        }
    }

    /// Create an object and return the created `Object`.
    #[instrument(skip(self, fields))]
    pub fn create<F>(&self, object: &str, fields: &F) -> Result<Value>
    where
        F: Serialize + ?Sized,
    {
        let path = self.scoped_ref(object, "create")?;
        let result = self.mutate(HttpMethod::Put, &path, Some(content_body(fields)?))?;
        take_object(result)
    }

    /// Update an object and return the updated `Object`.
    #[instrument(skip_all, fields(object = %object, id = %id))]
    pub fn update<F>(&self, object: &str, id: impl fmt::Display, fields: &F) -> Result<Value>
    where
        F: Serialize + ?Sized,
    {
        let path = self.scoped_ref(object, &id.to_string())?;
        let result = self.mutate(HttpMethod::Post, &path, Some(content_body(fields)?))?;
        take_object(result)
    }

    /// Delete an object. Failures are returned as errors, so a returned
    /// value is always `true`.
    #[instrument(skip_all, fields(object = %object, id = %id))]
    pub fn delete(&self, object: &str, id: impl fmt::Display) -> Result<bool> {
        let path = self.scoped_ref(object, &id.to_string())?;
        self.mutate(HttpMethod::Delete, &path, None)?;
        Ok(true)
    }

    /// Token required on mutating requests, fetched on first use and kept
    /// for the lifetime of the connector.
    pub fn security_token(&self) -> Result<String> {
        let mut cached = self
            .security_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = cached.as_ref().filter(|t| !t.is_empty()) {
            return Ok(token.clone());
        }

        debug!("Requesting security token");
        // The body carries the token itself, so it is never traced.
        let result = self.send(HttpMethod::Get, self.url(AUTHORIZE_PATH), None, false)?;
        let token = result
            .get("SecurityToken")
            .and_then(Value::as_str)
            .ok_or(RallyError::MissingField("SecurityToken"))?
            .to_string();
        *cached = Some(token.clone()).filter(|t| !t.is_empty());
        Ok(token)
    }

    /// Send a request for a path below the base URL and classify the answer.
    pub fn execute(&self, method: HttpMethod, path: &str, body: Option<String>) -> Result<Value> {
        self.send(method, self.url(path), body, true)
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url(),
            path.trim_start_matches('/')
        )
    }

    fn scoped_ref(&self, object: &str, id: &str) -> Result<String> {
        with_params(&object_ref(object, Some(id)), Vec::new(), self.workspace())
    }

    fn mutate(&self, method: HttpMethod, path: &str, body: Option<String>) -> Result<Value> {
        let token = self.security_token()?;
        let path = append_key(path, &token)?;
        self.execute(method, &path, body)
    }

    fn send(
        &self,
        method: HttpMethod,
        url: String,
        body: Option<String>,
        trace_body: bool,
    ) -> Result<Value> {
        let request = HttpRequest {
            method,
            headers: vec![
                ("Content-Type".to_string(), CONTENT_TYPE.to_string()),
                ("Accept".to_string(), "application/json".to_string()),
                ("User-Agent".to_string(), self.config.user_agent.clone()),
                ("Authorization".to_string(), self.authorization.clone()),
            ],
            url,
            body,
        };

        let path = request.url.split('?').next().unwrap_or_default();
        debug!(method = %request.method, path = %path, "Sending Rally request");

        let response = self.transport.execute(&request)?;

        debug!(status = response.status, "Received Rally response");
        if self.config.debug && trace_body {
            trace!(body = %response.body, "Rally response body");
        }

        classify(&response, self.config.warning_policy)
    }
}

impl<T> fmt::Debug for Connector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("config", &self.config)
            .field("workspace", &self.workspace)
            .field("project", &self.project)
            .finish_non_exhaustive()
    }
}

fn content_body<F: Serialize + ?Sized>(fields: &F) -> Result<String> {
    serde_json::to_string(&ContentBody { content: fields })
        .map_err(|e| RallyError::Serialization(e.to_string()))
}

fn take_object(result: Value) -> Result<Value> {
    match result {
        Value::Object(mut map) => map.remove("Object").ok_or(RallyError::MissingField("Object")),
        _ => Err(RallyError::MissingField("Object")),
    }
}
