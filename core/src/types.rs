//! Object references and query parameters.
//!
//! # Design
//! The service addresses objects by a type path segment that does not always
//! match the name users know (`story` lives under `hierarchicalrequirement`).
//! `translate` owns that table; everything that builds a path goes through it.
//! Query parameters are ordered pairs rather than a map so the encoded query
//! string follows insertion order.

use crate::error::{RallyError, Result};

/// User-facing aliases and the path segment the service expects for each.
const OBJECT_TRANSLATION: &[(&str, &str)] = &[
    ("story", "hierarchicalrequirement"),
    ("userstory", "hierarchicalrequirement"),
    ("feature", "portfolioitem/feature"),
    ("initiative", "portfolioitem/initiative"),
    ("theme", "portfolioitem/theme"),
    ("release", "release"),
];

pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const DEFAULT_START: u32 = 1;

/// Map a user-facing object type to its service path segment.
///
/// Lower-cases the input; names missing from the table pass through.
pub fn translate(object: &str) -> String {
    let object = object.to_lowercase();
    OBJECT_TRANSLATION
        .iter()
        .find(|(alias, _)| *alias == object)
        .map(|(_, target)| (*target).to_string())
        .unwrap_or(object)
}

/// `/{type}` or `/{type}/{id}`; an empty id is treated as absent.
pub fn object_ref(object: &str, id: Option<&str>) -> String {
    let object = translate(object);
    match id {
        Some(id) if !id.is_empty() => format!("/{object}/{id}"),
        _ => format!("/{object}"),
    }
}

/// Append `params` to `path`, adding `workspace` last when a workspace is set.
///
/// No `?` is emitted when there is nothing to encode.
pub fn with_params(
    path: &str,
    mut params: Vec<(String, String)>,
    workspace: Option<&str>,
) -> Result<String> {
    if let Some(workspace) = workspace {
        params.push(("workspace".to_string(), workspace.to_string()));
    }
    if params.is_empty() {
        return Ok(path.to_string());
    }
    let query =
        serde_urlencoded::to_string(&params).map_err(|e| RallyError::Serialization(e.to_string()))?;
    Ok(format!("{path}?{query}"))
}

/// Append the security token as `key=…`, respecting an existing query string.
pub fn append_key(path: &str, token: &str) -> Result<String> {
    let key = serde_urlencoded::to_string([("key", token)])
        .map_err(|e| RallyError::Serialization(e.to_string()))?;
    let separator = if path.contains('?') { '&' } else { '?' };
    Ok(format!("{path}{separator}{key}"))
}

/// Search options for `Connector::find`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindQuery {
    pub query: Option<String>,
    pub order: Option<String>,
    pub fetch: Vec<String>,
    pub page_size: u32,
    pub start: u32,
}

impl Default for FindQuery {
    fn default() -> Self {
        Self {
            query: None,
            order: None,
            fetch: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            start: DEFAULT_START,
        }
    }
}

impl FindQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Service query expression, e.g. `(Name contains "login")`.
    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    pub fn fetch<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fetch = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }

    pub fn start(mut self, start: u32) -> Self {
        self.start = start;
        self
    }

    /// Ordered query pairs: pagesize, start, then the optional ones.
    ///
    /// Empty strings and a project id of `0` count as unset.
    pub fn params(&self, project: Option<u64>) -> Vec<(String, String)> {
        let mut params = vec![
            ("pagesize".to_string(), self.page_size.to_string()),
            ("start".to_string(), self.start.to_string()),
        ];
        if let Some(query) = self.query.as_deref().filter(|q| !q.is_empty()) {
            params.push(("query".to_string(), query.to_string()));
        }
        if let Some(project) = project.filter(|p| *p != 0) {
            params.push(("project".to_string(), format!("/project/{project}")));
        }
        if !self.fetch.is_empty() {
            params.push(("fetch".to_string(), self.fetch.join(",")));
        }
        if let Some(order) = self.order.as_deref().filter(|o| !o.is_empty()) {
            params.push(("order".to_string(), order.to_string()));
        }
        params
    }
}
