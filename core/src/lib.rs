//! Blocking client for the Rally work-tracking web service (`/slm/webservice`).
//!
//! # Overview
//! `Connector` authenticates with HTTP Basic credentials, builds object
//! references and query strings, obtains the security token that mutating
//! calls require, and turns the service's envelopes into either a JSON
//! payload or a single `RallyError`.
//!
//! # Design
//! - Every call is described as a plain-data `HttpRequest` and executed by a
//!   `Transport`; the default `UreqTransport` owns one agent per connector,
//!   with its own cookie jar.
//! - Scope (workspace, project) and the security token are read when a call
//!   is made, never captured earlier.
//! - Service-reported `Errors` and `Warnings` are variants of `RallyError`;
//!   whether warnings fail a call is set by `WarningPolicy`.

pub mod config;
pub mod connector;
pub mod error;
pub mod http;
pub mod response;
pub mod transport;
pub mod types;

pub use config::{ConnectorConfig, WarningPolicy};
pub use connector::Connector;
pub use error::{RallyError, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use response::{classify, unwrap_envelope};
pub use transport::UreqTransport;
pub use types::{object_ref, translate, FindQuery};
