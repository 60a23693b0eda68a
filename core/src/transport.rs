//! Blocking transport backed by a `ureq::Agent`.
//!
//! One agent per connector: it keeps the connection pool and an in-memory
//! cookie jar for the service session, so two connectors never share
//! session cookies.

use ureq::tls::TlsConfig;
use ureq::Agent;

use crate::config::ConnectorConfig;
use crate::error::{RallyError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};

#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    /// Build an agent from the connection settings.
    ///
    /// Status codes are returned as data so that `response::classify` can
    /// report them together with the body.
    pub fn new(config: &ConnectorConfig) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(config.timeout()))
            .tls_config(
                TlsConfig::builder()
                    .disable_verification(!config.verify_tls())
                    .build(),
            )
            .build()
            .new_agent();
        Self { agent }
    }

    pub fn from_agent(agent: Agent) -> Self {
        Self { agent }
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let url = request.url.as_str();
        let headers = request.headers.as_slice();
        let body = request.body.as_deref().unwrap_or("");

        let result = match request.method {
            HttpMethod::Get => with_headers(self.agent.get(url), headers).call(),
            HttpMethod::Delete => with_headers(self.agent.delete(url), headers).call(),
            HttpMethod::Post => with_headers(self.agent.post(url), headers).send(body.as_bytes()),
            HttpMethod::Put => with_headers(self.agent.put(url), headers).send(body.as_bytes()),
        };
        let mut response = result.map_err(|e| RallyError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| RallyError::Transport(e.to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
