//! Connection settings for a `Connector`.
//!
//! A `ConnectorConfig` is assembled with builder methods and moved into the
//! connector, which never changes it afterwards.

use std::fmt;
use std::time::Duration;

pub const DEFAULT_DOMAIN: &str = "rally1.rallydev.com";
pub const DEFAULT_VERSION: &str = "v2.0";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// What to do when the service answers with `Warnings` but no `Errors`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WarningPolicy {
    /// Fail the call with `RallyError::Warning`.
    #[default]
    Raise,
    /// Log the warnings and return the payload.
    Log,
}

#[derive(Clone)]
pub struct ConnectorConfig {
    pub(crate) username: String,
    pub(crate) password: String,
    pub(crate) domain: String,
    pub(crate) version: String,
    pub(crate) user_agent: String,
    pub(crate) debug: bool,
    pub(crate) scheme: String,
    pub(crate) timeout: Duration,
    pub(crate) verify_tls: bool,
    pub(crate) warning_policy: WarningPolicy,
}

impl ConnectorConfig {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            domain: DEFAULT_DOMAIN.to_string(),
            version: DEFAULT_VERSION.to_string(),
            user_agent: concat!("Rust - Rally Api - ", env!("CARGO_PKG_VERSION")).to_string(),
            debug: false,
            scheme: "https".to_string(),
            timeout: DEFAULT_TIMEOUT,
            verify_tls: true,
            warning_policy: WarningPolicy::default(),
        }
    }

    /// Host (and optional port) of the service, e.g. `rally1.rallydev.com`.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Trace full response bodies.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// URL scheme; only local test servers need anything other than `https`.
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_tls_verification(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    pub fn with_warning_policy(mut self, policy: WarningPolicy) -> Self {
        self.warning_policy = policy;
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn verify_tls(&self) -> bool {
        self.verify_tls
    }

    pub fn warning_policy(&self) -> WarningPolicy {
        self.warning_policy
    }

    /// `{scheme}://{domain}/slm/webservice/{version}`, without a trailing slash.
    pub fn base_url(&self) -> String {
        format!(
            "{}://{}/slm/webservice/{}",
            self.scheme,
            self.domain.trim_end_matches('/'),
            self.version
        )
    }
}

impl fmt::Debug for ConnectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorConfig")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("domain", &self.domain)
            .field("version", &self.version)
            .field("user_agent", &self.user_agent)
            .field("debug", &self.debug)
            .field("scheme", &self.scheme)
            .field("timeout", &self.timeout)
            .field("verify_tls", &self.verify_tls)
            .field("warning_policy", &self.warning_policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_hosted_service() {
        let config = ConnectorConfig::new("user@example.com", "hunter2");
        assert_eq!(config.domain(), DEFAULT_DOMAIN);
        assert_eq!(config.version(), "v2.0");
        assert_eq!(config.warning_policy(), WarningPolicy::Raise);
        assert!(config.verify_tls());
        assert!(!config.debug());
        assert_eq!(
            config.base_url(),
            "https://rally1.rallydev.com/slm/webservice/v2.0"
        );
    }

    #[test]
    fn builder_overrides_base_url_parts() {
        let config = ConnectorConfig::new("u", "p")
            .with_scheme("http")
            .with_domain("127.0.0.1:8080/")
            .with_version("v3.0");
        assert_eq!(config.base_url(), "http://127.0.0.1:8080/slm/webservice/v3.0");
    }

    #[test]
    fn debug_output_redacts_password() {
        let config = ConnectorConfig::new("u", "hunter2");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
