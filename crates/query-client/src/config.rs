//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classify::ClassifierConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::pool::ConnectionMode;
use crate::request::Endpoint;
use crate::retry::RetryConfig;
use crate::signer::SignatureVersion;
use crate::transport::TransportConfig;

/// Default length of a GET query above which requests switch to POST.
pub const DEFAULT_POST_THRESHOLD: usize = 2000;

/// Configuration for a query client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Full endpoint URL; replaces the service's default host, port and path.
    pub endpoint_url: Option<String>,
    /// Region prefixed to the service's default host.
    pub region: Option<String>,
    /// API version; overrides the service default.
    pub api_version: Option<String>,
    pub signature_version: SignatureVersion,
    pub connection_mode: ConnectionMode,
    /// Retry configuration.
    pub retry: RetryConfig,
    /// Error classification and connection-closing policy.
    pub classifier: ClassifierConfig,
    /// Queries longer than this are sent as a POST form.
    pub post_threshold: usize,
    /// Request timeout.
    pub timeout: Duration,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Pool idle timeout.
    pub pool_idle_timeout: Duration,
    /// User-Agent header value.
    pub user_agent: String,
    /// Accept compressed responses.
    pub compression: bool,
    /// Whether to enable request/response tracing.
    pub enable_tracing: bool,
    /// Detect unchanged responses per action.
    pub caching: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            region: None,
            api_version: None,
            signature_version: SignatureVersion::default(),
            connection_mode: ConnectionMode::default(),
            retry: RetryConfig::default(),
            classifier: ClassifierConfig::default(),
            post_threshold: DEFAULT_POST_THRESHOLD,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(90),
            user_agent: crate::USER_AGENT.to_string(),
            compression: true,
            enable_tracing: true,
            caching: false,
        }
    }
}

impl ClientConfig {
    /// Create a new client config builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Where requests for `service` go.
    ///
    /// An explicit endpoint URL wins. Otherwise the service's default host is
    /// used, prefixed with the region when one is set.
    pub fn resolve_endpoint(&self, service: &ServiceDescriptor) -> Result<Endpoint> {
        match &self.endpoint_url {
            Some(url) => Endpoint::parse(url),
            None => Ok(service.endpoint(self.region.as_deref())),
        }
    }

    /// API version sent with requests for `service`.
    pub fn resolve_api_version(&self, service: &ServiceDescriptor) -> Option<String> {
        self.api_version
            .clone()
            .or_else(|| service.api_version.clone())
    }

    /// Settings for [`crate::ReqwestTransport`] connections.
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            connect_timeout: self.connect_timeout,
            pool_idle_timeout: self.pool_idle_timeout,
            user_agent: self.user_agent.clone(),
            accept_compressed: self.compression,
        }
    }
}

/// Builder for ClientConfig.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Send requests to this URL instead of the service default.
    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint_url = Some(url.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.config.region = Some(region.into());
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.config.api_version = Some(version.into());
        self
    }

    pub fn with_signature_version(mut self, version: SignatureVersion) -> Self {
        self.config.signature_version = version;
        self
    }

    pub fn with_connection_mode(mut self, mode: ConnectionMode) -> Self {
        self.config.connection_mode = mode;
        self
    }

    /// Set the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Disable retries and redirects.
    pub fn without_retry(mut self) -> Self {
        self.config.retry = RetryConfig::no_retry();
        self
    }

    pub fn with_classifier(mut self, classifier: ClassifierConfig) -> Self {
        self.config.classifier = classifier;
        self
    }

    pub fn with_post_threshold(mut self, threshold: usize) -> Self {
        self.config.post_threshold = threshold;
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set pool idle timeout.
    pub fn with_pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    /// Set custom User-Agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Accept gzip/deflate responses.
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.config.compression = enabled;
        self
    }

    /// Enable or disable request/response tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.config.enable_tracing = enabled;
        self
    }

    /// Enable unchanged-response detection for [`crate::QueryClient::execute_cached`].
    pub fn with_caching(mut self, enabled: bool) -> Self {
        self.config.caching = enabled;
        self
    }

    /// Build the client configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Default location and API version of one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Short name, also used for environment overrides (`<NAME>_URL`).
    pub name: String,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub protocol: String,
    pub api_version: Option<String>,
}

impl ServiceDescriptor {
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port: 443,
            path: "/".to_string(),
            protocol: "https".to_string(),
            api_version: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Elastic Load Balancing.
    pub fn elb() -> Self {
        Self::new("elb", "elasticloadbalancing.amazonaws.com").with_api_version("2009-05-15")
    }

    /// Relational Database Service.
    pub fn rds() -> Self {
        Self::new("rds", "rds.amazonaws.com").with_api_version("2010-07-28")
    }

    /// Simple Email Service.
    pub fn ses() -> Self {
        Self::new("ses", "email.us-east-1.amazonaws.com").with_api_version("2010-12-01")
    }

    /// Apply `<NAME>_URL` and `<NAME>_API_VERSION` from the environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        let prefix = self.name.to_uppercase();
        self.with_overrides(
            std::env::var(format!("{prefix}_URL")).ok(),
            std::env::var(format!("{prefix}_API_VERSION")).ok(),
        )
    }

    fn with_overrides(mut self, url: Option<String>, api_version: Option<String>) -> Result<Self> {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            let endpoint = Endpoint::parse(&url).map_err(|e| {
                Error::with_source(
                    ErrorKind::Config(format!("invalid {}_URL: {url}", self.name.to_uppercase())),
                    e,
                )
            })?;
            self.protocol = endpoint.protocol;
            self.host = endpoint.host;
            self.port = endpoint.port;
            self.path = endpoint.path;
        }
        if let Some(version) = api_version.filter(|v| !v.trim().is_empty()) {
            self.api_version = Some(version);
        }
        Ok(self)
    }

    /// The default endpoint, with `region.` prefixed to the host.
    pub fn endpoint(&self, region: Option<&str>) -> Endpoint {
        let host = match region {
            Some(region) if !region.is_empty() => format!("{region}.{}", self.host),
            _ => self.host.clone(),
        };
        Endpoint::new(self.protocol.as_str(), host, self.port, self.path.as_str())
    }
}
