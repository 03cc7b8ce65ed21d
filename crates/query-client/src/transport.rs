//! Pluggable HTTP transports.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, ErrorKind, Result};
use crate::request::HttpRequest;
use crate::response::HttpResponse;

/// Performs one HTTP exchange on a connection it created.
///
/// The executor owns connection lifetimes (see [`crate::ConnectionMode`]);
/// a transport only knows how to open a connection and how to send on one.
/// Connections may be shared between concurrent callers, so they must be
/// `Send + Sync`.
pub trait Transport: Send + Sync + 'static {
    type Connection: Send + Sync + 'static;

    /// Open a new connection.
    fn connect(&self) -> Result<Self::Connection>;

    /// Send `request` and read the whole response. Redirects must be
    /// returned as-is, not followed.
    fn send(
        &self,
        connection: &Self::Connection,
        request: HttpRequest,
        timeout: Option<Duration>,
    ) -> impl Future<Output = Result<HttpResponse>> + Send;
}

/// Settings for [`ReqwestTransport`] connections.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    pub pool_idle_timeout: Duration,
    pub user_agent: String,
    /// Accept gzip/deflate encoded responses.
    pub accept_compressed: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(90),
            user_agent: crate::USER_AGENT.to_string(),
            accept_compressed: true,
        }
    }
}

/// Transport backed by reqwest. Each connection is a `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    config: TransportConfig,
}

impl ReqwestTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

impl Transport for ReqwestTransport {
    type Connection = reqwest::Client;

    fn connect(&self) -> Result<reqwest::Client> {
        let builder = reqwest::Client::builder()
            .connect_timeout(self.config.connect_timeout)
            .pool_idle_timeout(self.config.pool_idle_timeout)
            .user_agent(&self.config.user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .gzip(self.config.accept_compressed)
            .deflate(self.config.accept_compressed);

        builder
            .build()
            .map_err(|e| Error::with_source(ErrorKind::Config(e.to_string()), e))
    }

    async fn send(
        &self,
        connection: &reqwest::Client,
        request: HttpRequest,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse> {
        let mut req = connection.request(request.method.to_reqwest(), &request.url);

        if let Some(content_type) = request.content_type {
            req = req.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        if let Some(body) = request.body {
            req = req.body(body);
        }
        if let Some(timeout) = timeout {
            req = req.timeout(timeout);
        }

        let response = req.send().await?;
        let status = response.status();
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
        let body = response.bytes().await?;
        debug!(status = status.as_u16(), content_length = body.len(), "Response received");

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{HttpMethod, FORM_CONTENT_TYPE};
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_get_roundtrip() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/"))
            .and(query_param("Action", "DescribeWidgets"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<ok/>"))
            .mount(&mock_server)
            .await;

        let transport = ReqwestTransport::default();
        let conn = transport.connect().unwrap();
        let response = transport
            .send(
                &conn,
                HttpRequest {
                    method: HttpMethod::Get,
                    url: format!("{}/?Action=DescribeWidgets", mock_server.uri()),
                    content_type: None,
                    body: None,
                },
                None,
            )
            .await
            .unwrap();

        assert!(response.is_success());
        assert_eq!(response.reason, "OK");
        assert_eq!(&response.body[..], b"<ok/>");
    }

    #[tokio::test]
    async fn test_post_form_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("content-type", FORM_CONTENT_TYPE))
            .and(body_string("Action=PutWidget&Signature=x"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let transport = ReqwestTransport::default();
        let conn = transport.connect().unwrap();
        let response = transport
            .send(
                &conn,
                HttpRequest {
                    method: HttpMethod::Post,
                    url: format!("{}/", mock_server.uri()),
                    content_type: Some(FORM_CONTENT_TYPE),
                    body: Some(bytes::Bytes::from_static(b"Action=PutWidget&Signature=x")),
                },
                None,
            )
            .await
            .unwrap();

        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_redirects_are_not_followed() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(301)
                    .insert_header("Location", "https://elsewhere.example.com/"),
            )
            .mount(&mock_server)
            .await;

        let transport = ReqwestTransport::default();
        let conn = transport.connect().unwrap();
        let response = transport
            .send(
                &conn,
                HttpRequest {
                    method: HttpMethod::Get,
                    url: format!("{}/", mock_server.uri()),
                    content_type: None,
                    body: None,
                },
                None,
            )
            .await
            .unwrap();

        assert!(response.is_redirect());
        assert_eq!(response.location(), Some("https://elsewhere.example.com/"));
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&mock_server)
            .await;

        let transport = ReqwestTransport::default();
        let conn = transport.connect().unwrap();
        let err = transport
            .send(
                &conn,
                HttpRequest {
                    method: HttpMethod::Get,
                    url: format!("{}/", mock_server.uri()),
                    content_type: None,
                    body: None,
                },
                Some(Duration::from_millis(50)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err.kind, ErrorKind::Timeout), "{err:?}");
    }
}
