//! Request model: parameters, endpoints and signed, transport-ready requests.

use std::fmt;
use std::io::{Read, Seek, SeekFrom};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use url::Url;

use crate::credentials::Credentials;
use crate::error::{Error, ErrorKind, Result};
use crate::signer::{self, SignatureVersion};

/// Content type of a form-encoded POST.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
        }
    }

    /// Convert to reqwest::Method.
    pub fn to_reqwest(&self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
        }
    }
}

/// Ordered parameter set. Setting an existing name replaces its value in
/// place; new names keep insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    pairs: Vec<(String, String)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == name) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((name, value)),
        }
        self
    }

    /// Set a parameter, builder style.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a parameter only when a value is present.
    pub fn with_opt(mut self, name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        if let Some(value) = value {
            self.set(name, value);
        }
        self
    }

    /// Add a list parameter as `Prefix.1`, `Prefix.2`, ...
    ///
    /// ```
    /// use aws_query_client::Params;
    ///
    /// let params = Params::new().indexed("InstanceId", ["i-1", "i-2"]);
    /// assert_eq!(params.get("InstanceId.2"), Some("i-2"));
    /// ```
    pub fn indexed<I, S>(mut self, prefix: &str, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for (i, item) in items.into_iter().enumerate() {
            self.set(format!("{prefix}.{}", i + 1), item);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self.pairs.iter().position(|(k, _)| k == name)?;
        Some(self.pairs.remove(idx).1)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, (String, String)> {
        self.pairs.iter()
    }

    /// Append every pair of `other`, replacing names already present.
    pub fn extend(&mut self, other: &Params) {
        for (k, v) in other {
            self.set(k.clone(), v.clone());
        }
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = &'a (String, String);
    type IntoIter = std::slice::Iter<'a, (String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.set(k, v);
        }
        params
    }
}

/// Where a request goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Endpoint {
    pub fn new(
        protocol: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        path: impl Into<String>,
    ) -> Self {
        let path = path.into();
        Self {
            protocol: protocol.into(),
            host: host.into(),
            port,
            path: if path.is_empty() { "/".to_string() } else { path },
        }
    }

    /// Parse an endpoint URL such as `https://ec2.amazonaws.com:443/`.
    pub fn parse(url: &str) -> Result<Self> {
        let parsed = Url::parse(url)?;
        let host = parsed
            .host_str()
            .ok_or_else(|| Error::new(ErrorKind::InvalidEndpoint(format!("no host in {url}"))))?;
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| Error::new(ErrorKind::InvalidEndpoint(format!("no port for {url}"))))?;
        Ok(Self::new(parsed.scheme(), host, port, parsed.path()))
    }

    /// `protocol://host:port`, without the path.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }

    /// Full URL of the service path.
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url(), self.path)
    }

    /// Point at the host, port and protocol named by a redirect `Location`.
    /// The service path is kept.
    pub fn apply_redirect(&mut self, location: &str) -> Result<()> {
        let target = Self::parse(location)?;
        self.protocol = target.protocol;
        self.host = target.host;
        self.port = target.port;
        Ok(())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}{}", self.host, self.port, self.path)
    }
}

/// A readable, rewindable upload body shared between attempts.
#[derive(Clone)]
pub struct SeekableBody {
    inner: Arc<Mutex<Box<dyn ReadSeek>>>,
}

/// Object-safe `Read + Seek`.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

impl fmt::Debug for SeekableBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeekableBody").finish_non_exhaustive()
    }
}

impl SeekableBody {
    pub fn new(body: impl Read + Seek + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(body))),
        }
    }

    /// Read from the current position to the end.
    pub fn read_to_bytes(&self) -> Result<Bytes> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut buf = Vec::new();
        guard.read_to_end(&mut buf)?;
        Ok(Bytes::from(buf))
    }

    /// Seek back to the start.
    pub fn rewind(&self) -> Result<()> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        guard.seek(SeekFrom::Start(0))?;
        Ok(())
    }
}

/// One service call before signing.
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    pub action: String,
    pub params: Params,
    pub endpoint: Endpoint,
    pub api_version: Option<String>,
    pub upload: Option<SeekableBody>,
}

impl ServiceRequest {
    pub fn new(action: impl Into<String>, params: Params, endpoint: Endpoint) -> Self {
        Self {
            action: action.into(),
            params,
            endpoint,
            api_version: None,
            upload: None,
        }
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Send `body` as a PUT with the signed query in the URL.
    pub fn with_upload(mut self, body: SeekableBody) -> Self {
        self.upload = Some(body);
        self
    }

    /// The parameters that get signed: `Action`, `AWSAccessKeyId`,
    /// `Version` (when set), then the caller's own.
    pub fn service_params(&self, access_key_id: &str) -> Params {
        let mut params = Params::new()
            .with("Action", self.action.as_str())
            .with("AWSAccessKeyId", access_key_id)
            .with_opt("Version", self.api_version.as_deref());
        params.extend(&self.params);
        params
    }

    /// Sign the request for sending.
    ///
    /// Requests are signed for GET first. If the signed query is longer than
    /// `post_threshold` the request becomes a form POST; v2 signatures cover
    /// the method, so those are signed again.
    pub fn sign(
        &self,
        credentials: &Credentials,
        version: SignatureVersion,
        post_threshold: usize,
        now: DateTime<Utc>,
    ) -> Result<SignedRequest> {
        let prepared = signer::prepare(
            &self.service_params(credentials.access_key_id()),
            version,
            now,
        );
        let sign_for = |method: HttpMethod| {
            signer::sign(
                credentials.secret_access_key(),
                &prepared,
                version,
                method,
                &self.endpoint.host,
                &self.endpoint.path,
            )
        };

        if self.upload.is_some() {
            let query = sign_for(HttpMethod::Put)?;
            return Ok(SignedRequest {
                method: HttpMethod::Put,
                endpoint: self.endpoint.clone(),
                query,
                form_body: None,
            });
        }

        let query = sign_for(HttpMethod::Get)?;
        if query.len() <= post_threshold {
            return Ok(SignedRequest {
                method: HttpMethod::Get,
                endpoint: self.endpoint.clone(),
                query,
                form_body: None,
            });
        }

        let query = if version == SignatureVersion::V2 {
            sign_for(HttpMethod::Post)?
        } else {
            query
        };
        Ok(SignedRequest {
            method: HttpMethod::Post,
            endpoint: self.endpoint.clone(),
            query: String::new(),
            form_body: Some(query),
        })
    }
}

/// A signed request ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub method: HttpMethod,
    pub endpoint: Endpoint,
    /// Signed query for GET and PUT; empty for POST.
    pub query: String,
    /// Signed form body for POST.
    pub form_body: Option<String>,
}

impl SignedRequest {
    /// Full request URL including the query string.
    pub fn url(&self) -> String {
        if self.query.is_empty() {
            self.endpoint.url()
        } else {
            format!("{}?{}", self.endpoint.url(), self.query)
        }
    }

    /// Turn into the transport's wire request.
    pub fn into_http(self, upload: Option<Bytes>) -> HttpRequest {
        let url = self.url();
        let (content_type, body) = match (self.method, self.form_body, upload) {
            (HttpMethod::Post, Some(form), _) => (Some(FORM_CONTENT_TYPE), Some(Bytes::from(form))),
            (HttpMethod::Put, _, Some(data)) => (None, Some(data)),
            _ => (None, None),
        };
        HttpRequest {
            method: self.method,
            url,
            content_type,
            body,
        }
    }
}

/// Wire-level request handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub content_type: Option<&'static str>,
    pub body: Option<Bytes>,
}
