//! HTTP responses as seen by the executor.

use std::borrow::Cow;

use bytes::Bytes;

/// A fully read HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Reason phrase of the status line.
    pub reason: String,
    /// Header names are stored lowercased.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

/// What a response body looks like, for error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// An XML document: has a prolog, or is markup carrying an `<Error>`.
    Xml,
    /// Other markup, typically an HTML error page from a proxy.
    Markup,
    /// Plain text.
    Text,
    /// Nothing but whitespace.
    Empty,
}

impl HttpResponse {
    /// Create a response with the canonical reason phrase for `status`.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        let reason = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or_default()
            .to_string();
        Self {
            status,
            reason,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .push((name.as_ref().to_ascii_lowercase(), value.into()));
        self
    }

    /// Override the reason phrase.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Returns true if the response status is successful (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns true for any 3xx status.
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    /// Get a header value (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get the Location header.
    pub fn location(&self) -> Option<&str> {
        self.header("location")
    }

    /// Get the Content-Type header.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// The body as text, replacing invalid UTF-8.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn body_kind(&self) -> BodyKind {
        let text = self.text();
        let trimmed = text.trim_start();
        if trimmed.trim_end().is_empty() {
            BodyKind::Empty
        } else if trimmed.contains("<?xml") {
            BodyKind::Xml
        } else if trimmed.starts_with('<') {
            if trimmed.contains("<Error>") || trimmed.contains("<Errors>") {
                BodyKind::Xml
            } else {
                BodyKind::Markup
            }
        } else {
            BodyKind::Text
        }
    }
}
