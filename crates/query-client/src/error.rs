//! Error types for aws-query-client.

use std::fmt;
use std::sync::LazyLock;

use regex_lite::Regex;

/// Result type alias for aws-query-client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for aws-query-client operations.
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional source error.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Create a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    /// Create a new error with the given kind and source.
    pub fn with_source(
        kind: ErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
        }
    }

    /// The service error record, if the service rejected the call.
    pub fn record(&self) -> Option<&ErrorRecord> {
        match &self.kind {
            ErrorKind::Service { record, .. } => Some(record),
            _ => None,
        }
    }

    /// Returns true if the service answered with the given error code.
    pub fn has_code(&self, code: &str) -> bool {
        self.record()
            .is_some_and(|r| r.errors.iter().any(|(c, _)| c == code))
    }

    /// Returns true if the failure happened below the HTTP layer.
    pub fn is_transport(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Transport(_) | ErrorKind::Timeout | ErrorKind::Connection(_)
        )
    }

    /// HTTP status of a service error.
    pub fn status(&self) -> Option<u16> {
        self.record().map(|r| r.status)
    }

    /// Request id reported by the service.
    pub fn request_id(&self) -> Option<&str> {
        self.record().and_then(|r| r.request_id.as_deref())
    }
}

/// The kind of error that occurred.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// The service rejected the request, permanently or after the retry
    /// budget ran out.
    #[error("Service error after {attempts} attempt(s): {record}")]
    Service { record: ErrorRecord, attempts: u32 },

    /// The transport failed to complete the exchange.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request timeout.
    #[error("Request timeout")]
    Timeout,

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Request signing failed.
    #[error("Signing error: {0}")]
    Signing(String),

    /// Endpoint or redirect target could not be used.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing or unusable credentials.
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// A successful response could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Reading or rewinding an upload body failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Everything known about a failed call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorRecord {
    /// `(code, message)` pairs in the order the service reported them.
    pub errors: Vec<(String, String)>,
    pub request_id: Option<String>,
    pub status: u16,
    /// `host:port/path` of the request that failed.
    pub request: String,
}

impl ErrorRecord {
    /// Codes and messages flattened into one newline-separated string, used
    /// for transient pattern matching.
    pub fn flattened(&self) -> String {
        self.errors
            .iter()
            .flat_map(|(code, message)| [code.as_str(), message.as_str()])
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().map(|(code, _)| code.as_str())
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        for (code, message) in &self.errors {
            if message.is_empty() {
                write!(f, " [{code}]")?;
            } else {
                write!(f, " [{code}: {message}]")?;
            }
        }
        if let Some(id) = &self.request_id {
            write!(f, " (request id {id})")?;
        }
        Ok(())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ErrorKind::Timeout
        } else if err.is_connect() {
            ErrorKind::Connection(err.to_string())
        } else if err.is_builder() {
            ErrorKind::Config(err.to_string())
        } else {
            ErrorKind::Transport(err.to_string())
        };

        Error::with_source(kind, err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::with_source(ErrorKind::InvalidEndpoint(err.to_string()), err)
    }
}

impl From<aws_query_xml::Error> for Error {
    fn from(err: aws_query_xml::Error) -> Self {
        Error::with_source(ErrorKind::Parse(err.to_string()), err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::with_source(ErrorKind::Io(err.to_string()), err)
    }
}

static ACCESS_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:AKIA|ASIA)[A-Z0-9]{16}\b").expect("valid access key pattern")
});
static SIGNATURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Signature=[A-Za-z0-9%+/=]+").expect("valid signature pattern"));

/// Sanitize a response snippet before it ends up in an error message.
///
/// This function:
/// - Removes anything that looks like an access key id
/// - Removes signatures echoed back in URLs
/// - Collapses whitespace and truncates to `max_len` characters
pub(crate) fn sanitize_snippet(message: &str, max_len: usize) -> String {
    let sanitized = ACCESS_KEY.replace_all(message, "[REDACTED_KEY]");
    let sanitized = SIGNATURE.replace_all(&sanitized, "Signature=[REDACTED]");
    let mut sanitized = sanitized.split_whitespace().collect::<Vec<_>>().join(" ");

    if let Some((idx, _)) = sanitized.char_indices().nth(max_len) {
        sanitized.truncate(idx);
        sanitized.push_str("...[truncated]");
    }

    sanitized
}
