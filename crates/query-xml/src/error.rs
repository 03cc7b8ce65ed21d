//! Error types for aws-query-xml.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    pub kind: ErrorKind,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    pub fn with_source(
        kind: ErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// The document is not well-formed.
    #[error("XML parse error at position {position}: {message}")]
    Syntax { position: u64, message: String },
    /// A tag name, attribute or text node is not valid UTF-8.
    #[error("Invalid UTF-8 in XML: {0}")]
    Utf8(String),
    /// A closing tag does not match the currently open element.
    #[error("Mismatched closing tag: expected </{expected}>, found </{found}>")]
    MismatchedTag { expected: String, found: String },
    /// The document ended while elements were still open.
    #[error("Unexpected end of document inside <{0}>")]
    UnexpectedEof(String),
    /// A `pull_out` path did not resolve.
    #[error("Missing path in response: {0}")]
    MissingPath(String),
    /// The payload at a path has a shape the caller did not expect.
    #[error("Unexpected shape at {path}: {message}")]
    UnexpectedShape { path: String, message: String },
    /// The payload could not be deserialized into the requested type.
    #[error("Deserialization error: {0}")]
    Deserialize(String),
    #[error("{0}")]
    Other(String),
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::with_source(
            ErrorKind::Syntax {
                position: 0,
                message: err.to_string(),
            },
            err,
        )
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::with_source(
            ErrorKind::Syntax {
                position: 0,
                message: err.to_string(),
            },
            err,
        )
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Self {
        Error::with_source(ErrorKind::Utf8(err.to_string()), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Deserialize(err.to_string()), err)
    }
}
