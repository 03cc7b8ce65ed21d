//! Classification of failed and redirected responses.
//!
//! Every non-2xx response becomes a [`Verdict`]: a redirect to follow, a
//! transient failure worth retrying, or a fatal error. Whether the connection
//! should be torn down is a separate decision made by [`ClassifierConfig::should_close`].

use aws_query_xml::{extract_request_id, ErrorResponse};
use regex_lite::Regex;
use tracing::warn;

use crate::error::{sanitize_snippet, ErrorRecord};
use crate::response::{BodyKind, HttpResponse};

/// Error texts that indicate a temporary service-side problem.
pub const DEFAULT_TRANSIENT_PATTERNS: &[&str] = &[
    "internal service error",
    "is currently unavailable",
    "no response from",
    "Please try again",
    "InternalError",
    "ServiceUnavailable",
    "Unavailable",
    "This application is not currently available",
    "InsufficientInstanceCapacity",
];

/// Default chance, in percent, of closing the connection on a 4xx.
pub const DEFAULT_CLOSE_ON_4XX_PROBABILITY: u8 = 10;

const SNIPPET_LEN: usize = 200;

/// A case-insensitive transient error pattern.
///
/// Patterns are regular expressions; one that does not compile is matched as
/// a literal substring instead.
#[derive(Debug, Clone)]
pub struct TransientPattern {
    source: String,
    matcher: Matcher,
}

#[derive(Debug, Clone)]
enum Matcher {
    Regex(Regex),
    Literal(String),
}

impl TransientPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        let source = pattern.into();
        let matcher = match Regex::new(&format!("(?i){source}")) {
            Ok(regex) => Matcher::Regex(regex),
            Err(_) => Matcher::Literal(source.to_lowercase()),
        };
        Self { source, matcher }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        match &self.matcher {
            Matcher::Regex(regex) => regex.is_match(text),
            Matcher::Literal(literal) => text.to_lowercase().contains(literal.as_str()),
        }
    }
}

/// Settings for the error classifier.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    patterns: Vec<TransientPattern>,
    /// Close the connection on transient errors and 5xx responses.
    pub close_on_error: bool,
    /// Percent chance (0-100) of closing the connection on a 4xx.
    pub close_on_4xx_probability: u8,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_TRANSIENT_PATTERNS
                .iter()
                .map(|p| TransientPattern::new(*p))
                .collect(),
            close_on_error: true,
            close_on_4xx_probability: DEFAULT_CLOSE_ON_4XX_PROBABILITY,
        }
    }
}

impl ClassifierConfig {
    /// Replace the transient pattern list.
    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns = patterns.into_iter().map(TransientPattern::new).collect();
        self
    }

    /// Append a transient pattern.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.push(TransientPattern::new(pattern));
        self
    }

    pub fn with_close_on_error(mut self, enabled: bool) -> Self {
        self.close_on_error = enabled;
        self
    }

    /// Set the 4xx close probability; values above 100 are clamped.
    pub fn with_close_on_4xx_probability(mut self, percent: u8) -> Self {
        self.close_on_4xx_probability = percent.min(100);
        self
    }

    pub fn patterns(&self) -> &[TransientPattern] {
        &self.patterns
    }

    /// The first pattern matching `text`.
    pub fn match_transient(&self, text: &str) -> Option<&TransientPattern> {
        self.patterns.iter().find(|p| p.is_match(text))
    }

    /// Classify a non-2xx response to a request for `request` (`host:port/path`).
    pub fn classify(&self, response: &HttpResponse, request: &str) -> Verdict {
        let (record, matched_text) = build_record(response, request);

        if response.is_redirect() {
            if let Some(location) = response.location() {
                return Verdict::Redirect {
                    location: location.to_string(),
                    record,
                };
            }
        }

        match self.match_transient(&matched_text) {
            Some(pattern) => Verdict::Transient {
                record,
                pattern: pattern.as_str().to_string(),
            },
            None => Verdict::Fatal(record),
        }
    }

    /// Decide whether to tear down the connection after `verdict`.
    ///
    /// `roll` is a uniform draw from `0..100`, compared against the 4xx
    /// close probability.
    pub fn should_close(&self, verdict: &Verdict, status: u16, roll: u8) -> bool {
        match verdict {
            Verdict::Redirect { .. } => true,
            Verdict::Transient { .. } => self.close_on_error,
            Verdict::Fatal(_) => {
                self.close_on_error
                    && match status {
                        500..=599 => true,
                        400..=499 => roll < self.close_on_4xx_probability,
                        _ => false,
                    }
            }
        }
    }
}

/// How to proceed after a non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Follow `location`; not counted as a retry.
    Redirect { location: String, record: ErrorRecord },
    /// Retry within the window.
    Transient { record: ErrorRecord, pattern: String },
    /// Give up.
    Fatal(ErrorRecord),
}

impl Verdict {
    pub fn record(&self) -> &ErrorRecord {
        match self {
            Verdict::Redirect { record, .. }
            | Verdict::Transient { record, .. }
            | Verdict::Fatal(record) => record,
        }
    }

    pub fn into_record(self) -> ErrorRecord {
        match self {
            Verdict::Redirect { record, .. }
            | Verdict::Transient { record, .. }
            | Verdict::Fatal(record) => record,
        }
    }
}

/// Build the error record for a response, plus the text transient patterns
/// are matched against.
pub fn build_record(response: &HttpResponse, request: &str) -> (ErrorRecord, String) {
    let body = response.text();
    let kind = match response.body_kind() {
        BodyKind::Empty => BodyKind::Empty,
        _ if response.is_redirect() => BodyKind::Xml,
        kind => kind,
    };

    let status_line = |detail: Option<String>| {
        let mut message = format!("{} ({})", response.reason, request);
        if let Some(detail) = detail {
            message.push_str(": ");
            message.push_str(&detail);
        }
        ErrorRecord {
            errors: vec![(response.status.to_string(), message)],
            request_id: extract_request_id(&body),
            status: response.status,
            request: request.to_string(),
        }
    };

    match kind {
        BodyKind::Xml => match ErrorResponse::parse(&body) {
            Ok(parsed) if !parsed.is_empty() => {
                let text = parsed.flattened();
                let record = ErrorRecord {
                    errors: parsed.errors,
                    request_id: parsed.request_id,
                    status: response.status,
                    request: request.to_string(),
                };
                (record, text)
            }
            Ok(_) => (status_line(None), response.reason.clone()),
            Err(err) => {
                if !response.is_redirect() {
                    warn!(status = response.status, error = %err, "Unparseable XML error body");
                }
                (status_line(None), response.reason.clone())
            }
        },
        BodyKind::Markup | BodyKind::Empty => (status_line(None), response.reason.clone()),
        BodyKind::Text => {
            let snippet = sanitize_snippet(&body, SNIPPET_LEN);
            let text = format!("{}\n{}", response.reason, snippet);
            (status_line(Some(snippet)), text)
        }
    }
}
