//! Parser for service error documents.
//!
//! Handles both layouts the query services return:
//!
//! ```text
//! <Response><Errors><Error><Code>..</Code><Message>..</Message></Error></Errors><RequestID>..</RequestID></Response>
//! <ErrorResponse><Error><Type>..</Type><Code>..</Code><Message>..</Message></Error><RequestId>..</RequestId></ErrorResponse>
//! ```

use std::sync::LazyLock;

use regex_lite::Regex;

use crate::error::Result;
use crate::events::{parse_response, strip_namespace, Attributes, ResponseParser, XmlHandler};

static REQUEST_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:[\w-]+:)?(?:RequestI[Dd]|requestId)>\s*([^<]+?)\s*</")
        .expect("valid request id pattern")
});

/// Errors extracted from a failure response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorResponse {
    /// `(code, message)` pairs in document order.
    pub errors: Vec<(String, String)>,
    pub request_id: Option<String>,
}

impl ErrorResponse {
    /// Parse an error document, falling back to a raw pattern match for the
    /// request id when the structured parse did not see one.
    pub fn parse(body: &str) -> Result<Self> {
        let mut response = parse_response(body, ErrorResponseParser::new())?;
        if response.request_id.is_none() {
            response.request_id = extract_request_id(body);
        }
        Ok(response)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Codes and messages flattened into one newline-separated string.
    pub fn flattened(&self) -> String {
        self.errors
            .iter()
            .flat_map(|(code, message)| [code.as_str(), message.as_str()])
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Pull a request id out of a raw body without parsing it.
pub fn extract_request_id(body: &str) -> Option<String> {
    REQUEST_ID
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Event handler collecting `<Error>` entries and the request id.
#[derive(Debug, Default)]
pub struct ErrorResponseParser {
    text: String,
    code: Option<String>,
    message: Option<String>,
    response: ErrorResponse,
}

impl ErrorResponseParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl XmlHandler for ErrorResponseParser {
    fn tag_start(&mut self, name: &str, _attributes: &Attributes) {
        self.text.clear();
        if strip_namespace(name) == "Error" {
            self.code = None;
            self.message = None;
        }
    }

    fn text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn tag_end(&mut self, name: &str) {
        match strip_namespace(name) {
            "RequestID" | "RequestId" | "requestId" => {
                self.response.request_id = Some(self.text.trim().to_string());
            }
            "Code" => self.code = Some(self.text.trim().to_string()),
            "Message" => self.message = Some(self.text.trim().to_string()),
            "Error" => {
                let code = self.code.take().unwrap_or_default();
                let message = self.message.take().unwrap_or_default();
                self.response.errors.push((code, message));
            }
            _ => {}
        }
        self.text.clear();
    }
}

impl ResponseParser for ErrorResponseParser {
    type Output = ErrorResponse;

    fn finish(self) -> Result<ErrorResponse> {
        Ok(self.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ec2_style_errors() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
  <Errors>
    <Error><Code>InvalidInstanceID.NotFound</Code><Message>The instance ID 'i-1' does not exist</Message></Error>
    <Error><Code>InternalError</Code><Message>We encountered an internal error.</Message></Error>
  </Errors>
  <RequestID>ab-12</RequestID>
</Response>"#;

        let response = ErrorResponse::parse(body).unwrap();
        assert_eq!(response.errors.len(), 2);
        assert_eq!(response.errors[0].0, "InvalidInstanceID.NotFound");
        assert_eq!(response.errors[1].0, "InternalError");
        assert_eq!(response.errors[1].1, "We encountered an internal error.");
        assert_eq!(response.request_id.as_deref(), Some("ab-12"));
        assert!(response.flattened().contains("InternalError\nWe encountered"));
    }

    #[test]
    fn test_parse_query_style_error() {
        let body = r#"<ErrorResponse xmlns="http://elasticloadbalancing.amazonaws.com/doc/2012-06-01/">
  <Error><Type>Sender</Type><Code>Throttling</Code><Message>Rate exceeded</Message></Error>
  <RequestId>req-9</RequestId>
</ErrorResponse>"#;

        let response = ErrorResponse::parse(body).unwrap();
        assert_eq!(response.errors, vec![("Throttling".to_string(), "Rate exceeded".to_string())]);
        assert_eq!(response.request_id.as_deref(), Some("req-9"));
    }

    #[test]
    fn test_error_without_message() {
        let response = ErrorResponse::parse("<Error><Code>AccessDenied</Code></Error>").unwrap();
        assert_eq!(response.errors, vec![("AccessDenied".to_string(), String::new())]);
        assert_eq!(response.request_id, None);
    }

    #[test]
    fn test_extract_request_id_fallback() {
        assert_eq!(
            extract_request_id("garbage <requestId> 7f-1 </requestId> more"),
            Some("7f-1".to_string())
        );
        assert_eq!(
            extract_request_id("<RequestID>X</RequestID>"),
            Some("X".to_string())
        );
        assert_eq!(extract_request_id("<html>no id</html>"), None);
    }
}
