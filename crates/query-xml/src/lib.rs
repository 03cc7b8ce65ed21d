//! # aws-query-xml
//!
//! Response parsing for AWS query-style APIs.
//!
//! This crate provides:
//! - A streaming event protocol ([`XmlHandler`]) driven by quick-xml
//! - A schema-free tree parser ([`TreeParser`]) that turns repeated sibling
//!   tags into sequences
//! - A directive-driven transform ([`SimpleParser`]) for list-of-record
//!   responses, producing `serde_json::Value`
//! - An error-document parser ([`ErrorResponse`])
//! - Tag name normalization ([`underscore`])
//!
//! ## Example
//!
//! ```rust
//! use aws_query_xml::{parse_response, TreeParser};
//!
//! let xml = r#"<DescribeWidgetsResponse>
//!   <DescribeWidgetsResult>
//!     <Widgets>
//!       <Widget><Id>w-1</Id></Widget>
//!       <Widget><Id>w-2</Id></Widget>
//!     </Widgets>
//!   </DescribeWidgetsResult>
//! </DescribeWidgetsResponse>"#;
//!
//! let root = parse_response(xml, TreeParser::new()).unwrap();
//! let widgets = root
//!     .at("describe_widgets_response/describe_widgets_result/widgets/widget")
//!     .unwrap();
//! let ids: Vec<_> = widgets.as_slice().iter().filter_map(|w| w.child_text("id")).collect();
//! assert_eq!(ids, vec!["w-1", "w-2"]);
//! ```

mod error;
mod error_response;
mod events;
mod naming;
mod simple;
mod tree;

pub use error::{Error, ErrorKind, Result};
pub use error_response::{extract_request_id, ErrorResponse, ErrorResponseParser};
pub use events::{
    parse, parse_response, strip_namespace, Attributes, ResponseParser, XmlHandler, XmlPath,
};
pub use naming::underscore;
pub use simple::{PullOut, SimpleOptions, SimpleParser, SimpleResult};
pub use tree::{Field, Node, TreeParser};
