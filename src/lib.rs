//! # aws-query
//!
//! Request engine for AWS query-style web services.
//!
//! Every call of the query protocol family (EC2, SDB, ELB, RDS, SES, IAM, ...)
//! funnels through the same machinery: sign an action plus its parameters,
//! send it, and either parse the XML response or decide whether the failure
//! is worth a retry or a redirect.
//!
//! ## Security
//!
//! - Secret keys are redacted in Debug output
//! - Tracing spans skip request parameters and credentials
//! - Error snippets are sanitized of access key ids and signatures
//!
//! ## Crates
//!
//! - **aws-query-xml** - XML event protocol, tree parser, directive-driven transform, error documents
//! - **aws-query-client** - Signing, request executor, error classification, retry, connection pooling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use aws_query::client::{ClientConfig, Credentials, ExecuteOptions, Params, QueryClient, ServiceDescriptor};
//! use aws_query::xml::TreeParser;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let elb = QueryClient::new(
//!         &ServiceDescriptor::elb(),
//!         Credentials::from_env()?,
//!         ClientConfig::default(),
//!     )?;
//!
//!     let root = elb
//!         .execute(
//!             "DescribeLoadBalancers",
//!             Params::new().indexed("LoadBalancerNames.member", ["web"]),
//!             TreeParser::new(),
//!             &ExecuteOptions::new().with_retries(3),
//!         )
//!         .await?;
//!
//!     println!("{root:?}");
//!     Ok(())
//! }
//! ```

// Re-export all crates for convenient access
pub use aws_query_client as client;
pub use aws_query_xml as xml;

pub use aws_query_client::{
    ClientConfig, ConnectionMode, Credentials, Error, ErrorKind, ExecuteOptions, Params,
    QueryClient, Result, ServiceDescriptor, SignatureVersion,
};
pub use aws_query_xml::{SimpleOptions, SimpleResult, TreeParser};
