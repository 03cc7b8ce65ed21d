//! # aws-query-client
//!
//! Request engine for AWS query-style APIs (EC2, SDB, ELB, RDS, SES, IAM, ...).
//!
//! This crate provides:
//! - Parameter escaping and request signing (versions 0, 1 and 2)
//! - Automatic GET to POST switching for long queries
//! - Error classification with redirect following and time-bounded retry
//! - Per-request, per-worker or single shared connections
//! - Optional unchanged-response detection
//! - Request/response tracing
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Service callers                          │
//! │  (build an action name + Params, pick a parser)             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    QueryClient                              │
//! │  - Signs every attempt                                      │
//! │  - Classifies failures: redirect / transient / fatal        │
//! │  - Backoff within the reiteration window                    │
//! │  - Owns the ConnectionPool and ResponseCache                │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Transport                                │
//! │  - ReqwestTransport by default                              │
//! │  - Any backend implementing the trait                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use aws_query_client::{
//!     ClientConfig, Credentials, ExecuteOptions, Params, QueryClient, ServiceDescriptor,
//! };
//! use aws_query_xml::SimpleOptions;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), aws_query_client::Error> {
//!     let credentials = Credentials::from_env()?;
//!     let config = ClientConfig::builder().with_region("eu-west-1").build();
//!     let rds = QueryClient::new(&ServiceDescriptor::rds(), credentials, config)?;
//!
//!     let shape = SimpleOptions::new()
//!         .group_tag("DBInstances", "DBInstance")
//!         .pull_out_array(["describe_db_instances_result", "db_instances"]);
//!     let instances = rds
//!         .execute_simple(
//!             "DescribeDBInstances",
//!             Params::new().with("MaxRecords", "20"),
//!             &shape,
//!             &ExecuteOptions::new(),
//!         )
//!         .await?;
//!
//!     println!("{}", instances.payload);
//!     Ok(())
//! }
//! ```

mod cache;
mod classify;
mod config;
mod credentials;
mod error;
mod executor;
mod pool;
mod request;
mod response;
mod retry;
mod signer;
mod transport;

pub use cache::{CacheCheck, Fetched, ResponseCache};
pub use classify::{
    build_record, ClassifierConfig, TransientPattern, Verdict, DEFAULT_CLOSE_ON_4XX_PROBABILITY,
    DEFAULT_TRANSIENT_PATTERNS,
};
pub use config::{ClientConfig, ClientConfigBuilder, ServiceDescriptor, DEFAULT_POST_THRESHOLD};
pub use credentials::Credentials;
pub use error::{Error, ErrorKind, ErrorRecord, Result};
pub use executor::{ExecuteOptions, QueryClient};
pub use pool::{slot_for, ConnectionMode, ConnectionPool, SlotKey, WorkerKey};
pub use request::{
    Endpoint, HttpMethod, HttpRequest, Params, ReadSeek, SeekableBody, ServiceRequest,
    SignedRequest, FORM_CONTENT_TYPE,
};
pub use response::{BodyKind, HttpResponse};
pub use retry::{RetryConfig, RetryGate, RetryState};
pub use signer::{
    canonical_query, escape, prepare, sign, sign_request, timestamp, SignatureMethod,
    SignatureVersion, TIMESTAMP_FORMAT,
};
pub use transport::{ReqwestTransport, Transport, TransportConfig};

/// User-Agent string for the client
pub const USER_AGENT: &str = concat!("aws-query/", env!("CARGO_PKG_VERSION"));
