//! End-to-end tests against a local mock service.
//!
//! Run with:
//!   RUST_LOG=aws_query_client=debug cargo test --test integration -- --nocapture

#[path = "integration/common.rs"]
mod common;
#[path = "integration/connections.rs"]
mod connections;
#[path = "integration/describe.rs"]
mod describe;
#[path = "integration/errors.rs"]
mod errors;
#[path = "integration/redirects.rs"]
mod redirects;
#[path = "integration/signing.rs"]
mod signing;
