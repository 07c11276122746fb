//! Remote test-management service client.
//!
//! Algorithms only see the `TestOpsApi` trait; `HttpTestOps` talks to the
//! real service.

pub mod api;
pub mod dto;
pub mod http;
#[cfg(test)]
pub(crate) mod memory;

pub use api::*;
pub use dto::*;
pub use http::HttpTestOps;
