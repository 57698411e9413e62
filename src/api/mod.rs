//! HTTP API Module
//!
//! Provides the REST API for writes, reads, replica registration and the
//! replica-side replication endpoints.

mod http;
mod replicate;

pub use http::{ApiError, ErrorResponse, HttpServer};
