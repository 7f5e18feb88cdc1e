//! Minimal NIFCLOUD RDB API client.
//!
//! NIFCLOUD has no official Rust SDK, so this crate carries just enough of
//! the RDB query API for the exporter:
//!
//! - [`client`] - `RdbClient` and the `NiftyGetMetricStatistics` operation
//! - [`credential`] - Per-environment API credential pair
//! - [`error`] - Error types
//!
//! Request signing (SignatureVersion 2) is internal to the client.
//!
//! The API is an AWS-2013-style query interface: GET requests with flattened
//! query parameters (`Dimensions.member.1.Name=...`), HmacSHA256 signatures,
//! and XML response bodies.

pub mod client;
pub mod credential;
pub mod error;
mod sign;

pub use client::{
    Datapoint, Dimension, MetricStatistics, NiftyGetMetricStatisticsInput,
    NiftyGetMetricStatisticsOutput, RdbClient,
};
pub use credential::Credential;
pub use error::{ApiError, Result};
