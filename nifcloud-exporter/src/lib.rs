//! Prometheus exporter for NIFCLOUD RDB metrics.
//!
//! Each Prometheus scrape triggers one collection pass: the collector fans
//! out one task per configured database instance, queries the
//! `NiftyGetMetricStatistics` API once per catalog metric, and renders every
//! produced sample in text exposition format.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  NIFCLOUD RDB   │<────│    Collector    │<────│   HTTP Server   │
//! │   (query API)   │     │  (scrape pass)  │     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! Run the exporter binary with a configuration file:
//!
//! ```bash
//! nifcloud_exporter --config.file config.yml
//! ```
//!
//! # Configuration
//!
//! See [`config::Config`] for the YAML schema.

pub mod collector;
pub mod config;
pub mod http;
pub mod metrics;

pub use collector::{NifcloudCollector, Sample, ScrapeStats, SharedCollector};
pub use config::Config;
pub use http::HttpServer;
