//! # AIOps Sources
//!
//! Data-source capabilities consumed by the analysts.
//!
//! ```text
//! ┌───────────────┐ ┌───────────────┐ ┌────────────────┐
//! │ MetricsSource │ │  LogsSource   │ │ TopologySource │
//! └───────┬───────┘ └───────┬───────┘ └───────┬────────┘
//!         │                 │                 │
//!         ▼                 ▼                 ▼
//!    MetricPoint[]      LogEntry[]        Topology
//! ```
//!
//! Real adapters (Prometheus, Elasticsearch, service meshes) live outside this
//! workspace. In-memory sources and the JSON incident fixture are provided for
//! replay and tests.

#![warn(missing_debug_implementations, rust_2018_idioms)]

pub mod fixture;
pub mod logs;
pub mod metrics;
pub mod topology;

pub use fixture::IncidentFixture;
pub use logs::{InMemoryLogs, LogEntry, LogLevel};
pub use metrics::{InMemoryMetrics, MetricPoint};
pub use topology::{InMemoryTopology, ServiceEdge, ServiceNode, Topology};

use aiops_core::types::TimeRange;
use aiops_core::Result;
use async_trait::async_trait;

/// Time-series metrics for a set of services
#[async_trait]
pub trait MetricsSource: Send + Sync + std::fmt::Debug {
    /// Source name for logging and error messages
    fn name(&self) -> &str;

    async fn fetch(&self, services: &[String], time_range: TimeRange) -> Result<Vec<MetricPoint>>;
}

/// Log lines for a set of services
#[async_trait]
pub trait LogsSource: Send + Sync + std::fmt::Debug {
    /// Source name for logging and error messages
    fn name(&self) -> &str;

    async fn fetch(&self, services: &[String], time_range: TimeRange) -> Result<Vec<LogEntry>>;
}

/// Service dependency graph around a set of services
#[async_trait]
pub trait TopologySource: Send + Sync + std::fmt::Debug {
    /// Source name for logging and error messages
    fn name(&self) -> &str;

    async fn fetch(&self, services: &[String], time_range: TimeRange) -> Result<Topology>;
}

/// Returns true when `service` is selected by `services`.
///
/// An empty selection selects nothing.
pub(crate) fn selects(services: &[String], service: &str) -> bool {
    services.iter().any(|s| s == service)
}
