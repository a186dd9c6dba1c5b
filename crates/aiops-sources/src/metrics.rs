//! Metric samples and the in-memory metrics source.

use crate::{selects, MetricsSource};
use aiops_core::types::TimeRange;
use aiops_core::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// A single metric sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub service: String,
    /// Metric name, e.g. `cpu_usage`, `qps`, `error_rate`, `latency`
    pub metric: String,
    /// Unix seconds
    pub timestamp: i64,
    pub value: f64,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl MetricPoint {
    pub fn new(
        service: impl Into<String>,
        metric: impl Into<String>,
        timestamp: i64,
        value: f64,
    ) -> Self {
        Self {
            service: service.into(),
            metric: metric.into(),
            timestamp,
            value,
            labels: HashMap::new(),
        }
    }
}

/// Metrics source backed by a fixed set of points.
///
/// A source built with [`InMemoryMetrics::failing`] returns a data-source
/// error from every fetch.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetrics {
    points: Vec<MetricPoint>,
    failure: Option<String>,
}

impl InMemoryMetrics {
    pub fn new(points: Vec<MetricPoint>) -> Self {
        Self {
            points,
            failure: None,
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            points: Vec::new(),
            failure: Some(message.into()),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[async_trait]
impl MetricsSource for InMemoryMetrics {
    fn name(&self) -> &str {
        "in_memory_metrics"
    }

    async fn fetch(&self, services: &[String], time_range: TimeRange) -> Result<Vec<MetricPoint>> {
        if let Some(message) = &self.failure {
            return Err(Error::data_source(self.name(), message.clone()));
        }

        let points: Vec<MetricPoint> = self
            .points
            .iter()
            .filter(|p| selects(services, &p.service) && time_range.contains(p.timestamp))
            .cloned()
            .collect();

        debug!(source = self.name(), points = points.len(), "Fetched metrics");
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_filters_service_and_range() {
        let source = InMemoryMetrics::new(vec![
            MetricPoint::new("a", "cpu_usage", 10, 1.0),
            MetricPoint::new("a", "cpu_usage", 5000, 2.0),
            MetricPoint::new("b", "cpu_usage", 10, 3.0),
        ]);

        let points = source
            .fetch(&["a".to_string()], TimeRange::new(0, 3600))
            .await
            .unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value, 1.0);
    }

    #[tokio::test]
    async fn test_failing_source() {
        let source = InMemoryMetrics::failing("connection refused");
        let err = source
            .fetch(&["a".to_string()], TimeRange::new(0, 10))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), aiops_core::ErrorKind::DataSourceFailure);
        assert!(err.to_string().contains("connection refused"));
    }
}
