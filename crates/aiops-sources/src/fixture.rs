//! JSON incident fixtures for offline replay.
//!
//! ```json
//! {
//!   "query": "checkout latency spike",
//!   "time_range": {"start": 0, "end": 3600},
//!   "services": ["checkout"],
//!   "alerts": [],
//!   "metrics": [{"service": "checkout", "metric": "cpu_usage", "timestamp": 60, "value": 93.0}],
//!   "logs": [],
//!   "topology": {"edges": [{"source": "checkout", "target": "payments"}]}
//! }
//! ```

use crate::logs::{InMemoryLogs, LogEntry};
use crate::metrics::{InMemoryMetrics, MetricPoint};
use crate::topology::{InMemoryTopology, Topology};
use aiops_core::types::{Alert, TimeRange};
use aiops_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// A recorded incident: the request plus everything the sources would return
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentFixture {
    pub query: String,
    pub time_range: TimeRange,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub alerts: Vec<Alert>,
    #[serde(default)]
    pub metrics: Vec<MetricPoint>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    #[serde(default)]
    pub topology: Topology,
}

impl IncidentFixture {
    pub fn from_json(json: &str) -> Result<Self> {
        let fixture: Self = serde_json::from_str(json)?;
        if !fixture.time_range.is_valid() {
            return Err(Error::validation(format!(
                "fixture time_range start {} is after end {}",
                fixture.time_range.start, fixture.time_range.end
            )));
        }
        Ok(fixture)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let fixture = Self::from_json(&content)?;
        info!(
            path = %path.display(),
            metrics = fixture.metrics.len(),
            logs = fixture.logs.len(),
            nodes = fixture.topology.node_count(),
            "Loaded incident fixture"
        );
        Ok(fixture)
    }

    pub fn metrics_source(&self) -> InMemoryMetrics {
        InMemoryMetrics::new(self.metrics.clone())
    }

    pub fn logs_source(&self) -> InMemoryLogs {
        InMemoryLogs::new(self.logs.clone())
    }

    pub fn topology_source(&self) -> InMemoryTopology {
        InMemoryTopology::new(self.topology.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LogsSource, MetricsSource, TopologySource};
    use std::io::Write;

    const FIXTURE: &str = r#"{
        "query": "checkout latency spike",
        "time_range": {"start": 0, "end": 3600},
        "services": ["checkout"],
        "alerts": [{"id": "a1", "service": "payments", "severity": "HIGH", "message": "5xx", "timestamp": 30}],
        "metrics": [{"service": "checkout", "metric": "cpu_usage", "timestamp": 60, "value": 93.0}],
        "logs": [{"service": "checkout", "level": "ERROR", "timestamp": 61, "message": "upstream timeout"}],
        "topology": {"edges": [{"source": "checkout", "target": "payments", "latency": 250.0}]}
    }"#;

    #[tokio::test]
    async fn test_load_fixture_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FIXTURE.as_bytes()).unwrap();

        let fixture = IncidentFixture::load(file.path()).unwrap();
        assert_eq!(fixture.services, vec!["checkout".to_string()]);
        assert_eq!(fixture.alerts[0].service, "payments");

        let services = vec!["checkout".to_string()];
        let metrics = fixture
            .metrics_source()
            .fetch(&services, fixture.time_range)
            .await
            .unwrap();
        assert_eq!(metrics.len(), 1);

        let logs = fixture
            .logs_source()
            .fetch(&services, fixture.time_range)
            .await
            .unwrap();
        assert_eq!(logs[0].message, "upstream timeout");

        let topology = fixture
            .topology_source()
            .fetch(&services, fixture.time_range)
            .await
            .unwrap();
        assert_eq!(topology.deps("checkout"), ["payments"]);
    }

    #[test]
    fn test_minimal_fixture() {
        let fixture =
            IncidentFixture::from_json(r#"{"query":"q","time_range":{"start":0,"end":1}}"#)
                .unwrap();
        assert!(fixture.metrics.is_empty());
        assert!(fixture.topology.is_empty());
    }

    #[test]
    fn test_invalid_time_range_rejected() {
        let err = IncidentFixture::from_json(r#"{"query":"q","time_range":{"start":9,"end":1}}"#)
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = IncidentFixture::load("/nonexistent/incident.json").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
