//! Shared scalar types: severities, roles, task types, time ranges and alerts.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Clamp a score or confidence into `[0, 1]`.
///
/// NaN collapses to `0.0`.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Severity lattice: `LOW < MEDIUM < HIGH < CRITICAL`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Bucket an anomaly/impact score: `>0.8` critical, `>0.6` high, otherwise medium
    pub fn from_impact(score: f64) -> Self {
        if score > 0.8 {
            Severity::Critical
        } else if score > 0.6 {
            Severity::High
        } else {
            Severity::Medium
        }
    }

    /// Bucket an averaged evidence score, down to `LOW`
    pub fn from_average_score(score: f64) -> Self {
        if score > 0.8 {
            Severity::Critical
        } else if score > 0.6 {
            Severity::High
        } else if score > 0.4 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a timeline entry. Evidence with a low score is reported as `INFO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimelineSeverity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl TimelineSeverity {
    /// Bucket an evidence score for the timeline
    pub fn from_evidence_score(score: f64) -> Self {
        if score > 0.8 {
            TimelineSeverity::Critical
        } else if score > 0.6 {
            TimelineSeverity::High
        } else if score > 0.4 {
            TimelineSeverity::Medium
        } else {
            TimelineSeverity::Info
        }
    }
}

impl From<Severity> for TimelineSeverity {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Low => TimelineSeverity::Low,
            Severity::Medium => TimelineSeverity::Medium,
            Severity::High => TimelineSeverity::High,
            Severity::Critical => TimelineSeverity::Critical,
        }
    }
}

/// Role of an agent in the collaboration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Planner,
    Metrics,
    Logs,
    Topology,
    Decision,
    Output,
}

impl AgentRole {
    /// All roles in pipeline order
    pub const ALL: [AgentRole; 6] = [
        AgentRole::Planner,
        AgentRole::Metrics,
        AgentRole::Logs,
        AgentRole::Topology,
        AgentRole::Decision,
        AgentRole::Output,
    ];

    /// The task type this role declares it handles
    pub fn task_type(&self) -> TaskType {
        match self {
            AgentRole::Planner => TaskType::RootCauseAnalysis,
            AgentRole::Metrics => TaskType::MetricsAnalysis,
            AgentRole::Logs => TaskType::LogsAnalysis,
            AgentRole::Topology => TaskType::TopologyAnalysis,
            AgentRole::Decision => TaskType::Decision,
            AgentRole::Output => TaskType::Output,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Planner => "planner",
            AgentRole::Metrics => "metrics",
            AgentRole::Logs => "logs",
            AgentRole::Topology => "topology",
            AgentRole::Decision => "decision",
            AgentRole::Output => "output",
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of work a task represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    RootCauseAnalysis,
    MetricsAnalysis,
    LogsAnalysis,
    TopologyAnalysis,
    Decision,
    Output,
}

impl TaskType {
    /// Fallback role mapping used when no agent claims a task via `can_handle`
    pub fn default_role(&self) -> AgentRole {
        match self {
            TaskType::RootCauseAnalysis => AgentRole::Planner,
            TaskType::MetricsAnalysis => AgentRole::Metrics,
            TaskType::LogsAnalysis => AgentRole::Logs,
            TaskType::TopologyAnalysis => AgentRole::Topology,
            TaskType::Decision => AgentRole::Decision,
            TaskType::Output => AgentRole::Output,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::RootCauseAnalysis => "root_cause_analysis",
            TaskType::MetricsAnalysis => "metrics_analysis",
            TaskType::LogsAnalysis => "logs_analysis",
            TaskType::TopologyAnalysis => "topology_analysis",
            TaskType::Decision => "decision",
            TaskType::Output => "output",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed time window in unix seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Window length in seconds (zero for inverted ranges)
    pub fn duration_secs(&self) -> i64 {
        (self.end - self.start).max(0)
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }
}

/// An open alert supplied with the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub service: String,
    pub severity: Severity,
    pub message: String,
    /// Unix seconds
    pub timestamp: i64,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl Alert {
    pub fn new(
        id: impl Into<String>,
        service: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            id: id.into(),
            service: service.into(),
            severity,
            message: message.into(),
            timestamp,
            source: String::new(),
            labels: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_lattice() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
        assert_eq!(
            [Severity::Medium, Severity::Critical, Severity::Low]
                .into_iter()
                .max(),
            Some(Severity::Critical)
        );
    }

    #[test]
    fn test_severity_buckets() {
        assert_eq!(Severity::from_impact(0.81), Severity::Critical);
        assert_eq!(Severity::from_impact(0.8), Severity::High);
        assert_eq!(Severity::from_impact(0.6), Severity::Medium);
        assert_eq!(Severity::from_average_score(0.3), Severity::Low);
        assert_eq!(
            TimelineSeverity::from_evidence_score(0.2),
            TimelineSeverity::Info
        );
    }

    #[test]
    fn test_severity_serde() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"CRITICAL\"");
        let parsed: Severity = serde_json::from_str("\"HIGH\"").unwrap();
        assert_eq!(parsed, Severity::High);
    }

    #[test]
    fn test_role_task_type_mapping() {
        for role in AgentRole::ALL {
            assert_eq!(role.task_type().default_role(), role);
        }
    }

    #[test]
    fn test_clamp_unit() {
        assert_eq!(clamp_unit(1.7), 1.0);
        assert_eq!(clamp_unit(-0.2), 0.0);
        assert_eq!(clamp_unit(f64::NAN), 0.0);
        assert_eq!(clamp_unit(0.42), 0.42);
    }

    #[test]
    fn test_time_range() {
        let range = TimeRange::new(0, 3600);
        assert!(range.is_valid());
        assert!(range.contains(3600));
        assert!(!range.contains(3601));
        assert_eq!(range.duration_secs(), 3600);
        assert!(!TimeRange::new(10, 0).is_valid());
    }
}
