//! Decision outcomes, timelines and the final diagnostic report.

use crate::task::{Evidence, Finding};
use crate::types::{Severity, TimeRange, TimelineSeverity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root cause text used when nothing could be ranked
pub const NO_CLEAR_ROOT_CAUSE: &str = "no clear root cause";

/// Per-service aggregation of evidence and findings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCauseHypothesis {
    pub service: String,
    pub description: String,
    pub evidence: Vec<Evidence>,
    pub findings: Vec<Finding>,
    pub confidence: f64,
    pub severity: Severity,
    pub reasoning: String,
}

/// How two evidence items were related
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationKind {
    Temporal,
    Spatial,
}

/// A scored relation between two evidence items, referenced by index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceCorrelation {
    pub kind: CorrelationKind,
    pub first: usize,
    pub second: usize,
    pub score: f64,
}

/// Contradictory same-service evidence and how it was resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub service: String,
    pub winner: Evidence,
    pub loser: Evidence,
    pub resolution: String,
}

/// Everything the decision agent concluded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionOutcome {
    /// Winning hypothesis, if any evidence or finding existed
    pub root_cause: Option<RootCauseHypothesis>,
    /// All hypotheses in input order
    pub hypotheses: Vec<RootCauseHypothesis>,
    pub correlations: Vec<EvidenceCorrelation>,
    pub conflicts: Vec<Conflict>,
    /// Advisory LLM reasoning
    pub reasoning: String,
    pub confidence: f64,
}

impl DecisionOutcome {
    /// Human-readable root cause, or the "no clear root cause" marker
    pub fn root_cause_text(&self) -> String {
        self.root_cause
            .as_ref()
            .map(|h| format!("{} - {}", h.service, h.description))
            .unwrap_or_else(|| NO_CLEAR_ROOT_CAUSE.to_string())
    }
}

/// One entry on the incident timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// Unix seconds
    pub timestamp: i64,
    pub service: String,
    pub event_type: String,
    pub description: String,
    pub severity: TimelineSeverity,
}

/// Report fields produced by the output agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDraft {
    pub summary: String,
    pub root_cause: String,
    pub affected_services: Vec<String>,
    pub evidence_chain: Vec<Evidence>,
    pub findings: Vec<Finding>,
    pub recommendations: Vec<String>,
    pub timeline: Vec<TimelineEvent>,
    pub confidence: f64,
}

/// Terminal diagnostic report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub query: String,
    pub time_range: TimeRange,
    pub summary: String,
    pub root_cause: String,
    pub affected_services: Vec<String>,
    /// Sorted non-decreasing by timestamp
    pub evidence_chain: Vec<Evidence>,
    pub findings: Vec<Finding>,
    pub recommendations: Vec<String>,
    pub confidence: f64,
    /// Sorted non-decreasing by timestamp
    pub timeline: Vec<TimelineEvent>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Report {
    /// Key under which a report is archived in the shared data map
    pub fn archive_key(&self) -> String {
        format!("report_{}", self.id)
    }

    /// Check the ordering and range invariants
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !(0.0..=1.0).contains(&self.confidence) {
            errors.push(format!("confidence {} outside [0, 1]", self.confidence));
        }
        if self
            .evidence_chain
            .windows(2)
            .any(|w| w[0].timestamp > w[1].timestamp)
        {
            errors.push("evidence_chain is not sorted by timestamp".to_string());
        }
        if self.timeline.windows(2).any(|w| w[0].timestamp > w[1].timestamp) {
            errors.push("timeline is not sorted by timestamp".to_string());
        }
        for evidence in &self.evidence_chain {
            if !(0.0..=1.0).contains(&evidence.score) {
                errors.push(format!(
                    "evidence score {} outside [0, 1] for {}",
                    evidence.score, evidence.service
                ));
            }
        }
        for finding in &self.findings {
            if !(0.0..=1.0).contains(&finding.score) {
                errors.push(format!(
                    "finding score {} outside [0, 1] for {}",
                    finding.score, finding.service
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::EvidenceType;

    fn report_with(evidence_chain: Vec<Evidence>, confidence: f64) -> Report {
        Report {
            id: "r1".to_string(),
            query: "q".to_string(),
            time_range: TimeRange::new(0, 10),
            summary: String::new(),
            root_cause: NO_CLEAR_ROOT_CAUSE.to_string(),
            affected_services: vec![],
            evidence_chain,
            findings: vec![],
            recommendations: vec![],
            confidence,
            timeline: vec![],
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn test_validate_sorted_chain() {
        let chain = vec![
            Evidence::new(EvidenceType::Logs, "a", 1, "x", 0.5),
            Evidence::new(EvidenceType::Logs, "a", 1, "y", 0.5),
            Evidence::new(EvidenceType::Metrics, "a", 5, "z", 0.9),
        ];
        assert!(report_with(chain, 0.5).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unsorted_chain() {
        let chain = vec![
            Evidence::new(EvidenceType::Logs, "a", 9, "x", 0.5),
            Evidence::new(EvidenceType::Logs, "a", 1, "y", 0.5),
        ];
        let errors = report_with(chain, 0.5).validate().unwrap_err();
        assert!(errors[0].contains("evidence_chain"));
    }

    #[test]
    fn test_archive_key() {
        assert_eq!(report_with(vec![], 0.1).archive_key(), "report_r1");
    }

    #[test]
    fn test_root_cause_text_without_winner() {
        let outcome = DecisionOutcome {
            root_cause: None,
            hypotheses: vec![],
            correlations: vec![],
            conflicts: vec![],
            reasoning: String::new(),
            confidence: 0.3,
        };
        assert_eq!(outcome.root_cause_text(), NO_CLEAR_ROOT_CAUSE);
    }
}
