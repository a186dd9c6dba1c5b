//! Output agent: drafts the diagnostic report.
//!
//! Everything except the summary and recommendations text is computed
//! deterministically from the analyst results and the decision. Those two
//! fields ask the chat model first and fall back to fixed templates.

use super::Agent;
use aiops_core::context::CollaborationContext;
use aiops_core::report::{ReportDraft, TimelineEvent, NO_CLEAR_ROOT_CAUSE};
use aiops_core::task::{Evidence, Finding, Task, TaskId, TaskInput, TaskPayload, TaskResult};
use aiops_core::types::{clamp_unit, AgentRole, TimeRange, TimelineSeverity};
use aiops_core::Error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::{info, warn};

const SUMMARY_PROMPT: &str =
    "You are an SRE writing an incident summary. Answer in two or three sentences.";
const RECOMMENDATION_PROMPT: &str =
    "You are an SRE. List concrete remediation steps, one per line.";

/// Parsed recommendation lines shorter than this are dropped
pub const MIN_RECOMMENDATION_LEN: usize = 10;

/// Used when the model gives no usable recommendation
pub const DEFAULT_RECOMMENDATIONS: [&str; 5] = [
    "Review recent deployments and configuration changes on the affected services",
    "Check CPU, memory and disk utilisation on the affected hosts",
    "Inspect error logs around the incident window for recurring failures",
    "Verify the health and latency of upstream and downstream dependencies",
    "Tune alert thresholds so this failure mode is detected earlier",
];

/// Root-cause keywords and the hint prepended to the default list
const DOMAIN_HINTS: [(&[&str], &str); 3] = [
    (
        &["database", "数据库"],
        "Check database connection pools, slow queries and replication lag",
    ),
    (
        &["memory", "内存"],
        "Look for memory leaks and review container memory limits",
    ),
    (
        &["network", "网络"],
        "Verify network connectivity, DNS resolution and packet loss between services",
    ),
];

fn list_prefix() -> Option<&'static Regex> {
    static PREFIX: OnceLock<Option<Regex>> = OnceLock::new();
    PREFIX
        .get_or_init(|| Regex::new(r"^\s*(?:\d+[.)、]|[-*•])\s*").ok())
        .as_ref()
}

/// Split model output into recommendation lines.
///
/// List markers such as `1.`, `2)`, `-` and `*` are stripped and lines shorter
/// than [`MIN_RECOMMENDATION_LEN`] characters are dropped.
pub fn parse_recommendations(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| match list_prefix() {
            Some(re) => re.replace(line, "").trim().to_string(),
            None => line.trim().to_string(),
        })
        .filter(|line| line.chars().count() >= MIN_RECOMMENDATION_LEN)
        .collect()
}

/// Default list, preceded by any hint whose keywords appear in the root cause
pub fn default_recommendations(root_cause: &str) -> Vec<String> {
    let lowered = root_cause.to_lowercase();
    DOMAIN_HINTS
        .iter()
        .filter(|(keywords, _)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(_, hint)| hint.to_string())
        .chain(DEFAULT_RECOMMENDATIONS.iter().map(|s| s.to_string()))
        .collect()
}

/// Root cause text carried by a decision result
pub fn root_cause_of(decision: &TaskResult) -> String {
    if let Some(text) = decision.metadata.get("root_cause").and_then(|v| v.as_str()) {
        return text.to_string();
    }
    decision
        .findings
        .first()
        .map(|f| f.description.clone())
        .unwrap_or_else(|| NO_CLEAR_ROOT_CAUSE.to_string())
}

/// Evidence of every successful result, stably sorted by timestamp
pub fn evidence_chain(task_results: &BTreeMap<TaskId, TaskResult>) -> Vec<Evidence> {
    let mut chain: Vec<Evidence> = task_results
        .values()
        .flat_map(|r| r.usable_evidence().iter().cloned())
        .collect();
    chain.sort_by_key(|e| e.timestamp);
    chain
}

/// Findings of every successful result
pub fn collect_findings(task_results: &BTreeMap<TaskId, TaskResult>) -> Vec<Finding> {
    task_results
        .values()
        .flat_map(|r| r.usable_findings().iter().cloned())
        .collect()
}

/// Timeline events for evidence and findings, stably sorted by timestamp.
///
/// Findings carry no time of their own and are stamped with `now`.
pub fn timeline(task_results: &BTreeMap<TaskId, TaskResult>, now: i64) -> Vec<TimelineEvent> {
    let mut events = Vec::new();
    for result in task_results.values() {
        for evidence in result.usable_evidence() {
            events.push(TimelineEvent {
                timestamp: evidence.timestamp,
                service: evidence.service.clone(),
                event_type: format!("{}_evidence", evidence.evidence_type),
                description: evidence.description.clone(),
                severity: TimelineSeverity::from_evidence_score(evidence.score),
            });
        }
        for finding in result.usable_findings() {
            events.push(TimelineEvent {
                timestamp: now,
                service: finding.service.clone(),
                event_type: finding.finding_type.clone(),
                description: finding.description.clone(),
                severity: finding.severity.into(),
            });
        }
    }
    events.sort_by_key(|e| e.timestamp);
    events
}

/// Distinct services across successful evidence and findings, sorted
pub fn affected_services(task_results: &BTreeMap<TaskId, TaskResult>) -> Vec<String> {
    let services: BTreeSet<String> = task_results
        .values()
        .flat_map(|r| {
            r.usable_evidence()
                .iter()
                .map(|e| e.service.clone())
                .chain(r.usable_findings().iter().map(|f| f.service.clone()))
        })
        .collect();
    services.into_iter().collect()
}

/// Decision confidence attenuated by the analyst success rate:
/// `decision · (0.7 + 0.3 · success_rate)`
pub fn report_confidence(decision_confidence: f64, task_results: &BTreeMap<TaskId, TaskResult>) -> f64 {
    let total = task_results.len();
    let succeeded = task_results.values().filter(|r| r.success).count();
    let success_rate = if total == 0 {
        0.0
    } else {
        succeeded as f64 / total as f64
    };
    clamp_unit(decision_confidence * (0.7 + 0.3 * success_rate))
}

fn format_time(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

/// Summary used when the model is unavailable
pub fn fallback_summary(
    time_range: TimeRange,
    root_cause: &str,
    task_results: &BTreeMap<TaskId, TaskResult>,
) -> String {
    let succeeded = task_results.values().filter(|r| r.success).count();
    format!(
        "Incident analysed from {} to {}. Root cause: {}. {} of {} analyses completed.",
        format_time(time_range.start),
        format_time(time_range.end),
        root_cause,
        succeeded,
        task_results.len()
    )
}

/// Report draft with template summary and default recommendations
pub fn deterministic_draft(
    decision: &TaskResult,
    task_results: &BTreeMap<TaskId, TaskResult>,
    time_range: TimeRange,
    now: i64,
) -> ReportDraft {
    let root_cause = root_cause_of(decision);
    ReportDraft {
        summary: fallback_summary(time_range, &root_cause, task_results),
        recommendations: default_recommendations(&root_cause),
        affected_services: affected_services(task_results),
        evidence_chain: evidence_chain(task_results),
        findings: collect_findings(task_results),
        timeline: timeline(task_results, now),
        confidence: report_confidence(decision.confidence, task_results),
        root_cause,
    }
}

#[derive(Debug, Default)]
pub struct OutputAgent;

impl OutputAgent {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Agent for OutputAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Output
    }

    fn name(&self) -> &str {
        "Report Writer"
    }

    async fn execute(&self, ctx: Arc<CollaborationContext>, task: Task) -> TaskResult {
        let start = Instant::now();
        let TaskInput::Output(input) = &task.input else {
            let err = Error::missing_context("decision_result");
            warn!(agent = %self.role(), task_id = %task.id, error = %err, "Output input missing");
            return TaskResult::failure(task.id, self.role(), err.to_string());
        };

        let mut draft = deterministic_draft(
            &input.decision_result,
            &input.task_results,
            task.time_range,
            ctx.now(),
        );

        let summary_prompt = format!(
            "Query: {}\nTime range: {} to {}\nRoot cause: {}\nAnalyses: {} ({} succeeded)\nEvidence items: {}",
            task.query,
            format_time(task.time_range.start),
            format_time(task.time_range.end),
            draft.root_cause,
            input.task_results.len(),
            input.task_results.values().filter(|r| r.success).count(),
            draft.evidence_chain.len(),
        );
        match ctx.advise(SUMMARY_PROMPT, summary_prompt, task.deadline).await {
            Ok(text) if !text.trim().is_empty() => draft.summary = text.trim().to_string(),
            Ok(_) => {}
            Err(e) => warn!(agent = %self.role(), error = %e, "Using template summary"),
        }

        let recommendation_prompt = format!(
            "Root cause: {}\nKey findings:\n{}",
            draft.root_cause,
            draft
                .findings
                .iter()
                .take(ctx.max_prompt_items())
                .map(|f| format!("- [{}] {}: {}", f.severity, f.service, f.description))
                .collect::<Vec<_>>()
                .join("\n"),
        );
        match ctx
            .advise(RECOMMENDATION_PROMPT, recommendation_prompt, task.deadline)
            .await
        {
            Ok(text) => {
                let parsed = parse_recommendations(&text);
                if !parsed.is_empty() {
                    draft.recommendations = parsed;
                }
            }
            Err(e) => warn!(agent = %self.role(), error = %e, "Using default recommendations"),
        }

        let mut result = TaskResult::new(task.id.clone(), self.role()).with_confidence(draft.confidence);
        result.insert_metadata("summary", json!(draft.summary));
        result.insert_metadata("root_cause", json!(draft.root_cause));
        result.insert_metadata("recommendations", json!(draft.recommendations));
        result.insert_metadata("timeline", json!(draft.timeline));
        result.insert_metadata("affected_services", json!(draft.affected_services));
        result.insert_metadata("confidence", json!(draft.confidence));

        info!(
            agent = %self.role(),
            task_id = %task.id,
            evidence = draft.evidence_chain.len(),
            timeline = draft.timeline.len(),
            recommendations = draft.recommendations.len(),
            confidence = draft.confidence,
            processing_ms = start.elapsed().as_millis() as u64,
            "Report drafted"
        );

        result.payload = Some(TaskPayload::Report(draft));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiops_core::chat::{NoopChat, StaticChat};
    use aiops_core::clock::FixedClock;
    use aiops_core::task::{EvidenceType, OutputInput};
    use aiops_core::types::{Severity, TaskType};

    fn results() -> BTreeMap<TaskId, TaskResult> {
        let mut metrics = TaskResult::new(TaskId::generate(), AgentRole::Metrics);
        metrics.evidence = vec![
            Evidence::new(EvidenceType::Metrics, "db", 300, "cpu", 0.95),
            Evidence::new(EvidenceType::Metrics, "db", 100, "mem", 0.5),
        ];
        metrics.findings = vec![Finding::new("metric_anomaly", "db", "cpu", Severity::Critical, 1.0)];

        let mut logs = TaskResult::new(TaskId::generate(), AgentRole::Logs);
        logs.evidence = vec![Evidence::new(EvidenceType::Logs, "api", 200, "timeout", 0.7)];

        let mut failed = TaskResult::failure(TaskId::generate(), AgentRole::Topology, "down");
        failed.evidence = vec![Evidence::new(EvidenceType::Topology, "ghost", 1, "x", 1.0)];

        [metrics, logs, failed]
            .into_iter()
            .map(|r| (r.task_id.clone(), r))
            .collect()
    }

    fn decision(root_cause: &str, confidence: f64) -> TaskResult {
        let mut decision = TaskResult::new(TaskId::generate(), AgentRole::Decision).with_confidence(confidence);
        decision.insert_metadata("root_cause", json!(root_cause));
        decision
    }

    #[test]
    fn test_parse_recommendations() {
        let text = "1. Restart the payment workers\n2) Increase pool size to 50\n- short\n* Roll back release 2024.3\n• Page the database on-call\n\nok";
        assert_eq!(
            parse_recommendations(text),
            vec![
                "Restart the payment workers",
                "Increase pool size to 50",
                "Roll back release 2024.3",
                "Page the database on-call",
            ]
        );
        assert!(parse_recommendations("ok").is_empty());
    }

    #[test]
    fn test_default_recommendations_with_hint() {
        let recs = default_recommendations("db - Database connection refused");
        assert_eq!(recs.len(), 6);
        assert!(recs[0].contains("database"));

        let recs = default_recommendations("节点 内存 不足");
        assert!(recs[0].contains("memory"));

        assert_eq!(default_recommendations(NO_CLEAR_ROOT_CAUSE).len(), 5);
    }

    #[test]
    fn test_deterministic_draft() {
        let results = results();
        let draft = deterministic_draft(&decision("db - cpu", 0.8), &results, TimeRange::new(0, 3600), 50);

        let stamps: Vec<i64> = draft.evidence_chain.iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![100, 200, 300]);
        assert_eq!(draft.affected_services, vec!["api".to_string(), "db".to_string()]);
        assert_eq!(draft.findings.len(), 1);
        assert_eq!(draft.root_cause, "db - cpu");

        // finding stamped with now = 50 sorts first
        assert_eq!(draft.timeline.len(), 4);
        assert_eq!(draft.timeline[0].timestamp, 50);
        assert_eq!(draft.timeline[0].severity, TimelineSeverity::Critical);
        assert_eq!(draft.timeline[3].severity, TimelineSeverity::Critical);
        assert_eq!(draft.timeline[1].severity, TimelineSeverity::Medium);

        // 0.8 * (0.7 + 0.3 * 2/3)
        assert!((draft.confidence - 0.72).abs() < 1e-9);
        assert!(draft.summary.contains("1970-01-01 00:00:00 UTC"));
        assert!(draft.summary.contains("2 of 3"));
    }

    #[tokio::test]
    async fn test_execute_uses_model_text() {
        let ctx = Arc::new(
            CollaborationContext::new(Arc::new(StaticChat::new(
                "1. Scale out the database replicas\n2. Add an index on orders.created_at",
            )))
            .with_clock(Arc::new(FixedClock(42))),
        );
        let input = OutputInput {
            task_results: results(),
            decision_result: decision("db - cpu", 0.8),
        };
        let task = Task::new(TaskType::Output, "q", TimeRange::new(0, 3600), vec![], vec![])
            .with_input(TaskInput::Output(Box::new(input)));

        let result = OutputAgent::new().execute(ctx, task).await;
        assert!(result.success);
        let Some(TaskPayload::Report(draft)) = result.payload else {
            panic!("report payload missing");
        };
        assert_eq!(draft.recommendations.len(), 2);
        assert!(draft.summary.starts_with("1. Scale out"));
        assert_eq!(draft.timeline[0].timestamp, 42);
    }

    #[tokio::test]
    async fn test_execute_falls_back_without_model() {
        let ctx = Arc::new(CollaborationContext::new(Arc::new(NoopChat::new())));
        let input = OutputInput {
            task_results: BTreeMap::new(),
            decision_result: decision(NO_CLEAR_ROOT_CAUSE, 0.3),
        };
        let task = Task::new(TaskType::Output, "q", TimeRange::new(0, 3600), vec![], vec![])
            .with_input(TaskInput::Output(Box::new(input)));

        let result = OutputAgent::new().execute(ctx, task).await;
        let Some(TaskPayload::Report(draft)) = result.payload else {
            panic!("report payload missing");
        };
        assert_eq!(draft.recommendations.len(), DEFAULT_RECOMMENDATIONS.len());
        assert_eq!(draft.root_cause, NO_CLEAR_ROOT_CAUSE);
        assert!(draft.summary.starts_with("Incident analysed"));
        assert!(draft.evidence_chain.is_empty());
    }

    #[tokio::test]
    async fn test_missing_input_fails() {
        let ctx = Arc::new(CollaborationContext::new(Arc::new(NoopChat::new())));
        let task = Task::new(TaskType::Output, "q", TimeRange::new(0, 1), vec![], vec![]);
        let result = OutputAgent::new().execute(ctx, task).await;
        assert!(!result.success);
        assert!(result.error().unwrap().contains("decision_result"));
    }
}
