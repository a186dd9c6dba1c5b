//! Decision agent: reconciles analyst evidence and ranks root causes.

use super::Agent;
use crate::analysis::hypothesis::{build_hypotheses, rank};
use crate::analysis::reconcile::{detect_conflicts, spatial_correlations, temporal_correlations};
use aiops_core::config::RcaConfig;
use aiops_core::context::CollaborationContext;
use aiops_core::report::DecisionOutcome;
use aiops_core::task::{Finding, Task, TaskInput, TaskPayload, TaskResult};
use aiops_core::types::AgentRole;
use aiops_core::Error;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

const SYSTEM_PROMPT: &str =
    "You are an SRE reviewing ranked root-cause hypotheses. Explain the most likely root cause.";

/// Decision confidence when there was nothing to rank
pub const NO_HYPOTHESIS_CONFIDENCE: f64 = 0.3;

#[derive(Debug)]
pub struct DecisionAgent {
    temporal_window_secs: i64,
    conflict_window_secs: i64,
}

impl DecisionAgent {
    pub fn new(config: &RcaConfig) -> Self {
        Self {
            temporal_window_secs: config.temporal_window_sec,
            conflict_window_secs: config.conflict_window_sec,
        }
    }
}

impl Default for DecisionAgent {
    fn default() -> Self {
        Self::new(&RcaConfig::default())
    }
}

#[async_trait]
impl Agent for DecisionAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Decision
    }

    fn name(&self) -> &str {
        "Decision Maker"
    }

    async fn execute(&self, ctx: Arc<CollaborationContext>, task: Task) -> TaskResult {
        let start = Instant::now();
        let TaskInput::Decision(input) = &task.input else {
            let err = Error::missing_context("task_results");
            warn!(agent = %self.role(), task_id = %task.id, error = %err, "Decision input missing");
            return TaskResult::failure(task.id, self.role(), err.to_string());
        };

        info!(
            agent = %self.role(),
            task_id = %task.id,
            task_results = input.task_results.len(),
            "Decision started"
        );

        let evidence: Vec<_> = input
            .task_results
            .values()
            .flat_map(|r| r.usable_evidence().iter().cloned())
            .collect();

        let mut correlations = temporal_correlations(&evidence, self.temporal_window_secs);
        correlations.extend(spatial_correlations(&evidence));
        let conflicts = detect_conflicts(&evidence, self.conflict_window_secs);

        let hypotheses = build_hypotheses(input.task_results.values());
        let winner = rank(&hypotheses).map(|idx| hypotheses[idx].clone());

        let prompt = format!(
            "Query: {}\nHypotheses:\n{}\nConflicts: {}",
            task.query,
            hypotheses
                .iter()
                .take(ctx.max_prompt_items())
                .map(|h| format!("- {} ({:.2}, {}): {}", h.service, h.confidence, h.severity, h.description))
                .collect::<Vec<_>>()
                .join("\n"),
            conflicts.len(),
        );
        let reasoning = ctx
            .advise(SYSTEM_PROMPT, prompt, task.deadline)
            .await
            .unwrap_or_else(|e| e.to_string());

        let confidence = winner
            .as_ref()
            .map(|h| h.confidence)
            .unwrap_or(NO_HYPOTHESIS_CONFIDENCE);

        let outcome = DecisionOutcome {
            root_cause: winner,
            hypotheses,
            correlations,
            conflicts,
            reasoning,
            confidence,
        };

        let mut result = TaskResult::new(task.id.clone(), self.role()).with_confidence(confidence);
        if let Some(h) = &outcome.root_cause {
            result.findings.push(Finding::new(
                "root_cause",
                &h.service,
                h.description.clone(),
                h.severity,
                h.confidence,
            ));
        }
        result.insert_metadata("root_cause", json!(outcome.root_cause_text()));
        result.insert_metadata("confidence", json!(confidence));
        result.insert_metadata("reasoning", json!(outcome.reasoning));
        result.insert_metadata("hypotheses", json!(outcome.hypotheses.len()));
        result.insert_metadata("correlations", json!(outcome.correlations.len()));
        result.insert_metadata("conflicts", json!(outcome.conflicts));

        info!(
            agent = %self.role(),
            task_id = %task.id,
            evidence = evidence.len(),
            hypotheses = outcome.hypotheses.len(),
            conflicts = outcome.conflicts.len(),
            root_cause = %outcome.root_cause_text(),
            confidence,
            processing_ms = start.elapsed().as_millis() as u64,
            "Decision completed"
        );

        result.payload = Some(TaskPayload::Decision(outcome));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiops_core::chat::StaticChat;
    use aiops_core::report::NO_CLEAR_ROOT_CAUSE;
    use aiops_core::task::{DecisionInput, Evidence, EvidenceType, TaskId};
    use aiops_core::types::{Severity, TaskType, TimeRange};
    use std::collections::BTreeMap;

    fn ctx() -> Arc<CollaborationContext> {
        Arc::new(CollaborationContext::new(Arc::new(StaticChat::new("db is the culprit"))))
    }

    fn decision_task(results: Vec<TaskResult>) -> Task {
        let task_results: BTreeMap<TaskId, TaskResult> =
            results.into_iter().map(|r| (r.task_id.clone(), r)).collect();
        Task::new(TaskType::Decision, "q", TimeRange::new(0, 3600), vec![], vec![])
            .with_input(TaskInput::Decision(DecisionInput { task_results }))
    }

    #[tokio::test]
    async fn test_conflict_and_winner() {
        let mut metrics = TaskResult::new(TaskId::generate(), AgentRole::Metrics);
        metrics.evidence = vec![
            Evidence::new(EvidenceType::Metrics, "svc-c", 100, "latency high", 0.9),
            Evidence::new(EvidenceType::Metrics, "svc-c", 160, "latency normal", 0.1),
        ];

        let result = DecisionAgent::default()
            .execute(ctx(), decision_task(vec![metrics]))
            .await;
        assert!(result.success);
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].finding_type, "root_cause");
        assert_eq!(result.findings[0].service, "svc-c");

        let conflicts = result.metadata["conflicts"].as_array().unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0]["winner"]["score"], 0.9);
        assert_eq!(result.metadata["reasoning"], "db is the culprit");
    }

    #[tokio::test]
    async fn test_failed_results_contribute_nothing() {
        let mut failed = TaskResult::failure(TaskId::generate(), AgentRole::Logs, "boom");
        failed.evidence = vec![Evidence::new(EvidenceType::Logs, "api", 1, "x", 1.0)];

        let result = DecisionAgent::default()
            .execute(ctx(), decision_task(vec![failed]))
            .await;
        assert!(result.success);
        assert!(result.findings.is_empty());
        assert_eq!(result.confidence, NO_HYPOTHESIS_CONFIDENCE);
        assert_eq!(result.metadata["root_cause"], NO_CLEAR_ROOT_CAUSE);
    }

    #[tokio::test]
    async fn test_winner_confidence_is_copied() {
        let mut logs = TaskResult::new(TaskId::generate(), AgentRole::Logs);
        logs.findings = vec![aiops_core::task::Finding::new(
            "error_pattern",
            "db",
            "'timeout' repeated 12 times",
            Severity::Critical,
            1.0,
        )];

        let result = DecisionAgent::default()
            .execute(ctx(), decision_task(vec![logs]))
            .await;
        // 0.5 + 0 + 0.05 + 0
        assert!((result.confidence - 0.55).abs() < 1e-9);
        assert_eq!(result.findings[0].severity, Severity::Critical);
        let Some(TaskPayload::Decision(outcome)) = &result.payload else {
            panic!("decision payload missing");
        };
        assert_eq!(
            outcome.root_cause_text(),
            "db - error_pattern: 'timeout' repeated 12 times"
        );
    }

    #[tokio::test]
    async fn test_missing_input_fails() {
        let task = Task::new(TaskType::Decision, "q", TimeRange::new(0, 1), vec![], vec![]);
        let result = DecisionAgent::default().execute(ctx(), task).await;
        assert!(!result.success);
        assert!(result.error().unwrap().contains("task_results"));
    }
}
