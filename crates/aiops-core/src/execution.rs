//! Execution spans for one collaboration run.
//!
//! The span structure is always:
//! ```text
//! Run
//!   └─ Agent (one per agent execution)
//! ```
//!
//! - Every agent execution records its own agent-level span.
//! - Agent spans reference the run span as parent.
//! - Spans are append-only; a run without agent spans is invalid.

use crate::task::TaskId;
use crate::types::AgentRole;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Level of a span in the trace
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpanType {
    /// Created on entry to `collaborate`.
    Run,
    /// Created for each agent execution.
    Agent,
}

/// Lifecycle of a span
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpanStatus {
    Running,
    Completed,
    Failed,
}

/// A single span within the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSpan {
    pub span_id: Uuid,
    /// Run span for agents, none for the run span itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub span_type: SpanType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_role: Option<AgentRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    pub status: SpanStatus,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failure_reasons: Vec<String>,
}

impl ExecutionSpan {
    /// Close the span successfully.
    pub fn complete(&mut self) {
        self.status = SpanStatus::Completed;
        self.end_time = Some(Utc::now());
    }

    /// Close the span with failure reasons.
    pub fn fail(&mut self, reasons: Vec<String>) {
        self.status = SpanStatus::Failed;
        self.end_time = Some(Utc::now());
        self.failure_reasons = reasons;
    }

    /// Close the span according to a task outcome.
    pub fn finish(&mut self, success: bool, error: Option<&str>) {
        if success {
            self.complete();
        } else {
            self.fail(vec![error.unwrap_or("unknown failure").to_string()]);
        }
    }
}

/// Run span plus every agent span, serializable without loss.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineTrace {
    pub trace_id: Uuid,
    pub run_span: ExecutionSpan,
    pub agent_spans: Vec<ExecutionSpan>,
}

impl PipelineTrace {
    /// Open a trace with a running run-level span.
    pub fn start(trace_id: Uuid) -> Self {
        Self {
            trace_id,
            run_span: ExecutionSpan {
                span_id: Uuid::new_v4(),
                parent_span_id: None,
                span_type: SpanType::Run,
                agent_role: None,
                task_id: None,
                status: SpanStatus::Running,
                start_time: Utc::now(),
                end_time: None,
                failure_reasons: Vec::new(),
            },
            agent_spans: Vec::new(),
        }
    }

    /// Create a running agent span parented to the run span.
    pub fn agent_span(&self, role: AgentRole, task_id: &TaskId) -> ExecutionSpan {
        ExecutionSpan {
            span_id: Uuid::new_v4(),
            parent_span_id: Some(self.run_span.span_id),
            span_type: SpanType::Agent,
            agent_role: Some(role),
            task_id: Some(task_id.clone()),
            status: SpanStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            failure_reasons: Vec::new(),
        }
    }

    /// Append a finished agent span.
    pub fn record(&mut self, span: ExecutionSpan) {
        self.agent_spans.push(span);
    }

    /// Close the run span. A run with no agent spans is marked failed.
    pub fn finalize(mut self) -> Self {
        if self.agent_spans.is_empty() {
            self.run_span
                .fail(vec!["No agent-level spans emitted".to_string()]);
        } else {
            self.run_span.complete();
        }
        self
    }

    /// Validate the span hierarchy.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.run_span.span_type != SpanType::Run {
            errors.push("Run span must have type 'run'".to_string());
        }
        if self.agent_spans.is_empty() {
            errors.push("No agent-level spans emitted".to_string());
        }
        for span in &self.agent_spans {
            if span.span_type != SpanType::Agent {
                errors.push(format!(
                    "Span {} has type {:?} but is in agent_spans",
                    span.span_id, span.span_type
                ));
            }
            if span.parent_span_id != Some(self.run_span.span_id) {
                errors.push(format!(
                    "Agent span {} is not parented to run span {}",
                    span.span_id, self.run_span.span_id
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Number of agent spans that ended in failure.
    pub fn failed_agents(&self) -> usize {
        self.agent_spans
            .iter()
            .filter(|s| s.status == SpanStatus::Failed)
            .count()
    }
}
