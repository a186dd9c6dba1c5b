//! Planner: splits the root task into analyst sub-tasks.

use super::Agent;
use aiops_core::context::CollaborationContext;
use aiops_core::task::{Task, TaskPayload, TaskResult};
use aiops_core::types::{AgentRole, TaskType};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

const SYSTEM_PROMPT: &str =
    "You are an incident commander. Outline a short investigation plan for the fault described.";

/// Plan text used when no model answers
pub const DEFAULT_PLAN: &str =
    "Collect metrics, logs and topology signals in parallel, reconcile the evidence, then rank root causes.";

/// Planner confidence is fixed
pub const PLANNER_CONFIDENCE: f64 = 0.9;

/// Analyst task types, in dispatch order
pub const ANALYST_TASK_TYPES: [TaskType; 3] = [
    TaskType::MetricsAnalysis,
    TaskType::LogsAnalysis,
    TaskType::TopologyAnalysis,
];

/// One sub-task per analyst, inheriting scope and deadline from `root`
pub fn default_sub_tasks(root: &Task) -> Vec<Task> {
    ANALYST_TASK_TYPES
        .iter()
        .map(|task_type| root.subtask(*task_type))
        .collect()
}

#[derive(Debug, Default)]
pub struct PlannerAgent;

impl PlannerAgent {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Agent for PlannerAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Planner
    }

    fn name(&self) -> &str {
        "Planner"
    }

    async fn execute(&self, ctx: Arc<CollaborationContext>, mut task: Task) -> TaskResult {
        task.fill_services_from_alerts();
        let sub_tasks = default_sub_tasks(&task);

        info!(
            agent = %self.role(),
            task_id = %task.id,
            services = task.services.len(),
            alerts = task.alerts.len(),
            sub_tasks = sub_tasks.len(),
            "Planning root cause analysis"
        );

        let prompt = format!(
            "Fault: {}\nServices: {}\nOpen alerts:\n{}",
            task.query,
            task.services.join(", "),
            task.alerts
                .iter()
                .take(ctx.max_prompt_items())
                .map(|a| format!("- [{}] {}: {}", a.severity, a.service, a.message))
                .collect::<Vec<_>>()
                .join("\n"),
        );

        let mut result = TaskResult::new(task.id.clone(), self.role()).with_confidence(PLANNER_CONFIDENCE);
        match ctx.advise(SYSTEM_PROMPT, prompt, task.deadline).await {
            Ok(plan) if !plan.trim().is_empty() => result.insert_metadata("plan", json!(plan)),
            Ok(_) => result.insert_metadata("plan", json!(DEFAULT_PLAN)),
            Err(e) => {
                warn!(agent = %self.role(), error = %e, "Falling back to default plan");
                result.insert_metadata("plan", json!(DEFAULT_PLAN));
                result.insert_metadata("plan_error", json!(e.to_string()));
            }
        }

        result.insert_metadata(
            "sub_tasks",
            json!(sub_tasks
                .iter()
                .map(|t| json!({"id": t.id, "type": t.task_type}))
                .collect::<Vec<_>>()),
        );
        result.insert_metadata("services", json!(task.services));
        result.payload = Some(TaskPayload::Plan { sub_tasks });
        result
    }
}
