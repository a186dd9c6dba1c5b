//! RCA agents
//!
//! One implementation per [`AgentRole`]:
//!
//! - **PlannerAgent**: splits the root task into metrics, logs and topology
//!   sub-tasks.
//! - **MetricsAgent**: sigma-rule anomalies and metric-pair correlation.
//! - **LogsAgent**: error filtering, pattern mining and Drain clustering.
//! - **TopologyAgent**: dependency walk, propagation and critical paths,
//!   impact scope.
//! - **DecisionAgent**: evidence reconciliation and root-cause ranking.
//! - **OutputAgent**: report drafting.
//!
//! Agents never return errors. Source failures, missing inputs and expired
//! deadlines surface as a failed [`TaskResult`] with `metadata["error"]`.

pub mod decision;
pub mod logs;
pub mod metrics;
pub mod output;
pub mod planner;
pub mod topology;

pub use decision::DecisionAgent;
pub use logs::LogsAgent;
pub use metrics::MetricsAgent;
pub use output::OutputAgent;
pub use planner::PlannerAgent;
pub use topology::TopologyAgent;

use aiops_core::context::CollaborationContext;
use aiops_core::task::{Task, TaskResult};
use aiops_core::types::AgentRole;
use aiops_core::{Error, Result};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// Uniform capability shared by every agent
#[async_trait]
pub trait Agent: Send + Sync + std::fmt::Debug {
    fn role(&self) -> AgentRole;

    /// Human-readable name
    fn name(&self) -> &str;

    /// Whether this agent accepts the task; by default the task type must
    /// match the role
    fn can_handle(&self, task: &Task) -> bool {
        task.task_type == self.role().task_type()
    }

    async fn execute(&self, ctx: Arc<CollaborationContext>, task: Task) -> TaskResult;
}

/// Await a source call, bounded by the task deadline if one is set
pub(crate) async fn within_deadline<T, F>(deadline: Option<tokio::time::Instant>, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, call)
            .await
            .map_err(|_| Error::deadline())?,
        None => call.await,
    }
}

/// Services the task is scoped to, sorted
pub(crate) fn scope_of(task: &Task) -> Vec<String> {
    task.service_scope().into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_within_deadline_passes_through() {
        let value = within_deadline(None, async { Ok::<_, Error>(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_within_deadline_expires() {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(10);
        let err = within_deadline(Some(deadline), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, Error>(())
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "deadline");
    }
}
