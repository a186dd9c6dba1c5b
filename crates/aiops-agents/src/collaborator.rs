//! Collaborator: the agent registry and the RCA pipeline.
//!
//! ```text
//! plan ──► metrics ─┐
//!      ├─► logs    ─┼─► decide ──► report
//!      └─► topology ┘
//! ```
//!
//! The planner finishes before any analyst starts, every analyst finishes (or
//! hits the deadline) before the decision agent starts, and the decision agent
//! finishes before the output agent starts. Analysts run concurrently and a
//! failure in one never cancels the others.

use crate::agents::output::deterministic_draft;
use crate::agents::planner::default_sub_tasks;
use crate::agents::{
    Agent, DecisionAgent, LogsAgent, MetricsAgent, OutputAgent, PlannerAgent, TopologyAgent,
};
use aiops_core::chat::ChatCompletions;
use aiops_core::clock::{Clock, SystemClock};
use aiops_core::config::RcaConfig;
use aiops_core::context::CollaborationContext;
use aiops_core::execution::PipelineTrace;
use aiops_core::report::Report;
use aiops_core::task::{
    DecisionInput, OutputInput, Task, TaskId, TaskInput, TaskPayload, TaskResult,
};
use aiops_core::types::{AgentRole, Alert, TaskType, TimeRange};
use aiops_core::{Error, Result};
use aiops_sources::{LogsSource, MetricsSource, TopologySource};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

// ============================================================================
// Request fingerprint
// ============================================================================

/// The caller's request, hashed into `Report.metadata["inputs_hash"]`
#[derive(Debug, Serialize)]
struct CollaborationRequest<'a> {
    query: &'a str,
    time_range: TimeRange,
    services: &'a [String],
    alerts: &'a [Alert],
}

impl CollaborationRequest<'_> {
    fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        let json = serde_json::to_string(&self).unwrap_or_default();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Shared-data key of the execution trace for a report
pub fn trace_key(report_id: &str) -> String {
    format!("trace_{}", report_id)
}

// ============================================================================
// Collaborator
// ============================================================================

/// Running totals across `collaborate` calls
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollaboratorStats {
    /// Pipeline runs started
    pub runs: u64,
    /// Reports returned to the caller
    pub reports_built: u64,
    /// Analyst results with `success = false`
    pub analyst_failures: u64,
    /// Analysts cut off by the deadline
    pub deadline_expirations: u64,
    /// Average processing time (ms) of successful runs
    pub avg_processing_ms: f64,
}

/// Registry of one agent per role plus the pipeline that drives them
pub struct Collaborator {
    config: RcaConfig,
    chat: Arc<dyn ChatCompletions>,
    clock: Arc<dyn Clock>,
    agents: RwLock<HashMap<AgentRole, Arc<dyn Agent>>>,
    stats: Arc<RwLock<CollaboratorStats>>,
}

impl std::fmt::Debug for Collaborator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborator")
            .field("config", &self.config)
            .field("chat", &self.chat.name())
            .finish()
    }
}

impl Collaborator {
    /// Create a collaborator with an empty registry
    pub fn new(config: RcaConfig, chat: Arc<dyn ChatCompletions>) -> Result<Self> {
        config.validate()?;

        info!(
            model = %config.llm_model,
            provider = chat.name(),
            deadline_ms = ?config.deadline_ms,
            "Creating collaborator"
        );

        Ok(Self {
            config,
            chat,
            clock: Arc::new(SystemClock),
            agents: RwLock::new(HashMap::new()),
            stats: Arc::new(RwLock::new(CollaboratorStats::default())),
        })
    }

    /// Create a collaborator with the six standard agents registered
    pub fn with_sources(
        config: RcaConfig,
        chat: Arc<dyn ChatCompletions>,
        metrics: Arc<dyn MetricsSource>,
        logs: Arc<dyn LogsSource>,
        topology: Arc<dyn TopologySource>,
    ) -> Result<Self> {
        let collaborator = Self::new(config, chat)?;

        let agents: Vec<Arc<dyn Agent>> = vec![
            Arc::new(PlannerAgent::new()),
            Arc::new(MetricsAgent::new(metrics, &collaborator.config)),
            Arc::new(LogsAgent::new(logs, &collaborator.config)),
            Arc::new(TopologyAgent::new(topology, &collaborator.config)),
            Arc::new(DecisionAgent::new(&collaborator.config)),
            Arc::new(OutputAgent::new()),
        ];
        let registry = agents.into_iter().map(|a| (a.role(), a)).collect();

        Ok(Self {
            agents: RwLock::new(registry),
            ..collaborator
        })
    }

    /// Clock used for timeline timestamps in new contexts
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &RcaConfig {
        &self.config
    }

    /// Register `agent` for its role, returning the agent it replaced
    pub async fn register(&self, agent: Arc<dyn Agent>) -> Option<Arc<dyn Agent>> {
        let role = agent.role();
        debug!(agent = %role, name = agent.name(), "Registering agent");
        self.agents.write().await.insert(role, agent)
    }

    pub async fn unregister(&self, role: AgentRole) -> Option<Arc<dyn Agent>> {
        self.agents.write().await.remove(&role)
    }

    /// Registered roles in pipeline order
    pub async fn roles(&self) -> Vec<AgentRole> {
        let agents = self.agents.read().await;
        AgentRole::ALL
            .into_iter()
            .filter(|r| agents.contains_key(r))
            .collect()
    }

    pub async fn stats(&self) -> CollaboratorStats {
        self.stats.read().await.clone()
    }

    /// Fresh context configured from this collaborator
    pub fn new_context(&self) -> CollaborationContext {
        CollaborationContext::from_config(self.chat.clone(), &self.config)
            .with_clock(self.clock.clone())
    }

    /// Run the pipeline in a fresh context
    pub async fn collaborate(
        &self,
        query: &str,
        time_range: TimeRange,
        services: Vec<String>,
        alerts: Vec<Alert>,
    ) -> Result<Report> {
        let ctx = Arc::new(self.new_context());
        self.collaborate_with_context(ctx, query, time_range, services, alerts)
            .await
    }

    /// Run the pipeline in a caller-owned context.
    ///
    /// The report is archived in the context's shared data under
    /// [`Report::archive_key`] and its execution trace under [`trace_key`].
    /// Only programmer errors (invalid time range, missing planner, decision
    /// or output agent) are returned as `Err`.
    pub async fn collaborate_with_context(
        &self,
        ctx: Arc<CollaborationContext>,
        query: &str,
        time_range: TimeRange,
        services: Vec<String>,
        alerts: Vec<Alert>,
    ) -> Result<Report> {
        let start = Instant::now();

        if !time_range.is_valid() {
            return Err(Error::validation(format!(
                "time_range start {} is after end {}",
                time_range.start, time_range.end
            )));
        }

        let (planner, decision, output, registry) = {
            let agents = self.agents.read().await;
            (
                Self::required(&agents, AgentRole::Planner)?,
                Self::required(&agents, AgentRole::Decision)?,
                Self::required(&agents, AgentRole::Output)?,
                agents.clone(),
            )
        };

        self.stats.write().await.runs += 1;

        let inputs_hash = CollaborationRequest {
            query,
            time_range,
            services: &services,
            alerts: &alerts,
        }
        .compute_hash();

        let deadline = self
            .config
            .deadline()
            .map(|d| tokio::time::Instant::now() + d);
        let mut root = Task::new(TaskType::RootCauseAnalysis, query, time_range, services, alerts)
            .with_deadline(deadline);
        root.fill_services_from_alerts();

        let mut trace = PipelineTrace::start(ctx.trace_id());

        info!(
            trace_id = %ctx.trace_id(),
            task_id = %root.id,
            services = root.services.len(),
            alerts = root.alerts.len(),
            inputs_hash = %inputs_hash,
            "Collaboration started"
        );

        // 1. Plan
        let plan = Self::run_stage(&mut trace, &planner, &ctx, root.clone()).await;
        let plan_text = plan.metadata.get("plan").cloned();
        let sub_tasks = match plan.payload {
            Some(TaskPayload::Plan { sub_tasks }) if plan.success && !sub_tasks.is_empty() => {
                sub_tasks
            }
            _ => {
                warn!(task_id = %root.id, "Planner returned no sub-tasks, using defaults");
                default_sub_tasks(&root)
            }
        };

        // 2. Fan out to analysts
        let task_results = self
            .fan_out(&mut trace, &ctx, &registry, sub_tasks)
            .await;
        let failed = task_results.values().filter(|r| !r.success).count();
        let expired = task_results
            .values()
            .filter(|r| r.error() == Some(Error::deadline().to_string().as_str()))
            .count();

        // 3. Decide
        let decision_task = root
            .subtask(TaskType::Decision)
            .with_input(TaskInput::Decision(DecisionInput {
                task_results: task_results.clone(),
            }));
        let decision_result = Self::run_stage(&mut trace, &decision, &ctx, decision_task).await;

        // 4. Draft the report
        let output_task = root
            .subtask(TaskType::Output)
            .with_input(TaskInput::Output(Box::new(OutputInput {
                task_results: task_results.clone(),
                decision_result: decision_result.clone(),
            })));
        let output_result = Self::run_stage(&mut trace, &output, &ctx, output_task).await;
        let draft = match output_result.payload {
            Some(TaskPayload::Report(draft)) if output_result.success => draft,
            _ => {
                warn!(
                    task_id = %output_result.task_id,
                    error = output_result.error().unwrap_or("no report payload"),
                    "Output agent produced no draft, assembling deterministically"
                );
                deterministic_draft(&decision_result, &task_results, time_range, ctx.now())
            }
        };

        // 5. Assemble
        let trace = trace.finalize();
        let mut metadata = BTreeMap::new();
        metadata.insert("inputs_hash".to_string(), json!(inputs_hash));
        metadata.insert("analysts".to_string(), Self::analyst_summary(&task_results));
        metadata.insert(
            "decision_confidence".to_string(),
            json!(decision_result.confidence),
        );
        for key in ["reasoning", "conflicts"] {
            if let Some(value) = decision_result.metadata.get(key) {
                metadata.insert(key.to_string(), value.clone());
            }
        }
        if let Some(plan_text) = plan_text {
            metadata.insert("plan".to_string(), plan_text);
        }
        if let Some(tenant_id) = ctx.tenant_id() {
            metadata.insert("tenant_id".to_string(), json!(tenant_id));
        }

        let report = Report {
            id: format!("rca-{}", inputs_hash.get(..16).unwrap_or(&inputs_hash)),
            query: root.query.clone(),
            time_range,
            summary: draft.summary,
            root_cause: draft.root_cause,
            affected_services: draft.affected_services,
            evidence_chain: draft.evidence_chain,
            findings: draft.findings,
            recommendations: draft.recommendations,
            confidence: draft.confidence,
            timeline: draft.timeline,
            metadata,
        };

        if let Err(violations) = report.validate() {
            error!(report_id = %report.id, ?violations, "Report failed validation");
            return Err(Error::internal(violations.join("; ")));
        }

        ctx.set_shared(report.archive_key(), serde_json::to_value(&report)?)
            .await;
        ctx.set_shared(trace_key(&report.id), serde_json::to_value(&trace)?)
            .await;

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        {
            let mut stats = self.stats.write().await;
            stats.reports_built += 1;
            stats.analyst_failures += failed as u64;
            stats.deadline_expirations += expired as u64;
            stats.avg_processing_ms = (stats.avg_processing_ms * (stats.reports_built - 1) as f64
                + elapsed_ms)
                / stats.reports_built as f64;
        }

        info!(
            trace_id = %ctx.trace_id(),
            report_id = %report.id,
            root_cause = %report.root_cause,
            confidence = report.confidence,
            evidence = report.evidence_chain.len(),
            failed_agents = trace.failed_agents(),
            processing_ms = elapsed_ms as u64,
            "Collaboration completed"
        );

        Ok(report)
    }

    fn required(
        agents: &HashMap<AgentRole, Arc<dyn Agent>>,
        role: AgentRole,
    ) -> Result<Arc<dyn Agent>> {
        agents
            .get(&role)
            .cloned()
            .ok_or_else(|| Error::unregistered_role(role))
    }

    /// First registered agent (in role order) accepting the task, else the
    /// agent registered for the task type's default role
    fn resolve(
        agents: &HashMap<AgentRole, Arc<dyn Agent>>,
        task: &Task,
    ) -> Option<Arc<dyn Agent>> {
        AgentRole::ALL
            .iter()
            .filter_map(|role| agents.get(role))
            .find(|agent| agent.can_handle(task))
            .or_else(|| agents.get(&task.task_type.default_role()))
            .cloned()
    }

    async fn run_stage(
        trace: &mut PipelineTrace,
        agent: &Arc<dyn Agent>,
        ctx: &Arc<CollaborationContext>,
        task: Task,
    ) -> TaskResult {
        let mut span = trace.agent_span(agent.role(), &task.id);
        let result = agent.execute(ctx.clone(), task).await;
        span.finish(result.success, result.error());
        trace.record(span);
        result
    }

    async fn fan_out(
        &self,
        trace: &mut PipelineTrace,
        ctx: &Arc<CollaborationContext>,
        registry: &HashMap<AgentRole, Arc<dyn Agent>>,
        sub_tasks: Vec<Task>,
    ) -> BTreeMap<TaskId, TaskResult> {
        let mut handles = Vec::with_capacity(sub_tasks.len());

        for task in sub_tasks {
            let Some(agent) = Self::resolve(registry, &task) else {
                warn!(task_id = %task.id, task_type = %task.task_type, "No agent for sub-task, skipping");
                continue;
            };

            let role = agent.role();
            let task_id = task.id.clone();
            let span = trace.agent_span(role, &task_id);
            let ctx = ctx.clone();
            let deadline = task.deadline;
            let expired_id = task_id.clone();

            debug!(agent = %role, task_id = %task_id, "Dispatching sub-task");
            let handle = tokio::spawn(async move {
                let call = agent.execute(ctx, task);
                match deadline {
                    Some(deadline) => tokio::time::timeout_at(deadline, call)
                        .await
                        .unwrap_or_else(|_| {
                            TaskResult::failure(expired_id, role, Error::deadline().to_string())
                        }),
                    None => call.await,
                }
            });
            handles.push((task_id, role, span, handle));
        }

        let mut task_results = BTreeMap::new();
        for (task_id, role, mut span, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!(agent = %role, task_id = %task_id, error = %e, "Analyst task aborted");
                    TaskResult::failure(task_id.clone(), role, format!("agent task aborted: {}", e))
                }
            };
            if !result.success {
                warn!(
                    agent = %role,
                    task_id = %task_id,
                    error = result.error().unwrap_or("unknown"),
                    "Analyst failed"
                );
            }
            span.finish(result.success, result.error());
            trace.record(span);
            task_results.insert(task_id, result);
        }
        task_results
    }

    /// Per-role outcome, keyed by role name
    fn analyst_summary(task_results: &BTreeMap<TaskId, TaskResult>) -> serde_json::Value {
        let summary: BTreeMap<&str, serde_json::Value> = task_results
            .values()
            .map(|r| {
                (
                    r.agent_role.as_str(),
                    json!({
                        "success": r.success,
                        "confidence": r.confidence,
                        "evidence": r.evidence.len(),
                        "findings": r.findings.len(),
                        "error": r.error(),
                    }),
                )
            })
            .collect();
        json!(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiops_core::chat::StaticChat;
    use aiops_core::clock::FixedClock;
    use aiops_core::memory::Memory;
    use aiops_core::report::NO_CLEAR_ROOT_CAUSE;
    use aiops_core::ErrorKind;
    use aiops_sources::{InMemoryLogs, InMemoryMetrics, InMemoryTopology};
    use async_trait::async_trait;
    use std::time::Duration;

    fn collaborator(config: RcaConfig) -> Collaborator {
        Collaborator::with_sources(
            config,
            Arc::new(StaticChat::new("ok")),
            Arc::new(InMemoryMetrics::default()),
            Arc::new(InMemoryLogs::default()),
            Arc::new(InMemoryTopology::default()),
        )
        .unwrap()
        .with_clock(Arc::new(FixedClock(100)))
    }

    #[derive(Debug)]
    struct SlowMetrics;

    #[async_trait]
    impl Agent for SlowMetrics {
        fn role(&self) -> AgentRole {
            AgentRole::Metrics
        }

        fn name(&self) -> &str {
            "slow"
        }

        async fn execute(&self, _ctx: Arc<CollaborationContext>, task: Task) -> TaskResult {
            tokio::time::sleep(Duration::from_secs(30)).await;
            TaskResult::new(task.id, self.role())
        }
    }

    #[derive(Debug)]
    struct PanickingLogs;

    #[async_trait]
    impl Agent for PanickingLogs {
        fn role(&self) -> AgentRole {
            AgentRole::Logs
        }

        fn name(&self) -> &str {
            "panicking"
        }

        async fn execute(&self, _ctx: Arc<CollaborationContext>, _task: Task) -> TaskResult {
            panic!("analyst bug");
        }
    }

    #[tokio::test]
    async fn test_registry() {
        let collaborator = collaborator(RcaConfig::default());
        assert_eq!(collaborator.roles().await, AgentRole::ALL.to_vec());

        let previous = collaborator.register(Arc::new(SlowMetrics)).await;
        assert_eq!(previous.unwrap().name(), "Metrics Analyst");

        collaborator.unregister(AgentRole::Topology).await;
        assert_eq!(collaborator.roles().await.len(), 5);
    }

    #[tokio::test]
    async fn test_missing_mandatory_role_is_fatal() {
        let collaborator = collaborator(RcaConfig::default());
        collaborator.unregister(AgentRole::Decision).await;

        let err = collaborator
            .collaborate("q", TimeRange::new(0, 10), vec![], vec![])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProgrammerError);
    }

    #[tokio::test]
    async fn test_invalid_time_range_is_fatal() {
        let collaborator = collaborator(RcaConfig::default());
        let err = collaborator
            .collaborate("q", TimeRange::new(10, 0), vec![], vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_missing_analyst_is_skipped() {
        let collaborator = collaborator(RcaConfig::default());
        collaborator.unregister(AgentRole::Topology).await;

        let report = collaborator
            .collaborate("q", TimeRange::new(0, 10), vec!["a".to_string()], vec![])
            .await
            .unwrap();
        assert_eq!(report.metadata["analysts"].as_object().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_deadline_cuts_off_slow_analyst() {
        let config = RcaConfig {
            deadline_ms: Some(50),
            ..Default::default()
        };
        let collaborator = collaborator(config);
        collaborator.register(Arc::new(SlowMetrics)).await;

        let report = collaborator
            .collaborate("q", TimeRange::new(0, 10), vec!["a".to_string()], vec![])
            .await
            .unwrap();

        let analysts = &report.metadata["analysts"];
        assert_eq!(analysts["metrics"]["success"], false);
        assert_eq!(analysts["metrics"]["error"], "deadline");
        assert_eq!(report.root_cause, NO_CLEAR_ROOT_CAUSE);

        let stats = collaborator.stats().await;
        assert_eq!(stats.deadline_expirations, 1);
        assert!(stats.analyst_failures >= 1);
    }

    #[tokio::test]
    async fn test_panicking_analyst_becomes_failed_result() {
        let collaborator = collaborator(RcaConfig::default());
        collaborator.register(Arc::new(PanickingLogs)).await;

        let report = collaborator
            .collaborate("q", TimeRange::new(0, 10), vec!["a".to_string()], vec![])
            .await
            .unwrap();
        let logs = &report.metadata["analysts"]["logs"];
        assert_eq!(logs["success"], false);
        assert!(logs["error"].as_str().unwrap().contains("aborted"));
    }

    #[tokio::test]
    async fn test_report_is_archived_and_traced() {
        let collaborator = collaborator(RcaConfig::default());
        let memory = Arc::new(Memory::new());
        let trace_id = uuid::Uuid::new_v4();
        let ctx = Arc::new(
            collaborator
                .new_context()
                .with_memory(memory.clone())
                .with_tenant("acme")
                .with_trace_id(trace_id),
        );

        let report = collaborator
            .collaborate_with_context(ctx.clone(), "q", TimeRange::new(0, 10), vec![], vec![])
            .await
            .unwrap();

        let archived = ctx.get_shared(&report.archive_key()).await.unwrap();
        assert_eq!(archived["id"], report.id.as_str());
        assert_eq!(report.metadata["tenant_id"], "acme");

        // every advisory exchange is a user prompt plus an assistant reply
        let transcript = memory.messages().await;
        assert!(!transcript.is_empty());
        assert_eq!(transcript.len() % 2, 0);

        assert!(!report.metadata.contains_key("trace"));
        let archived_trace = ctx.get_shared(&trace_key(&report.id)).await.unwrap();
        let trace: PipelineTrace = serde_json::from_value(archived_trace).unwrap();
        assert!(trace.validate().is_ok());
        assert_eq!(trace.trace_id, trace_id);
        assert_eq!(trace.failed_agents(), 0);
        // planner + 3 analysts + decision + output
        assert_eq!(trace.agent_spans.len(), 6);
        assert_eq!(report.metadata["inputs_hash"].as_str().unwrap().len(), 64);

        let stats = collaborator.stats().await;
        assert_eq!(stats.runs, 1);
        assert_eq!(stats.reports_built, 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = RcaConfig {
            anomaly_sigma: 0.0,
            ..Default::default()
        };
        assert!(Collaborator::new(config, Arc::new(StaticChat::new("ok"))).is_err());
    }
}
