//! Tasks, evidence, findings and task results.
//!
//! These are value types: produced by one component and read by later ones.

use crate::report::{DecisionOutcome, ReportDraft};
use crate::types::{clamp_unit, AgentRole, Alert, Severity, TaskType, TimeRange};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static LAST_TASK_NANOS: AtomicU64 = AtomicU64::new(0);

/// Monotonic task identifier.
///
/// Ids are zero-padded so that lexicographic order equals creation order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(String);

impl TaskId {
    /// Generate a new id from the wall clock, bumped to stay strictly increasing
    pub fn generate() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);

        let mut last = LAST_TASK_NANOS.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match LAST_TASK_NANOS.compare_exchange_weak(
                last,
                next,
                Ordering::SeqCst,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Self(format!("task-{:020}", next)),
                Err(observed) => last = observed,
            }
        }
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Upstream results handed to the decision agent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionInput {
    pub task_results: BTreeMap<TaskId, TaskResult>,
}

/// Upstream results handed to the output agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputInput {
    pub task_results: BTreeMap<TaskId, TaskResult>,
    pub decision_result: TaskResult,
}

/// Typed input carried by a task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskInput {
    #[default]
    None,
    Decision(DecisionInput),
    Output(Box<OutputInput>),
}

/// A unit of work for one agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub query: String,
    pub time_range: TimeRange,
    pub services: Vec<String>,
    pub alerts: Vec<Alert>,
    /// Free-form advisory bag; the pipeline itself reads `input`
    #[serde(default)]
    pub context_map: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub input: TaskInput,
    pub parent: Option<TaskId>,
    /// Absolute deadline for every I/O call made on behalf of this task
    #[serde(skip)]
    pub deadline: Option<tokio::time::Instant>,
}

impl Task {
    /// Create a root-level task
    pub fn new(
        task_type: TaskType,
        query: impl Into<String>,
        time_range: TimeRange,
        services: Vec<String>,
        alerts: Vec<Alert>,
    ) -> Self {
        Self {
            id: TaskId::generate(),
            task_type,
            query: query.into(),
            time_range,
            services,
            alerts,
            context_map: HashMap::new(),
            input: TaskInput::None,
            parent: None,
            deadline: None,
        }
    }

    /// Create a child task inheriting query, window, services, alerts and deadline
    pub fn subtask(&self, task_type: TaskType) -> Self {
        Self {
            id: TaskId::generate(),
            task_type,
            query: self.query.clone(),
            time_range: self.time_range,
            services: self.services.clone(),
            alerts: self.alerts.clone(),
            context_map: HashMap::new(),
            input: TaskInput::None,
            parent: Some(self.id.clone()),
            deadline: self.deadline,
        }
    }

    pub fn with_input(mut self, input: TaskInput) -> Self {
        self.input = input;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<tokio::time::Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context_map.insert(key.into(), value);
        self
    }

    /// Union of the explicit services and the services named by alerts
    pub fn service_scope(&self) -> BTreeSet<String> {
        self.services
            .iter()
            .cloned()
            .chain(self.alerts.iter().map(|a| a.service.clone()))
            .collect()
    }

    /// Whether evidence about `service` may be attributed to this task
    pub fn covers(&self, service: &str) -> bool {
        self.services.iter().any(|s| s == service) || self.alerts.iter().any(|a| a.service == service)
    }

    /// Populate empty `services` from the alert services, keeping first-seen order
    pub fn fill_services_from_alerts(&mut self) {
        if !self.services.is_empty() {
            return;
        }
        for alert in &self.alerts {
            if !self.services.contains(&alert.service) {
                self.services.push(alert.service.clone());
            }
        }
    }
}

/// Source of a piece of evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    Metrics,
    Logs,
    Topology,
}

impl EvidenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceType::Metrics => "metrics",
            EvidenceType::Logs => "logs",
            EvidenceType::Topology => "topology",
        }
    }
}

impl std::fmt::Display for EvidenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One atomic datum supporting a finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    #[serde(rename = "type")]
    pub evidence_type: EvidenceType,
    pub service: String,
    /// Unix seconds
    pub timestamp: i64,
    pub description: String,
    #[serde(default)]
    pub data: serde_json::Value,
    /// Always within `[0, 1]`
    pub score: f64,
}

impl Evidence {
    pub fn new(
        evidence_type: EvidenceType,
        service: impl Into<String>,
        timestamp: i64,
        description: impl Into<String>,
        score: f64,
    ) -> Self {
        Self {
            evidence_type,
            service: service.into(),
            timestamp,
            description: description.into(),
            data: serde_json::Value::Null,
            score: clamp_unit(score),
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

/// A higher-level assertion derived from evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "type")]
    pub finding_type: String,
    pub service: String,
    pub description: String,
    pub severity: Severity,
    /// Always within `[0, 1]`
    pub score: f64,
}

impl Finding {
    pub fn new(
        finding_type: impl Into<String>,
        service: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
        score: f64,
    ) -> Self {
        Self {
            finding_type: finding_type.into(),
            service: service.into(),
            description: description.into(),
            severity,
            score: clamp_unit(score),
        }
    }
}

/// Typed product of the planner, decision and output agents
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskPayload {
    Plan { sub_tasks: Vec<Task> },
    Decision(DecisionOutcome),
    Report(ReportDraft),
}

/// Result produced by exactly one agent for one task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub agent_role: AgentRole,
    pub success: bool,
    pub evidence: Vec<Evidence>,
    pub findings: Vec<Finding>,
    /// Always within `[0, 1]`
    pub confidence: f64,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub next_actions: Vec<String>,
    #[serde(default)]
    pub payload: Option<TaskPayload>,
}

impl TaskResult {
    /// Successful, empty result
    pub fn new(task_id: TaskId, agent_role: AgentRole) -> Self {
        Self {
            task_id,
            agent_role,
            success: true,
            evidence: Vec::new(),
            findings: Vec::new(),
            confidence: 0.0,
            metadata: BTreeMap::new(),
            next_actions: Vec::new(),
            payload: None,
        }
    }

    /// Failed result carrying `metadata["error"]`
    pub fn failure(task_id: TaskId, agent_role: AgentRole, error: impl Into<String>) -> Self {
        let mut result = Self::new(task_id, agent_role);
        result.success = false;
        result
            .metadata
            .insert("error".to_string(), serde_json::Value::String(error.into()));
        result
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_unit(confidence);
        self
    }

    pub fn set_confidence(&mut self, confidence: f64) {
        self.confidence = clamp_unit(confidence);
    }

    pub fn insert_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata.insert(key.into(), value);
    }

    /// Error message of a failed result
    pub fn error(&self) -> Option<&str> {
        self.metadata.get("error").and_then(|v| v.as_str())
    }

    /// Evidence that may flow downstream; empty for failed results
    pub fn usable_evidence(&self) -> &[Evidence] {
        if self.success {
            &self.evidence
        } else {
            &[]
        }
    }

    /// Findings that may flow downstream; empty for failed results
    pub fn usable_findings(&self) -> &[Finding] {
        if self.success {
            &self.findings
        } else {
            &[]
        }
    }
}
