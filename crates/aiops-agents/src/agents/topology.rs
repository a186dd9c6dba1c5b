//! Topology analyst.

use super::{scope_of, within_deadline, Agent};
use crate::analysis::graph::{
    critical_paths, dependency_walk, impact_scope, propagation_paths, CriticalPath,
    PropagationPath,
};
use aiops_core::config::RcaConfig;
use aiops_core::context::CollaborationContext;
use aiops_core::task::{Evidence, EvidenceType, Finding, Task, TaskResult};
use aiops_core::types::AgentRole;
use aiops_sources::TopologySource;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

const SYSTEM_PROMPT: &str =
    "You are an SRE reviewing a service dependency graph. Say which dependency most likely propagates the failure.";

/// Confidence for an empty topology
pub const EMPTY_TOPOLOGY_CONFIDENCE: f64 = 0.3;

/// Walks the dependency graph around the suspect services
#[derive(Debug)]
pub struct TopologyAgent {
    source: Arc<dyn TopologySource>,
    latency_ref_ms: f64,
}

impl TopologyAgent {
    pub fn new(source: Arc<dyn TopologySource>, config: &RcaConfig) -> Self {
        Self {
            source,
            latency_ref_ms: config.critical_path_latency_ms,
        }
    }

    fn confidence(n_paths: usize, n_critical: usize) -> f64 {
        0.5 + (n_paths as f64 * 0.05).min(0.2) + (n_critical as f64 * 0.1).min(0.3)
    }

    fn evidence_for(path: &PropagationPath, timestamp: i64) -> Evidence {
        Evidence::new(
            EvidenceType::Topology,
            &path.source,
            timestamp,
            path.describe(),
            path.impact,
        )
        .with_data(json!({
            "path": path.path,
            "error_rate_sum": path.error_rate_sum,
            "severity": path.severity,
        }))
    }

    fn finding_for(path: &CriticalPath) -> Finding {
        let mut description = format!(
            "critical path {} ({:.0}ms total latency)",
            path.describe(),
            path.total_latency_ms
        );
        if path.bottleneck {
            description.push_str(", contains bottleneck");
        }
        Finding::new(
            "critical_path",
            &path.service,
            description,
            path.severity,
            path.criticality,
        )
    }
}

#[async_trait]
impl Agent for TopologyAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Topology
    }

    fn name(&self) -> &str {
        "Topology Analyst"
    }

    async fn execute(&self, ctx: Arc<CollaborationContext>, task: Task) -> TaskResult {
        let start = Instant::now();
        let services = scope_of(&task);

        info!(
            agent = %self.role(),
            task_id = %task.id,
            services = services.len(),
            source = self.source.name(),
            "Topology analysis started"
        );

        let topology = match within_deadline(task.deadline, self.source.fetch(&services, task.time_range)).await {
            Ok(topology) => topology,
            Err(e) => {
                warn!(agent = %self.role(), task_id = %task.id, error = %e, "Topology fetch failed");
                return TaskResult::failure(task.id, self.role(), e.to_string());
            }
        };

        let mut result = TaskResult::new(task.id.clone(), self.role());
        if topology.is_empty() {
            result.set_confidence(EMPTY_TOPOLOGY_CONFIDENCE);
            result.insert_metadata("impact_scope", json!([]));
            result.insert_metadata("analysis", json!("topology is empty"));
            info!(agent = %self.role(), task_id = %task.id, "Topology is empty");
            return result;
        }

        let dependencies = dependency_walk(&topology, &services);
        let propagation = propagation_paths(&topology, &services);
        let critical = critical_paths(&topology, &services, self.latency_ref_ms);
        let scope = impact_scope(&topology, &services);

        result.evidence = propagation
            .iter()
            .map(|p| Self::evidence_for(p, task.time_range.start))
            .collect();
        result.findings = critical.iter().map(Self::finding_for).collect();
        result.set_confidence(Self::confidence(propagation.len(), critical.len()));

        let prompt = format!(
            "Query: {}\nImpact scope: {}\nPropagation paths:\n{}\nCritical paths:\n{}",
            task.query,
            scope.iter().cloned().collect::<Vec<_>>().join(", "),
            propagation
                .iter()
                .take(ctx.max_prompt_items())
                .map(|p| format!("- {} impact {:.2}", p.describe(), p.impact))
                .collect::<Vec<_>>()
                .join("\n"),
            critical
                .iter()
                .take(ctx.max_prompt_items())
                .map(|p| format!("- {} criticality {:.2}", p.describe(), p.criticality))
                .collect::<Vec<_>>()
                .join("\n"),
        );
        let analysis = ctx
            .advise(SYSTEM_PROMPT, prompt, task.deadline)
            .await
            .unwrap_or_else(|e| e.to_string());

        result.insert_metadata("dependencies", json!(dependencies));
        result.insert_metadata("propagation_paths", json!(propagation));
        result.insert_metadata("critical_paths", json!(critical));
        result.insert_metadata("impact_scope", json!(scope));
        result.insert_metadata(
            "bottlenecks",
            json!(critical.iter().filter(|p| p.bottleneck).count()),
        );
        result.insert_metadata("analysis", json!(analysis));

        info!(
            agent = %self.role(),
            task_id = %task.id,
            nodes = topology.node_count(),
            propagation_paths = propagation.len(),
            critical_paths = critical.len(),
            impact_scope = scope.len(),
            confidence = result.confidence,
            processing_ms = start.elapsed().as_millis() as u64,
            "Topology analysis completed"
        );
        result
    }
}
