//! Metrics analyst.

use super::{scope_of, within_deadline, Agent};
use crate::analysis::anomaly::{correlate_pairs, detect_anomalies, group_series, MetricAnomaly};
use aiops_core::config::RcaConfig;
use aiops_core::context::CollaborationContext;
use aiops_core::task::{Evidence, EvidenceType, Finding, Task, TaskResult};
use aiops_core::types::AgentRole;
use aiops_sources::MetricsSource;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

const SYSTEM_PROMPT: &str =
    "You are an SRE analysing metric anomalies. Summarise what the anomalies suggest in two sentences.";

/// Confidence when no anomaly was found
pub const NO_ANOMALY_CONFIDENCE: f64 = 0.3;

/// Detects sigma-rule anomalies and correlated metric pairs
#[derive(Debug)]
pub struct MetricsAgent {
    source: Arc<dyn MetricsSource>,
    sigma: f64,
    correlation_min: f64,
}

impl MetricsAgent {
    pub fn new(source: Arc<dyn MetricsSource>, config: &RcaConfig) -> Self {
        Self {
            source,
            sigma: config.anomaly_sigma,
            correlation_min: config.correlation_min,
        }
    }

    fn confidence(n_anomalies: usize, n_correlations: usize) -> f64 {
        if n_anomalies == 0 {
            return NO_ANOMALY_CONFIDENCE;
        }
        0.5 + (n_anomalies as f64 * 0.1).min(0.3) + (n_correlations as f64 * 0.05).min(0.2)
    }

    fn evidence_for(anomaly: &MetricAnomaly) -> Evidence {
        Evidence::new(
            EvidenceType::Metrics,
            &anomaly.service,
            anomaly.timestamp,
            format!(
                "{} = {:.2} deviates from mean {:.2} (σ {:.2})",
                anomaly.metric, anomaly.value, anomaly.mean, anomaly.std_dev
            ),
            anomaly.score,
        )
        .with_data(json!({
            "metric": anomaly.metric,
            "value": anomaly.value,
            "mean": anomaly.mean,
            "std_dev": anomaly.std_dev,
        }))
    }

    fn finding_for(anomaly: &MetricAnomaly) -> Finding {
        let sigmas = if anomaly.std_dev > 0.0 {
            (anomaly.value - anomaly.mean).abs() / anomaly.std_dev
        } else {
            0.0
        };
        Finding::new(
            "metric_anomaly",
            &anomaly.service,
            format!(
                "{} anomaly at t={}: {:.1}σ from baseline",
                anomaly.metric, anomaly.timestamp, sigmas
            ),
            anomaly.severity,
            anomaly.score,
        )
    }
}

#[async_trait]
impl Agent for MetricsAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Metrics
    }

    fn name(&self) -> &str {
        "Metrics Analyst"
    }

    async fn execute(&self, ctx: Arc<CollaborationContext>, task: Task) -> TaskResult {
        let start = Instant::now();
        let services = scope_of(&task);

        info!(
            agent = %self.role(),
            task_id = %task.id,
            services = services.len(),
            source = self.source.name(),
            "Metrics analysis started"
        );

        let points = match within_deadline(task.deadline, self.source.fetch(&services, task.time_range)).await {
            Ok(points) => points,
            Err(e) => {
                warn!(agent = %self.role(), task_id = %task.id, error = %e, "Metrics fetch failed");
                return TaskResult::failure(task.id, self.role(), e.to_string());
            }
        };
        let points: Vec<_> = points.into_iter().filter(|p| task.covers(&p.service)).collect();

        let groups = group_series(&points);
        let anomalies = detect_anomalies(&groups, self.sigma);
        let correlations = correlate_pairs(&groups, self.correlation_min);

        let mut result = TaskResult::new(task.id.clone(), self.role());
        result.evidence = anomalies.iter().map(Self::evidence_for).collect();
        result.findings = anomalies.iter().map(Self::finding_for).collect();
        result.set_confidence(Self::confidence(anomalies.len(), correlations.len()));

        let prompt = format!(
            "Query: {}\nSeries analysed: {}\nAnomalies ({} total):\n{}\nCorrelations:\n{}",
            task.query,
            groups.len(),
            anomalies.len(),
            anomalies
                .iter()
                .take(ctx.max_prompt_items())
                .map(|a| format!("- {} {} = {:.2} at {}", a.service, a.metric, a.value, a.timestamp))
                .collect::<Vec<_>>()
                .join("\n"),
            correlations
                .iter()
                .take(ctx.max_prompt_items())
                .map(|c| format!("- {} {}~{} r={:.2}", c.service, c.first, c.second, c.coefficient))
                .collect::<Vec<_>>()
                .join("\n"),
        );
        let analysis = ctx
            .advise(SYSTEM_PROMPT, prompt, task.deadline)
            .await
            .unwrap_or_else(|e| e.to_string());

        result.insert_metadata("series", json!(groups.len()));
        result.insert_metadata("anomalies", json!(anomalies.len()));
        result.insert_metadata("correlations", json!(correlations));
        result.insert_metadata("analysis", json!(analysis));
        if anomalies.is_empty() {
            result.next_actions.push("widen the time range or add metrics".to_string());
        }

        info!(
            agent = %self.role(),
            task_id = %task.id,
            anomalies = anomalies.len(),
            correlations = correlations.len(),
            confidence = result.confidence,
            processing_ms = start.elapsed().as_millis() as u64,
            "Metrics analysis completed"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiops_core::chat::{NoopChat, StaticChat};
    use aiops_core::task::TaskId;
    use aiops_core::types::{Severity, TaskType, TimeRange};
    use aiops_sources::{InMemoryMetrics, MetricPoint};

    fn spike(service: &str) -> Vec<MetricPoint> {
        (0..30)
            .map(|i| {
                let value = if i == 29 { 900.0 } else { 40.0 };
                MetricPoint::new(service, "cpu_usage", i * 60, value)
            })
            .collect()
    }

    fn task(services: &[&str]) -> Task {
        Task::new(
            TaskType::MetricsAnalysis,
            "cpu spike",
            TimeRange::new(0, 3600),
            services.iter().map(|s| s.to_string()).collect(),
            vec![],
        )
    }

    #[tokio::test]
    async fn test_spike_produces_evidence_and_finding() {
        let agent = MetricsAgent::new(
            Arc::new(InMemoryMetrics::new(spike("api"))),
            &RcaConfig::default(),
        );
        let ctx = Arc::new(CollaborationContext::new(Arc::new(StaticChat::new("cpu saturated"))));

        let result = agent.execute(ctx, task(&["api"])).await;
        assert!(result.success);
        assert_eq!(result.evidence.len(), 1);
        assert_eq!(result.evidence[0].timestamp, 29 * 60);
        assert_eq!(result.findings[0].severity, Severity::Critical);
        assert_eq!(result.findings[0].finding_type, "metric_anomaly");
        assert!((result.confidence - 0.6).abs() < 1e-9);
        assert_eq!(result.metadata["analysis"], "cpu saturated");
    }

    #[tokio::test]
    async fn test_quiet_series_has_low_confidence() {
        let points = (0..10)
            .map(|i| MetricPoint::new("api", "cpu_usage", i * 60, 40.0))
            .collect();
        let agent = MetricsAgent::new(Arc::new(InMemoryMetrics::new(points)), &RcaConfig::default());
        let ctx = Arc::new(CollaborationContext::new(Arc::new(NoopChat::new())));

        let result = agent.execute(ctx, task(&["api"])).await;
        assert!(result.success);
        assert!(result.evidence.is_empty());
        assert_eq!(result.confidence, NO_ANOMALY_CONFIDENCE);
        // LLM failure is absorbed as advisory text
        assert!(result.metadata["analysis"]
            .as_str()
            .unwrap()
            .contains("no chat model configured"));
    }

    #[tokio::test]
    async fn test_source_failure_marks_result_failed() {
        let agent = MetricsAgent::new(
            Arc::new(InMemoryMetrics::failing("prometheus unreachable")),
            &RcaConfig::default(),
        );
        let ctx = Arc::new(CollaborationContext::new(Arc::new(NoopChat::new())));
        let task = task(&["api"]);
        let id: TaskId = task.id.clone();

        let result = agent.execute(ctx, task).await;
        assert!(!result.success);
        assert_eq!(result.task_id, id);
        assert!(result.error().unwrap().contains("prometheus unreachable"));
    }

    #[test]
    fn test_confidence_caps() {
        assert_eq!(MetricsAgent::confidence(0, 5), NO_ANOMALY_CONFIDENCE);
        assert!((MetricsAgent::confidence(10, 10) - 1.0).abs() < 1e-9);
    }
}
