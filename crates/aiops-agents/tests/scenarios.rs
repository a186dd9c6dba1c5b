//! End-to-end incident scenarios run through the full collaborator pipeline.

use aiops_agents::{Agent, Collaborator, TopologyAgent};
use aiops_core::prelude::*;
use aiops_sources::{
    InMemoryLogs, InMemoryMetrics, InMemoryTopology, LogEntry, LogLevel, MetricPoint,
    ServiceEdge, Topology,
};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

const NOW: i64 = 1600;

fn window() -> TimeRange {
    TimeRange::new(0, 3600)
}

fn collaborator(
    metrics: InMemoryMetrics,
    logs: InMemoryLogs,
    topology: InMemoryTopology,
) -> Collaborator {
    Collaborator::with_sources(
        RcaConfig::default(),
        Arc::new(StaticChat::new("ok")),
        Arc::new(metrics),
        Arc::new(logs),
        Arc::new(topology),
    )
    .unwrap()
    .with_clock(Arc::new(FixedClock(NOW)))
}

fn services(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn cpu_spike() -> InMemoryMetrics {
    let points = (0..60)
        .map(|i| {
            let value = if i == 59 { 500.0 } else { 50.0 };
            MetricPoint::new("svc-a", "cpu_usage", i * 60, value)
        })
        .collect();
    InMemoryMetrics::new(points)
}

fn log_storm() -> InMemoryLogs {
    let mut entries: Vec<LogEntry> = (0..12)
        .map(|i| LogEntry::new("svc-b", LogLevel::Error, 1000 + i * 60, "connection timeout"))
        .collect();
    entries.extend(
        (0..3).map(|i| LogEntry::new("svc-b", LogLevel::Warn, 1000 + i * 60, "memory 85%")),
    );
    InMemoryLogs::new(entries)
}

/// Checks every report must pass regardless of scenario
fn assert_universal(report: &Report) {
    assert!(report.validate().is_ok(), "{:?}", report.validate());
    assert!((0.0..=1.0).contains(&report.confidence));
    for finding in &report.findings {
        assert!((0.0..=1.0).contains(&finding.score));
    }
    assert!(report
        .evidence_chain
        .windows(2)
        .all(|w| w[0].timestamp <= w[1].timestamp));
    assert!(report.timeline.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    let mentioned: BTreeSet<&str> = report
        .evidence_chain
        .iter()
        .map(|e| e.service.as_str())
        .chain(report.findings.iter().map(|f| f.service.as_str()))
        .collect();
    for service in &report.affected_services {
        assert!(mentioned.contains(service.as_str()), "{} not backed by output", service);
    }
}

#[tokio::test]
async fn test_single_service_cpu_spike() {
    let collaborator = collaborator(cpu_spike(), InMemoryLogs::default(), InMemoryTopology::default());

    let report = collaborator
        .collaborate("cpu spike on svc-a", window(), services(&["svc-a"]), vec![])
        .await
        .unwrap();

    assert_universal(&report);
    assert_eq!(report.affected_services, vec!["svc-a".to_string()]);
    assert!(report.findings.iter().any(|f| f.severity == Severity::Critical));
    assert!(report.root_cause.contains("svc-a"));
    assert!(report.confidence >= 0.5);
    assert!(report.evidence_chain.iter().any(|e| e.timestamp == 59 * 60));
}

#[tokio::test]
async fn test_log_pattern_storm() {
    let collaborator = collaborator(InMemoryMetrics::default(), log_storm(), InMemoryTopology::default());

    let report = collaborator
        .collaborate("errors on svc-b", window(), services(&["svc-b"]), vec![])
        .await
        .unwrap();

    assert_universal(&report);
    assert!(report.findings.iter().any(|f| {
        f.finding_type == "error_pattern" && f.service == "svc-b" && f.severity == Severity::Critical
    }));
    assert!(report.timeline.len() >= 15);
    assert!(report
        .timeline
        .iter()
        .all(|e| (1000..=1000 + 12 * 60).contains(&e.timestamp)));
}

#[derive(Debug)]
struct ConflictingMetrics;

#[async_trait]
impl Agent for ConflictingMetrics {
    fn role(&self) -> AgentRole {
        AgentRole::Metrics
    }

    fn name(&self) -> &str {
        "conflicting metrics"
    }

    async fn execute(&self, _ctx: Arc<CollaborationContext>, task: Task) -> TaskResult {
        let mut result = TaskResult::new(task.id, self.role()).with_confidence(0.6);
        result.evidence = vec![
            Evidence::new(EvidenceType::Metrics, "svc-c", 100, "latency p99 at 4s", 0.9),
            Evidence::new(EvidenceType::Metrics, "svc-c", 160, "latency p99 normal", 0.1),
        ];
        result
    }
}

#[tokio::test]
async fn test_conflict_resolution() {
    let collaborator = collaborator(
        InMemoryMetrics::default(),
        InMemoryLogs::default(),
        InMemoryTopology::default(),
    );
    collaborator.register(Arc::new(ConflictingMetrics)).await;

    let report = collaborator
        .collaborate("latency on svc-c", window(), services(&["svc-c"]), vec![])
        .await
        .unwrap();

    assert_universal(&report);
    let conflicts = report.metadata["conflicts"].as_array().unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0]["winner"]["score"], 0.9);
    assert!(report.root_cause.starts_with("svc-c"));
}

#[tokio::test]
async fn test_partial_failure_attenuates_confidence() {
    let logs = || {
        InMemoryLogs::new(vec![LogEntry::new(
            "svc-d",
            LogLevel::Error,
            300,
            "payment request failed",
        )])
    };

    let degraded = collaborator(
        InMemoryMetrics::failing("prometheus unreachable"),
        logs(),
        InMemoryTopology::default(),
    )
    .collaborate("payments failing", window(), services(&["svc-d"]), vec![])
    .await
    .unwrap();

    let healthy = collaborator(InMemoryMetrics::default(), logs(), InMemoryTopology::default())
        .collaborate("payments failing", window(), services(&["svc-d"]), vec![])
        .await
        .unwrap();

    assert_universal(&degraded);
    assert_eq!(degraded.metadata["analysts"]["metrics"]["success"], false);
    assert_eq!(degraded.evidence_chain.len(), 1);
    assert_eq!(degraded.affected_services, vec!["svc-d".to_string()]);

    // two of three analysts succeeded: factor 0.7 + 0.3 * 2/3
    assert!(degraded.confidence < healthy.confidence);
    assert!((degraded.confidence - healthy.confidence * 0.9).abs() < 1e-9);
}

#[tokio::test]
async fn test_topology_cycle_terminates() {
    let topology = Topology::from_edges(vec![
        ServiceEdge::new("svc-e", "svc-f"),
        ServiceEdge::new("svc-f", "svc-e"),
    ]);
    let config = RcaConfig::default();
    let agent = TopologyAgent::new(Arc::new(InMemoryTopology::new(topology.clone())), &config);
    let ctx = Arc::new(CollaborationContext::new(Arc::new(StaticChat::new("ok"))));
    let task = Task::new(
        TaskType::TopologyAnalysis,
        "svc-e degraded",
        window(),
        services(&["svc-e"]),
        vec![],
    );

    let started = Instant::now();
    let result = agent.execute(ctx, task).await;
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(result.success);
    assert_eq!(result.metadata["impact_scope"], serde_json::json!(["svc-e", "svc-f"]));

    let report = collaborator(
        InMemoryMetrics::default(),
        InMemoryLogs::default(),
        InMemoryTopology::new(topology),
    )
    .collaborate("svc-e degraded", window(), services(&["svc-e"]), vec![])
    .await
    .unwrap();
    assert_universal(&report);
}

#[tokio::test]
async fn test_empty_inputs() {
    let collaborator = collaborator(
        InMemoryMetrics::default(),
        InMemoryLogs::default(),
        InMemoryTopology::default(),
    );

    let report = collaborator
        .collaborate("anything wrong?", window(), vec![], vec![])
        .await
        .unwrap();

    assert_universal(&report);
    assert_eq!(report.root_cause, NO_CLEAR_ROOT_CAUSE);
    assert!(report.confidence <= 0.3);
    assert!(report.affected_services.is_empty());
    assert!(report.evidence_chain.is_empty());
    assert!(!report.recommendations.is_empty());
    assert_eq!(report.summary, "ok");
}

#[tokio::test]
async fn test_services_derived_from_alerts() {
    let collaborator = collaborator(cpu_spike(), InMemoryLogs::default(), InMemoryTopology::default());
    let alerts = vec![Alert::new("a-1", "svc-a", Severity::High, "cpu > 90%", 3540)];

    let report = collaborator
        .collaborate("cpu alert", window(), vec![], alerts)
        .await
        .unwrap();

    assert_universal(&report);
    assert_eq!(report.affected_services, vec!["svc-a".to_string()]);
}

#[tokio::test]
async fn test_replay_is_deterministic() {
    let run = || async {
        collaborator(cpu_spike(), log_storm(), InMemoryTopology::default())
            .collaborate(
                "checkout degraded",
                window(),
                services(&["svc-a", "svc-b"]),
                vec![],
            )
            .await
            .unwrap()
    };

    let first = run().await;
    let second = run().await;
    assert_eq!(first, second);
    assert!(first.id.starts_with("rca-"));
}
