//! Logs analyst.

use super::{scope_of, within_deadline, Agent};
use crate::analysis::drain::{Drain, DrainConfig};
use crate::analysis::template::{mine_patterns, normalize, stack_frames, LogPattern};
use aiops_core::config::RcaConfig;
use aiops_core::context::CollaborationContext;
use aiops_core::task::{Evidence, EvidenceType, Finding, Task, TaskResult};
use aiops_core::types::AgentRole;
use aiops_sources::{LogEntry, LogLevel, LogsSource};
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const SYSTEM_PROMPT: &str =
    "You are an SRE reading error logs. Explain the dominant failure in two sentences.";

/// Keywords that raise a log's evidence score
pub const FAILURE_KEYWORDS: [&str; 5] = ["exception", "failed", "error", "timeout", "deadlock"];

/// Confidence when no error or warning log was found
pub const NO_LOGS_CONFIDENCE: f64 = 0.2;

/// Evidence score of a single log line
pub fn log_score(entry: &LogEntry) -> f64 {
    let mut score: f64 = 0.5;
    match entry.level {
        LogLevel::Error => score += 0.4,
        LogLevel::Warn => score += 0.2,
        _ => {}
    }
    let message = entry.message.to_lowercase();
    if FAILURE_KEYWORDS.iter().any(|k| message.contains(k)) {
        score += 0.1;
    }
    score.min(1.0)
}

/// Mines error patterns and clusters error and warning logs
#[derive(Debug)]
pub struct LogsAgent {
    source: Arc<dyn LogsSource>,
    pattern_min_count: usize,
    drain: DrainConfig,
}

impl LogsAgent {
    pub fn new(source: Arc<dyn LogsSource>, config: &RcaConfig) -> Self {
        Self {
            source,
            pattern_min_count: config.pattern_min_count,
            drain: DrainConfig {
                similarity: config.drain_similarity,
                max_depth: config.drain_max_depth,
            },
        }
    }

    fn confidence(n_logs: usize, n_patterns: usize) -> f64 {
        if n_logs == 0 {
            return NO_LOGS_CONFIDENCE;
        }
        0.5 + (n_logs as f64 / 50.0).min(0.3) + (n_patterns as f64 * 0.1).min(0.2)
    }

    fn evidence_for(entry: &LogEntry) -> Evidence {
        Evidence::new(
            EvidenceType::Logs,
            &entry.service,
            entry.timestamp,
            entry.message.clone(),
            log_score(entry),
        )
        .with_data(json!({
            "level": entry.level,
            "template": normalize(&entry.message),
            "trace_id": entry.trace_id,
        }))
    }

    fn finding_for(pattern: &LogPattern) -> Finding {
        Finding::new(
            "error_pattern",
            &pattern.service,
            format!("'{}' repeated {} times", pattern.template, pattern.count),
            pattern.severity,
            pattern.score,
        )
    }
}

#[async_trait]
impl Agent for LogsAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Logs
    }

    fn name(&self) -> &str {
        "Logs Analyst"
    }

    async fn execute(&self, ctx: Arc<CollaborationContext>, task: Task) -> TaskResult {
        let start = Instant::now();
        let services = scope_of(&task);

        info!(
            agent = %self.role(),
            task_id = %task.id,
            services = services.len(),
            source = self.source.name(),
            "Logs analysis started"
        );

        let entries = match within_deadline(task.deadline, self.source.fetch(&services, task.time_range)).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(agent = %self.role(), task_id = %task.id, error = %e, "Logs fetch failed");
                return TaskResult::failure(task.id, self.role(), e.to_string());
            }
        };

        let kept: Vec<&LogEntry> = entries
            .iter()
            .filter(|e| matches!(e.level, LogLevel::Error | LogLevel::Warn))
            .filter(|e| task.covers(&e.service))
            .collect();
        debug!(fetched = entries.len(), kept = kept.len(), "Filtered error and warning logs");

        let patterns = mine_patterns(&kept, self.pattern_min_count);

        let mut drain = Drain::new(self.drain.clone());
        for (idx, entry) in kept.iter().enumerate() {
            drain.add(idx, &entry.message, &entry.service);
        }
        let clusters: Vec<_> = drain
            .clusters()
            .iter()
            .map(|c| {
                json!({
                    "id": c.id,
                    "template": c.template_string(),
                    "size": c.size(),
                    "services": c.services,
                })
            })
            .collect();

        // template -> member log messages, in arrival order
        let cluster_logs: BTreeMap<String, Vec<&str>> = drain
            .groups()
            .into_iter()
            .map(|(template, members)| {
                let messages = members
                    .into_iter()
                    .filter_map(|idx| kept.get(idx).map(|e| e.message.as_str()))
                    .collect();
                (template, messages)
            })
            .collect();

        let stack_traces: Vec<_> = kept
            .iter()
            .filter_map(|entry| {
                let frames = stack_frames(&entry.raw);
                (!frames.is_empty()).then(|| {
                    json!({
                        "service": entry.service,
                        "timestamp": entry.timestamp,
                        "frames": frames,
                    })
                })
            })
            .collect();

        let mut result = TaskResult::new(task.id.clone(), self.role());
        result.evidence = kept.iter().map(|e| Self::evidence_for(e)).collect();
        result.findings = patterns.iter().map(Self::finding_for).collect();
        result.set_confidence(Self::confidence(kept.len(), patterns.len()));

        let prompt = format!(
            "Query: {}\nError/warning logs: {}\nTop patterns:\n{}",
            task.query,
            kept.len(),
            patterns
                .iter()
                .take(ctx.max_prompt_items())
                .map(|p| format!("- [{}] {} x{}", p.service, p.template, p.count))
                .collect::<Vec<_>>()
                .join("\n"),
        );
        let analysis = ctx
            .advise(SYSTEM_PROMPT, prompt, task.deadline)
            .await
            .unwrap_or_else(|e| e.to_string());

        result.insert_metadata("log_count", json!(kept.len()));
        result.insert_metadata("patterns", json!(patterns));
        result.insert_metadata("clusters", json!(clusters));
        result.insert_metadata("cluster_logs", json!(cluster_logs));
        result.insert_metadata("drain_max_depth", json!(self.drain.max_depth));
        result.insert_metadata("stack_traces", json!(stack_traces));
        result.insert_metadata("analysis", json!(analysis));

        info!(
            agent = %self.role(),
            task_id = %task.id,
            logs = kept.len(),
            patterns = patterns.len(),
            clusters = clusters.len(),
            confidence = result.confidence,
            processing_ms = start.elapsed().as_millis() as u64,
            "Logs analysis completed"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiops_core::chat::StaticChat;
    use aiops_core::types::{Severity, TaskType, TimeRange};
    use aiops_sources::InMemoryLogs;

    fn task() -> Task {
        Task::new(
            TaskType::LogsAnalysis,
            "errors",
            TimeRange::new(0, 3600),
            vec!["api".to_string()],
            vec![],
        )
    }

    fn ctx() -> Arc<CollaborationContext> {
        Arc::new(CollaborationContext::new(Arc::new(StaticChat::new("pool exhausted"))))
    }

    #[test]
    fn test_log_score() {
        let error = LogEntry::new("a", LogLevel::Error, 0, "request failed");
        let warn = LogEntry::new("a", LogLevel::Warn, 0, "slow response");
        let warn_kw = LogEntry::new("a", LogLevel::Warn, 0, "upstream Timeout");
        assert!((log_score(&error) - 1.0).abs() < 1e-9);
        assert!((log_score(&warn) - 0.7).abs() < 1e-9);
        assert!((log_score(&warn_kw) - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_patterns_clusters_and_stack_traces() {
        let mut entries: Vec<LogEntry> = (0..6)
            .map(|i| LogEntry::new("api", LogLevel::Error, i * 60, format!("db call {} timed out", i)))
            .collect();
        entries.push(LogEntry::new("api", LogLevel::Info, 10, "healthy"));
        entries.push(
            LogEntry::new("api", LogLevel::Error, 400, "NullPointerException")
                .with_raw("NullPointerException\n    at app.Handler.run(Handler.java:12)"),
        );
        entries.push(LogEntry::new("other", LogLevel::Error, 20, "not in scope"));

        let agent = LogsAgent::new(Arc::new(InMemoryLogs::new(entries)), &RcaConfig::default());
        let result = agent.execute(ctx(), task()).await;

        assert!(result.success);
        assert_eq!(result.evidence.len(), 7);
        assert!(result.evidence.iter().all(|e| e.service == "api"));
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].finding_type, "error_pattern");
        assert_eq!(result.findings[0].severity, Severity::High);

        let clusters = result.metadata["clusters"].as_array().unwrap();
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0]["template"], "db call <*> timed out");
        assert_eq!(clusters[0]["services"]["api"], 6);

        let cluster_logs = result.metadata["cluster_logs"].as_object().unwrap();
        assert_eq!(cluster_logs.len(), 2);
        let members = cluster_logs["db call <*> timed out"].as_array().unwrap();
        assert_eq!(members.len(), 6);
        assert_eq!(members[0], "db call 0 timed out");
        assert_eq!(cluster_logs["NullPointerException"][0], "NullPointerException");

        let traces = result.metadata["stack_traces"].as_array().unwrap();
        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0]["frames"][0], "at app.Handler.run(Handler.java:12)");

        // 7 logs, 1 pattern: 0.5 + 0.14 + 0.1
        assert!((result.confidence - 0.74).abs() < 1e-9);
        assert_eq!(result.metadata["analysis"], "pool exhausted");
    }

    #[tokio::test]
    async fn test_no_logs() {
        let agent = LogsAgent::new(Arc::new(InMemoryLogs::default()), &RcaConfig::default());
        let result = agent.execute(ctx(), task()).await;
        assert!(result.success);
        assert!(result.evidence.is_empty());
        assert_eq!(result.confidence, NO_LOGS_CONFIDENCE);
    }
}
