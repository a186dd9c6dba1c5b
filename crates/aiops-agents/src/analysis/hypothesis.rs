//! Per-service root-cause hypotheses and their ranking.

use aiops_core::report::RootCauseHypothesis;
use aiops_core::task::{Evidence, Finding, TaskResult};
use aiops_core::types::{clamp_unit, Severity};

/// Confidence of a service with no evidence and no findings
pub const EMPTY_GROUP_CONFIDENCE: f64 = 0.3;

#[derive(Default)]
struct Group {
    evidence: Vec<Evidence>,
    findings: Vec<Finding>,
}

/// Group usable evidence and findings by service.
///
/// Services appear in order of first mention while iterating the results,
/// evidence before findings within each result. Failed results are skipped.
pub fn build_hypotheses<'a>(
    results: impl IntoIterator<Item = &'a TaskResult>,
) -> Vec<RootCauseHypothesis> {
    let mut groups: Vec<(String, Group)> = Vec::new();

    fn group_for<'g>(groups: &'g mut Vec<(String, Group)>, service: &str) -> &'g mut Group {
        let idx = match groups.iter().position(|(s, _)| s == service) {
            Some(idx) => idx,
            None => {
                groups.push((service.to_string(), Group::default()));
                groups.len() - 1
            }
        };
        &mut groups[idx].1
    }

    for result in results {
        for evidence in result.usable_evidence() {
            group_for(&mut groups, &evidence.service)
                .evidence
                .push(evidence.clone());
        }
        for finding in result.usable_findings() {
            group_for(&mut groups, &finding.service)
                .findings
                .push(finding.clone());
        }
    }

    groups
        .into_iter()
        .map(|(service, group)| hypothesis_for(service, group))
        .collect()
}

fn average_score(evidence: &[Evidence]) -> f64 {
    if evidence.is_empty() {
        0.0
    } else {
        evidence.iter().map(|e| e.score).sum::<f64>() / evidence.len() as f64
    }
}

fn hypothesis_for(service: String, group: Group) -> RootCauseHypothesis {
    let avg = average_score(&group.evidence);
    let n_evidence = group.evidence.len();
    let n_findings = group.findings.len();

    let confidence = if n_evidence == 0 && n_findings == 0 {
        EMPTY_GROUP_CONFIDENCE
    } else {
        clamp_unit(
            0.5 + (n_evidence as f64 * 0.05).min(0.2)
                + (n_findings as f64 * 0.05).min(0.2)
                + avg * 0.1,
        )
    };

    let severity = if group.findings.iter().any(|f| f.severity == Severity::Critical) {
        Severity::Critical
    } else if group.findings.iter().any(|f| f.severity == Severity::High) {
        Severity::High
    } else {
        Severity::from_average_score(avg)
    };

    let description = if let Some(finding) = group.findings.first() {
        format!("{}: {}", finding.finding_type, finding.description)
    } else if let Some(evidence) = group.evidence.first() {
        evidence.description.clone()
    } else {
        "service may be anomalous".to_string()
    };

    let reasoning = format!(
        "{} evidence item(s) with average score {:.2} and {} finding(s); highest finding severity {}",
        n_evidence,
        avg,
        n_findings,
        group
            .findings
            .iter()
            .map(|f| f.severity)
            .max()
            .map(|s| s.as_str())
            .unwrap_or("none")
    );

    RootCauseHypothesis {
        service,
        description,
        evidence: group.evidence,
        findings: group.findings,
        confidence,
        severity,
        reasoning,
    }
}

/// Index of the most confident hypothesis; the earliest wins ties
pub fn rank(hypotheses: &[RootCauseHypothesis]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (idx, hypothesis) in hypotheses.iter().enumerate() {
        match best {
            Some(b) if hypotheses[b].confidence >= hypothesis.confidence => {}
            _ => best = Some(idx),
        }
    }
    best
}
