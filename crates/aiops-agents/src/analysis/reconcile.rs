//! Cross-agent evidence correlation and conflict detection.

use aiops_core::report::{Conflict, CorrelationKind, EvidenceCorrelation};
use aiops_core::task::{Evidence, EvidenceType};

/// Temporal pairs must score above this
pub const TEMPORAL_MIN_SCORE: f64 = 0.7;
/// Spatial pairs must score above this
pub const SPATIAL_MIN_SCORE: f64 = 0.6;
/// Minimum score gap for two evidences to contradict each other
pub const CONFLICT_MIN_GAP: f64 = 0.7;
/// Scores above this count as anomalous
pub const CONFLICT_HIGH: f64 = 0.7;
/// Scores below this count as normal
pub const CONFLICT_LOW: f64 = 0.3;

/// Pairs close in time: `1 - |Δt| / window` for `|Δt| < window`
pub fn temporal_correlations(evidence: &[Evidence], window_secs: i64) -> Vec<EvidenceCorrelation> {
    let mut correlations = Vec::new();
    if window_secs <= 0 {
        return correlations;
    }
    for i in 0..evidence.len() {
        for j in (i + 1)..evidence.len() {
            let delta = (evidence[i].timestamp - evidence[j].timestamp).abs();
            if delta >= window_secs {
                continue;
            }
            let score = 1.0 - delta as f64 / window_secs as f64;
            if score > TEMPORAL_MIN_SCORE {
                correlations.push(EvidenceCorrelation {
                    kind: CorrelationKind::Temporal,
                    first: i,
                    second: j,
                    score,
                });
            }
        }
    }
    correlations
}

fn spatial_score(a: EvidenceType, b: EvidenceType) -> f64 {
    use EvidenceType::*;
    match (a, b) {
        _ if a == b => 0.9,
        (Metrics, Logs) | (Logs, Metrics) => 0.7,
        _ => 0.5,
    }
}

/// Same-service pairs scored by how their evidence types relate
pub fn spatial_correlations(evidence: &[Evidence]) -> Vec<EvidenceCorrelation> {
    let mut correlations = Vec::new();
    for i in 0..evidence.len() {
        for j in (i + 1)..evidence.len() {
            if evidence[i].service != evidence[j].service {
                continue;
            }
            let score = spatial_score(evidence[i].evidence_type, evidence[j].evidence_type);
            if score > SPATIAL_MIN_SCORE {
                correlations.push(EvidenceCorrelation {
                    kind: CorrelationKind::Spatial,
                    first: i,
                    second: j,
                    score,
                });
            }
        }
    }
    correlations
}

/// Same-service evidence inside `window_secs` where one reads anomalous and
/// the other normal. The higher-scored item wins.
pub fn detect_conflicts(evidence: &[Evidence], window_secs: i64) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    for i in 0..evidence.len() {
        for j in (i + 1)..evidence.len() {
            let (a, b) = (&evidence[i], &evidence[j]);
            if a.service != b.service || (a.timestamp - b.timestamp).abs() >= window_secs {
                continue;
            }
            let (high, low) = if a.score >= b.score { (a, b) } else { (b, a) };
            if high.score - low.score > CONFLICT_MIN_GAP
                && high.score > CONFLICT_HIGH
                && low.score < CONFLICT_LOW
            {
                conflicts.push(Conflict {
                    service: a.service.clone(),
                    resolution: format!(
                        "kept {} evidence '{}' (score {:.2}) over {} evidence '{}' (score {:.2})",
                        high.evidence_type,
                        high.description,
                        high.score,
                        low.evidence_type,
                        low.description,
                        low.score
                    ),
                    winner: high.clone(),
                    loser: low.clone(),
                });
            }
        }
    }
    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(kind: EvidenceType, service: &str, ts: i64, score: f64) -> Evidence {
        Evidence::new(kind, service, ts, format!("{}@{}", service, ts), score)
    }

    #[test]
    fn test_temporal_window() {
        let evidence = vec![
            ev(EvidenceType::Metrics, "a", 0, 0.5),
            ev(EvidenceType::Logs, "b", 600, 0.5),
            ev(EvidenceType::Logs, "c", 1500, 0.5),
        ];
        let correlations = temporal_correlations(&evidence, 3600);
        // 0-600: 0.833, 600-1500: 0.75, 0-1500: 0.583 (dropped)
        assert_eq!(correlations.len(), 2);
        assert_eq!((correlations[0].first, correlations[0].second), (0, 1));
        assert!((correlations[0].score - (1.0 - 600.0 / 3600.0)).abs() < 1e-9);
        assert_eq!((correlations[1].first, correlations[1].second), (1, 2));
    }

    #[test]
    fn test_spatial_scores() {
        let evidence = vec![
            ev(EvidenceType::Metrics, "a", 0, 0.5),
            ev(EvidenceType::Metrics, "a", 10, 0.5),
            ev(EvidenceType::Logs, "a", 20, 0.5),
            ev(EvidenceType::Topology, "a", 30, 0.5),
            ev(EvidenceType::Logs, "b", 0, 0.5),
        ];
        let correlations = spatial_correlations(&evidence);
        let scores: Vec<(usize, usize, f64)> = correlations
            .iter()
            .map(|c| (c.first, c.second, c.score))
            .collect();
        assert_eq!(scores, vec![(0, 1, 0.9), (0, 2, 0.7), (1, 2, 0.7)]);
    }

    #[test]
    fn test_conflict_detection() {
        let evidence = vec![
            ev(EvidenceType::Metrics, "svc", 100, 0.9),
            ev(EvidenceType::Metrics, "svc", 160, 0.1),
            ev(EvidenceType::Metrics, "svc", 1000, 0.05),
            ev(EvidenceType::Metrics, "other", 120, 0.1),
        ];
        let conflicts = detect_conflicts(&evidence, 300);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].winner.score, 0.9);
        assert_eq!(conflicts[0].loser.score, 0.1);
        assert!(conflicts[0].resolution.contains("svc@100"));
        assert!(conflicts[0].resolution.contains("svc@160"));
    }

    #[test]
    fn test_moderate_gap_is_not_a_conflict() {
        let evidence = vec![
            ev(EvidenceType::Logs, "svc", 0, 1.0),
            ev(EvidenceType::Logs, "svc", 10, 0.7),
        ];
        assert!(detect_conflicts(&evidence, 300).is_empty());
    }
}
