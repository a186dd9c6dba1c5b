//! Sigma-rule anomaly detection and metric-pair correlation.

use super::stats::{mean, pearson, population_std_dev};
use aiops_core::types::{clamp_unit, Severity};
use aiops_sources::MetricPoint;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Groups with fewer points are ignored
pub const MIN_SERIES_LEN: usize = 3;

/// Metric pairs checked for co-movement within one service
pub const CORRELATION_PAIRS: [(&str, &str); 3] = [
    ("cpu_usage", "qps"),
    ("error_rate", "latency"),
    ("memory_usage", "cpu_usage"),
];

/// Points of one `(service, metric)` series, ordered by timestamp
pub type SeriesMap<'a> = BTreeMap<(String, String), Vec<&'a MetricPoint>>;

/// A point outside `mean ± sigma·σ`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricAnomaly {
    pub service: String,
    pub metric: String,
    pub timestamp: i64,
    pub value: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub score: f64,
    pub severity: Severity,
}

/// Pearson correlation between two metrics of one service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricCorrelation {
    pub service: String,
    pub first: String,
    pub second: String,
    pub coefficient: f64,
}

/// Group points by `(service, metric)`, dropping series shorter than
/// [`MIN_SERIES_LEN`].
pub fn group_series(points: &[MetricPoint]) -> SeriesMap<'_> {
    let mut groups: SeriesMap<'_> = BTreeMap::new();
    for point in points {
        groups
            .entry((point.service.clone(), point.metric.clone()))
            .or_default()
            .push(point);
    }
    groups.retain(|_, series| series.len() >= MIN_SERIES_LEN);
    for series in groups.values_mut() {
        series.sort_by_key(|p| p.timestamp);
    }
    groups
}

/// Flag every point with `|value - μ| > sigma·σ`.
///
/// A constant series has `σ = 0` and never yields anomalies.
pub fn detect_anomalies(groups: &SeriesMap<'_>, sigma: f64) -> Vec<MetricAnomaly> {
    let mut anomalies = Vec::new();

    for ((service, metric), series) in groups {
        let values: Vec<f64> = series.iter().map(|p| p.value).collect();
        let (Some(mu), Some(std_dev)) = (mean(&values), population_std_dev(&values)) else {
            continue;
        };
        if std_dev == 0.0 || !std_dev.is_finite() {
            continue;
        }

        let limit = sigma * std_dev;
        for point in series {
            let deviation = (point.value - mu).abs();
            if deviation > limit {
                let score = clamp_unit(deviation / limit);
                anomalies.push(MetricAnomaly {
                    service: service.clone(),
                    metric: metric.clone(),
                    timestamp: point.timestamp,
                    value: point.value,
                    mean: mu,
                    std_dev,
                    score,
                    severity: Severity::from_impact(score),
                });
            }
        }
    }

    anomalies
}

/// Correlate the fixed metric pairs of each service on shared timestamps.
///
/// Only pairs with `|coef| > min_coefficient` are returned.
pub fn correlate_pairs(groups: &SeriesMap<'_>, min_coefficient: f64) -> Vec<MetricCorrelation> {
    let mut services: Vec<&String> = groups.keys().map(|(service, _)| service).collect();
    services.dedup();

    let mut correlations = Vec::new();
    for service in services {
        for (first, second) in CORRELATION_PAIRS {
            let key_a = (service.clone(), first.to_string());
            let key_b = (service.clone(), second.to_string());
            let (Some(a), Some(b)) = (groups.get(&key_a), groups.get(&key_b)) else {
                continue;
            };

            let (xs, ys) = align(a, b);
            if xs.len() < MIN_SERIES_LEN {
                continue;
            }
            if let Some(coefficient) = pearson(&xs, &ys) {
                if coefficient.abs() > min_coefficient {
                    correlations.push(MetricCorrelation {
                        service: service.clone(),
                        first: first.to_string(),
                        second: second.to_string(),
                        coefficient,
                    });
                }
            }
        }
    }
    correlations
}

/// Inner join of two series on identical timestamps
fn align(a: &[&MetricPoint], b: &[&MetricPoint]) -> (Vec<f64>, Vec<f64>) {
    let by_ts: HashMap<i64, f64> = b.iter().map(|p| (p.timestamp, p.value)).collect();
    a.iter()
        .filter_map(|p| by_ts.get(&p.timestamp).map(|v| (p.value, *v)))
        .unzip()
}
