//! Deterministic analysis routines used by the agents.
//!
//! Nothing in here performs I/O. Agents fetch data, call these functions and
//! wrap the output into evidence and findings.

pub mod anomaly;
pub mod drain;
pub mod graph;
pub mod hypothesis;
pub mod reconcile;
pub mod stats;
pub mod template;

pub use anomaly::{correlate_pairs, detect_anomalies, group_series, MetricAnomaly, MetricCorrelation};
pub use drain::{Drain, DrainConfig, LogCluster};
pub use graph::{
    critical_paths, dependency_walk, impact_scope, propagation_paths, CriticalPath,
    DependencyInfo, PropagationPath,
};
pub use hypothesis::{build_hypotheses, rank};
pub use reconcile::{detect_conflicts, spatial_correlations, temporal_correlations};
pub use template::{mine_patterns, normalize, stack_frames, token_template, LogPattern};
