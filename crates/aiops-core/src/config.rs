//! Engine configuration.
//!
//! All options are optional; `Default` carries the documented defaults and
//! [`RcaConfig::from_env`] overlays `AIOPS_*` environment variables.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Default sigma multiplier for metric anomalies
pub const DEFAULT_ANOMALY_SIGMA: f64 = 3.0;

/// Default Pearson |coef| threshold
pub const DEFAULT_CORRELATION_MIN: f64 = 0.7;

/// Default minimum repeats for a log pattern
pub const DEFAULT_PATTERN_MIN_COUNT: usize = 2;

/// Default Drain cluster-merge threshold
pub const DEFAULT_DRAIN_SIMILARITY: f64 = 0.5;

/// Default Drain tree depth hint
pub const DEFAULT_DRAIN_MAX_DEPTH: usize = 4;

/// Default evidence temporal-correlation window (seconds)
pub const DEFAULT_TEMPORAL_WINDOW_SECS: i64 = 3600;

/// Default same-service conflict window (seconds)
pub const DEFAULT_CONFLICT_WINDOW_SECS: i64 = 300;

/// Default latency reference for critical-path scoring (milliseconds)
pub const DEFAULT_CRITICAL_PATH_LATENCY_MS: f64 = 1000.0;

/// Default chat model id
pub const DEFAULT_LLM_MODEL: &str = "gpt-3.5-turbo";

/// Default cap on items quoted in an LLM prompt
pub const DEFAULT_LLM_MAX_PROMPT_ITEMS: usize = 10;

/// RCA engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RcaConfig {
    /// Sigma multiplier for metric anomalies
    pub anomaly_sigma: f64,
    /// Minimum |Pearson coefficient| for a reported correlation
    pub correlation_min: f64,
    /// Minimum repeats for a log pattern
    pub pattern_min_count: usize,
    /// Drain cluster-merge threshold
    pub drain_similarity: f64,
    /// Drain tree depth hint; does not affect clustering results
    pub drain_max_depth: usize,
    /// Evidence temporal-correlation window (seconds)
    pub temporal_window_sec: i64,
    /// Same-service conflict window (seconds)
    pub conflict_window_sec: i64,
    /// Latency reference for critical-path scoring (milliseconds)
    pub critical_path_latency_ms: f64,
    /// Model id passed to the chat capability
    pub llm_model: String,
    /// Cap on evidence/findings quoted in a single prompt
    pub llm_max_prompt_items: usize,
    /// Whole-pipeline deadline (milliseconds from the start of a run)
    pub deadline_ms: Option<u64>,
    /// Tenant copied into every collaboration context
    pub tenant_id: Option<String>,
}

impl Default for RcaConfig {
    fn default() -> Self {
        Self {
            anomaly_sigma: DEFAULT_ANOMALY_SIGMA,
            correlation_min: DEFAULT_CORRELATION_MIN,
            pattern_min_count: DEFAULT_PATTERN_MIN_COUNT,
            drain_similarity: DEFAULT_DRAIN_SIMILARITY,
            drain_max_depth: DEFAULT_DRAIN_MAX_DEPTH,
            temporal_window_sec: DEFAULT_TEMPORAL_WINDOW_SECS,
            conflict_window_sec: DEFAULT_CONFLICT_WINDOW_SECS,
            critical_path_latency_ms: DEFAULT_CRITICAL_PATH_LATENCY_MS,
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            llm_max_prompt_items: DEFAULT_LLM_MAX_PROMPT_ITEMS,
            deadline_ms: None,
            tenant_id: None,
        }
    }
}

fn env_parse<T: FromStr>(var: &str) -> Option<T> {
    std::env::var(var).ok().and_then(|v| v.trim().parse().ok())
}

impl RcaConfig {
    /// Load defaults overlaid with `AIOPS_*` environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            anomaly_sigma: env_parse("AIOPS_ANOMALY_SIGMA").unwrap_or(defaults.anomaly_sigma),
            correlation_min: env_parse("AIOPS_CORRELATION_MIN")
                .unwrap_or(defaults.correlation_min),
            pattern_min_count: env_parse("AIOPS_PATTERN_MIN_COUNT")
                .unwrap_or(defaults.pattern_min_count),
            drain_similarity: env_parse("AIOPS_DRAIN_SIMILARITY")
                .unwrap_or(defaults.drain_similarity),
            drain_max_depth: env_parse("AIOPS_DRAIN_MAX_DEPTH")
                .unwrap_or(defaults.drain_max_depth),
            temporal_window_sec: env_parse("AIOPS_TEMPORAL_WINDOW_SEC")
                .unwrap_or(defaults.temporal_window_sec),
            conflict_window_sec: env_parse("AIOPS_CONFLICT_WINDOW_SEC")
                .unwrap_or(defaults.conflict_window_sec),
            critical_path_latency_ms: env_parse("AIOPS_CRITICAL_PATH_LATENCY_MS")
                .unwrap_or(defaults.critical_path_latency_ms),
            llm_model: std::env::var("AIOPS_LLM_MODEL").unwrap_or(defaults.llm_model),
            llm_max_prompt_items: env_parse("AIOPS_LLM_MAX_PROMPT_ITEMS")
                .unwrap_or(defaults.llm_max_prompt_items),
            deadline_ms: env_parse("AIOPS_DEADLINE_MS").or(defaults.deadline_ms),
            tenant_id: std::env::var("AIOPS_TENANT_ID").ok().or(defaults.tenant_id),
        }
    }

    /// Reject out-of-range values
    pub fn validate(&self) -> Result<()> {
        if !(self.anomaly_sigma > 0.0) {
            return Err(Error::config("anomaly_sigma must be positive"));
        }
        if !(0.0..=1.0).contains(&self.correlation_min) {
            return Err(Error::config("correlation_min must be between 0.0 and 1.0"));
        }
        if self.pattern_min_count < 1 {
            return Err(Error::config("pattern_min_count must be at least 1"));
        }
        if !(self.drain_similarity > 0.0 && self.drain_similarity <= 1.0) {
            return Err(Error::config("drain_similarity must be in (0.0, 1.0]"));
        }
        if self.temporal_window_sec <= 0 || self.conflict_window_sec <= 0 {
            return Err(Error::config("correlation windows must be positive"));
        }
        if !(self.critical_path_latency_ms > 0.0) {
            return Err(Error::config("critical_path_latency_ms must be positive"));
        }
        if self.llm_model.trim().is_empty() {
            return Err(Error::config("llm_model must not be empty"));
        }
        Ok(())
    }

    /// Deadline as a duration relative to the start of a run
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}
