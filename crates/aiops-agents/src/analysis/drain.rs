//! Drain-style online log clustering.
//!
//! Each message is reduced to a token template (see
//! [`token_template`](super::template::token_template)) and compared with every
//! known cluster by position-aligned token identity:
//!
//! ```text
//! similarity(a, b) = |{i : a[i] == b[i]}| / max(|a|, |b|)
//! ```
//!
//! The best cluster at or above the threshold absorbs the message and its
//! template keeps only the positions both agree on. Otherwise a new cluster
//! is opened.

use super::template::{token_template, WILDCARD};
use aiops_core::config::{DEFAULT_DRAIN_MAX_DEPTH, DEFAULT_DRAIN_SIMILARITY};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Clustering parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrainConfig {
    /// Minimum similarity for a message to join a cluster
    pub similarity: f64,
    /// Parse-tree depth hint, reported only
    pub max_depth: usize,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            similarity: DEFAULT_DRAIN_SIMILARITY,
            max_depth: DEFAULT_DRAIN_MAX_DEPTH,
        }
    }
}

/// A group of messages sharing one token template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogCluster {
    pub id: u64,
    pub template: Vec<String>,
    /// Caller-supplied member indices, in insertion order
    pub members: Vec<usize>,
    /// Member count per service
    pub services: BTreeMap<String, usize>,
}

impl LogCluster {
    pub fn template_string(&self) -> String {
        self.template.join(" ")
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }
}

/// Position-aligned token similarity in `[0, 1]`
pub fn similarity(a: &[String], b: &[String]) -> f64 {
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    let common = a.iter().zip(b).filter(|(x, y)| x == y).count();
    common as f64 / longest as f64
}

/// Keep agreeing tokens, wildcard the rest; the result has the longer length
pub fn merge_templates(a: &[String], b: &[String]) -> Vec<String> {
    let longest = a.len().max(b.len());
    (0..longest)
        .map(|i| match (a.get(i), b.get(i)) {
            (Some(x), Some(y)) if x == y => x.clone(),
            _ => WILDCARD.to_string(),
        })
        .collect()
}

/// Online clusterer
#[derive(Debug, Default)]
pub struct Drain {
    config: DrainConfig,
    clusters: Vec<LogCluster>,
    next_id: u64,
}

impl Drain {
    pub fn new(config: DrainConfig) -> Self {
        Self {
            config,
            clusters: Vec::new(),
            next_id: 1,
        }
    }

    pub fn config(&self) -> &DrainConfig {
        &self.config
    }

    /// Most similar cluster and its similarity; the earliest cluster wins ties
    pub fn best_match(&self, tokens: &[String]) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, cluster) in self.clusters.iter().enumerate() {
            let sim = similarity(&cluster.template, tokens);
            if best.map_or(true, |(_, s)| sim > s) {
                best = Some((idx, sim));
            }
        }
        best
    }

    /// Add one message and return the id of the cluster it joined
    pub fn add(&mut self, member: usize, message: &str, service: &str) -> u64 {
        let tokens = token_template(message);

        let target = match self.best_match(&tokens) {
            Some((idx, sim)) if sim >= self.config.similarity => idx,
            _ => {
                let id = self.next_id.max(1);
                self.next_id = id + 1;
                self.clusters.push(LogCluster {
                    id,
                    template: tokens.clone(),
                    members: Vec::new(),
                    services: BTreeMap::new(),
                });
                self.clusters.len() - 1
            }
        };

        let cluster = &mut self.clusters[target];
        cluster.template = merge_templates(&cluster.template, &tokens);
        cluster.members.push(member);
        *cluster.services.entry(service.to_string()).or_insert(0) += 1;
        cluster.id
    }

    pub fn clusters(&self) -> &[LogCluster] {
        &self.clusters
    }

    pub fn into_clusters(self) -> Vec<LogCluster> {
        self.clusters
    }

    /// Member indices keyed by template string
    pub fn groups(&self) -> BTreeMap<String, Vec<usize>> {
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for cluster in &self.clusters {
            groups
                .entry(cluster.template_string())
                .or_default()
                .extend(cluster.members.iter().copied());
        }
        groups
    }
}
