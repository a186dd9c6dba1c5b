//! Service dependency graph and the in-memory topology source.
//!
//! `deps` of a node are its outgoing edges (services it calls) and
//! `dependents` are its incoming edges. Both lists keep edge insertion order,
//! which makes every walk over the graph deterministic.

use crate::TopologySource;
use aiops_core::types::TimeRange;
use aiops_core::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

fn default_node_type() -> String {
    "service".to_string()
}

fn default_status() -> String {
    "unknown".to_string()
}

fn default_edge_type() -> String {
    "call".to_string()
}

fn default_weight() -> f64 {
    1.0
}

/// A vertex of the topology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceNode {
    pub name: String,
    #[serde(rename = "type", default = "default_node_type")]
    pub node_type: String,
    #[serde(default = "default_status")]
    pub status: String,
    /// Services this node calls
    #[serde(default)]
    pub deps: Vec<String>,
    /// Services calling this node
    #[serde(default)]
    pub dependents: Vec<String>,
}

impl ServiceNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node_type: default_node_type(),
            status: default_status(),
            deps: Vec::new(),
            dependents: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }
}

/// A directed call edge `source -> target`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type", default = "default_edge_type")]
    pub edge_type: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Milliseconds
    #[serde(default)]
    pub latency: f64,
    /// Fraction of failed calls in [0, 1]
    #[serde(default)]
    pub error_rate: f64,
}

impl ServiceEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            edge_type: default_edge_type(),
            weight: default_weight(),
            latency: 0.0,
            error_rate: 0.0,
        }
    }

    pub fn with_latency(mut self, latency_ms: f64) -> Self {
        self.latency = latency_ms;
        self
    }

    pub fn with_error_rate(mut self, error_rate: f64) -> Self {
        self.error_rate = error_rate;
        self
    }
}

/// Wire form of a topology: node list plus edge list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologyDocument {
    #[serde(default)]
    pub nodes: Vec<ServiceNode>,
    #[serde(default)]
    pub edges: Vec<ServiceEdge>,
}

/// Read-only directed service graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "TopologyDocument", into = "TopologyDocument")]
pub struct Topology {
    nodes: BTreeMap<String, ServiceNode>,
    edges: Vec<ServiceEdge>,
}

impl Topology {
    /// Build a graph, recomputing `deps`/`dependents` from the edges.
    ///
    /// Edge endpoints missing from `nodes` are added with default attributes.
    /// A repeated `source -> target` pair keeps the first edge.
    pub fn new(nodes: Vec<ServiceNode>, edges: Vec<ServiceEdge>) -> Self {
        let mut topology = Self::default();
        for mut node in nodes {
            node.deps.clear();
            node.dependents.clear();
            topology.nodes.insert(node.name.clone(), node);
        }
        for edge in edges {
            topology.add_edge(edge);
        }
        topology
    }

    pub fn from_edges(edges: Vec<ServiceEdge>) -> Self {
        Self::new(Vec::new(), edges)
    }

    fn add_edge(&mut self, edge: ServiceEdge) {
        if self.edge(&edge.source, &edge.target).is_some() {
            return;
        }
        self.nodes
            .entry(edge.source.clone())
            .or_insert_with(|| ServiceNode::new(edge.source.clone()))
            .deps
            .push(edge.target.clone());
        self.nodes
            .entry(edge.target.clone())
            .or_insert_with(|| ServiceNode::new(edge.target.clone()))
            .dependents
            .push(edge.source.clone());
        self.edges.push(edge);
    }

    pub fn node(&self, name: &str) -> Option<&ServiceNode> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ServiceNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> &[ServiceEdge] {
        &self.edges
    }

    pub fn edge(&self, source: &str, target: &str) -> Option<&ServiceEdge> {
        self.edges
            .iter()
            .find(|e| e.source == source && e.target == target)
    }

    /// Outgoing neighbours of `name`
    pub fn deps(&self, name: &str) -> &[String] {
        self.nodes.get(name).map(|n| n.deps.as_slice()).unwrap_or(&[])
    }

    /// Incoming neighbours of `name`
    pub fn dependents(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl From<TopologyDocument> for Topology {
    fn from(doc: TopologyDocument) -> Self {
        Topology::new(doc.nodes, doc.edges)
    }
}

impl From<Topology> for TopologyDocument {
    fn from(topology: Topology) -> Self {
        TopologyDocument {
            nodes: topology.nodes.into_values().collect(),
            edges: topology.edges,
        }
    }
}

/// Topology source returning one fixed graph
#[derive(Debug, Clone, Default)]
pub struct InMemoryTopology {
    topology: Topology,
    failure: Option<String>,
}

impl InMemoryTopology {
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            failure: None,
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            topology: Topology::default(),
            failure: Some(message.into()),
        }
    }
}

#[async_trait]
impl TopologySource for InMemoryTopology {
    fn name(&self) -> &str {
        "in_memory_topology"
    }

    async fn fetch(&self, _services: &[String], _time_range: TimeRange) -> Result<Topology> {
        if let Some(message) = &self.failure {
            return Err(Error::data_source(self.name(), message.clone()));
        }
        debug!(
            source = self.name(),
            nodes = self.topology.node_count(),
            edges = self.topology.edges().len(),
            "Fetched topology"
        );
        Ok(self.topology.clone())
    }
}
