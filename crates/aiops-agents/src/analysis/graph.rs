//! Walks over the service topology.
//!
//! Path enumeration uses one visited set per DFS root that is never unmarked
//! on backtrack. Every reachable vertex is covered once, and each leaf of the
//! DFS tree yields at most one path. Cycles terminate naturally.
//!
//! Dependency depth is the exception: it tracks only the current path, so a
//! node reached again through a longer branch is measured again.

use aiops_core::types::{clamp_unit, Severity};
use aiops_sources::Topology;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet, VecDeque};

/// Nodes with more dependents than this are bottlenecks
pub const BOTTLENECK_DEPENDENTS: usize = 3;

/// Node visits allowed for one depth search
pub const DEPTH_SEARCH_BUDGET: usize = 100_000;

/// Neighbourhood of one input service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyInfo {
    pub service: String,
    /// Services this one calls
    pub upstream: Vec<String>,
    /// Services calling this one
    pub downstream: Vec<String>,
    /// Edges on the longest simple path of outgoing edges
    pub depth: usize,
}

/// A downstream path along outgoing edges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationPath {
    pub source: String,
    pub path: Vec<String>,
    pub error_rate_sum: f64,
    pub impact: f64,
    pub severity: Severity,
}

impl PropagationPath {
    pub fn describe(&self) -> String {
        self.path.join("->")
    }
}

/// An upstream path along incoming edges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalPath {
    pub service: String,
    pub path: Vec<String>,
    pub total_latency_ms: f64,
    pub error_rate_sum: f64,
    pub criticality: f64,
    pub bottleneck: bool,
    pub severity: Severity,
}

impl CriticalPath {
    pub fn describe(&self) -> String {
        self.path.join("<-")
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Outgoing,
    Incoming,
}

fn neighbours<'a>(topology: &'a Topology, node: &str, direction: Direction) -> &'a [String] {
    match direction {
        Direction::Outgoing => topology.deps(node),
        Direction::Incoming => topology.dependents(node),
    }
}

/// Paths of at least two nodes from `root`, one per DFS-tree leaf
fn dfs_paths(topology: &Topology, root: &str, direction: Direction) -> Vec<Vec<String>> {
    let mut paths = Vec::new();
    if !topology.contains(root) {
        return paths;
    }
    let mut visited = HashSet::new();
    let mut path = Vec::new();
    walk(topology, root, direction, &mut visited, &mut path, &mut paths);
    paths
}

fn walk(
    topology: &Topology,
    node: &str,
    direction: Direction,
    visited: &mut HashSet<String>,
    path: &mut Vec<String>,
    paths: &mut Vec<Vec<String>>,
) {
    visited.insert(node.to_string());
    path.push(node.to_string());

    let mut extended = false;
    for next in neighbours(topology, node, direction) {
        if !visited.contains(next) {
            extended = true;
            walk(topology, next, direction, visited, path, paths);
        }
    }

    if !extended && path.len() >= 2 {
        paths.push(path.clone());
    }
    path.pop();
}

/// Longest simple path (in edges) along outgoing edges from `node`.
///
/// Nodes are unmarked on backtrack so every simple path is considered; each
/// visit spends one unit of `budget` and an exhausted budget stops the search
/// with the deepest path found so far.
fn longest_simple_path(
    topology: &Topology,
    node: &str,
    on_path: &mut HashSet<String>,
    budget: &mut usize,
) -> usize {
    if *budget == 0 {
        return 0;
    }
    *budget -= 1;

    on_path.insert(node.to_string());
    let mut deepest = 0;
    for next in topology.deps(node) {
        if !on_path.contains(next) {
            deepest = deepest.max(1 + longest_simple_path(topology, next, on_path, budget));
        }
    }
    on_path.remove(node);
    deepest
}

/// Neighbours and depth for each service present in the topology
pub fn dependency_walk(topology: &Topology, services: &[String]) -> Vec<DependencyInfo> {
    services
        .iter()
        .filter(|s| topology.contains(s))
        .map(|service| {
            let mut on_path = HashSet::new();
            let mut budget = DEPTH_SEARCH_BUDGET;
            DependencyInfo {
                service: service.clone(),
                upstream: topology.deps(service).to_vec(),
                downstream: topology.dependents(service).to_vec(),
                depth: longest_simple_path(topology, service, &mut on_path, &mut budget),
            }
        })
        .collect()
}

/// Downstream propagation paths from each service.
///
/// `impact = min(len/10, 1) + min(10·Σ error_rate, 0.5)`, clamped to `[0, 1]`.
pub fn propagation_paths(topology: &Topology, services: &[String]) -> Vec<PropagationPath> {
    let mut result = Vec::new();
    for service in services {
        for path in dfs_paths(topology, service, Direction::Outgoing) {
            let error_rate_sum: f64 = path
                .windows(2)
                .filter_map(|w| topology.edge(&w[0], &w[1]))
                .map(|e| e.error_rate)
                .sum();
            let raw = (path.len() as f64 / 10.0).min(1.0) + (10.0 * error_rate_sum).min(0.5);
            let impact = clamp_unit(raw);
            result.push(PropagationPath {
                source: service.clone(),
                path,
                error_rate_sum,
                impact,
                severity: Severity::from_impact(impact),
            });
        }
    }
    result
}

/// Upstream critical paths ending at each service.
///
/// `criticality = min(len/10, 0.7) + min(Σ latency / latency_ref, 0.15) + min(5·Σ error_rate, 0.15)`.
pub fn critical_paths(
    topology: &Topology,
    services: &[String],
    latency_ref_ms: f64,
) -> Vec<CriticalPath> {
    let mut result = Vec::new();
    for service in services {
        for path in dfs_paths(topology, service, Direction::Incoming) {
            // Walking against edge direction: each step is path[i+1] -> path[i].
            let edges: Vec<_> = path
                .windows(2)
                .filter_map(|w| topology.edge(&w[1], &w[0]))
                .collect();
            let total_latency_ms: f64 = edges.iter().map(|e| e.latency).sum();
            let error_rate_sum: f64 = edges.iter().map(|e| e.error_rate).sum();

            let latency_term = if latency_ref_ms > 0.0 {
                (total_latency_ms / latency_ref_ms).min(0.15)
            } else {
                0.0
            };
            let criticality = clamp_unit(
                (path.len() as f64 / 10.0).min(0.7) + latency_term + (5.0 * error_rate_sum).min(0.15),
            );
            let bottleneck = path
                .iter()
                .any(|n| topology.dependents(n).len() > BOTTLENECK_DEPENDENTS);

            result.push(CriticalPath {
                service: service.clone(),
                path,
                total_latency_ms,
                error_rate_sum,
                criticality,
                bottleneck,
                severity: Severity::from_impact(criticality),
            });
        }
    }
    result
}

/// Every node reachable over outgoing edges from the services, inclusive
pub fn impact_scope(topology: &Topology, services: &[String]) -> BTreeSet<String> {
    let mut scope = BTreeSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();

    for service in services {
        if topology.contains(service) && scope.insert(service.clone()) {
            queue.push_back(service);
        }
    }
    while let Some(node) = queue.pop_front() {
        for next in topology.deps(node) {
            if scope.insert(next.clone()) {
                queue.push_back(next);
            }
        }
    }
    scope
}
