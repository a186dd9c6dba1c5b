//! # AIOps Agents
//!
//! The analyst agents and the pipeline that coordinates them.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      Collaborator                        │
//! │   registry: AgentRole → Agent        stats, trace        │
//! └────────────────────────────┬─────────────────────────────┘
//!                              │
//!      ┌───────────┬───────────┼───────────┬───────────┐
//!      ▼           ▼           ▼           ▼           ▼
//!   Planner     Metrics      Logs      Topology    Decision ──► Output
//!                  │           │           │
//!                  └───────────┴───────────┴──► analysis::*
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use aiops_agents::Collaborator;
//! use aiops_core::prelude::*;
//! use aiops_sources::{InMemoryLogs, InMemoryMetrics, InMemoryTopology};
//! use std::sync::Arc;
//!
//! # async fn run() -> aiops_core::Result<()> {
//! let collaborator = Collaborator::with_sources(
//!     RcaConfig::from_env(),
//!     Arc::new(NoopChat::new()),
//!     Arc::new(InMemoryMetrics::default()),
//!     Arc::new(InMemoryLogs::default()),
//!     Arc::new(InMemoryTopology::default()),
//! )?;
//!
//! let report = collaborator
//!     .collaborate("checkout latency", TimeRange::new(0, 3600), vec![], vec![])
//!     .await?;
//! println!("{}", report.root_cause);
//! # Ok(())
//! # }
//! ```

#![warn(missing_debug_implementations, rust_2018_idioms)]

pub mod agents;
pub mod analysis;
pub mod collaborator;

pub use agents::{
    Agent, DecisionAgent, LogsAgent, MetricsAgent, OutputAgent, PlannerAgent, TopologyAgent,
};
pub use collaborator::{trace_key, Collaborator, CollaboratorStats};
