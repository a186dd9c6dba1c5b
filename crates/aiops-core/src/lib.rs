//! # AIOps Core
//!
//! Shared building blocks for the root-cause-analysis engine:
//! - Value types: tasks, evidence, findings, results and reports
//! - Error taxonomy and configuration
//! - Collaboration context (chat handle, memory, clock, shared data)
//! - Execution spans for a collaboration run

#![warn(missing_debug_implementations, rust_2018_idioms)]

pub mod chat;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod execution;
pub mod memory;
pub mod report;
pub mod task;
pub mod types;

pub use error::{Error, ErrorKind, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::chat::{ChatCompletions, ChatResponse, NoopChat, StaticChat, TokenUsage};
    pub use crate::clock::{Clock, FixedClock, SystemClock};
    pub use crate::config::RcaConfig;
    pub use crate::context::CollaborationContext;
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::execution::{ExecutionSpan, PipelineTrace, SpanStatus};
    pub use crate::memory::{Memory, Message, MessageRole};
    pub use crate::report::{
        Conflict, CorrelationKind, DecisionOutcome, EvidenceCorrelation, Report, ReportDraft,
        RootCauseHypothesis, TimelineEvent, NO_CLEAR_ROOT_CAUSE,
    };
    pub use crate::task::{
        DecisionInput, Evidence, EvidenceType, Finding, OutputInput, Task, TaskId, TaskInput,
        TaskPayload, TaskResult,
    };
    pub use crate::types::{
        clamp_unit, AgentRole, Alert, Severity, TaskType, TimeRange, TimelineSeverity,
    };
}
