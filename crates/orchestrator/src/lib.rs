//! ParcelScope task orchestration layer.
//!
//! This crate creates analysis tasks, runs each one through the ordered
//! pipeline stages on its own Tokio task, tracks progress in a shared
//! [`pipeline::TaskStore`], and answers status and result queries while runs
//! are in flight.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** The executor sequences calls between business
//! logic in the [`pipeline`] crate and the collaborator traits it defines. It
//! contains no domain rules of its own: transition rules live on
//! [`pipeline::TaskRecord`], report content in [`pipeline::report`].
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`store`] | `InMemoryTaskStore` over `DashMap` |
//! | [`collaborators`] | Timeout-bounded collaborator decorators |
//! | [`executor`] | `PipelineExecutor`, `ExecutorConfig`, `CollaboratorMode` |
//! | [`orchestrator`] | `TaskOrchestrator` facade and its query views |

pub mod collaborators;
pub mod executor;
pub mod orchestrator;
pub mod store;

pub use collaborators::{
    TimedKnowledge, TimedPolicy, DEFAULT_KNOWLEDGE_TIMEOUT, DEFAULT_POLICY_TIMEOUT,
};
pub use executor::{
    CollaboratorMode, ExecutorConfig, PipelineExecutor, DEFAULT_MAX_RETRY_DELAY,
};
pub use orchestrator::{
    CompletedAnalysis, OrchestratorError, TaskOrchestrator, TaskStatusView, TaskSummary,
};
pub use store::InMemoryTaskStore;
