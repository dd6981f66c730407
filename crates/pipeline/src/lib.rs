//! Core analysis domain for ParcelScope.
//!
//! This crate contains every domain concept used by the land-analysis service:
//! the parcel input model, the task record and its state machine, the report
//! assembler, the cross-cutting error types, and the port traits through which
//! the orchestration layer reaches collaborators and storage. Infrastructure
//! crates implement the traits defined here; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype domain identifiers (`TaskId`) |
//! | [`types`] | Shared value types (`Progress`, `Score`, `Timestamp`, etc.) |
//! | [`parcel`] | `ParcelSubmission` wire form and validated `LandParcel` |
//! | [`task`] | `TaskRecord`, `TaskStatus`, `Stage` and the transition rules |
//! | [`report`] | `PolicyRecord`, `AnalysisResult` and the Markdown assembler |
//! | [`ports`] | `KnowledgeCollaborator`, `PolicyCollaborator`, `TaskStore` |
//! | [`errors`] | Collaborator, failure, store and retry-policy types |

pub mod errors;
pub mod identifiers;
pub mod parcel;
pub mod ports;
pub mod report;
pub mod task;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{
    Collaborator, CollaboratorError, FailureKind, InvalidParcel, RetryPolicy, StoreError,
    TaskFailure, TransitionError,
};
pub use identifiers::TaskId;
pub use parcel::{LandParcel, ParcelSubmission, ScoreSubmission};
pub use ports::{KnowledgeCollaborator, PolicyCollaborator, TaskMutator, TaskStore};
pub use report::{assemble, AnalysisResult, PolicyRecord};
pub use task::{Stage, TaskRecord, TaskStatus};
pub use types::{format_krw, AssessmentScores, Progress, Score, Timestamp};
