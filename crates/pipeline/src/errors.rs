//! Error, failure, and retry-policy types for the analysis domain.
//!
//! Three families live here:
//!
//! - [`CollaboratorError`]: the single normalized error every collaborator
//!   adapter returns, whatever transport or provider sits behind it.
//! - [`TaskFailure`] / [`FailureKind`]: what a failed task records and what
//!   API callers see verbatim.
//! - [`StoreError`] / [`TransitionError`] / [`InvalidParcel`]: conditions at
//!   the store seam and at the submission boundary. None of these is a task
//!   failure.
//!
//! [`RetryPolicy`] is a cross-cutting concern: any error type that participates
//! in retry decisions must be able to produce a [`RetryPolicy`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::task::{Stage, TaskStatus};
use crate::TaskId;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// Returned by [`CollaboratorError::retry_policy`] to let the executor decide
/// whether a further attempt is permitted within its attempt budget.
///
/// - `Retryable` errors: timeouts, unreachable providers, rate limiting.
/// - `NonRetryable` errors: responses that arrived but could not be used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt. `None` means apply the
        /// caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Collaborator errors
// ---------------------------------------------------------------------------

/// The external analysis provider an error or stage refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collaborator {
    /// Produces the professional-language parcel analysis.
    Knowledge,
    /// Finds candidate support policies for the parcel's region.
    Policy,
}

impl std::fmt::Display for Collaborator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Knowledge => write!(f, "knowledge"),
            Self::Policy => write!(f, "policy"),
        }
    }
}

/// Normalized failure of a collaborator call.
///
/// Adapters translate every transport or provider failure into one of these
/// three variants; nothing else crosses the collaborator seam.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CollaboratorError {
    /// The provider could not be reached or refused to serve the request.
    #[error("{collaborator} collaborator unavailable: {message}")]
    Unavailable {
        collaborator: Collaborator,
        message: String,
        /// Provider-suggested wait before trying again (e.g. `Retry-After`).
        retry_after: Option<Duration>,
    },

    /// No response arrived within the configured bound.
    #[error("{collaborator} collaborator timed out after {}s", .after.as_secs_f64())]
    Timeout {
        collaborator: Collaborator,
        after: Duration,
    },

    /// A response arrived but could not be interpreted.
    #[error("{collaborator} collaborator returned an invalid response: {message}")]
    InvalidResponse {
        collaborator: Collaborator,
        message: String,
    },
}

impl CollaboratorError {
    /// Convenience constructor for [`CollaboratorError::Unavailable`] without a
    /// retry hint.
    pub fn unavailable(collaborator: Collaborator, message: impl Into<String>) -> Self {
        Self::Unavailable {
            collaborator,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Convenience constructor for [`CollaboratorError::InvalidResponse`].
    pub fn invalid_response(collaborator: Collaborator, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            collaborator,
            message: message.into(),
        }
    }

    /// Classifies a non-success HTTP status returned by a provider.
    ///
    /// Rate limiting (429) and server-side errors (5xx) mean the provider is
    /// temporarily unable to serve and become [`Unavailable`](Self::Unavailable);
    /// any other status means the request or response is unusable and becomes
    /// [`InvalidResponse`](Self::InvalidResponse).
    pub fn from_http_status(
        collaborator: Collaborator,
        status: u16,
        retry_after: Option<Duration>,
        detail: &str,
    ) -> Self {
        let detail = detail.trim();
        let message = if detail.is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {detail}")
        };
        if status == 429 || (500..600).contains(&status) {
            Self::Unavailable {
                collaborator,
                message,
                retry_after,
            }
        } else {
            Self::InvalidResponse {
                collaborator,
                message,
            }
        }
    }

    /// Which collaborator produced the error.
    pub fn collaborator(&self) -> Collaborator {
        match self {
            Self::Unavailable { collaborator, .. }
            | Self::Timeout { collaborator, .. }
            | Self::InvalidResponse { collaborator, .. } => *collaborator,
        }
    }

    /// The failure kind recorded on a task that fails because of this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Unavailable { .. } => FailureKind::CollaboratorUnavailable,
            Self::Timeout { .. } => FailureKind::CollaboratorTimeout,
            Self::InvalidResponse { .. } => FailureKind::CollaboratorInvalidResponse,
        }
    }

    /// Whether another attempt could succeed.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Unavailable { retry_after, .. } => RetryPolicy::Retryable {
                after: *retry_after,
            },
            Self::Timeout { .. } => RetryPolicy::Retryable { after: None },
            Self::InvalidResponse { .. } => RetryPolicy::NonRetryable,
        }
    }
}

// ---------------------------------------------------------------------------
// Task failures
// ---------------------------------------------------------------------------

/// Normalized reason a task reached `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    CollaboratorUnavailable,
    CollaboratorTimeout,
    CollaboratorInvalidResponse,
    /// A fault inside the executor itself (panic, rejected store update).
    Internal,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::CollaboratorUnavailable => "collaborator_unavailable",
            Self::CollaboratorTimeout => "collaborator_timeout",
            Self::CollaboratorInvalidResponse => "collaborator_invalid_response",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// The error recorded on a failed task and surfaced verbatim to API callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind} during {stage}: {message}")]
pub struct TaskFailure {
    pub kind: FailureKind,
    /// Stage that was running when the failure occurred.
    pub stage: Stage,
    /// Human-readable description.
    pub message: String,
}

impl TaskFailure {
    /// Builds the failure recorded when `stage` fails with a collaborator error.
    pub fn from_collaborator(stage: Stage, error: &CollaboratorError) -> Self {
        Self {
            kind: error.kind(),
            stage,
            message: error.to_string(),
        }
    }

    /// Builds an [`FailureKind::Internal`] failure.
    pub fn internal(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Internal,
            stage,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Store and boundary errors
// ---------------------------------------------------------------------------

/// A state transition the task state machine does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition for task {task_id}: {from} -> {to}")]
pub struct TransitionError {
    pub task_id: TaskId,
    pub from: TaskStatus,
    pub to: TaskStatus,
    /// Extra detail when the status pair alone does not explain the rejection.
    pub detail: Option<String>,
}

/// Errors returned by a [`TaskStore`](crate::TaskStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No task exists with this id. Not a pipeline failure.
    #[error("task not found: {task_id}")]
    NotFound { task_id: TaskId },

    /// The mutator rejected the transition; the record was left unchanged.
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// A submission missing one or more required parcel attributes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing required parcel fields: {}", .missing.join(", "))]
pub struct InvalidParcel {
    /// Names of the missing fields, in declaration order.
    pub missing: Vec<&'static str>,
}
