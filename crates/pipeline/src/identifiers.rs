//! Newtype domain identifiers.
//!
//! A task is addressed from the HTTP boundary by an opaque string, but inside
//! the workspace it is always a [`TaskId`]. Wrapping the UUID prevents a raw
//! string (an address, a policy name) from being passed where a task identity
//! is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed, internally generated
// ---------------------------------------------------------------------------

/// Identifies one submitted analysis task.
///
/// Generated fresh by the task store for every submission and never reused.
/// Propagated through tracing spans so all activity for one task can be
/// correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generates a new random task identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a [`TaskId`] from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Parses the hyphenated string form produced by [`Display`](std::fmt::Display).
    ///
    /// Returns `None` for anything that is not a UUID. Callers at the HTTP
    /// boundary treat `None` exactly like an unknown id.
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value.trim()).ok().map(Self)
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
