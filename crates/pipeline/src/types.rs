//! Shared value types for the analysis domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (progress and scores are bounded to
//! `0..=100`) and participate in domain computations.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Completion percentage of a task in the range `0..=100`.
///
/// Progress only ever moves forward while a task is running; the task record
/// merges updates with `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Progress(u8);

impl Progress {
    /// No work done yet.
    pub const ZERO: Self = Self(0);

    /// All stages finished.
    pub const COMPLETE: Self = Self(100);

    /// Creates a [`Progress`], returning `None` if `value` exceeds 100.
    #[must_use]
    pub fn new(value: u8) -> Option<Self> {
        (value <= 100).then_some(Self(value))
    }

    /// Returns the percentage as an integer in `0..=100`.
    pub fn as_u8(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Progress {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("progress {value} is outside 0..=100"))
    }
}

impl From<Progress> for u8 {
    fn from(progress: Progress) -> Self {
        progress.0
    }
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

// ---------------------------------------------------------------------------
// Assessment scores
// ---------------------------------------------------------------------------

/// A 0–100 rating supplied alongside a parcel by an upstream scoring step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Score(u8);

impl Score {
    /// Creates a [`Score`], returning `None` if `value` exceeds 100.
    #[must_use]
    pub fn new(value: u8) -> Option<Self> {
        (value <= 100).then_some(Self(value))
    }

    /// Returns the score as an integer in `0..=100`.
    pub fn as_u8(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Score {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("score {value} is outside 0..=100"))
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> Self {
        score.0
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The three location ratings that accompany a parcel.
///
/// When a submission omits them the defaults below apply; they are the values
/// the analysis service has always assumed for unscored parcels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentScores {
    /// Location conditions (입지조건).
    pub location: Score,
    /// Surrounding infrastructure (인프라).
    pub infrastructure: Score,
    /// Stability (안정성).
    pub stability: Score,
}

impl Default for AssessmentScores {
    fn default() -> Self {
        Self {
            location: Score(75),
            infrastructure: Score(70),
            stability: Score(65),
        }
    }
}

// ---------------------------------------------------------------------------
// Money
// ---------------------------------------------------------------------------

/// Formats a KRW amount with thousands separators, e.g. `3,735,000 KRW`.
pub fn format_krw(amount: u64) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{grouped} KRW")
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Report date line, e.g. `2026-10-16 09:30 UTC`.
    pub fn report_date(self) -> String {
        self.0.format("%Y-%m-%d %H:%M UTC").to_string()
    }

    /// Calendar quarter label, e.g. `2026 Q4`.
    pub fn quarter_label(self) -> String {
        format!("{} Q{}", self.0.year(), (self.0.month() - 1) / 3 + 1)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
