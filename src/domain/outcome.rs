//! Outcome types for achievements and titles.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why an achievement was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Already unlocked before the run
    AlreadyUnlocked,
    /// Excluded by the protection policy
    Protected,
    /// Eligible, but the run was cancelled before it was reached
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::AlreadyUnlocked => "already unlocked",
            SkipReason::Protected => "protected",
            SkipReason::Cancelled => "run cancelled",
        };
        f.write_str(text)
    }
}

/// Outcome of a single achievement within a title pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AchievementOutcome {
    Unlocked,
    Skipped { reason: SkipReason },
    Failed { reason: String },
}

impl AchievementOutcome {
    pub fn skipped(reason: SkipReason) -> Self {
        AchievementOutcome::Skipped { reason }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        AchievementOutcome::Failed { reason: reason.into() }
    }

    pub fn is_unlocked(&self) -> bool {
        matches!(self, AchievementOutcome::Unlocked)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, AchievementOutcome::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, AchievementOutcome::Failed { .. })
    }
}

impl fmt::Display for AchievementOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AchievementOutcome::Unlocked => f.write_str("unlocked"),
            AchievementOutcome::Skipped { reason } => write!(f, "skipped ({})", reason),
            AchievementOutcome::Failed { reason } => write!(f, "failed ({})", reason),
        }
    }
}

/// Terminal outcome of a title worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleOutcome {
    /// Every attempted unlock succeeded (or there was nothing to unlock)
    Success,
    /// Some unlocks failed, or everything failed but protected/unlocked records existed
    PartialFailure,
    /// The session could not be used, or every achievement failed
    Failure,
    /// The run was cancelled before the title finished
    Cancelled,
}

impl TitleOutcome {
    /// Decide the outcome of a title whose unlocking phase ran to completion.
    ///
    /// `non_eligible` counts records that were skipped by classification.
    pub fn from_unlock_counts(succeeded: usize, failed: usize, non_eligible: usize) -> Self {
        let attempted = succeeded + failed;
        if attempted > 0 && failed == attempted {
            if non_eligible > 0 {
                TitleOutcome::PartialFailure
            } else {
                TitleOutcome::Failure
            }
        } else if failed == 0 {
            TitleOutcome::Success
        } else {
            TitleOutcome::PartialFailure
        }
    }
}

impl fmt::Display for TitleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TitleOutcome::Success => "success",
            TitleOutcome::PartialFailure => "partial failure",
            TitleOutcome::Failure => "failure",
            TitleOutcome::Cancelled => "cancelled",
        };
        f.write_str(text)
    }
}
