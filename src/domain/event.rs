//! Progress events emitted by title workers.

use std::fmt;

use serde::Serialize;

use crate::domain::{AchievementOutcome, TitleId, TitleOutcome};

/// Event kind constants
pub mod event_types {
    pub const STATE_CHANGED: &str = "title.state_changed";
    pub const ACHIEVEMENT_ATTEMPTED: &str = "achievement.attempted";
    pub const TITLE_FINISHED: &str = "title.finished";
}

/// Lifecycle state of a title worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Idle,
    SessionOpening,
    Listing,
    Classifying,
    Unlocking,
    Closed(TitleOutcome),
}

impl WorkerState {
    /// Whether the worker holds (or is acquiring) a session in this state
    pub fn is_active(&self) -> bool {
        !matches!(self, WorkerState::Idle | WorkerState::Closed(_))
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Idle => f.write_str("idle"),
            WorkerState::SessionOpening => f.write_str("opening session"),
            WorkerState::Listing => f.write_str("listing achievements"),
            WorkerState::Classifying => f.write_str("classifying"),
            WorkerState::Unlocking => f.write_str("unlocking"),
            WorkerState::Closed(outcome) => write!(f, "closed ({})", outcome),
        }
    }
}

/// Real-time progress pushed from workers towards the progress sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    StateChanged {
        title: TitleId,
        state: WorkerState,
    },
    AchievementAttempted {
        title: TitleId,
        achievement: String,
        outcome: AchievementOutcome,
    },
    TitleFinished {
        title: TitleId,
        outcome: TitleOutcome,
    },
}

impl ProgressEvent {
    pub fn title(&self) -> TitleId {
        match self {
            ProgressEvent::StateChanged { title, .. }
            | ProgressEvent::AchievementAttempted { title, .. }
            | ProgressEvent::TitleFinished { title, .. } => *title,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::StateChanged { .. } => event_types::STATE_CHANGED,
            ProgressEvent::AchievementAttempted { .. } => event_types::ACHIEVEMENT_ATTEMPTED,
            ProgressEvent::TitleFinished { .. } => event_types::TITLE_FINISHED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_state_activity() {
        assert!(!WorkerState::Idle.is_active());
        assert!(WorkerState::SessionOpening.is_active());
        assert!(WorkerState::Unlocking.is_active());
        assert!(!WorkerState::Closed(TitleOutcome::Success).is_active());
    }

    #[test]
    fn test_event_kind_and_title() {
        let event = ProgressEvent::AchievementAttempted {
            title: TitleId(100),
            achievement: "A1".to_string(),
            outcome: AchievementOutcome::Unlocked,
        };
        assert_eq!(event.kind(), event_types::ACHIEVEMENT_ATTEMPTED);
        assert_eq!(event.title(), TitleId(100));

        let finished = ProgressEvent::TitleFinished {
            title: TitleId(200),
            outcome: TitleOutcome::Cancelled,
        };
        assert_eq!(finished.kind(), event_types::TITLE_FINISHED);
    }

    #[test]
    fn test_worker_state_display() {
        assert_eq!(WorkerState::Listing.to_string(), "listing achievements");
        assert_eq!(
            WorkerState::Closed(TitleOutcome::PartialFailure).to_string(),
            "closed (partial failure)"
        );
    }
}
