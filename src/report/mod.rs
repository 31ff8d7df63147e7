//! Per-title results and the aggregated run report.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::classifier::ClassificationVerdict;
use crate::domain::{AchievementOutcome, AchievementRecord, SkipReason, TitleId, TitleOutcome};
use crate::session::SessionError;

/// One achievement with its verdict and outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AchievementAttempt {
    pub record: AchievementRecord,
    pub verdict: ClassificationVerdict,
    pub outcome: AchievementOutcome,
}

impl AchievementAttempt {
    pub fn new(record: AchievementRecord, verdict: ClassificationVerdict, outcome: AchievementOutcome) -> Self {
        Self {
            record,
            verdict,
            outcome,
        }
    }

    /// Whether an unlock call was issued for this achievement
    pub fn was_attempted(&self) -> bool {
        matches!(
            self.outcome,
            AchievementOutcome::Unlocked | AchievementOutcome::Failed { .. }
        )
    }
}

/// Frozen result of one title worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TitleResult {
    pub title: TitleId,
    pub name: Option<String>,
    pub outcome: TitleOutcome,
    /// Every listed achievement, in listing order
    pub attempts: Vec<AchievementAttempt>,
    pub session_error: Option<SessionError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TitleResult {
    /// Result of a title whose session could not be opened or listed
    pub fn session_failure(title: TitleId, error: SessionError, started_at: DateTime<Utc>) -> Self {
        Self {
            title,
            name: None,
            outcome: TitleOutcome::Failure,
            attempts: Vec::new(),
            session_error: Some(error),
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Result of a title never dispatched because the run was cancelled
    pub fn not_dispatched(title: TitleId) -> Self {
        let now = Utc::now();
        Self {
            title,
            name: None,
            outcome: TitleOutcome::Cancelled,
            attempts: Vec::new(),
            session_error: None,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn unlocked_count(&self) -> usize {
        self.attempts.iter().filter(|a| a.outcome.is_unlocked()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.attempts.iter().filter(|a| a.outcome.is_skipped()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.attempts.iter().filter(|a| a.outcome.is_failed()).count()
    }

    pub fn protected_count(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| a.outcome == AchievementOutcome::skipped(SkipReason::Protected))
            .count()
    }

    pub fn eligible_count(&self) -> usize {
        self.attempts.iter().filter(|a| a.verdict.is_eligible()).count()
    }

    /// Number of unlock calls issued
    pub fn attempted_count(&self) -> usize {
        self.attempts.iter().filter(|a| a.was_attempted()).count()
    }

    pub fn attempt(&self, achievement_id: &str) -> Option<&AchievementAttempt> {
        self.attempts.iter().find(|a| a.record.id == achievement_id)
    }

    /// Human-readable reason for a non-success outcome
    pub fn reason(&self) -> Option<String> {
        if let Some(error) = &self.session_error {
            return Some(error.to_string());
        }
        match self.outcome {
            TitleOutcome::Success => None,
            TitleOutcome::Cancelled => Some("run cancelled".to_string()),
            TitleOutcome::PartialFailure | TitleOutcome::Failure => Some(format!(
                "{} of {} unlocks failed",
                self.failed_count(),
                self.attempted_count()
            )),
        }
    }

    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => format!("{} ({})", name, self.title),
            None => self.title.to_string(),
        }
    }
}

/// Aggregated outcome of a run.
///
/// Built by merging title results in completion order; never rewritten.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub total_titles: usize,
    pub titles_succeeded: usize,
    pub titles_failed: usize,
    pub titles_partial: usize,
    pub titles_cancelled: usize,
    pub achievements_unlocked: usize,
    pub achievements_skipped: usize,
    pub achievements_failed: usize,
    pub cancelled: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Title results in completion order
    pub results: Vec<TitleResult>,
}

impl RunReport {
    pub fn new(total_titles: usize) -> Self {
        Self {
            total_titles,
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Fold one completed title into the report
    pub fn merge(&mut self, result: TitleResult) {
        match result.outcome {
            TitleOutcome::Success => self.titles_succeeded += 1,
            TitleOutcome::PartialFailure => self.titles_partial += 1,
            TitleOutcome::Failure => self.titles_failed += 1,
            TitleOutcome::Cancelled => self.titles_cancelled += 1,
        }
        self.achievements_unlocked += result.unlocked_count();
        self.achievements_skipped += result.skipped_count();
        self.achievements_failed += result.failed_count();
        self.results.push(result);
    }

    pub fn finish(&mut self, cancelled: bool) {
        self.cancelled = cancelled;
        self.finished_at = Some(Utc::now());
    }

    /// Titles that reached a terminal outcome
    pub fn completed_titles(&self) -> usize {
        self.titles_succeeded + self.titles_failed + self.titles_partial + self.titles_cancelled
    }

    pub fn is_complete(&self) -> bool {
        self.completed_titles() == self.total_titles
    }

    pub fn result(&self, title: TitleId) -> Option<&TitleResult> {
        self.results.iter().find(|r| r.title == title)
    }

    /// Achievements skipped by the protection policy
    pub fn skipped_protected(&self) -> usize {
        self.results.iter().map(TitleResult::protected_count).sum()
    }

    /// Titles that did not fully succeed
    pub fn problems(&self) -> impl Iterator<Item = &TitleResult> {
        self.results.iter().filter(|r| r.outcome != TitleOutcome::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with(title: u32, outcomes: Vec<(ClassificationVerdict, AchievementOutcome)>, outcome: TitleOutcome) -> TitleResult {
        let now = Utc::now();
        TitleResult {
            title: TitleId(title),
            name: None,
            outcome,
            attempts: outcomes
                .into_iter()
                .enumerate()
                .map(|(i, (verdict, outcome))| {
                    AchievementAttempt::new(AchievementRecord::locked(format!("A{}", i)), verdict, outcome)
                })
                .collect(),
            session_error: None,
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn test_title_result_counts() {
        let result = result_with(
            1,
            vec![
                (ClassificationVerdict::Eligible, AchievementOutcome::Unlocked),
                (ClassificationVerdict::Eligible, AchievementOutcome::failed("denied")),
                (
                    ClassificationVerdict::ProtectedById,
                    AchievementOutcome::skipped(SkipReason::Protected),
                ),
                (
                    ClassificationVerdict::AlreadyUnlocked,
                    AchievementOutcome::skipped(SkipReason::AlreadyUnlocked),
                ),
            ],
            TitleOutcome::PartialFailure,
        );

        assert_eq!(result.unlocked_count(), 1);
        assert_eq!(result.failed_count(), 1);
        assert_eq!(result.skipped_count(), 2);
        assert_eq!(result.protected_count(), 1);
        assert_eq!(result.eligible_count(), 2);
        assert_eq!(result.attempted_count(), 2);
        assert_eq!(result.reason().unwrap(), "1 of 2 unlocks failed");
    }

    #[test]
    fn test_session_failure_result() {
        let result = TitleResult::session_failure(TitleId(400), SessionError::InitTimeout, Utc::now());
        assert_eq!(result.outcome, TitleOutcome::Failure);
        assert!(result.attempts.is_empty());
        assert_eq!(result.reason().unwrap(), "Timed out initializing the client");
    }

    #[test]
    fn test_merge_accumulates() {
        let mut report = RunReport::new(3);
        report.merge(result_with(
            1,
            vec![(ClassificationVerdict::Eligible, AchievementOutcome::Unlocked)],
            TitleOutcome::Success,
        ));
        report.merge(TitleResult::session_failure(TitleId(2), SessionError::NotRunning, Utc::now()));
        assert!(!report.is_complete());

        report.merge(TitleResult::not_dispatched(TitleId(3)));
        report.finish(true);

        assert!(report.is_complete());
        assert!(report.cancelled);
        assert_eq!(report.titles_succeeded, 1);
        assert_eq!(report.titles_failed, 1);
        assert_eq!(report.titles_cancelled, 1);
        assert_eq!(report.achievements_unlocked, 1);
        assert_eq!(report.problems().count(), 2);
        assert!(report.result(TitleId(2)).unwrap().session_error.is_some());
    }

    #[test]
    fn test_display_name() {
        let result = TitleResult::not_dispatched(TitleId(700570)).with_name(Some("Beyond the Void".to_string()));
        assert_eq!(result.display_name(), "Beyond the Void (700570)");
        assert_eq!(TitleResult::not_dispatched(TitleId(5)).display_name(), "5");
    }

    #[test]
    fn test_report_serializes() {
        let mut report = RunReport::new(1);
        report.merge(TitleResult::session_failure(TitleId(9), SessionError::AlreadyOwned, Utc::now()));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["titles_failed"], 1);
        assert_eq!(json["results"][0]["session_error"], "already_owned");
    }
}
