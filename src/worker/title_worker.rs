//! Title worker implementation.
//!
//! State machine per title:
//! `Idle -> SessionOpening -> Listing -> Classifying -> Unlocking -> Closed(outcome)`.
//! Achievement failures are folded into the result; they never abort the title.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::classifier::{ClassificationVerdict, Classifier};
use crate::domain::{AchievementOutcome, AchievementRecord, ProgressEvent, SkipReason, TitleId, TitleOutcome, WorkerState};
use crate::report::{AchievementAttempt, TitleResult};
use crate::scheduler::ProgressEmitter;
use crate::session::{ClientHost, Session};

/// Configuration for a TitleWorker.
#[derive(Debug, Clone, Default)]
pub struct WorkerConfig {
    /// Pause after closing a session so the client can reset
    pub title_cooldown: Duration,
}

/// Processes one title at a time against the shared client host.
#[derive(Clone)]
pub struct TitleWorker {
    host: ClientHost,
    classifier: Arc<Classifier>,
    emitter: ProgressEmitter,
    cancel: CancellationToken,
    config: WorkerConfig,
}

impl TitleWorker {
    pub fn new(host: ClientHost, classifier: Arc<Classifier>, emitter: ProgressEmitter, cancel: CancellationToken) -> Self {
        Self {
            host,
            classifier,
            emitter,
            cancel,
            config: WorkerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one title to a terminal state.
    pub async fn run(&self, title: TitleId) -> TitleResult {
        self.transition(title, WorkerState::Idle);
        let started_at = Utc::now();
        let result = self.process(title, started_at).await;

        self.transition(title, WorkerState::Closed(result.outcome));
        self.emitter.emit(ProgressEvent::TitleFinished {
            title,
            outcome: result.outcome,
        });
        tracing::info!(
            title = %title,
            outcome = %result.outcome,
            unlocked = result.unlocked_count(),
            failed = result.failed_count(),
            skipped = result.skipped_count(),
            "Title finished"
        );

        self.cooldown().await;
        result
    }

    async fn process(&self, title: TitleId, started_at: DateTime<Utc>) -> TitleResult {
        self.transition(title, WorkerState::SessionOpening);
        let mut session = match self.host.open(title).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(title = %title, error = %e, "Session open failed");
                return TitleResult::session_failure(title, e, started_at);
            }
        };

        if self.cancel.is_cancelled() {
            session.close().await;
            return Self::frozen(title, TitleOutcome::Cancelled, Vec::new(), started_at);
        }

        self.transition(title, WorkerState::Listing);
        let records = match session.list_achievements().await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(title = %title, error = %e, "Listing achievements failed");
                session.close().await;
                return TitleResult::session_failure(title, e, started_at);
            }
        };

        self.transition(title, WorkerState::Classifying);
        let classified = self.classifier.classify_all(records);

        self.transition(title, WorkerState::Unlocking);
        let (attempts, cut_short) = self.unlock_eligible(title, &mut session, classified).await;
        session.close().await;

        // A stop requested during the last unlock or the listing still cancels the title
        let cancelled = cut_short || self.cancel.is_cancelled();
        let outcome = if cancelled {
            TitleOutcome::Cancelled
        } else {
            let unlocked = attempts.iter().filter(|a| a.outcome.is_unlocked()).count();
            let failed = attempts.iter().filter(|a| a.outcome.is_failed()).count();
            let non_eligible = attempts.iter().filter(|a| !a.verdict.is_eligible()).count();
            TitleOutcome::from_unlock_counts(unlocked, failed, non_eligible)
        };

        Self::frozen(title, outcome, attempts, started_at)
    }

    /// Unlock eligible achievements in listing order.
    ///
    /// Cancellation is checked before each unlock; an in-flight unlock always
    /// completes. Returns the attempts and whether cancellation cut the pass short.
    async fn unlock_eligible(
        &self,
        title: TitleId,
        session: &mut Session,
        classified: Vec<(AchievementRecord, ClassificationVerdict)>,
    ) -> (Vec<AchievementAttempt>, bool) {
        let mut attempts = Vec::with_capacity(classified.len());
        let mut cancelled = false;

        for (record, verdict) in classified {
            let outcome = match verdict.skip_reason() {
                Some(reason) => AchievementOutcome::skipped(reason),
                None if cancelled || self.cancel.is_cancelled() => {
                    cancelled = true;
                    AchievementOutcome::skipped(SkipReason::Cancelled)
                }
                None => match session.unlock(&record.id).await {
                    Ok(()) => {
                        tracing::debug!(title = %title, achievement = %record.id, "Unlocked");
                        AchievementOutcome::Unlocked
                    }
                    Err(e) => {
                        tracing::warn!(title = %title, achievement = %record.id, error = %e, "Unlock failed");
                        AchievementOutcome::failed(e.to_string())
                    }
                },
            };

            self.emitter.emit(ProgressEvent::AchievementAttempted {
                title,
                achievement: record.id.clone(),
                outcome: outcome.clone(),
            });
            attempts.push(AchievementAttempt::new(record, verdict, outcome));
        }

        (attempts, cancelled)
    }

    fn frozen(
        title: TitleId,
        outcome: TitleOutcome,
        attempts: Vec<AchievementAttempt>,
        started_at: DateTime<Utc>,
    ) -> TitleResult {
        TitleResult {
            title,
            name: None,
            outcome,
            attempts,
            session_error: None,
            started_at,
            finished_at: Utc::now(),
        }
    }

    fn transition(&self, title: TitleId, state: WorkerState) {
        tracing::debug!(title = %title, state = %state, "Worker state change");
        self.emitter.emit(ProgressEvent::StateChanged { title, state });
    }

    async fn cooldown(&self) {
        if self.config.title_cooldown.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(self.config.title_cooldown) => {}
            _ = self.cancel.cancelled() => {}
        }
    }
}
