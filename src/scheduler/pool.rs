//! Bounded worker pool running title workers.
//!
//! The Scheduler:
//! 1. Dispatches titles FIFO while fewer than `concurrency_limit` workers run
//! 2. Merges each finished `TitleResult` into the report, in completion order
//! 3. Stops dispatching once cancellation is signalled
//! 4. Returns only after every submitted title has a result

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::classifier::Classifier;
use crate::domain::TitleId;
use crate::error::{EngineError, Result};
use crate::report::{RunReport, TitleResult};
use crate::scheduler::progress::{ProgressEmitter, ProgressSink, spawn_forwarder};
use crate::session::{ClientApi, ClientHost, DEFAULT_INIT_TIMEOUT, SessionError};
use crate::worker::{TitleWorker, WorkerConfig};

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of titles processed at once
    pub concurrency_limit: usize,
    /// Deadline for connecting and fetching user stats
    pub init_timeout: Duration,
    /// Pause after each title so the client can reset
    pub title_cooldown: Duration,
    /// Capacity of the progress channel
    pub progress_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 4,
            init_timeout: DEFAULT_INIT_TIMEOUT,
            title_cooldown: Duration::from_secs(1),
            progress_buffer: 256,
        }
    }
}

/// Runs title workers with bounded concurrency and builds the run report.
pub struct Scheduler {
    host: ClientHost,
    classifier: Arc<Classifier>,
    config: EngineConfig,
    names: HashMap<TitleId, String>,
}

impl Scheduler {
    pub fn new(client: Arc<dyn ClientApi>, classifier: Classifier, config: EngineConfig) -> Self {
        let host = ClientHost::new(client).with_init_timeout(config.init_timeout);
        Self {
            host,
            classifier: Arc::new(classifier),
            config,
            names: HashMap::new(),
        }
    }

    /// Display names attached to title results
    pub fn with_names(mut self, names: HashMap<TitleId, String>) -> Self {
        self.names = names;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn host(&self) -> &ClientHost {
        &self.host
    }

    /// Process every title and return the aggregated report.
    ///
    /// Fails only when no worker can run at all. Title and achievement
    /// failures are recorded in the report.
    pub async fn run(
        &self,
        titles: Vec<TitleId>,
        concurrency_limit: usize,
        sink: Arc<dyn ProgressSink>,
        cancel: CancellationToken,
    ) -> Result<RunReport> {
        if concurrency_limit == 0 {
            return Err(EngineError::InvalidConcurrency(concurrency_limit));
        }

        let mut report = RunReport::new(titles.len());
        tracing::info!(titles = titles.len(), concurrency_limit, "Starting run");

        let (emitter, rx) = ProgressEmitter::channel(self.config.progress_buffer);
        let forwarder = spawn_forwarder(rx, sink);
        let worker = TitleWorker::new(self.host.clone(), self.classifier.clone(), emitter.clone(), cancel.clone())
            .with_config(WorkerConfig {
                title_cooldown: self.config.title_cooldown,
            });

        let mut queue: VecDeque<TitleId> = titles.into();
        let mut running: JoinSet<TitleResult> = JoinSet::new();
        let mut in_flight: HashMap<tokio::task::Id, TitleId> = HashMap::new();

        loop {
            while running.len() < concurrency_limit && !cancel.is_cancelled() {
                let Some(title) = queue.pop_front() else {
                    break;
                };
                let worker = worker.clone();
                let handle = running.spawn(async move { worker.run(title).await });
                in_flight.insert(handle.id(), title);
                tracing::debug!(title = %title, running = running.len(), queued = queue.len(), "Dispatched title");
            }

            let Some(joined) = running.join_next_with_id().await else {
                break;
            };

            let result = match joined {
                Ok((id, result)) => {
                    in_flight.remove(&id);
                    result
                }
                Err(e) => {
                    let Some(title) = in_flight.remove(&e.id()) else {
                        tracing::error!(error = %e, "Unknown worker task failed");
                        continue;
                    };
                    tracing::error!(title = %title, error = %e, "Worker task panicked");
                    TitleResult::session_failure(title, SessionError::Unknown(format!("worker aborted: {}", e)), Utc::now())
                }
            };

            let name = self.names.get(&result.title).cloned();
            report.merge(result.with_name(name));
        }

        for title in queue.drain(..) {
            let name = self.names.get(&title).cloned();
            report.merge(TitleResult::not_dispatched(title).with_name(name));
        }

        let dropped = emitter.dropped();
        drop(worker);
        drop(emitter);
        match forwarder.await {
            Ok(delivered) => tracing::debug!(delivered, dropped, "Progress forwarder finished"),
            Err(e) => tracing::warn!(error = %e, "Progress forwarder failed"),
        }

        report.finish(cancel.is_cancelled());
        tracing::info!(
            succeeded = report.titles_succeeded,
            partial = report.titles_partial,
            failed = report.titles_failed,
            cancelled = report.titles_cancelled,
            unlocked = report.achievements_unlocked,
            "Run finished"
        );
        Ok(report)
    }
}
