//! Progress forwarding from workers to a caller-supplied sink.
//!
//! Workers never block on progress: events go through a bounded channel with
//! `try_send` and are dropped when it is full. The run report stays
//! authoritative regardless.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::domain::{AchievementOutcome, ProgressEvent, TitleId, TitleOutcome, WorkerState};

/// Receives progress for user-facing display.
pub trait ProgressSink: Send + Sync {
    /// An achievement was attempted or skipped
    fn achievement(&self, title: TitleId, achievement: &str, outcome: &AchievementOutcome);

    /// A title reached its terminal outcome
    fn title_finished(&self, title: TitleId, outcome: TitleOutcome);

    /// A worker changed state
    fn state_changed(&self, _title: TitleId, _state: WorkerState) {}
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn achievement(&self, _title: TitleId, _achievement: &str, _outcome: &AchievementOutcome) {}

    fn title_finished(&self, _title: TitleId, _outcome: TitleOutcome) {}
}

/// Route one event to the matching sink method
pub fn dispatch(sink: &dyn ProgressSink, event: &ProgressEvent) {
    match event {
        ProgressEvent::StateChanged { title, state } => sink.state_changed(*title, *state),
        ProgressEvent::AchievementAttempted {
            title,
            achievement,
            outcome,
        } => sink.achievement(*title, achievement, outcome),
        ProgressEvent::TitleFinished { title, outcome } => sink.title_finished(*title, *outcome),
    }
}

/// Non-blocking sender handed to workers.
#[derive(Debug, Clone)]
pub struct ProgressEmitter {
    tx: Option<mpsc::Sender<ProgressEvent>>,
    dropped: Arc<AtomicU64>,
}

impl ProgressEmitter {
    /// Emitter that sends nowhere
    pub fn disabled() -> Self {
        Self {
            tx: None,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emitter backed by a bounded channel
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let emitter = Self {
            tx: Some(tx),
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (emitter, rx)
    }

    pub fn emit(&self, event: ProgressEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(title = %event.title(), kind = event.kind(), "Progress channel full, event dropped");
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    /// Events dropped because the channel was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Drain the channel into the sink until every emitter is gone.
///
/// Resolves to the number of events delivered.
pub fn spawn_forwarder(mut rx: mpsc::Receiver<ProgressEvent>, sink: Arc<dyn ProgressSink>) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut delivered = 0;
        while let Some(event) = rx.recv().await {
            dispatch(sink.as_ref(), &event);
            delivered += 1;
        }
        delivered
    })
}
