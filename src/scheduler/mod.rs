//! Scheduler module for running title workers.
//!
//! This module provides:
//! - **Scheduler**: a bounded, FIFO worker pool that folds title results into a `RunReport`.
//! - **Progress**: non-blocking forwarding of worker events to a `ProgressSink`.
//!
//! # Example
//!
//! ```ignore
//! use unlockr::scheduler::{EngineConfig, NullSink, Scheduler};
//!
//! let scheduler = Scheduler::new(client, Classifier::default(), EngineConfig::default());
//! let report = scheduler.run(titles, 4, Arc::new(NullSink), CancellationToken::new()).await?;
//! ```

mod pool;
mod progress;

pub use pool::{EngineConfig, Scheduler};
pub use progress::{NullSink, ProgressEmitter, ProgressSink, dispatch, spawn_forwarder};
