//! Title worker module - drives one title end to end.
//!
//! A worker opens a session, lists and classifies achievements, unlocks the
//! eligible ones one at a time, and always closes the session before
//! producing its `TitleResult`.

mod title_worker;

pub use title_worker::{TitleWorker, WorkerConfig};
