//! Unlockr - bulk achievement processing engine
//!
//! Unlockr walks a set of titles, opens one client session per title, classifies
//! every achievement against a protection policy and unlocks the eligible ones.
//! Titles run in a bounded worker pool; every outcome lands in a `RunReport`.
//! The library snapshot the run consumes is built by a scan of the vendor web API.

pub mod classifier;
pub mod discovery;
pub mod domain;
pub mod error;
pub mod report;
pub mod scan;
pub mod scheduler;
pub mod session;
pub mod worker;

pub use error::{EngineError, Result};
