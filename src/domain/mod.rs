//! Domain types for Unlockr
//!
//! This module contains the core domain types:
//! - TitleId: The vendor application identifier of a game
//! - AchievementRecord: One achievement as reported by the client API
//! - AchievementOutcome / TitleOutcome: What happened to an achievement or a title
//! - ProgressEvent: Real-time progress emitted by title workers

pub mod achievement;
pub mod event;
pub mod outcome;
pub mod title;

pub use achievement::{AchievementRecord, MetadataValue};
pub use event::{ProgressEvent, WorkerState, event_types};
pub use outcome::{AchievementOutcome, SkipReason, TitleOutcome};
pub use title::TitleId;
