//! Core client API trait and error types

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::{AchievementRecord, TitleId};

/// Raw interface to the vendor client library.
///
/// Every call is a stateful interaction with an external process. Implementations
/// do not need to guard against concurrent use of one handle; `Session` never
/// shares a handle.
#[async_trait]
pub trait ClientApi: Send + Sync {
    /// Create a client context for one title
    async fn connect(&self, title: TitleId) -> Result<ClientHandle, SessionError>;

    /// Fetch the user's stats for the title; required before any unlock
    async fn request_stats(&self, handle: &ClientHandle) -> Result<(), SessionError>;

    /// List every achievement of the title with its current state
    async fn list_achievements(&self, handle: &ClientHandle) -> Result<Vec<AchievementRecord>, SessionError>;

    /// Set one achievement and store stats
    async fn unlock(&self, handle: &ClientHandle, achievement_id: &str) -> Result<(), UnlockError>;

    /// Release the context. Must not fail.
    async fn release(&self, handle: ClientHandle);
}

/// Opaque handle to a title-scoped client context.
#[derive(Debug, PartialEq, Eq)]
pub struct ClientHandle {
    title: TitleId,
    raw: u64,
}

impl ClientHandle {
    pub fn new(title: TitleId, raw: u64) -> Self {
        Self { title, raw }
    }

    pub fn title(&self) -> TitleId {
        self.title
    }

    pub fn raw(&self) -> u64 {
        self.raw
    }
}

/// Errors scoped to a whole title session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum SessionError {
    #[error("Client is not running")]
    NotRunning,

    #[error("Another session already holds this title")]
    AlreadyOwned,

    #[error("Timed out initializing the client")]
    InitTimeout,

    #[error("Client error: {0}")]
    Unknown(String),
}

/// Errors scoped to a single achievement
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnlockError {
    #[error("Achievement is not eligible for this session")]
    NotEligible,

    #[error("Achievement is already unlocked")]
    AlreadyUnlocked,

    #[error("Client rejected the unlock: {0}")]
    ApiRejected(String),

    #[error("Client disconnected")]
    Disconnected,
}
