//! Process-scoped client host and title sessions.
//!
//! The vendor library permits one client context per process, so `ClientHost`
//! serialises `open`/`close` behind an async mutex and tracks which titles
//! currently hold a session. A `Session` is exclusively owned by one worker.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::{Instant, timeout_at};

use crate::domain::{AchievementRecord, TitleId};
use crate::session::client::{ClientApi, ClientHandle, SessionError, UnlockError};

/// Default time allowed for connecting and fetching user stats
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(5);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owner of the process-wide client context.
#[derive(Clone)]
pub struct ClientHost {
    client: Arc<dyn ClientApi>,
    context: Arc<tokio::sync::Mutex<()>>,
    slots: Arc<Mutex<HashSet<TitleId>>>,
    init_timeout: Duration,
}

impl ClientHost {
    pub fn new(client: Arc<dyn ClientApi>) -> Self {
        Self {
            client,
            context: Arc::new(tokio::sync::Mutex::new(())),
            slots: Arc::new(Mutex::new(HashSet::new())),
            init_timeout: DEFAULT_INIT_TIMEOUT,
        }
    }

    pub fn with_init_timeout(mut self, init_timeout: Duration) -> Self {
        self.init_timeout = init_timeout;
        self
    }

    pub fn init_timeout(&self) -> Duration {
        self.init_timeout
    }

    /// Number of titles holding a session right now
    pub fn open_sessions(&self) -> usize {
        lock(&self.slots).len()
    }

    pub fn is_open(&self, title: TitleId) -> bool {
        lock(&self.slots).contains(&title)
    }

    /// Open a session for a title.
    ///
    /// Connecting and fetching user stats share one deadline; on any failure
    /// the handle and the title slot are released before returning.
    pub async fn open(&self, title: TitleId) -> Result<Session, SessionError> {
        let _context = self.context.lock().await;

        if !lock(&self.slots).insert(title) {
            return Err(SessionError::AlreadyOwned);
        }

        match self.connect_and_prime(title).await {
            Ok(handle) => {
                tracing::debug!(title = %title, handle = handle.raw(), "Session opened");
                Ok(Session {
                    host: self.clone(),
                    title,
                    handle: Some(handle),
                    known: HashMap::new(),
                })
            }
            Err(e) => {
                self.free_slot(title);
                Err(e)
            }
        }
    }

    async fn connect_and_prime(&self, title: TitleId) -> Result<ClientHandle, SessionError> {
        let deadline = Instant::now() + self.init_timeout;

        let handle = timeout_at(deadline, self.client.connect(title))
            .await
            .map_err(|_| SessionError::InitTimeout)??;

        match timeout_at(deadline, self.client.request_stats(&handle)).await {
            Ok(Ok(())) => Ok(handle),
            Ok(Err(e)) => {
                self.client.release(handle).await;
                Err(e)
            }
            Err(_) => {
                self.client.release(handle).await;
                Err(SessionError::InitTimeout)
            }
        }
    }

    fn free_slot(&self, title: TitleId) {
        lock(&self.slots).remove(&title);
    }
}

/// A live, title-scoped connection to the client.
///
/// Not `Clone`: exactly one worker owns it. Call [`Session::close`] when done;
/// dropping an unclosed session frees the slot and schedules the release.
pub struct Session {
    host: ClientHost,
    title: TitleId,
    handle: Option<ClientHandle>,
    /// Unlock state of every listed achievement
    known: HashMap<String, bool>,
}

impl Session {
    pub fn title(&self) -> TitleId {
        self.title
    }

    fn handle(&self) -> Result<&ClientHandle, SessionError> {
        self.handle
            .as_ref()
            .ok_or_else(|| SessionError::Unknown("session already closed".to_string()))
    }

    /// List the title's achievements
    pub async fn list_achievements(&mut self) -> Result<Vec<AchievementRecord>, SessionError> {
        let records = self.host.client.list_achievements(self.handle()?).await?;
        self.known = records.iter().map(|r| (r.id.clone(), r.unlocked)).collect();
        Ok(records)
    }

    /// Unlock one listed achievement
    pub async fn unlock(&mut self, achievement_id: &str) -> Result<(), UnlockError> {
        match self.known.get(achievement_id) {
            None => return Err(UnlockError::NotEligible),
            Some(true) => return Err(UnlockError::AlreadyUnlocked),
            Some(false) => {}
        }

        let handle = self.handle.as_ref().ok_or(UnlockError::Disconnected)?;
        self.host.client.unlock(handle, achievement_id).await?;
        self.known.insert(achievement_id.to_string(), true);
        Ok(())
    }

    /// Release the client context and the title slot
    pub async fn close(mut self) {
        if let Some(handle) = self.handle.take() {
            let _context = self.host.context.lock().await;
            self.host.client.release(handle).await;
            self.host.free_slot(self.title);
            tracing::debug!(title = %self.title, "Session closed");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        tracing::warn!(title = %self.title, "Session dropped without close, releasing");
        self.host.free_slot(self.title);

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let client = self.host.client.clone();
                let context = self.host.context.clone();
                runtime.spawn(async move {
                    let _context = context.lock().await;
                    client.release(handle).await;
                });
            }
            Err(_) => {
                tracing::error!(title = %self.title, "No runtime to release dropped session handle");
            }
        }
    }
}
