//! Scriptable in-memory client for tests and dry runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::{AchievementRecord, TitleId};
use crate::session::client::{ClientApi, ClientHandle, SessionError, UnlockError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted behaviour of one title.
#[derive(Debug, Clone, Default)]
pub struct TitleScript {
    pub achievements: Vec<AchievementRecord>,
    pub open_error: Option<SessionError>,
    pub stats_error: Option<SessionError>,
    pub list_error: Option<SessionError>,
    pub unlock_errors: HashMap<String, UnlockError>,
    pub connect_delay: Option<Duration>,
    /// Cancel this token while the named achievement's unlock is in flight
    pub cancel_during: Option<(String, CancellationToken)>,
    /// Cancel this token while the listing is in flight
    pub cancel_during_list: Option<CancellationToken>,
}

impl TitleScript {
    pub fn with_achievements(achievements: Vec<AchievementRecord>) -> Self {
        Self {
            achievements,
            ..Default::default()
        }
    }

    pub fn failing_open(mut self, error: SessionError) -> Self {
        self.open_error = Some(error);
        self
    }

    pub fn failing_stats(mut self, error: SessionError) -> Self {
        self.stats_error = Some(error);
        self
    }

    pub fn failing_list(mut self, error: SessionError) -> Self {
        self.list_error = Some(error);
        self
    }

    pub fn failing_unlock(mut self, achievement_id: impl Into<String>, error: UnlockError) -> Self {
        self.unlock_errors.insert(achievement_id.into(), error);
        self
    }

    pub fn connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    pub fn cancel_during(mut self, achievement_id: impl Into<String>, token: CancellationToken) -> Self {
        self.cancel_during = Some((achievement_id.into(), token));
        self
    }

    pub fn cancel_during_list(mut self, token: CancellationToken) -> Self {
        self.cancel_during_list = Some(token);
        self
    }
}

/// A recorded client call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Connect(TitleId),
    RequestStats(TitleId),
    List(TitleId),
    Unlock(TitleId, String),
    Release(TitleId),
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<MockCall>,
    active: usize,
    peak: usize,
}

/// In-memory `ClientApi` driven by per-title scripts.
///
/// Successful unlocks are written back into the script, so a second run
/// against the same client sees them as already unlocked.
#[derive(Debug, Default)]
pub struct MockClient {
    scripts: Mutex<HashMap<TitleId, TitleScript>>,
    state: Mutex<MockState>,
    next_handle: AtomicU64,
    call_delay: Duration,
    down: bool,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(self, title: TitleId, script: TitleScript) -> Self {
        lock(&self.scripts).insert(title, script);
        self
    }

    /// Delay applied to every list and unlock call
    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    /// Every connect fails with `NotRunning`
    pub fn client_down(mut self) -> Self {
        self.down = true;
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.state).calls.clone()
    }

    pub fn unlock_calls(&self, title: TitleId) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                MockCall::Unlock(t, id) if t == title => Some(id),
                _ => None,
            })
            .collect()
    }

    fn count(&self, matches: impl Fn(&MockCall) -> bool) -> usize {
        lock(&self.state).calls.iter().filter(|c| matches(c)).count()
    }

    pub fn connects(&self, title: TitleId) -> usize {
        self.count(|c| *c == MockCall::Connect(title))
    }

    pub fn releases(&self, title: TitleId) -> usize {
        self.count(|c| *c == MockCall::Release(title))
    }

    pub fn active_sessions(&self) -> usize {
        lock(&self.state).active
    }

    /// Highest number of simultaneously held handles
    pub fn peak_sessions(&self) -> usize {
        lock(&self.state).peak
    }

    fn record(&self, call: MockCall) {
        lock(&self.state).calls.push(call);
    }

    fn script(&self, title: TitleId) -> Option<TitleScript> {
        lock(&self.scripts).get(&title).cloned()
    }

    async fn pause(&self) {
        if !self.call_delay.is_zero() {
            tokio::time::sleep(self.call_delay).await;
        }
    }
}

#[async_trait]
impl ClientApi for MockClient {
    async fn connect(&self, title: TitleId) -> Result<ClientHandle, SessionError> {
        self.record(MockCall::Connect(title));
        if self.down {
            return Err(SessionError::NotRunning);
        }

        let script = self
            .script(title)
            .ok_or_else(|| SessionError::Unknown(format!("title {} is not installed", title)))?;
        if let Some(delay) = script.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = script.open_error {
            return Err(error);
        }

        let mut state = lock(&self.state);
        state.active += 1;
        state.peak = state.peak.max(state.active);
        Ok(ClientHandle::new(title, self.next_handle.fetch_add(1, Ordering::SeqCst)))
    }

    async fn request_stats(&self, handle: &ClientHandle) -> Result<(), SessionError> {
        self.record(MockCall::RequestStats(handle.title()));
        match self.script(handle.title()).and_then(|s| s.stats_error) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn list_achievements(&self, handle: &ClientHandle) -> Result<Vec<AchievementRecord>, SessionError> {
        self.record(MockCall::List(handle.title()));
        self.pause().await;
        let script = self
            .script(handle.title())
            .ok_or_else(|| SessionError::Unknown("title vanished".to_string()))?;
        if let Some(token) = &script.cancel_during_list {
            token.cancel();
        }
        match script.list_error {
            Some(error) => Err(error),
            None => Ok(script.achievements),
        }
    }

    async fn unlock(&self, handle: &ClientHandle, achievement_id: &str) -> Result<(), UnlockError> {
        let title = handle.title();
        self.record(MockCall::Unlock(title, achievement_id.to_string()));

        let script = self.script(title).ok_or(UnlockError::Disconnected)?;
        if let Some((id, token)) = &script.cancel_during
            && id == achievement_id
        {
            token.cancel();
        }
        self.pause().await;

        if let Some(error) = script.unlock_errors.get(achievement_id) {
            return Err(error.clone());
        }

        if let Some(script) = lock(&self.scripts).get_mut(&title)
            && let Some(record) = script.achievements.iter_mut().find(|r| r.id == achievement_id)
        {
            record.unlocked = true;
        }
        Ok(())
    }

    async fn release(&self, handle: ClientHandle) {
        self.record(MockCall::Release(handle.title()));
        let mut state = lock(&self.state);
        state.active = state.active.saturating_sub(1);
    }
}
