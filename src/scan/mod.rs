//! Library scan.
//!
//! Builds the `LibrarySnapshot` a run consumes:
//! 1. Fetch the player's owned games
//! 2. Fetch achievement state per game, a bounded number of requests at a time
//! 3. Keep games with at least one locked achievement
//! 4. Save progress every `save_every` games and once more at the end
//!
//! A cancelled scan stops issuing requests and still saves what it found.

mod web;

pub use web::{
    DEFAULT_BASE_URL, OwnedGame, ScanError, SteamWebApi, WebApi, parse_owned_games, parse_player_achievements,
};

use std::path::{Path, PathBuf};
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::domain::TitleId;
use crate::error::{EngineError, Result};
use crate::session::{LibrarySnapshot, SnapshotGame};

/// Scan tuning.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Requests in flight at once
    pub concurrency: usize,
    /// Pause after each request to stay under the API rate limit
    pub request_delay: Duration,
    /// Save progress after this many games; 0 saves only at the end
    pub save_every: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            request_delay: Duration::from_millis(50),
            save_every: 100,
        }
    }
}

/// A game whose achievements could not be fetched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanFailure {
    pub title: TitleId,
    pub name: String,
    pub reason: String,
}

/// Outcome of a scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub owned_games: usize,
    pub scanned: usize,
    /// Games skipped because every achievement is unlocked or none exist
    pub fully_unlocked: usize,
    pub failures: Vec<ScanFailure>,
    pub cancelled: bool,
    pub snapshot: LibrarySnapshot,
}

impl ScanReport {
    /// Locked achievements across the snapshot
    pub fn locked_achievements(&self) -> usize {
        self.snapshot.games.iter().map(SnapshotGame::locked_count).sum()
    }
}

/// Scans a player's library through a `WebApi`.
pub struct LibraryScanner {
    api: Arc<dyn WebApi>,
    steam_id: String,
    config: ScanConfig,
    output: Option<PathBuf>,
}

impl LibraryScanner {
    pub fn new(api: Arc<dyn WebApi>, steam_id: impl Into<String>, config: ScanConfig) -> Self {
        Self {
            api,
            steam_id: steam_id.into(),
            config,
            output: None,
        }
    }

    /// Save progress and the final snapshot to this path
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    pub async fn scan(&self, cancel: CancellationToken) -> Result<ScanReport> {
        if self.config.concurrency == 0 {
            return Err(EngineError::InvalidConcurrency(0));
        }
        if self.steam_id.trim().is_empty() {
            return Err(ScanError::MissingCredential("steam_id").into());
        }

        let owned = self.api.owned_games(&self.steam_id).await?;
        let owned_games = owned.len();
        tracing::info!(owned_games, concurrency = self.config.concurrency, "Starting library scan");

        let mut found: Vec<(usize, SnapshotGame)> = Vec::new();
        let mut scanned = 0;
        let mut fully_unlocked = 0;
        let mut failures = Vec::new();
        let mut cancelled = false;

        let requests = futures::stream::iter(owned.into_iter().enumerate())
            .map(|(index, game)| {
                let api = self.api.clone();
                let steam_id = self.steam_id.clone();
                let delay = self.config.request_delay;
                async move {
                    let result = api.player_achievements(&steam_id, game.appid).await;
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    (index, game, result)
                }
            })
            .buffer_unordered(self.config.concurrency);
        let mut requests = pin!(requests);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    None
                }
                next = requests.next() => next,
            };
            let Some((index, game, result)) = next else {
                break;
            };
            scanned += 1;

            match result {
                Ok(achievements) => {
                    let game = SnapshotGame {
                        appid: game.appid,
                        name: game.name,
                        playtime_forever: game.playtime_forever,
                        achievements,
                    };
                    let locked = game.locked_count();
                    if locked > 0 {
                        tracing::debug!(title = %game.appid, locked, "Game has locked achievements");
                        found.push((index, game));
                    } else {
                        fully_unlocked += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(title = %game.appid, error = %e, "Achievement fetch failed");
                    failures.push(ScanFailure {
                        title: game.appid,
                        name: game.name,
                        reason: e.to_string(),
                    });
                }
            }

            if self.config.save_every > 0 && scanned % self.config.save_every == 0 {
                tracing::info!(scanned, owned_games, found = found.len(), "Scan progress");
                self.save(&found)?;
            }
        }

        let snapshot = self.snapshot_of(&found);
        if let Some(path) = &self.output {
            snapshot.save(path)?;
        }
        tracing::info!(
            scanned,
            owned_games,
            with_locked = snapshot.games.len(),
            failed = failures.len(),
            cancelled,
            "Library scan finished"
        );

        Ok(ScanReport {
            owned_games,
            scanned,
            fully_unlocked,
            failures,
            cancelled,
            snapshot,
        })
    }

    /// Snapshot in owned-games order, independent of completion order
    fn snapshot_of(&self, found: &[(usize, SnapshotGame)]) -> LibrarySnapshot {
        let mut ordered: Vec<&(usize, SnapshotGame)> = found.iter().collect();
        ordered.sort_by_key(|(index, _)| *index);
        LibrarySnapshot {
            steam_id: Some(self.steam_id.clone()),
            games: ordered.into_iter().map(|(_, game)| game.clone()).collect(),
        }
    }

    fn save(&self, found: &[(usize, SnapshotGame)]) -> Result<()> {
        match &self.output {
            Some(path) => self.snapshot_of(found).save(path),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SnapshotAchievement;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Web API answering from canned JSON bodies
    struct CannedApi {
        owned: &'static str,
        achievements: HashMap<TitleId, &'static str>,
        delay: Duration,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        requested: Mutex<Vec<TitleId>>,
        cancel_after: Option<(usize, CancellationToken)>,
    }

    impl CannedApi {
        fn new(owned: &'static str) -> Self {
            Self {
                owned,
                achievements: HashMap::new(),
                delay: Duration::ZERO,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                requested: Mutex::new(Vec::new()),
                cancel_after: None,
            }
        }

        fn with_achievements(mut self, title: u32, body: &'static str) -> Self {
            self.achievements.insert(TitleId(title), body);
            self
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl WebApi for CannedApi {
        async fn owned_games(&self, _steam_id: &str) -> std::result::Result<Vec<OwnedGame>, ScanError> {
            parse_owned_games(self.owned)
        }

        async fn player_achievements(
            &self,
            _steam_id: &str,
            title: TitleId,
        ) -> std::result::Result<Vec<SnapshotAchievement>, ScanError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let count = {
                let mut requested = self.requested.lock().unwrap();
                requested.push(title);
                requested.len()
            };
            if let Some((after, token)) = &self.cancel_after
                && count >= *after
            {
                token.cancel();
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            match self.achievements.get(&title) {
                Some(body) => parse_player_achievements(body),
                None => Err(ScanError::Status {
                    status: 500,
                    body: "internal error".to_string(),
                }),
            }
        }
    }

    const OWNED: &str = r#"{"response": {"game_count": 4, "games": [
        {"appid": 10, "name": "Locked Game", "playtime_forever": 30},
        {"appid": 20, "name": "Done Game"},
        {"appid": 30, "name": "No Stats"},
        {"appid": 40, "name": "Broken"}
    ]}}"#;

    const LOCKED: &str = r#"{"playerstats": {"success": true, "achievements": [
        {"apiname": "A1", "achieved": 0},
        {"apiname": "A2", "achieved": 1, "unlocktime": 1600000000}
    ]}}"#;

    const DONE: &str = r#"{"playerstats": {"success": true, "achievements": [
        {"apiname": "B1", "achieved": 1}
    ]}}"#;

    const NO_STATS: &str = r#"{"playerstats": {"error": "Requested app has no stats", "success": false}}"#;

    fn fast_config() -> ScanConfig {
        ScanConfig {
            concurrency: 2,
            request_delay: Duration::ZERO,
            save_every: 0,
        }
    }

    fn canned_library() -> CannedApi {
        CannedApi::new(OWNED)
            .with_achievements(10, LOCKED)
            .with_achievements(20, DONE)
            .with_achievements(30, NO_STATS)
    }

    #[tokio::test]
    async fn test_scan_keeps_games_with_locked_achievements() {
        let scanner = LibraryScanner::new(Arc::new(canned_library()), "7656", fast_config());

        let report = scanner.scan(CancellationToken::new()).await.unwrap();

        assert_eq!(report.owned_games, 4);
        assert_eq!(report.scanned, 4);
        assert_eq!(report.fully_unlocked, 1);
        assert_eq!(report.failures.len(), 2);
        assert!(!report.cancelled);
        assert_eq!(report.snapshot.steam_id.as_deref(), Some("7656"));
        assert_eq!(report.snapshot.titles_with_locked(), vec![TitleId(10)]);
        assert_eq!(report.locked_achievements(), 1);

        let game = report.snapshot.game(TitleId(10)).unwrap();
        assert_eq!(game.name, "Locked Game");
        assert_eq!(game.playtime_forever, 30);

        let no_stats = report.failures.iter().find(|f| f.title == TitleId(30)).unwrap();
        assert!(no_stats.reason.contains("no stats"));
    }

    #[tokio::test]
    async fn test_scan_writes_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        let scanner = LibraryScanner::new(Arc::new(canned_library()), "7656", fast_config()).with_output(&path);

        scanner.scan(CancellationToken::new()).await.unwrap();

        let snapshot = LibrarySnapshot::load(&path).unwrap();
        assert_eq!(snapshot.titles_with_locked(), vec![TitleId(10)]);
    }

    #[tokio::test]
    async fn test_snapshot_keeps_owned_order() {
        let owned = r#"{"response": {"games": [
            {"appid": 1, "name": "One"}, {"appid": 2, "name": "Two"}, {"appid": 3, "name": "Three"}
        ]}}"#;
        let api = CannedApi::new(owned)
            .with_achievements(1, LOCKED)
            .with_achievements(2, LOCKED)
            .with_achievements(3, LOCKED)
            .with_delay(Duration::from_millis(5));
        let scanner = LibraryScanner::new(Arc::new(api), "7656", ScanConfig {
            concurrency: 3,
            ..fast_config()
        });

        let report = scanner.scan(CancellationToken::new()).await.unwrap();
        assert_eq!(
            report.snapshot.titles_with_locked(),
            vec![TitleId(1), TitleId(2), TitleId(3)]
        );
    }

    #[tokio::test]
    async fn test_scan_concurrency_is_bounded() {
        let owned = r#"{"response": {"games": [
            {"appid": 1}, {"appid": 2}, {"appid": 3}, {"appid": 4}, {"appid": 5}, {"appid": 6}
        ]}}"#;
        let api = Arc::new(
            (1..=6)
                .fold(CannedApi::new(owned), |api, id| api.with_achievements(id, LOCKED))
                .with_delay(Duration::from_millis(10)),
        );
        let scanner = LibraryScanner::new(api.clone(), "7656", ScanConfig {
            concurrency: 2,
            ..fast_config()
        });

        let report = scanner.scan(CancellationToken::new()).await.unwrap();

        assert_eq!(report.snapshot.games.len(), 6);
        assert!(api.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_cancelled_scan_saves_partial_progress() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        let owned = r#"{"response": {"games": [
            {"appid": 1}, {"appid": 2}, {"appid": 3}, {"appid": 4}, {"appid": 5}, {"appid": 6}
        ]}}"#;
        let cancel = CancellationToken::new();
        let mut api = (1..=6).fold(CannedApi::new(owned), |api, id| api.with_achievements(id, LOCKED));
        api.cancel_after = Some((2, cancel.clone()));
        let api = Arc::new(api.with_delay(Duration::from_millis(10)));
        let scanner = LibraryScanner::new(api.clone(), "7656", ScanConfig {
            concurrency: 1,
            ..fast_config()
        })
        .with_output(&path);

        let report = scanner.scan(cancel).await.unwrap();

        assert!(report.cancelled);
        assert!(report.scanned < 6);
        assert!(api.requested.lock().unwrap().len() < 6);
        let saved = LibrarySnapshot::load(&path).unwrap();
        assert_eq!(saved.games.len(), report.snapshot.games.len());
    }

    #[tokio::test]
    async fn test_progress_saved_every_n_games() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        let scanner = LibraryScanner::new(Arc::new(canned_library()), "7656", ScanConfig {
            save_every: 1,
            ..fast_config()
        })
        .with_output(&path);

        scanner.scan(CancellationToken::new()).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_owned_games_failure_is_fatal() {
        let scanner = LibraryScanner::new(Arc::new(CannedApi::new("not json")), "7656", fast_config());
        let result = scanner.scan(CancellationToken::new()).await;
        assert!(matches!(result, Err(EngineError::Scan(ScanError::Parse(_)))));
    }

    #[tokio::test]
    async fn test_rejects_bad_settings() {
        let api = Arc::new(canned_library());

        let zero = LibraryScanner::new(api.clone(), "7656", ScanConfig {
            concurrency: 0,
            ..fast_config()
        });
        assert!(matches!(
            zero.scan(CancellationToken::new()).await,
            Err(EngineError::InvalidConcurrency(0))
        ));

        let no_id = LibraryScanner::new(api, " ", fast_config());
        assert!(matches!(
            no_id.scan(CancellationToken::new()).await,
            Err(EngineError::Scan(ScanError::MissingCredential("steam_id")))
        ));
    }
}
