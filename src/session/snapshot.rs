//! Library snapshot - the owned-titles collaborator and a client backed by it.
//!
//! The snapshot is the JSON document produced by the library scan:
//!
//! ```json
//! {
//!   "steam_id": "7656119...",
//!   "games": [
//!     { "appid": 700570, "name": "Beyond the Void",
//!       "achievements": [ { "apiname": "TURRET_BREAKER", "achieved": 0 } ] }
//!   ]
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::achievement::metadata_keys;
use crate::domain::{AchievementRecord, TitleId};
use crate::error::EngineError;
use crate::session::client::{ClientApi, ClientHandle, SessionError, UnlockError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One achievement entry of a snapshot game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotAchievement {
    pub apiname: String,
    pub achieved: u8,
    #[serde(default)]
    pub unlocktime: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub protected: bool,
}

impl SnapshotAchievement {
    pub fn is_locked(&self) -> bool {
        self.achieved == 0
    }

    pub fn to_record(&self) -> AchievementRecord {
        let mut record = if self.is_locked() {
            AchievementRecord::locked(&self.apiname)
        } else {
            AchievementRecord::unlocked(&self.apiname)
        };
        if !self.name.is_empty() {
            record = record.with_meta(metadata_keys::NAME, self.name.as_str());
        }
        if !self.description.is_empty() {
            record = record.with_meta(metadata_keys::DESCRIPTION, self.description.as_str());
        }
        if self.protected {
            record = record.with_meta(metadata_keys::PROTECTED, true);
        }
        record
    }
}

/// One game of the snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotGame {
    pub appid: TitleId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub playtime_forever: u64,
    #[serde(default)]
    pub achievements: Vec<SnapshotAchievement>,
}

impl SnapshotGame {
    pub fn locked_count(&self) -> usize {
        self.achievements.iter().filter(|a| a.is_locked()).count()
    }

    pub fn protected_count(&self) -> usize {
        self.achievements.iter().filter(|a| a.is_locked() && a.protected).count()
    }
}

/// The scanned library
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibrarySnapshot {
    #[serde(default)]
    pub steam_id: Option<String>,
    #[serde(default)]
    pub games: Vec<SnapshotGame>,
}

impl LibrarySnapshot {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| EngineError::Snapshot(format!("cannot read {}: {}", path.display(), e)))?;
        let snapshot: Self = serde_json::from_str(&content)
            .map_err(|e| EngineError::Snapshot(format!("invalid snapshot {}: {}", path.display(), e)))?;
        tracing::info!(path = %path.display(), games = snapshot.games.len(), "Loaded library snapshot");
        Ok(snapshot)
    }

    /// Write the snapshot as pretty JSON, creating parent directories
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), EngineError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        tracing::info!(path = %path.display(), games = self.games.len(), "Saved library snapshot");
        Ok(())
    }

    /// Titles with at least one locked achievement, in file order
    pub fn titles_with_locked(&self) -> Vec<TitleId> {
        self.games
            .iter()
            .filter(|g| g.locked_count() > 0)
            .map(|g| g.appid)
            .collect()
    }

    pub fn game(&self, title: TitleId) -> Option<&SnapshotGame> {
        self.games.iter().find(|g| g.appid == title)
    }

    /// Display names by title, for reporting
    pub fn names(&self) -> HashMap<TitleId, String> {
        self.games
            .iter()
            .filter(|g| !g.name.is_empty())
            .map(|g| (g.appid, g.name.clone()))
            .collect()
    }
}

/// `ClientApi` that replays a library snapshot.
///
/// Unlocks are applied to the in-memory copy only.
#[derive(Debug)]
pub struct SnapshotClient {
    titles: Mutex<HashMap<TitleId, Vec<AchievementRecord>>>,
    next_handle: AtomicU64,
}

impl SnapshotClient {
    pub fn new(snapshot: &LibrarySnapshot) -> Self {
        let titles = snapshot
            .games
            .iter()
            .map(|g| (g.appid, g.achievements.iter().map(SnapshotAchievement::to_record).collect()))
            .collect();
        Self {
            titles: Mutex::new(titles),
            next_handle: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl ClientApi for SnapshotClient {
    async fn connect(&self, title: TitleId) -> Result<ClientHandle, SessionError> {
        if !lock(&self.titles).contains_key(&title) {
            return Err(SessionError::Unknown(format!("title {} is not in the library snapshot", title)));
        }
        Ok(ClientHandle::new(title, self.next_handle.fetch_add(1, Ordering::SeqCst)))
    }

    async fn request_stats(&self, _handle: &ClientHandle) -> Result<(), SessionError> {
        Ok(())
    }

    async fn list_achievements(&self, handle: &ClientHandle) -> Result<Vec<AchievementRecord>, SessionError> {
        lock(&self.titles)
            .get(&handle.title())
            .cloned()
            .ok_or_else(|| SessionError::Unknown("title vanished from snapshot".to_string()))
    }

    async fn unlock(&self, handle: &ClientHandle, achievement_id: &str) -> Result<(), UnlockError> {
        let mut titles = lock(&self.titles);
        let records = titles.get_mut(&handle.title()).ok_or(UnlockError::Disconnected)?;
        let record = records
            .iter_mut()
            .find(|r| r.id == achievement_id)
            .ok_or_else(|| UnlockError::ApiRejected(format!("unknown achievement {}", achievement_id)))?;
        record.unlocked = true;
        Ok(())
    }

    async fn release(&self, handle: ClientHandle) {
        tracing::trace!(title = %handle.title(), "Snapshot handle released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SNAPSHOT: &str = r#"{
        "steam_id": "76561198000000000",
        "games": [
            { "appid": 100, "name": "Alpha", "achievements": [
                { "apiname": "A1", "achieved": 0, "name": "First" },
                { "apiname": "A2", "achieved": 1 },
                { "apiname": "SECRET_PROGRESS", "achieved": 0, "protected": true }
            ]},
            { "appid": 200, "name": "Beta", "achievements": [
                { "apiname": "B1", "achieved": 1 }
            ]}
        ]
    }"#;

    fn write_snapshot() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SNAPSHOT.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_and_filter_titles() {
        let file = write_snapshot();
        let snapshot = LibrarySnapshot::load(file.path()).unwrap();

        assert_eq!(snapshot.games.len(), 2);
        assert_eq!(snapshot.titles_with_locked(), vec![TitleId(100)]);
        let alpha = snapshot.game(TitleId(100)).unwrap();
        assert_eq!(alpha.locked_count(), 2);
        assert_eq!(alpha.protected_count(), 1);
        assert_eq!(snapshot.names().get(&TitleId(200)).map(String::as_str), Some("Beta"));
    }

    #[test]
    fn test_save_then_load() {
        let file = write_snapshot();
        let snapshot = LibrarySnapshot::load(file.path()).unwrap();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("data.json");

        snapshot.save(&path).unwrap();
        let reloaded = LibrarySnapshot::load(&path).unwrap();

        assert_eq!(reloaded.steam_id.as_deref(), Some("76561198000000000"));
        assert_eq!(reloaded.titles_with_locked(), vec![TitleId(100)]);
        assert_eq!(reloaded.game(TitleId(100)).unwrap().protected_count(), 1);
    }

    #[test]
    fn test_load_missing_file() {
        let result = LibrarySnapshot::load("/nonexistent/data.json");
        assert!(matches!(result, Err(EngineError::Snapshot(_))));
    }

    #[test]
    fn test_to_record_carries_metadata() {
        let file = write_snapshot();
        let snapshot = LibrarySnapshot::load(file.path()).unwrap();
        let alpha = snapshot.game(TitleId(100)).unwrap();

        let first = alpha.achievements[0].to_record();
        assert_eq!(first.display_name(), "First");
        assert!(!first.unlocked);

        let secret = alpha.achievements[2].to_record();
        assert!(secret.meta(metadata_keys::PROTECTED).unwrap().is_truthy());
    }

    #[tokio::test]
    async fn test_snapshot_client_unlock_in_memory() {
        let file = write_snapshot();
        let snapshot = LibrarySnapshot::load(file.path()).unwrap();
        let client = SnapshotClient::new(&snapshot);

        let handle = client.connect(TitleId(100)).await.unwrap();
        client.unlock(&handle, "A1").await.unwrap();
        let records = client.list_achievements(&handle).await.unwrap();
        assert!(records.iter().find(|r| r.id == "A1").unwrap().unlocked);

        let missing = client.unlock(&handle, "NOPE").await;
        assert!(matches!(missing, Err(UnlockError::ApiRejected(_))));

        assert!(matches!(client.connect(TitleId(999)).await, Err(SessionError::Unknown(_))));
    }
}
