//! Vendor web API client
//!
//! Only the two calls the library scan needs: the owned-games list and a
//! player's achievement state for one game.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::domain::TitleId;
use crate::session::SnapshotAchievement;

/// Public web API base URL
pub const DEFAULT_BASE_URL: &str = "http://api.steampowered.com";

const OWNED_GAMES_PATH: &str = "IPlayerService/GetOwnedGames/v0001/";
const PLAYER_ACHIEVEMENTS_PATH: &str = "ISteamUserStats/GetPlayerAchievements/v0001/";

/// Errors from the web API
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Missing web API credential: {0}")]
    MissingCredential(&'static str),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    /// The API answered but has no achievement data for the game
    #[error("Achievements unavailable: {0}")]
    Unavailable(String),
}

/// One entry of the owned-games list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OwnedGame {
    pub appid: TitleId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub playtime_forever: u64,
}

#[derive(Deserialize)]
struct OwnedGamesEnvelope {
    #[serde(default)]
    response: OwnedGamesBody,
}

#[derive(Default, Deserialize)]
struct OwnedGamesBody {
    #[serde(default)]
    games: Vec<OwnedGame>,
}

#[derive(Deserialize)]
struct PlayerStatsEnvelope {
    playerstats: PlayerStats,
}

#[derive(Deserialize)]
struct PlayerStats {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    achievements: Vec<SnapshotAchievement>,
}

/// Parse a `GetOwnedGames` response body
pub fn parse_owned_games(body: &str) -> Result<Vec<OwnedGame>, ScanError> {
    let envelope: OwnedGamesEnvelope = serde_json::from_str(body)?;
    Ok(envelope.response.games)
}

/// Parse a `GetPlayerAchievements` response body
pub fn parse_player_achievements(body: &str) -> Result<Vec<SnapshotAchievement>, ScanError> {
    let envelope: PlayerStatsEnvelope = serde_json::from_str(body)?;
    let stats = envelope.playerstats;
    if !stats.success {
        return Err(ScanError::Unavailable(
            stats.error.unwrap_or_else(|| "request unsuccessful".to_string()),
        ));
    }
    Ok(stats.achievements)
}

/// Read access to a player's library
#[async_trait]
pub trait WebApi: Send + Sync {
    /// Games owned by the player, free games included
    async fn owned_games(&self, steam_id: &str) -> Result<Vec<OwnedGame>, ScanError>;

    /// Achievement state of one game for the player
    async fn player_achievements(&self, steam_id: &str, title: TitleId) -> Result<Vec<SnapshotAchievement>, ScanError>;
}

/// `WebApi` over HTTP
pub struct SteamWebApi {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SteamWebApi {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, timeout: Duration) -> Result<Self, ScanError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ScanError::MissingCredential("api_key"));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, api_key, base_url))
    }

    /// Use a preconfigured HTTP client
    pub fn with_client(client: Client, api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<(StatusCode, String), ScanError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let response = self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str()), ("format", "json")])
            .query(params)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }
}

#[async_trait]
impl WebApi for SteamWebApi {
    async fn owned_games(&self, steam_id: &str) -> Result<Vec<OwnedGame>, ScanError> {
        let params = [
            ("steamid", steam_id.to_string()),
            ("include_appinfo", "1".to_string()),
            ("include_played_free_games", "1".to_string()),
        ];
        let (status, body) = self.get(OWNED_GAMES_PATH, &params).await?;
        if !status.is_success() {
            return Err(ScanError::Status {
                status: status.as_u16(),
                body,
            });
        }
        parse_owned_games(&body)
    }

    async fn player_achievements(&self, steam_id: &str, title: TitleId) -> Result<Vec<SnapshotAchievement>, ScanError> {
        let params = [
            ("steamid", steam_id.to_string()),
            ("appid", title.app_id().to_string()),
            ("l", "english".to_string()),
        ];
        let (status, body) = self.get(PLAYER_ACHIEVEMENTS_PATH, &params).await?;

        // Games without stats answer 400 with a playerstats error body
        match parse_player_achievements(&body) {
            Err(ScanError::Parse(_)) if !status.is_success() => Err(ScanError::Status {
                status: status.as_u16(),
                body,
            }),
            result => result,
        }
    }
}
