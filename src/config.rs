use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use unlockr::classifier::{MetadataRule, PolicyError, ProtectionPolicy};
use unlockr::domain::MetadataValue;
use unlockr::domain::achievement::metadata_keys;
use unlockr::scan::{DEFAULT_BASE_URL, ScanConfig};
use unlockr::scheduler::EngineConfig;

/// Environment fallbacks for the web API credentials
pub const API_KEY_ENV: &str = "STEAM_API_KEY";
pub const STEAM_ID_ENV: &str = "STEAM_ID";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub engine: EngineSection,
    pub protection: ProtectionSection,
    pub client: ClientSection,
    pub web_api: WebApiSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub concurrency_limit: usize,
    pub init_timeout_ms: u64,
    pub title_cooldown_ms: u64,
    pub progress_buffer: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            concurrency_limit: 4,
            init_timeout_ms: 5000,
            title_cooldown_ms: 1000,
            progress_buffer: 256,
        }
    }
}

/// Rule matching one metadata key. Without `equals` the key must be truthy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRuleConfig {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<MetadataValue>,
}

impl MetadataRuleConfig {
    fn to_rule(&self) -> MetadataRule {
        match &self.equals {
            Some(value) => MetadataRule::equals(self.key.clone(), value.clone()),
            None => MetadataRule::truthy(self.key.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectionSection {
    pub id_patterns: Vec<String>,
    pub case_insensitive: bool,
    pub metadata_rules: Vec<MetadataRuleConfig>,
}

impl Default for ProtectionSection {
    fn default() -> Self {
        Self {
            id_patterns: Vec::new(),
            case_insensitive: false,
            metadata_rules: vec![MetadataRuleConfig {
                key: metadata_keys::PROTECTED.to_string(),
                equals: None,
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSection {
    pub install_dir: Option<PathBuf>,
    pub snapshot_path: PathBuf,
    pub require_library: bool,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            install_dir: None,
            snapshot_path: PathBuf::from("data.json"),
            require_library: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebApiSection {
    pub api_key: Option<String>,
    pub steam_id: Option<String>,
    pub base_url: String,
    pub concurrency: usize,
    pub request_delay_ms: u64,
    pub save_every: usize,
    pub timeout_ms: u64,
}

impl Default for WebApiSection {
    fn default() -> Self {
        Self {
            api_key: None,
            steam_id: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            concurrency: 8,
            request_delay_ms: 50,
            save_every: 100,
            timeout_ms: 30000,
        }
    }
}

/// A configured value, else the named environment variable. Blank values count as unset.
fn credential(configured: Option<&str>, env_var: &str) -> Option<String> {
    configured
        .map(str::to_string)
        .or_else(|| std::env::var(env_var).ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            engine: EngineSection::default(),
            protection: ProtectionSection::default(),
            client: ClientSection::default(),
            web_api: WebApiSection::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            concurrency_limit: self.engine.concurrency_limit,
            init_timeout: Duration::from_millis(self.engine.init_timeout_ms),
            title_cooldown: Duration::from_millis(self.engine.title_cooldown_ms),
            progress_buffer: self.engine.progress_buffer,
        }
    }

    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            concurrency: self.web_api.concurrency,
            request_delay: Duration::from_millis(self.web_api.request_delay_ms),
            save_every: self.web_api.save_every,
        }
    }

    pub fn api_key(&self) -> Option<String> {
        credential(self.web_api.api_key.as_deref(), API_KEY_ENV)
    }

    pub fn steam_id(&self) -> Option<String> {
        credential(self.web_api.steam_id.as_deref(), STEAM_ID_ENV)
    }

    /// Build the protection policy. Fails on the first invalid id pattern.
    pub fn protection_policy(&self) -> std::result::Result<ProtectionPolicy, PolicyError> {
        let mut policy = ProtectionPolicy::empty().case_insensitive(self.protection.case_insensitive);
        for pattern in &self.protection.id_patterns {
            policy = policy.with_id_pattern(pattern)?;
        }
        Ok(self
            .protection
            .metadata_rules
            .iter()
            .fold(policy, |policy, rule| policy.with_metadata_rule(rule.to_rule())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use unlockr::domain::AchievementRecord;

    fn write_config(yaml: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.log_level.as_deref(), Some("info"));
        assert_eq!(config.engine.concurrency_limit, 4);
        assert_eq!(config.client.snapshot_path, PathBuf::from("data.json"));
        assert!(config.client.require_library);

        let engine = config.engine_config();
        assert_eq!(engine.init_timeout, Duration::from_secs(5));
        assert_eq!(engine.title_cooldown, Duration::from_secs(1));
        assert_eq!(engine.progress_buffer, 256);
    }

    #[test]
    fn test_load_explicit_path_with_partial_sections() {
        let file = write_config(
            r#"
engine:
  concurrency_limit: 2
client:
  require_library: false
"#,
        );
        let config = Config::load(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(config.engine.concurrency_limit, 2);
        assert_eq!(config.engine.init_timeout_ms, 5000);
        assert!(!config.client.require_library);
        assert_eq!(config.protection.metadata_rules.len(), 1);
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let path = PathBuf::from("/nonexistent/unlockr.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_load_invalid_yaml_fails() {
        let file = write_config("engine: [not, a, map");
        assert!(Config::load(Some(&file.path().to_path_buf())).is_err());
    }

    #[test]
    fn test_default_policy_protects_metadata_flag() {
        let policy = Config::default().protection_policy().unwrap();
        let protected = AchievementRecord::locked("SECRET").with_meta("protected", true);
        assert!(policy.protects_metadata(&protected));
        assert!(!policy.protects_metadata(&AchievementRecord::locked("PLAIN")));
        assert!(!policy.protects_id("SECRET"));
    }

    #[test]
    fn test_policy_from_yaml() {
        let file = write_config(
            r#"
protection:
  id_patterns: ["*_PROGRESS", "STAT_*"]
  case_insensitive: true
  metadata_rules:
    - key: hidden
    - key: category
      equals: story
"#,
        );
        let config = Config::load(Some(&file.path().to_path_buf())).unwrap();
        let policy = config.protection_policy().unwrap();

        assert!(policy.protects_id("secret_progress"));
        assert!(policy.protects_id("STAT_KILLS"));
        assert!(!policy.protects_id("WIN_GAME"));
        assert!(policy.protects_metadata(&AchievementRecord::locked("X").with_meta("hidden", true)));
        assert!(policy.protects_metadata(&AchievementRecord::locked("Y").with_meta("category", "story")));
        assert!(!policy.protects_metadata(&AchievementRecord::locked("Z").with_meta("category", "combat")));
    }

    #[test]
    fn test_web_api_section() {
        let file = write_config(
            r#"
web_api:
  api_key: ABC123
  steam_id: "76561190000000000"
  concurrency: 3
  request_delay_ms: 0
"#,
        );
        let config = Config::load(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(config.api_key().as_deref(), Some("ABC123"));
        assert_eq!(config.steam_id().as_deref(), Some("76561190000000000"));
        assert_eq!(config.web_api.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.web_api.timeout_ms, 30000);

        let scan = config.scan_config();
        assert_eq!(scan.concurrency, 3);
        assert_eq!(scan.request_delay, Duration::ZERO);
        assert_eq!(scan.save_every, 100);
    }

    #[test]
    fn test_credential_fallback() {
        let unset = "UNLOCKR_TEST_CREDENTIAL_NEVER_SET";
        assert_eq!(credential(Some(" key "), unset).as_deref(), Some("key"));
        assert_eq!(credential(Some("   "), unset), None);
        assert_eq!(credential(None, unset), None);
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let mut config = Config::default();
        config.protection.id_patterns = vec!["[unclosed".to_string()];
        assert!(config.protection_policy().is_err());
    }
}
