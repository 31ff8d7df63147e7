//! Client library discovery.
//!
//! Probes install directories for the vendor client library and collects
//! companion libraries shipped next to the tool. Registry lookups are not
//! performed; configure `client.install_dir` when the client lives elsewhere.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Client library file names, most specific first
pub const CLIENT_LIBRARY_NAMES: &[&str] = &[
    "steamclient64.dll",
    "steamclient.dll",
    "linux64/steamclient.so",
    "steamclient.so",
];

/// Companion library file names
pub const COMPANION_NAMES: &[&str] = &["steam_api64.dll", "steam_api.dll", "libsteam_api.so"];

/// Located client library and its companions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientLibrary {
    pub install_dir: PathBuf,
    pub client_library: PathBuf,
    pub companions: Vec<PathBuf>,
}

/// Discovery failures. Fatal for a run.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Client library not found ({} locations searched)", .searched.len())]
    NotFound { searched: Vec<PathBuf> },
}

/// Probes candidate directories for the client library.
#[derive(Debug, Clone, Default)]
pub struct ClientLocator {
    install_dirs: Vec<PathBuf>,
    companion_dirs: Vec<PathBuf>,
}

impl ClientLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locator seeded with an optional configured install dir, then platform defaults
    pub fn from_config(install_dir: Option<&Path>) -> Self {
        let mut locator = Self::new();
        if let Some(dir) = install_dir {
            locator = locator.with_install_dir(dir);
        }
        locator.with_defaults()
    }

    pub fn with_install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.install_dirs.push(dir.into());
        self
    }

    pub fn with_companion_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.companion_dirs.push(dir.into());
        self
    }

    /// Append the platform default install dirs and working-directory companion dirs
    pub fn with_defaults(mut self) -> Self {
        self.install_dirs.push(PathBuf::from(r"C:\Program Files (x86)\Steam"));
        self.install_dirs.push(PathBuf::from(r"C:\Program Files\Steam"));
        if let Some(home) = dirs::home_dir() {
            self.install_dirs.push(home.join(".steam").join("steam"));
        }
        if let Some(data) = dirs::data_local_dir() {
            self.install_dirs.push(data.join("Steam"));
        }

        if let Ok(cwd) = std::env::current_dir() {
            self.companion_dirs.push(cwd.join("DLLs").join("win64"));
            self.companion_dirs.push(cwd.join("DLLs"));
            self.companion_dirs.push(cwd);
        }
        self
    }

    pub fn install_dirs(&self) -> &[PathBuf] {
        &self.install_dirs
    }

    /// Find the first client library across install dirs
    pub fn locate(&self) -> Result<ClientLibrary, DiscoveryError> {
        let mut searched = Vec::new();

        for dir in &self.install_dirs {
            for name in CLIENT_LIBRARY_NAMES {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    log::info!("Found client library at {}", candidate.display());
                    return Ok(ClientLibrary {
                        install_dir: dir.clone(),
                        client_library: candidate,
                        companions: self.companions(dir),
                    });
                }
                searched.push(candidate);
            }
        }

        log::warn!("Client library not found in {} locations", searched.len());
        Err(DiscoveryError::NotFound { searched })
    }

    fn companions(&self, install_dir: &Path) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = Vec::new();
        for dir in self.companion_dirs.iter().map(PathBuf::as_path).chain(std::iter::once(install_dir)) {
            for name in COMPANION_NAMES {
                let candidate = dir.join(name);
                if candidate.is_file() && !found.contains(&candidate) {
                    found.push(candidate);
                }
            }
        }
        found
    }
}
