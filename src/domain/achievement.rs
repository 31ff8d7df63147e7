//! Achievement records as reported by the client API.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Metadata keys the client API commonly reports.
pub mod metadata_keys {
    pub const NAME: &str = "name";
    pub const DESCRIPTION: &str = "description";
    pub const PROTECTED: &str = "protected";
}

/// A loosely-typed metadata value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Flag(bool),
    Text(String),
}

impl MetadataValue {
    /// Whether the value reads as "set".
    ///
    /// Text values count as truthy when they spell `true`, `yes` or `1`,
    /// since some titles report flags as strings.
    pub fn is_truthy(&self) -> bool {
        match self {
            MetadataValue::Flag(b) => *b,
            MetadataValue::Text(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1"),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            MetadataValue::Flag(_) => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Flag(b) => write!(f, "{}", b),
            MetadataValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        MetadataValue::Flag(b)
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::Text(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::Text(s)
    }
}

/// One achievement of a title.
///
/// Lives only for the duration of a title worker's pass; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementRecord {
    /// API name of the achievement (e.g. `TURRET_BREAKER`)
    pub id: String,
    /// Whether the achievement was already unlocked when listed
    pub unlocked: bool,
    /// Display name, hidden flag, icon path and whatever else the title reports
    #[serde(default)]
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl AchievementRecord {
    /// Create a locked achievement with no metadata
    pub fn locked(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            unlocked: false,
            metadata: BTreeMap::new(),
        }
    }

    /// Create an already-unlocked achievement with no metadata
    pub fn unlocked(id: impl Into<String>) -> Self {
        Self {
            unlocked: true,
            ..Self::locked(id)
        }
    }

    /// Attach a metadata entry
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn meta(&self, key: &str) -> Option<&MetadataValue> {
        self.metadata.get(key)
    }

    /// Human-readable name, falling back to the API name
    pub fn display_name(&self) -> &str {
        self.meta(metadata_keys::NAME)
            .and_then(MetadataValue::as_text)
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.id)
    }
}
