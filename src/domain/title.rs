//! Title identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Vendor application identifier of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TitleId(pub u32);

impl TitleId {
    pub fn new(app_id: u32) -> Self {
        Self(app_id)
    }

    pub fn app_id(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TitleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TitleId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u32>().map(TitleId)
    }
}

impl From<u32> for TitleId {
    fn from(app_id: u32) -> Self {
        Self(app_id)
    }
}
