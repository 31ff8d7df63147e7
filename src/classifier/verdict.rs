//! Classification verdicts.

use std::fmt;

use serde::Serialize;

use crate::domain::SkipReason;

/// Result of classifying one achievement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationVerdict {
    Eligible,
    ProtectedById,
    ProtectedByMetadata,
    AlreadyUnlocked,
}

impl ClassificationVerdict {
    pub fn is_eligible(&self) -> bool {
        matches!(self, ClassificationVerdict::Eligible)
    }

    pub fn is_protected(&self) -> bool {
        matches!(
            self,
            ClassificationVerdict::ProtectedById | ClassificationVerdict::ProtectedByMetadata
        )
    }

    /// Skip reason for non-eligible verdicts
    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            ClassificationVerdict::Eligible => None,
            ClassificationVerdict::ProtectedById | ClassificationVerdict::ProtectedByMetadata => {
                Some(SkipReason::Protected)
            }
            ClassificationVerdict::AlreadyUnlocked => Some(SkipReason::AlreadyUnlocked),
        }
    }
}

impl fmt::Display for ClassificationVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ClassificationVerdict::Eligible => "eligible",
            ClassificationVerdict::ProtectedById => "protected (id)",
            ClassificationVerdict::ProtectedByMetadata => "protected (metadata)",
            ClassificationVerdict::AlreadyUnlocked => "already unlocked",
        };
        f.write_str(text)
    }
}
