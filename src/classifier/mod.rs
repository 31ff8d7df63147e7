//! Achievement classification.
//!
//! Decides, from an achievement's identifier and metadata, whether it may be
//! unlocked automatically. The decision is a pure function of the record and
//! an injected [`ProtectionPolicy`].

mod policy;
mod verdict;

pub use policy::{MetadataExpectation, MetadataRule, PolicyError, ProtectionPolicy};
pub use verdict::ClassificationVerdict;

use crate::domain::AchievementRecord;

/// Applies the ordered decision table to achievement records.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    policy: ProtectionPolicy,
}

impl Classifier {
    pub fn new(policy: ProtectionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ProtectionPolicy {
        &self.policy
    }

    /// Classify one record. First matching rule wins:
    /// 1. already unlocked
    /// 2. identifier matches a protected pattern
    /// 3. metadata matches a protection rule
    /// 4. eligible
    pub fn classify(&self, record: &AchievementRecord) -> ClassificationVerdict {
        if record.unlocked {
            ClassificationVerdict::AlreadyUnlocked
        } else if self.policy.protects_id(&record.id) {
            ClassificationVerdict::ProtectedById
        } else if self.policy.protects_metadata(record) {
            ClassificationVerdict::ProtectedByMetadata
        } else {
            ClassificationVerdict::Eligible
        }
    }

    /// Classify a whole listing, keeping the listing order
    pub fn classify_all(&self, records: Vec<AchievementRecord>) -> Vec<(AchievementRecord, ClassificationVerdict)> {
        records
            .into_iter()
            .map(|record| {
                let verdict = self.classify(&record);
                (record, verdict)
            })
            .collect()
    }
}
