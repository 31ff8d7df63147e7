//! Protection policy - the injectable rule table behind the classifier.

use glob::{MatchOptions, Pattern};

use crate::domain::achievement::metadata_keys;
use crate::domain::{AchievementRecord, MetadataValue};

/// Errors building a protection policy
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("Invalid protected id pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// What a metadata rule expects of its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataExpectation {
    /// Key present with a truthy value
    Truthy,
    /// Key present with exactly this value
    Equals(MetadataValue),
}

/// A single metadata protection rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRule {
    pub key: String,
    pub expect: MetadataExpectation,
}

impl MetadataRule {
    pub fn truthy(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            expect: MetadataExpectation::Truthy,
        }
    }

    pub fn equals(key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        Self {
            key: key.into(),
            expect: MetadataExpectation::Equals(value.into()),
        }
    }

    pub fn matches(&self, record: &AchievementRecord) -> bool {
        let Some(value) = record.meta(&self.key) else {
            return false;
        };
        match &self.expect {
            MetadataExpectation::Truthy => value.is_truthy(),
            // Flags compare by truthiness so "true" and true agree
            MetadataExpectation::Equals(MetadataValue::Flag(expected)) => value.is_truthy() == *expected,
            MetadataExpectation::Equals(expected) => value == expected,
        }
    }
}

/// Ordered protection rules.
///
/// Identifier patterns use glob syntax (`STAT_*`, `*_PROGRESS`, `META_?`).
#[derive(Debug, Clone)]
pub struct ProtectionPolicy {
    id_patterns: Vec<Pattern>,
    match_options: MatchOptions,
    metadata_rules: Vec<MetadataRule>,
}

impl ProtectionPolicy {
    /// A policy that protects nothing
    pub fn empty() -> Self {
        Self {
            id_patterns: Vec::new(),
            match_options: MatchOptions::new(),
            metadata_rules: Vec::new(),
        }
    }

    /// Add a protected identifier pattern
    pub fn with_id_pattern(mut self, pattern: &str) -> Result<Self, PolicyError> {
        let compiled = Pattern::new(pattern).map_err(|e| PolicyError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.msg.to_string(),
        })?;
        self.id_patterns.push(compiled);
        Ok(self)
    }

    /// Add a metadata rule
    pub fn with_metadata_rule(mut self, rule: MetadataRule) -> Self {
        self.metadata_rules.push(rule);
        self
    }

    /// Match identifier patterns without regard to case
    pub fn case_insensitive(mut self, enabled: bool) -> Self {
        self.match_options.case_sensitive = !enabled;
        self
    }

    pub fn id_patterns(&self) -> impl Iterator<Item = &str> {
        self.id_patterns.iter().map(Pattern::as_str)
    }

    pub fn metadata_rules(&self) -> &[MetadataRule] {
        &self.metadata_rules
    }

    pub fn protects_id(&self, id: &str) -> bool {
        self.id_patterns
            .iter()
            .any(|pattern| pattern.matches_with(id, self.match_options))
    }

    pub fn protects_metadata(&self, record: &AchievementRecord) -> bool {
        self.metadata_rules.iter().any(|rule| rule.matches(record))
    }
}

impl Default for ProtectionPolicy {
    /// Protects achievements whose title data sets `protected`.
    fn default() -> Self {
        Self::empty().with_metadata_rule(MetadataRule::truthy(metadata_keys::PROTECTED))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_has_protected_rule_only() {
        let policy = ProtectionPolicy::default();
        assert_eq!(policy.id_patterns().count(), 0);
        assert_eq!(policy.metadata_rules(), &[MetadataRule::truthy("protected")]);
    }

    #[test]
    fn test_glob_id_patterns() {
        let policy = ProtectionPolicy::empty()
            .with_id_pattern("STAT_*")
            .unwrap()
            .with_id_pattern("*_TRACKER")
            .unwrap();
        assert!(policy.protects_id("STAT_KILLS"));
        assert!(policy.protects_id("PLAYTIME_TRACKER"));
        assert!(!policy.protects_id("BOSS_KILLED"));
        assert!(!policy.protects_id("stat_kills"));
    }

    #[test]
    fn test_case_insensitive_patterns() {
        let policy = ProtectionPolicy::empty()
            .with_id_pattern("STAT_*")
            .unwrap()
            .case_insensitive(true);
        assert!(policy.protects_id("stat_kills"));
    }

    #[test]
    fn test_invalid_pattern() {
        let result = ProtectionPolicy::empty().with_id_pattern("[unclosed");
        assert!(matches!(result, Err(PolicyError::InvalidPattern { .. })));
    }

    #[test]
    fn test_metadata_equals_rule() {
        let rule = MetadataRule::equals("category", "anticheat");
        let matching = AchievementRecord::locked("A").with_meta("category", "anticheat");
        let other = AchievementRecord::locked("B").with_meta("category", "story");
        let missing = AchievementRecord::locked("C");
        assert!(rule.matches(&matching));
        assert!(!rule.matches(&other));
        assert!(!rule.matches(&missing));
    }

    #[test]
    fn test_metadata_flag_equals_accepts_text_flags() {
        let rule = MetadataRule::equals("protected", true);
        assert!(rule.matches(&AchievementRecord::locked("A").with_meta("protected", "true")));
        assert!(!rule.matches(&AchievementRecord::locked("B").with_meta("protected", false)));
    }
}
