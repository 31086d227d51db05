use serde::{Deserialize, Serialize};

use super::error_codes::GameError;
use crate::config::ProtocolConfig;

/// A validated player or spectator nickname.
///
/// The raw form is what other clients see; the normalized form (trimmed,
/// lowercased) is what uniqueness and ban checks run against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nickname {
    raw: String,
    normalized: String,
}

impl Nickname {
    /// Validate a client-supplied nickname against the protocol rules:
    /// surrounding whitespace is ignored, the rest must be 2-15 characters
    /// from `[A-Za-z0-9_-]`.
    pub fn parse(raw: &str, config: &ProtocolConfig) -> Result<Self, GameError> {
        let trimmed = raw.trim();
        let len = trimmed.chars().count();
        if len < config.min_nickname_length {
            return Err(GameError::InvalidNickname(format!(
                "must be at least {} characters",
                config.min_nickname_length
            )));
        }
        if len > config.max_nickname_length {
            return Err(GameError::InvalidNickname(format!(
                "must be at most {} characters",
                config.max_nickname_length
            )));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(GameError::InvalidNickname(
                "only letters, digits, '_' and '-' are allowed".to_string(),
            ));
        }

        Ok(Self {
            raw: trimmed.to_string(),
            normalized: trimmed.to_lowercase(),
        })
    }

    /// Normalize a raw string the same way `parse` does, without validating.
    /// Used for ban-list lookups where the input may predate validation.
    pub fn normalize(raw: &str) -> String {
        raw.trim().to_lowercase()
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cfg() -> ProtocolConfig {
        ProtocolConfig::default()
    }

    #[test]
    fn length_boundaries() {
        assert!(Nickname::parse("a", &cfg()).is_err()); // 1: too short
        assert!(Nickname::parse("ab", &cfg()).is_ok()); // 2: minimum
        assert!(Nickname::parse(&"x".repeat(15), &cfg()).is_ok()); // 15: maximum
        assert!(Nickname::parse(&"x".repeat(16), &cfg()).is_err()); // 16: too long
    }

    #[test]
    fn charset_is_enforced() {
        assert!(Nickname::parse("Alice_42", &cfg()).is_ok());
        assert!(Nickname::parse("bob-the-2nd", &cfg()).is_ok());
        assert!(Nickname::parse("has space", &cfg()).is_err());
        assert!(Nickname::parse("emoji💥", &cfg()).is_err());
        assert!(Nickname::parse("semi;colon", &cfg()).is_err());
        assert!(Nickname::parse("tab\tchar", &cfg()).is_err());
    }

    #[test]
    fn normalization_trims_and_lowercases() {
        let nick = Nickname::parse("  Alice  ", &cfg()).unwrap();
        assert_eq!(nick.raw(), "Alice");
        assert_eq!(nick.normalized(), "alice");

        let upper = Nickname::parse("BOB", &cfg()).unwrap();
        assert_eq!(upper.normalized(), "bob");
        assert_eq!(Nickname::normalize("  BOB "), "bob");
    }

    #[test]
    fn case_variants_normalize_identically() {
        let a = Nickname::parse("Zoe", &cfg()).unwrap();
        let b = Nickname::parse("zOE", &cfg()).unwrap();
        assert_eq!(a.normalized(), b.normalized());
        assert_ne!(a.raw(), b.raw());
    }

    fn expected_ok(raw: &str, config: &ProtocolConfig) -> bool {
        let trimmed = raw.trim();
        let len = trimmed.chars().count();
        len >= config.min_nickname_length
            && len <= config.max_nickname_length
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }

    proptest! {
        #[test]
        fn parse_matches_predicate(raw in "\\PC{0,20}") {
            let config = cfg();
            prop_assert_eq!(
                Nickname::parse(&raw, &config).is_ok(),
                expected_ok(&raw, &config)
            );
        }
    }
}
