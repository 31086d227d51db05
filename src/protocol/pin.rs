use rand::RngExt;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error_codes::GameError;

/// Number of digits in a room PIN.
pub const PIN_LENGTH: usize = 6;

/// Public 6-digit identifier of a room, unique while the room lives.
///
/// Value object: equality and hashing are by digit string. Allocation against
/// the live-room index happens in the store; this type only draws and
/// validates candidates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pin(String);

impl Pin {
    /// Draw six uniform random digits.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let digits = (0..PIN_LENGTH)
            .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
            .collect();
        Self(digits)
    }

    /// Parse a client-supplied PIN, rejecting anything that is not exactly
    /// six ASCII digits.
    pub fn parse(raw: &str) -> Result<Self, GameError> {
        if Self::is_valid(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(GameError::InvalidPin(format!(
                "expected exactly {PIN_LENGTH} digits"
            )))
        }
    }

    pub fn is_valid(raw: &str) -> bool {
        raw.len() == PIN_LENGTH && raw.bytes().all(|b| b.is_ascii_digit())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn generated_pins_are_always_valid() {
        for _ in 0..1000 {
            let pin = Pin::generate();
            assert!(Pin::is_valid(pin.as_str()));
        }
    }

    #[test]
    fn generation_spreads_over_the_pin_space() {
        let pins: HashSet<_> = (0..200).map(|_| Pin::generate()).collect();
        // 200 draws from a million values collide rarely; > 190 distinct is
        // far beyond any realistic bias.
        assert!(pins.len() > 190);
    }

    #[test]
    fn parse_accepts_six_digits_only() {
        assert!(Pin::parse("123456").is_ok());
        assert!(Pin::parse("000000").is_ok());
        assert!(Pin::parse("12345").is_err());
        assert!(Pin::parse("1234567").is_err());
        assert!(Pin::parse("12345a").is_err());
        assert!(Pin::parse("12 456").is_err());
        assert!(Pin::parse("").is_err());
        // Non-ASCII digits must not pass
        assert!(Pin::parse("１２３４５６").is_err());
    }

    #[test]
    fn serde_round_trips_as_plain_string() {
        let pin = Pin::parse("987654").unwrap();
        let json = serde_json::to_string(&pin).unwrap();
        assert_eq!(json, "\"987654\"");
        let back: Pin = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pin);
    }

    proptest! {
        #[test]
        fn parse_matches_validity_predicate(raw in "\\PC{0,8}") {
            let expected = raw.len() == PIN_LENGTH && raw.bytes().all(|b| b.is_ascii_digit());
            prop_assert_eq!(Pin::parse(&raw).is_ok(), expected);
        }
    }
}
