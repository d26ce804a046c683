//! Core identifier and amount types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("amount overflow")]
pub struct AmountOverflowError;

/// Opaque identifier for one schedulable fixture (8 bytes).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
pub struct FixtureId(pub [u8; 8]);

impl FixtureId {
    pub fn new(data: [u8; 8]) -> Self {
        Self(data)
    }

    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl std::fmt::Display for FixtureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Participant account identifier (20 bytes).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
pub struct AccountId(pub [u8; 20]);

impl AccountId {
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Outcome code for an unresolved fixture.
pub const OUTCOME_UNRESOLVED: u8 = 0;

/// One of the three mutually exclusive outcomes of a fixture.
///
/// Wire codes: 1 = Home, 2 = Away, 3 = Draw; 0 means unresolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Home,
    Away,
    Draw,
}

impl Position {
    /// Maps a resolved outcome code to a position. Code 0 (unresolved) and
    /// any code outside 1..=3 map to `None`: such outcomes have no winning
    /// side, so nothing staked can match them.
    pub fn from_outcome_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Home),
            2 => Some(Self::Away),
            3 => Some(Self::Draw),
            _ => None,
        }
    }

    pub fn outcome_code(&self) -> u8 {
        match self {
            Self::Home => 1,
            Self::Away => 2,
            Self::Draw => 3,
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Home => "home",
            Self::Away => "away",
            Self::Draw => "draw",
        };
        write!(f, "{name}")
    }
}
