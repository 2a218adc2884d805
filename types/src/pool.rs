use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

use super::{PoolId, UserId, MATCHES_PER_POOL};

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum PoolInvariantError {
    #[error("pool requires exactly {expected} matches (got {got})")]
    WrongMatchCount { got: usize, expected: usize },
}

/// Outcome of a single match: home win, draw, or away win.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MatchOutcome {
    Home = 0,
    Draw = 1,
    Away = 2,
}

impl MatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchOutcome::Home => "1",
            MatchOutcome::Draw => "X",
            MatchOutcome::Away => "2",
        }
    }
}

impl TryFrom<u8> for MatchOutcome {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MatchOutcome::Home),
            1 => Ok(MatchOutcome::Draw),
            2 => Ok(MatchOutcome::Away),
            _ => Err(()),
        }
    }
}

/// One fixture inside a pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolMatch {
    pub home: String,
    pub away: String,
    pub kickoff_ms: u64,
    pub result: Option<MatchOutcome>,
    pub is_cancelled: bool,
}

impl PoolMatch {
    pub fn new(home: String, away: String, kickoff_ms: u64) -> Self {
        Self {
            home,
            away,
            kickoff_ms,
            result: None,
            is_cancelled: false,
        }
    }

    /// A match is resolved once it carries a result or a cancellation flag.
    pub fn is_resolved(&self) -> bool {
        self.is_cancelled || self.result.is_some()
    }
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolStatus {
    Open = 0,
    Closed = 1,
    Completed = 2,
    Cancelled = 3,
}

impl PoolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolStatus::Open => "open",
            PoolStatus::Closed => "closed",
            PoolStatus::Completed => "completed",
            PoolStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal statuses admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PoolStatus::Completed | PoolStatus::Cancelled)
    }
}

impl TryFrom<u8> for PoolStatus {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PoolStatus::Open),
            1 => Ok(PoolStatus::Closed),
            2 => Ok(PoolStatus::Completed),
            3 => Ok(PoolStatus::Cancelled),
            _ => Err(()),
        }
    }
}

/// Absolute prize amounts pre-allocated to each tier at pool closure.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierAmounts {
    pub first: u64,
    pub second: u64,
    pub third: u64,
}

impl TierAmounts {
    pub fn total(&self) -> u64 {
        self.first
            .saturating_add(self.second)
            .saturating_add(self.third)
    }
}

/// Winning users per tier, recorded at settlement.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierWinners {
    pub first: Vec<UserId>,
    pub second: Vec<UserId>,
    pub third: Vec<UserId>,
}

/// One round of fifteen matches users stake predictions against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamePool {
    pub id: PoolId,
    pub name: String,
    pub matches: Vec<PoolMatch>,
    pub deadline_ms: u64,
    pub status: PoolStatus,
    /// Sum of all prediction prices, frozen at closure.
    pub total_pot: u64,
    pub commission_amount: u64,
    pub prize_pool: u64,
    pub prizes: TierAmounts,
    pub winners: TierWinners,
    /// Prize money no tier occupant qualified for, plus equal-split
    /// remainders. Retained as platform revenue.
    pub undistributed: u64,
    pub is_refunded: bool,
}

impl GamePool {
    pub fn new(
        id: PoolId,
        name: String,
        deadline_ms: u64,
        matches: Vec<PoolMatch>,
    ) -> Result<Self, PoolInvariantError> {
        if matches.len() != MATCHES_PER_POOL {
            return Err(PoolInvariantError::WrongMatchCount {
                got: matches.len(),
                expected: MATCHES_PER_POOL,
            });
        }
        Ok(Self {
            id,
            name,
            matches,
            deadline_ms,
            status: PoolStatus::Open,
            total_pot: 0,
            commission_amount: 0,
            prize_pool: 0,
            prizes: TierAmounts::default(),
            winners: TierWinners::default(),
            undistributed: 0,
            is_refunded: false,
        })
    }

    pub fn all_matches_resolved(&self) -> bool {
        self.matches.iter().all(PoolMatch::is_resolved)
    }
}
