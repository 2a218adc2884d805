use serde::{Deserialize, Serialize};

use super::{MatchOutcome, PoolId, PredictionId, UserId};

/// Chosen outcome set for a single match of a pool.
///
/// `chosen` is a non-empty, deduplicated subset of {1, X, 2}; covering more
/// than one outcome multiplies the stake price.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPick {
    pub match_index: usize,
    pub chosen: Vec<MatchOutcome>,
}

/// One user's full-coverage stake against a pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: PredictionId,
    pub user: UserId,
    pub pool: PoolId,
    pub picks: Vec<MatchPick>,
    /// Stake price in minor units: product of chosen-set sizes times the base
    /// stake unit.
    pub price: u64,
    pub score: u64,
    pub is_scored: bool,
    pub is_refunded: bool,
}

impl Prediction {
    pub fn new(
        id: PredictionId,
        user: UserId,
        pool: PoolId,
        picks: Vec<MatchPick>,
        price: u64,
    ) -> Self {
        Self {
            id,
            user,
            pool,
            picks,
            price,
            score: 0,
            is_scored: false,
            is_refunded: false,
        }
    }
}
