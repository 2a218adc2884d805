//! Scoring and pari-mutuel prize distribution.
//!
//! Settlement is a single atomic transition `closed → completed`: every
//! prediction is scored from the full set, tiers are partitioned, and payouts
//! are credited before the status flips. There is no partially-resumable
//! scan; a repeated call observes `completed` and returns without
//! recomputation.

use serde::Serialize;
use tracing::info;

use toto_types::{
    EntryStatus, EntryType, MatchPick, PoolId, PoolMatch, PoolStatus, PredictionId, RelatedEntity,
    TierWinners, UserId,
};

use crate::engine::Engine;
use crate::error::{EngineError, Result};

/// Score one prediction against resolved matches.
///
/// A match contributes the per-match score when its result is a member of the
/// prediction's chosen set, and zero otherwise. Cancelled matches contribute
/// zero to every prediction.
pub fn score_prediction(
    matches: &[PoolMatch],
    picks: &[MatchPick],
    points_per_correct: u64,
) -> u64 {
    picks
        .iter()
        .map(|pick| {
            let Some(game) = matches.get(pick.match_index) else {
                return 0;
            };
            if game.is_cancelled {
                return 0;
            }
            match game.result {
                Some(result) if pick.chosen.contains(&result) => points_per_correct,
                _ => 0,
            }
        })
        .sum()
}

/// The top three distinct positive scores, descending.
fn top_three_distinct_scores(scores: &[u64]) -> [Option<u64>; 3] {
    let mut distinct: Vec<u64> = scores.iter().copied().filter(|score| *score > 0).collect();
    distinct.sort_unstable_by(|a, b| b.cmp(a));
    distinct.dedup();
    [
        distinct.first().copied(),
        distinct.get(1).copied(),
        distinct.get(2).copied(),
    ]
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SettlementOutcome {
    /// The pool was already `completed`; nothing recomputed.
    AlreadySettled,
    Settled {
        paid_total: u64,
        /// Prize money retained by the platform: empty-tier amounts plus
        /// equal-split and basis-point rounding remainders.
        undistributed: u64,
    },
}

/// Amount already auto-credited to the claimant at settlement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ClaimOutcome {
    pub amount: u64,
}

impl Engine {
    /// Score a closed, fully-resolved pool and distribute its prizes.
    pub fn settle_pool(&mut self, pool_id: &PoolId, now_ms: u64) -> Result<SettlementOutcome> {
        let pool = self.pool(pool_id)?;
        match pool.status {
            PoolStatus::Completed => return Ok(SettlementOutcome::AlreadySettled),
            PoolStatus::Closed => {}
            other => {
                return Err(EngineError::conflict("pool", other.as_str(), "closed"));
            }
        }
        if !pool.all_matches_resolved() {
            return Err(EngineError::validation(
                "cannot settle: unresolved matches remain",
            ));
        }
        let matches = pool.matches.clone();
        let prizes = pool.prizes;
        let prize_pool_amount = pool.prize_pool;

        let mut scored: Vec<(PredictionId, UserId, u64)> = Vec::new();
        for prediction_id in self.store.predictions_for_pool(pool_id) {
            let Some(prediction) = self.store.prediction(&prediction_id) else {
                continue;
            };
            if prediction.is_refunded {
                continue;
            }
            let score = score_prediction(&matches, &prediction.picks, self.config.points_per_correct);
            scored.push((prediction_id, prediction.user, score));
        }

        for (prediction_id, user_id, score) in &scored {
            if let Some(prediction) = self.store.prediction_mut(prediction_id) {
                prediction.score = *score;
                prediction.is_scored = true;
            }
            if let Some(user) = self.store.user_mut(user_id) {
                user.score = user.score.saturating_add(*score);
            }
        }

        let scores: Vec<u64> = scored.iter().map(|(_, _, score)| *score).collect();
        let tier_scores = top_three_distinct_scores(&scores);
        let tier_amounts = [prizes.first, prizes.second, prizes.third];

        let mut winners = TierWinners::default();
        let mut paid_total = 0u64;
        for (tier_index, tier_score) in tier_scores.iter().enumerate() {
            let Some(tier_score) = tier_score else {
                continue;
            };
            let occupants: Vec<UserId> = scored
                .iter()
                .filter(|(_, _, score)| score == tier_score)
                .map(|(_, user, _)| *user)
                .collect();
            let share = tier_amounts[tier_index] / occupants.len() as u64;
            for user_id in &occupants {
                if share > 0 {
                    self.credit_user(
                        user_id,
                        share,
                        EntryType::PrizePayout,
                        EntryStatus::Completed,
                        format!("prize payout: tier {}", tier_index + 1),
                        Some(RelatedEntity::Pool(*pool_id)),
                        now_ms,
                    )?;
                    paid_total = paid_total.saturating_add(share);
                }
            }
            match tier_index {
                0 => winners.first = occupants,
                1 => winners.second = occupants,
                _ => winners.third = occupants,
            }
        }

        let undistributed = prize_pool_amount.saturating_sub(paid_total);
        let pool = self
            .store
            .pool_mut(pool_id)
            .ok_or(EngineError::not_found("pool"))?;
        pool.winners = winners;
        pool.undistributed = undistributed;
        pool.status = PoolStatus::Completed;

        info!(
            pool = %pool_id,
            predictions = scored.len(),
            paid_total,
            undistributed,
            settled_at_ms = now_ms,
            "pool settled"
        );
        Ok(SettlementOutcome::Settled {
            paid_total,
            undistributed,
        })
    }

    /// Idempotent claim guard on the auto-credit: succeeds when a prize
    /// payout ledger entry already exists for this user and pool.
    pub fn claim_prize(&self, user_id: &UserId, pool_id: &PoolId) -> Result<ClaimOutcome> {
        let pool = self.pool(pool_id)?;
        if pool.status != PoolStatus::Completed {
            return Err(EngineError::conflict(
                "pool",
                pool.status.as_str(),
                "completed",
            ));
        }
        self.user(user_id)?;
        let amount: u64 = self
            .ledger_entries(user_id)
            .iter()
            .filter(|entry| {
                entry.entry_type == EntryType::PrizePayout
                    && entry.related == Some(RelatedEntity::Pool(*pool_id))
            })
            .map(|entry| entry.amount.max(0) as u64)
            .sum();
        if amount == 0 {
            return Err(EngineError::not_found("prize payout"));
        }
        Ok(ClaimOutcome { amount })
    }
}
