//! Pool lifecycle transitions: open → closed → completed, with cancellation
//! reachable from any non-terminal status.

use serde::Serialize;
use tracing::info;

use toto_types::{
    apply_bps, EntryStatus, EntryType, GamePool, MatchOutcome, PoolId, PoolMatch, PoolStatus,
    RelatedEntity, TierAmounts, MATCHES_PER_POOL, MAX_NAME_LENGTH,
};

use crate::engine::Engine;
use crate::error::{EngineError, Result};

/// Result or cancellation submitted for one match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultUpdate {
    Outcome(MatchOutcome),
    Cancel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchResultUpdate {
    pub match_index: usize,
    pub update: ResultUpdate,
}

/// Outcome of a (possibly partial) result submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ResultsOutcome {
    pub resolved_matches: usize,
    /// True once every match carries a result or cancellation flag; the pool
    /// is then eligible for settlement but stays `closed` until settled.
    pub all_resolved: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CancelOutcome {
    /// Pool cancelled; stakes refunded.
    Refunded { predictions: usize, total: u64 },
    /// The pool was already cancelled and refunded; no-op.
    AlreadyRefunded,
}

impl Engine {
    /// Create a pool of exactly fifteen matches with `status = open`.
    pub fn create_pool(
        &mut self,
        name: String,
        deadline_ms: u64,
        matches: Vec<PoolMatch>,
    ) -> Result<PoolId> {
        if name.is_empty() || name.len() > MAX_NAME_LENGTH {
            return Err(EngineError::validation(format!(
                "pool name length must be 1..={MAX_NAME_LENGTH}"
            )));
        }
        let id = PoolId::generate();
        let pool = GamePool::new(id, name, deadline_ms, matches)
            .map_err(|err| EngineError::validation(err.to_string()))?;
        self.store.insert_pool(pool);
        Ok(id)
    }

    /// Transition a pool open → closed and freeze its pot.
    ///
    /// Snapshot on entry: `total_pot` = sum of all prediction prices,
    /// commission at the configured rate, tier amounts pre-allocated from the
    /// remaining prize pool. Per-winner amounts are divided at settlement.
    pub fn close_pool(&mut self, pool_id: &PoolId, now_ms: u64) -> Result<()> {
        let pool = self.pool(pool_id)?;
        if pool.status != PoolStatus::Open {
            return Err(EngineError::conflict("pool", pool.status.as_str(), "open"));
        }

        let total_pot = self
            .store
            .predictions_for_pool(pool_id)
            .iter()
            .filter_map(|id| self.store.prediction(id))
            .filter(|prediction| !prediction.is_refunded)
            .map(|prediction| prediction.price)
            .fold(0u64, u64::saturating_add);

        let commission_amount = apply_bps(total_pot, self.config.commission_bps);
        let prize_pool = total_pot.saturating_sub(commission_amount);
        let prizes = TierAmounts {
            first: apply_bps(prize_pool, self.config.first_tier_bps),
            second: apply_bps(prize_pool, self.config.second_tier_bps),
            third: apply_bps(prize_pool, self.config.third_tier_bps),
        };

        let pool = self
            .store
            .pool_mut(pool_id)
            .ok_or(EngineError::not_found("pool"))?;
        pool.status = PoolStatus::Closed;
        pool.total_pot = total_pot;
        pool.commission_amount = commission_amount;
        pool.prize_pool = prize_pool;
        pool.prizes = prizes;

        info!(
            pool = %pool_id,
            total_pot,
            commission_amount,
            prize_pool,
            closed_at_ms = now_ms,
            "pool closed"
        );
        Ok(())
    }

    /// Record results for a subset of matches. The pool stays `closed` until
    /// all matches are resolved; a result may be corrected by re-submission
    /// while the pool is still `closed`.
    pub fn submit_results(
        &mut self,
        pool_id: &PoolId,
        updates: Vec<MatchResultUpdate>,
    ) -> Result<ResultsOutcome> {
        let pool = self.pool(pool_id)?;
        if pool.status != PoolStatus::Closed {
            return Err(EngineError::conflict(
                "pool",
                pool.status.as_str(),
                "closed",
            ));
        }
        for update in &updates {
            if update.match_index >= MATCHES_PER_POOL {
                return Err(EngineError::validation(format!(
                    "match index {} out of range (0..{MATCHES_PER_POOL})",
                    update.match_index
                )));
            }
        }

        let pool = self
            .store
            .pool_mut(pool_id)
            .ok_or(EngineError::not_found("pool"))?;
        for update in updates {
            let entry = &mut pool.matches[update.match_index];
            match update.update {
                ResultUpdate::Outcome(outcome) => {
                    entry.result = Some(outcome);
                    entry.is_cancelled = false;
                }
                ResultUpdate::Cancel => {
                    entry.result = None;
                    entry.is_cancelled = true;
                }
            }
        }

        let resolved_matches = pool.matches.iter().filter(|m| m.is_resolved()).count();
        Ok(ResultsOutcome {
            resolved_matches,
            all_resolved: resolved_matches == MATCHES_PER_POOL,
        })
    }

    /// Cancel a pool from any non-terminal status, refunding every unrefunded
    /// prediction. Calling again on a cancelled pool is an idempotent no-op.
    pub fn cancel_pool(&mut self, pool_id: &PoolId, now_ms: u64) -> Result<CancelOutcome> {
        let pool = self.pool(pool_id)?;
        match pool.status {
            PoolStatus::Cancelled if pool.is_refunded => {
                return Ok(CancelOutcome::AlreadyRefunded)
            }
            PoolStatus::Completed => {
                return Err(EngineError::conflict(
                    "pool",
                    pool.status.as_str(),
                    "open or closed",
                ))
            }
            _ => {}
        }

        let mut refunded = 0usize;
        let mut total = 0u64;
        for prediction_id in self.store.predictions_for_pool(pool_id) {
            let Some(prediction) = self.store.prediction(&prediction_id) else {
                continue;
            };
            if prediction.is_refunded {
                continue;
            }
            let (user, price) = (prediction.user, prediction.price);
            self.credit_user(
                &user,
                price,
                EntryType::Refund,
                EntryStatus::Completed,
                "pool cancelled: stake refund".to_string(),
                Some(RelatedEntity::Prediction(prediction_id)),
                now_ms,
            )?;
            if let Some(prediction) = self.store.prediction_mut(&prediction_id) {
                prediction.is_refunded = true;
            }
            refunded += 1;
            total = total.saturating_add(price);
        }

        let pool = self
            .store
            .pool_mut(pool_id)
            .ok_or(EngineError::not_found("pool"))?;
        pool.status = PoolStatus::Cancelled;
        pool.is_refunded = true;

        info!(pool = %pool_id, refunded, total, "pool cancelled and refunded");
        Ok(CancelOutcome::Refunded {
            predictions: refunded,
            total,
        })
    }
}
