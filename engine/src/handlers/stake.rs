//! Prediction submission and the referral-commission side effect.

use tracing::debug;

use toto_types::{
    apply_bps, EntryStatus, EntryType, MatchPick, PoolId, PoolStatus, Prediction, PredictionId,
    RelatedEntity, UserId, MATCHES_PER_POOL, MAX_CHOSEN_OUTCOMES,
};

use crate::engine::Engine;
use crate::error::{EngineError, Result};

/// Stake price of a full-coverage entry: product of the chosen-set sizes
/// times the base unit cost.
pub fn stake_price(picks: &[MatchPick], base_stake_unit: u64) -> u64 {
    picks.iter().fold(base_stake_unit, |price, pick| {
        price.saturating_mul(pick.chosen.len() as u64)
    })
}

impl Engine {
    /// Submit a full-coverage prediction against an open pool.
    ///
    /// The open/deadline guard runs at write time: a stake accepted earlier in
    /// a request is still rejected here if the pool closed or the deadline
    /// passed in between.
    pub fn submit_prediction(
        &mut self,
        user_id: &UserId,
        pool_id: &PoolId,
        picks: Vec<MatchPick>,
        now_ms: u64,
    ) -> Result<PredictionId> {
        self.user(user_id)?;
        let pool = self.pool(pool_id)?;
        if pool.status != PoolStatus::Open {
            return Err(EngineError::conflict("pool", pool.status.as_str(), "open"));
        }
        if now_ms >= pool.deadline_ms {
            return Err(EngineError::validation("pool deadline has passed"));
        }

        let picks = normalize_picks(picks)?;
        if self.store.pool_has_prediction_by(pool_id, user_id) {
            return Err(EngineError::conflict(
                "prediction",
                "already submitted",
                "none for this pool",
            ));
        }

        let price = stake_price(&picks, self.config.base_stake_unit);
        let prediction_id = PredictionId::generate();
        self.debit_user(
            user_id,
            price,
            EntryType::Stake,
            EntryStatus::Completed,
            "stake".to_string(),
            Some(RelatedEntity::Prediction(prediction_id)),
            now_ms,
        )?;
        self.store.insert_prediction(Prediction::new(
            prediction_id,
            *user_id,
            *pool_id,
            picks,
            price,
        ));

        self.award_referral_commission(user_id, prediction_id, price, now_ms)?;
        Ok(prediction_id)
    }

    /// Credit the referrer once, on the referred user's first qualifying
    /// stake. The one-way `referral_commission_awarded` latch makes the award
    /// exactly-once even under concurrent submissions.
    fn award_referral_commission(
        &mut self,
        user_id: &UserId,
        prediction_id: PredictionId,
        price: u64,
        now_ms: u64,
    ) -> Result<()> {
        let user = self.user(user_id)?;
        if user.referral_commission_awarded {
            return Ok(());
        }
        let Some(referrer) = user.referrer else {
            return Ok(());
        };

        let commission = apply_bps(price, self.config.referral_bps);
        self.credit_user(
            &referrer,
            commission,
            EntryType::ReferralCommission,
            EntryStatus::Completed,
            "referral commission: first stake of referred user".to_string(),
            Some(RelatedEntity::Prediction(prediction_id)),
            now_ms,
        )?;
        if let Some(user) = self.store.user_mut(user_id) {
            user.referral_commission_awarded = true;
        }
        debug!(user = %user_id, referrer = %referrer, commission, "referral commission credited");
        Ok(())
    }
}

/// Validate full coverage: one non-empty pick per match, indexes 0..15 each
/// exactly once. Chosen sets are deduplicated in place.
fn normalize_picks(mut picks: Vec<MatchPick>) -> Result<Vec<MatchPick>> {
    if picks.len() != MATCHES_PER_POOL {
        return Err(EngineError::validation(format!(
            "prediction must cover exactly {MATCHES_PER_POOL} matches (got {})",
            picks.len()
        )));
    }
    let mut seen = [false; MATCHES_PER_POOL];
    for pick in &mut picks {
        if pick.match_index >= MATCHES_PER_POOL {
            return Err(EngineError::validation(format!(
                "match index {} out of range (0..{MATCHES_PER_POOL})",
                pick.match_index
            )));
        }
        if seen[pick.match_index] {
            return Err(EngineError::validation(format!(
                "duplicate pick for match {}",
                pick.match_index
            )));
        }
        seen[pick.match_index] = true;

        pick.chosen.sort_unstable();
        pick.chosen.dedup();
        if pick.chosen.is_empty() {
            return Err(EngineError::validation(format!(
                "empty outcome set for match {}",
                pick.match_index
            )));
        }
        if pick.chosen.len() > MAX_CHOSEN_OUTCOMES {
            return Err(EngineError::validation(format!(
                "match {} covers more than {MAX_CHOSEN_OUTCOMES} outcomes",
                pick.match_index
            )));
        }
    }
    picks.sort_unstable_by_key(|pick| pick.match_index);
    Ok(picks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{fund_user, open_pool, single_picks};
    use crate::EngineConfig;
    use toto_types::MatchOutcome;

    #[test]
    fn test_stake_price_multiplies_per_combination() {
        let mut picks = single_picks(MatchOutcome::Home);
        assert_eq!(stake_price(&picks, 100), 100);

        picks[0].chosen = vec![MatchOutcome::Home, MatchOutcome::Draw];
        picks[1].chosen = vec![MatchOutcome::Home, MatchOutcome::Draw, MatchOutcome::Away];
        assert_eq!(stake_price(&picks, 100), 600);
    }

    #[test]
    fn test_submission_requires_open_pool_and_deadline() {
        let mut engine = Engine::new(EngineConfig::default());
        let pool = open_pool(&mut engine, 10_000);
        let alice = engine.create_user("alice".to_string(), None).unwrap();
        fund_user(&mut engine, &alice, 10_000);

        // Deadline passed but still open: rejected at write time.
        let err = engine
            .submit_prediction(&alice, &pool, single_picks(MatchOutcome::Home), 10_000)
            .expect_err("deadline race must lose");
        assert!(matches!(err, EngineError::Validation(_)));

        engine.close_pool(&pool, 10_000).unwrap();
        let err = engine
            .submit_prediction(&alice, &pool, single_picks(MatchOutcome::Home), 1)
            .expect_err("closed pool rejects stakes");
        assert_eq!(err, EngineError::conflict("pool", "closed", "open"));
    }

    #[test]
    fn test_second_prediction_for_same_pool_conflicts() {
        let mut engine = Engine::new(EngineConfig::default());
        let pool = open_pool(&mut engine, 10_000);
        let alice = engine.create_user("alice".to_string(), None).unwrap();
        fund_user(&mut engine, &alice, 10_000);
        engine
            .submit_prediction(&alice, &pool, single_picks(MatchOutcome::Home), 1)
            .unwrap();
        let err = engine
            .submit_prediction(&alice, &pool, single_picks(MatchOutcome::Away), 2)
            .expect_err("one prediction per user per pool");
        assert!(matches!(err, EngineError::Conflict { .. }));
    }

    #[test]
    fn test_partial_coverage_is_rejected() {
        let mut engine = Engine::new(EngineConfig::default());
        let pool = open_pool(&mut engine, 10_000);
        let alice = engine.create_user("alice".to_string(), None).unwrap();
        fund_user(&mut engine, &alice, 10_000);

        let mut short = single_picks(MatchOutcome::Home);
        short.pop();
        assert!(engine
            .submit_prediction(&alice, &pool, short, 1)
            .is_err());

        let mut duplicated = single_picks(MatchOutcome::Home);
        duplicated[1].match_index = 0;
        assert!(engine
            .submit_prediction(&alice, &pool, duplicated, 1)
            .is_err());

        let mut empty_set = single_picks(MatchOutcome::Home);
        empty_set[3].chosen.clear();
        assert!(engine
            .submit_prediction(&alice, &pool, empty_set, 1)
            .is_err());
    }

    #[test]
    fn test_rejected_stake_leaves_no_trace() {
        let mut engine = Engine::new(EngineConfig::default());
        let pool = open_pool(&mut engine, 10_000);
        let alice = engine.create_user("alice".to_string(), None).unwrap();
        fund_user(&mut engine, &alice, 1_000);

        // 2^15 combinations at 100/unit is far above the funded 1000.
        let mut picks = single_picks(MatchOutcome::Home);
        for pick in &mut picks {
            pick.chosen = vec![MatchOutcome::Home, MatchOutcome::Draw];
        }
        let err = engine
            .submit_prediction(&alice, &pool, picks, 1)
            .expect_err("unaffordable stake");
        assert!(matches!(err, EngineError::InsufficientFunds { .. }));
        assert_eq!(engine.user(&alice).unwrap().balance, 1_000);
        assert!(engine.store.predictions_for_pool(&pool).is_empty());
    }
}
