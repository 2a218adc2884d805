//! Helpers for exercising the engine in tests.

use toto_types::{
    MatchOutcome, MatchPick, PoolId, PoolMatch, ProviderPaymentStatus, UserId, MATCHES_PER_POOL,
};

use crate::engine::Engine;
use crate::handlers::lifecycle::{MatchResultUpdate, ResultUpdate};

pub fn sample_matches(count: usize) -> Vec<PoolMatch> {
    (0..count)
        .map(|i| PoolMatch::new(format!("Home{i}"), format!("Away{i}"), i as u64))
        .collect()
}

/// Create an open pool of fifteen matches with the given deadline.
pub fn open_pool(engine: &mut Engine, deadline_ms: u64) -> PoolId {
    engine
        .create_pool(
            "Test Round".to_string(),
            deadline_ms,
            sample_matches(MATCHES_PER_POOL),
        )
        .expect("pool creation")
}

/// Full coverage with the same single outcome for every match.
pub fn single_picks(outcome: MatchOutcome) -> Vec<MatchPick> {
    (0..MATCHES_PER_POOL)
        .map(|match_index| MatchPick {
            match_index,
            chosen: vec![outcome],
        })
        .collect()
}

/// Full coverage hitting exactly `correct` matches when every result is
/// `MatchOutcome::Home`.
pub fn picks_correct_first_n(correct: usize) -> Vec<MatchPick> {
    (0..MATCHES_PER_POOL)
        .map(|match_index| MatchPick {
            match_index,
            chosen: if match_index < correct {
                vec![MatchOutcome::Home]
            } else {
                vec![MatchOutcome::Away]
            },
        })
        .collect()
}

/// Fund a user through the deposit path so the ledger stays auditable.
pub fn fund_user(engine: &mut Engine, user: &UserId, amount: u64) {
    let deposit = engine
        .create_deposit(
            user,
            "USDT".to_string(),
            "TRC20".to_string(),
            amount,
            0,
        )
        .expect("deposit intent");
    engine
        .apply_deposit_notification(&deposit, ProviderPaymentStatus::Paid, amount, "PAID", 0)
        .expect("deposit credit");
}

/// Submit the same result for every match of a closed pool.
pub fn resolve_all(engine: &mut Engine, pool: &PoolId, outcome: MatchOutcome) {
    let updates = (0..MATCHES_PER_POOL)
        .map(|match_index| MatchResultUpdate {
            match_index,
            update: ResultUpdate::Outcome(outcome),
        })
        .collect();
    let report = engine.submit_results(pool, updates).expect("results");
    assert!(report.all_resolved);
}
