//! Cross-cutting reconciliation properties: webhook idempotency, withdrawal
//! compensation, referral exactly-once, and ledger/balance audit.

use toto_types::{
    EntryStatus, EntryType, MatchOutcome, ProviderPaymentStatus, WithdrawalStatus,
};

use crate::mocks::{fund_user, open_pool, single_picks};
use crate::{Engine, EngineConfig, EngineError, WebhookOutcome};

#[test]
fn test_webhook_redelivery_credits_once() {
    let mut engine = Engine::new(EngineConfig::default());
    let alice = engine.create_user("alice".to_string(), None).unwrap();
    let deposit = engine
        .create_deposit(&alice, "BTC".to_string(), "BTC".to_string(), 7_000, 1)
        .unwrap();

    let first = engine
        .apply_deposit_notification(&deposit, ProviderPaymentStatus::Paid, 7_000, "PAID", 2)
        .unwrap();
    assert_eq!(first, WebhookOutcome::Credited { amount: 7_000 });

    // At-least-once delivery: the provider sends the same payload again.
    let second = engine
        .apply_deposit_notification(&deposit, ProviderPaymentStatus::Paid, 7_000, "PAID", 3)
        .unwrap();
    assert_eq!(second, WebhookOutcome::AlreadyProcessed);

    assert_eq!(engine.user(&alice).unwrap().balance, 7_000);
    let deposit_entries = engine
        .ledger_entries(&alice)
        .iter()
        .filter(|entry| entry.entry_type == EntryType::Deposit)
        .count();
    assert_eq!(deposit_entries, 1, "exactly one credit for one intent");
    engine.audit_user(&alice).unwrap();
}

#[test]
fn test_withdrawal_compensation_restores_exact_amount() {
    let mut engine = Engine::new(EngineConfig::default());
    let alice = engine.create_user("alice".to_string(), None).unwrap();
    fund_user(&mut engine, &alice, 10_000);

    let id = engine
        .request_withdrawal(&alice, 4_000, "TAddr".to_string(), "TRC20".to_string(), 1)
        .unwrap();
    assert_eq!(engine.user(&alice).unwrap().balance, 6_000);

    // Provider rejected the payout task: compensate.
    engine.fail_withdrawal(&id, 2).unwrap();
    assert_eq!(engine.user(&alice).unwrap().balance, 10_000);

    let withdrawal = engine.withdrawal(&id).unwrap();
    assert_eq!(withdrawal.status, WithdrawalStatus::Failed);
    let entries = engine.ledger_entries(&alice);
    let reservation = entries
        .iter()
        .find(|entry| entry.id == withdrawal.ledger_entry)
        .unwrap();
    assert_eq!(reservation.status, EntryStatus::Failed);

    let refund: i64 = engine
        .ledger_entries(&alice)
        .iter()
        .filter(|entry| entry.entry_type == EntryType::Refund)
        .map(|entry| entry.amount)
        .sum();
    assert_eq!(refund, 4_000);
    engine.audit_user(&alice).unwrap();
}

#[test]
fn test_withdrawal_rejection_cancels_reservation() {
    let mut engine = Engine::new(EngineConfig::default());
    let alice = engine.create_user("alice".to_string(), None).unwrap();
    fund_user(&mut engine, &alice, 10_000);

    let id = engine
        .request_withdrawal(&alice, 4_000, "TAddr".to_string(), "TRC20".to_string(), 1)
        .unwrap();
    engine.reject_withdrawal(&id, "ops", 2).unwrap();

    assert_eq!(engine.user(&alice).unwrap().balance, 10_000);
    let withdrawal = engine.withdrawal(&id).unwrap();
    assert_eq!(withdrawal.status, WithdrawalStatus::Rejected);
    assert_eq!(withdrawal.processed_by.as_deref(), Some("ops"));
    let entries = engine.ledger_entries(&alice);
    let reservation = entries
        .iter()
        .find(|entry| entry.id == withdrawal.ledger_entry)
        .unwrap();
    assert_eq!(reservation.status, EntryStatus::Cancelled);
    engine.audit_user(&alice).unwrap();
}

#[test]
fn test_withdrawal_requires_funds_at_request_time() {
    let mut engine = Engine::new(EngineConfig::default());
    let alice = engine.create_user("alice".to_string(), None).unwrap();
    fund_user(&mut engine, &alice, 2_000);

    let err = engine
        .request_withdrawal(&alice, 3_000, "TAddr".to_string(), "TRC20".to_string(), 1)
        .expect_err("over-balance withdrawal");
    assert_eq!(
        err,
        EngineError::InsufficientFunds {
            balance: 2_000,
            required: 3_000
        }
    );
    assert!(engine
        .ledger_entries(&alice)
        .iter()
        .all(|entry| entry.entry_type != EntryType::Withdrawal));
}

#[test]
fn test_referral_commission_awarded_exactly_once() {
    let mut engine = Engine::new(EngineConfig::default());
    let referrer = engine.create_user("referrer".to_string(), None).unwrap();
    let referred = engine
        .create_user("referred".to_string(), Some(referrer))
        .unwrap();
    fund_user(&mut engine, &referred, 10_000);

    let first_pool = open_pool(&mut engine, 10_000);
    engine
        .submit_prediction(&referred, &first_pool, single_picks(MatchOutcome::Home), 1)
        .unwrap();

    // 5% of the 100 stake.
    assert_eq!(engine.user(&referrer).unwrap().balance, 5);
    assert!(engine.user(&referred).unwrap().referral_commission_awarded);

    let second_pool = open_pool(&mut engine, 10_000);
    engine
        .submit_prediction(&referred, &second_pool, single_picks(MatchOutcome::Home), 2)
        .unwrap();
    assert_eq!(
        engine.user(&referrer).unwrap().balance,
        5,
        "second stake credits nothing additional"
    );

    let commissions = engine
        .ledger_entries(&referrer)
        .iter()
        .filter(|entry| entry.entry_type == EntryType::ReferralCommission)
        .count();
    assert_eq!(commissions, 1);
    engine.audit_user(&referrer).unwrap();
}

#[test]
fn test_no_referrer_means_no_commission() {
    let mut engine = Engine::new(EngineConfig::default());
    let alice = engine.create_user("alice".to_string(), None).unwrap();
    fund_user(&mut engine, &alice, 10_000);
    let pool = open_pool(&mut engine, 10_000);
    engine
        .submit_prediction(&alice, &pool, single_picks(MatchOutcome::Home), 1)
        .unwrap();
    assert!(
        !engine.user(&alice).unwrap().referral_commission_awarded,
        "latch stays open when there is no referrer"
    );
    assert!(engine
        .ledger_entries(&alice)
        .iter()
        .all(|entry| entry.entry_type != EntryType::ReferralCommission));
}

#[test]
fn test_stake_race_against_deadline() {
    let mut engine = Engine::new(EngineConfig::default());
    let pool = open_pool(&mut engine, 5_000);
    let alice = engine.create_user("alice".to_string(), None).unwrap();
    let bob = engine.create_user("bob".to_string(), None).unwrap();
    fund_user(&mut engine, &alice, 1_000);
    fund_user(&mut engine, &bob, 1_000);

    // Two submissions race the deadline; the write-time check decides.
    engine
        .submit_prediction(&alice, &pool, single_picks(MatchOutcome::Home), 4_999)
        .unwrap();
    let err = engine
        .submit_prediction(&bob, &pool, single_picks(MatchOutcome::Home), 5_000)
        .expect_err("the later write loses");
    assert!(matches!(err, EngineError::Validation(_)));
    assert_eq!(engine.user(&bob).unwrap().balance, 1_000);
}

#[test]
fn test_audit_holds_across_a_full_flow() {
    let mut engine = Engine::new(EngineConfig::default());
    let referrer = engine.create_user("referrer".to_string(), None).unwrap();
    let alice = engine
        .create_user("alice".to_string(), Some(referrer))
        .unwrap();
    fund_user(&mut engine, &alice, 20_000);

    let pool = open_pool(&mut engine, 10_000);
    engine
        .submit_prediction(&alice, &pool, single_picks(MatchOutcome::Home), 1)
        .unwrap();
    let withdrawal = engine
        .request_withdrawal(&alice, 5_000, "TAddr".to_string(), "TRC20".to_string(), 2)
        .unwrap();
    engine.fail_withdrawal(&withdrawal, 3).unwrap();
    engine.cancel_pool(&pool, 4).unwrap();

    engine.audit_user(&alice).unwrap();
    engine.audit_user(&referrer).unwrap();
    assert_eq!(engine.user(&alice).unwrap().balance, 20_000);
    assert_eq!(engine.ledger_balance(&alice), 20_000);
}
