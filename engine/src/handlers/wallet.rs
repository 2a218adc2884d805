//! Wallet state transitions: crypto deposit intents, webhook application,
//! and withdrawal reservations with compensation.

use serde::Serialize;
use tracing::{info, warn};

use toto_types::{
    CryptoDeposit, DepositId, DepositStatus, EntryStatus, EntryType, ProviderPaymentStatus,
    RelatedEntity, UserId, WithdrawalId, WithdrawalRequest, WithdrawalStatus,
};

use crate::engine::Engine;
use crate::error::{EngineError, Result};

/// Resolution of a provider payment notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum WebhookOutcome {
    /// Balance credited; the deposit is confirmed and latched.
    Credited { amount: u64 },
    /// Terminal provider failure; latched without a balance change.
    MarkedFailed,
    /// Provider reports `NEW`; the latch stays open.
    StillPending,
    /// Interim provider status; the latch stays open.
    InFlight,
    /// The latch was already set; acknowledged without reprocessing.
    AlreadyProcessed,
}

/// Data the provider payout call needs for a pending withdrawal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayoutInstruction {
    pub amount: u64,
    pub wallet_address: String,
    pub network: String,
}

impl Engine {
    /// Create a pending deposit intent. The record exists before any provider
    /// call; its id is the provider correlation key (`external_id`).
    pub fn create_deposit(
        &mut self,
        user_id: &UserId,
        currency: String,
        network: String,
        expected_amount: u64,
        now_ms: u64,
    ) -> Result<DepositId> {
        self.user(user_id)?;
        if expected_amount == 0 {
            return Err(EngineError::validation("deposit amount must be > 0"));
        }
        if currency.is_empty() || network.is_empty() {
            return Err(EngineError::validation("currency and network are required"));
        }
        let id = DepositId::generate();
        self.store.insert_deposit(CryptoDeposit::new(
            id,
            *user_id,
            currency,
            network,
            expected_amount,
            now_ms,
        ));
        Ok(id)
    }

    /// Attach the provider invoice to a pending deposit.
    pub fn attach_deposit_invoice(
        &mut self,
        id: &DepositId,
        invoice_id: String,
        deposit_address: String,
    ) -> Result<()> {
        let deposit = self
            .store
            .deposit_mut(id)
            .ok_or(EngineError::not_found("deposit"))?;
        if deposit.status != DepositStatus::Pending {
            return Err(EngineError::conflict(
                "deposit",
                deposit.status.as_str(),
                "pending",
            ));
        }
        deposit.invoice_id = Some(invoice_id);
        deposit.deposit_address = Some(deposit_address);
        Ok(())
    }

    /// Mark a deposit failed after the provider invoice call failed. The
    /// latch is set: no invoice exists, so no credit may ever apply.
    pub fn mark_deposit_failed(&mut self, id: &DepositId) -> Result<()> {
        let deposit = self
            .store
            .deposit_mut(id)
            .ok_or(EngineError::not_found("deposit"))?;
        if deposit.is_processed {
            return Err(EngineError::conflict(
                "deposit",
                "already processed",
                "unprocessed",
            ));
        }
        deposit.status = DepositStatus::Failed;
        deposit.is_processed = true;
        Ok(())
    }

    /// Apply one provider payment notification, exactly once.
    ///
    /// The `is_processed` latch governs everything: once set, redeliveries
    /// resolve to [`WebhookOutcome::AlreadyProcessed`] without touching state.
    /// The raw provider status is persisted on every branch reached before
    /// the latch.
    pub fn apply_deposit_notification(
        &mut self,
        id: &DepositId,
        status: ProviderPaymentStatus,
        amount: u64,
        raw_status: &str,
        now_ms: u64,
    ) -> Result<WebhookOutcome> {
        let deposit = self
            .store
            .deposit_mut(id)
            .ok_or(EngineError::not_found("deposit"))?;
        if deposit.is_processed {
            return Ok(WebhookOutcome::AlreadyProcessed);
        }
        deposit.provider_status = raw_status.to_string();

        if status.is_paid() {
            if !matches!(
                deposit.status,
                DepositStatus::Pending | DepositStatus::Processing
            ) {
                warn!(
                    deposit = %id,
                    status = deposit.status.as_str(),
                    raw_status,
                    "paid notification for deposit outside pending/processing"
                );
                return Ok(WebhookOutcome::InFlight);
            }
            let user = deposit.user;
            deposit.actual_amount = amount;
            deposit.status = DepositStatus::Confirmed;
            deposit.is_processed = true;
            self.credit_user(
                &user,
                amount,
                EntryType::Deposit,
                EntryStatus::Completed,
                "crypto deposit confirmed".to_string(),
                Some(RelatedEntity::Deposit(*id)),
                now_ms,
            )?;
            info!(deposit = %id, amount, "deposit credited");
            return Ok(WebhookOutcome::Credited { amount });
        }

        if status.is_failed() {
            deposit.status = DepositStatus::Failed;
            deposit.is_processed = true;
            info!(deposit = %id, raw_status, "deposit failed without credit");
            return Ok(WebhookOutcome::MarkedFailed);
        }

        if status == ProviderPaymentStatus::New {
            deposit.status = DepositStatus::Pending;
            return Ok(WebhookOutcome::StillPending);
        }

        deposit.status = DepositStatus::Processing;
        Ok(WebhookOutcome::InFlight)
    }

    /// Admin surface: confirm a deposit by hand. Same latch rules as the
    /// webhook path.
    pub fn confirm_deposit_manual(
        &mut self,
        id: &DepositId,
        amount: u64,
        admin: &str,
        now_ms: u64,
    ) -> Result<WebhookOutcome> {
        info!(deposit = %id, amount, admin, "manual deposit confirmation");
        self.apply_deposit_notification(id, ProviderPaymentStatus::Paid, amount, "MANUAL", now_ms)
    }

    /// Admin surface: reject a deposit by hand, latching it cancelled.
    pub fn reject_deposit_manual(&mut self, id: &DepositId, admin: &str) -> Result<()> {
        let deposit = self
            .store
            .deposit_mut(id)
            .ok_or(EngineError::not_found("deposit"))?;
        if deposit.is_processed {
            return Err(EngineError::conflict(
                "deposit",
                "already processed",
                "unprocessed",
            ));
        }
        deposit.status = DepositStatus::Cancelled;
        deposit.provider_status = "MANUAL".to_string();
        deposit.is_processed = true;
        info!(deposit = %id, admin, "deposit rejected manually");
        Ok(())
    }

    /// Create a withdrawal request, debiting the balance immediately as an
    /// optimistic reservation. No provider call is involved here.
    pub fn request_withdrawal(
        &mut self,
        user_id: &UserId,
        amount: u64,
        wallet_address: String,
        network: String,
        now_ms: u64,
    ) -> Result<WithdrawalId> {
        if amount < self.config.min_withdrawal {
            return Err(EngineError::validation(format!(
                "withdrawal below minimum of {}",
                self.config.min_withdrawal
            )));
        }
        if wallet_address.is_empty() || network.is_empty() {
            return Err(EngineError::validation(
                "wallet address and network are required",
            ));
        }
        self.user(user_id)?;

        let id = WithdrawalId::generate();
        let ledger_entry = self.debit_user(
            user_id,
            amount,
            EntryType::Withdrawal,
            EntryStatus::Pending,
            "withdrawal reservation".to_string(),
            Some(RelatedEntity::Withdrawal(id)),
            now_ms,
        )?;
        self.store.insert_withdrawal(WithdrawalRequest {
            id,
            user: *user_id,
            amount,
            wallet_address,
            network,
            status: WithdrawalStatus::Pending,
            provider_task_id: None,
            ledger_entry,
            processed_by: None,
            processed_at_ms: None,
            created_ms: now_ms,
        });
        Ok(id)
    }

    /// Validate that a withdrawal is still pending and return what the payout
    /// call needs. Terminal requests are a conflict, never a silent retry.
    pub fn withdrawal_for_payout(&self, id: &WithdrawalId) -> Result<PayoutInstruction> {
        let withdrawal = self.withdrawal(id)?;
        if withdrawal.status != WithdrawalStatus::Pending {
            return Err(EngineError::conflict(
                "withdrawal",
                withdrawal.status.as_str(),
                "pending",
            ));
        }
        Ok(PayoutInstruction {
            amount: withdrawal.amount,
            wallet_address: withdrawal.wallet_address.clone(),
            network: withdrawal.network.clone(),
        })
    }

    /// Record a provider-accepted payout: pending → approved, reservation
    /// entry completed.
    pub fn approve_withdrawal(
        &mut self,
        id: &WithdrawalId,
        provider_task_id: String,
        admin: &str,
        now_ms: u64,
    ) -> Result<()> {
        let withdrawal = self
            .store
            .withdrawal_mut(id)
            .ok_or(EngineError::not_found("withdrawal"))?;
        if withdrawal.status != WithdrawalStatus::Pending {
            return Err(EngineError::conflict(
                "withdrawal",
                withdrawal.status.as_str(),
                "pending",
            ));
        }
        withdrawal.status = WithdrawalStatus::Approved;
        withdrawal.provider_task_id = Some(provider_task_id);
        withdrawal.processed_by = Some(admin.to_string());
        withdrawal.processed_at_ms = Some(now_ms);
        let entry_id = withdrawal.ledger_entry;
        if let Some(entry) = self.store.ledger_entry_mut(&entry_id) {
            entry.status = EntryStatus::Completed;
        }
        info!(withdrawal = %id, admin, "withdrawal approved");
        Ok(())
    }

    /// Compensate a provider-rejected payout: re-credit the reserved amount
    /// with a refund entry, pending → failed.
    pub fn fail_withdrawal(&mut self, id: &WithdrawalId, now_ms: u64) -> Result<()> {
        let withdrawal = self
            .store
            .withdrawal_mut(id)
            .ok_or(EngineError::not_found("withdrawal"))?;
        if withdrawal.status != WithdrawalStatus::Pending {
            return Err(EngineError::conflict(
                "withdrawal",
                withdrawal.status.as_str(),
                "pending",
            ));
        }
        withdrawal.status = WithdrawalStatus::Failed;
        withdrawal.processed_at_ms = Some(now_ms);
        let (user, amount, entry_id) = (
            withdrawal.user,
            withdrawal.amount,
            withdrawal.ledger_entry,
        );
        if let Some(entry) = self.store.ledger_entry_mut(&entry_id) {
            entry.status = EntryStatus::Failed;
        }
        self.credit_user(
            &user,
            amount,
            EntryType::Refund,
            EntryStatus::Completed,
            "withdrawal payout failed: reservation refunded".to_string(),
            Some(RelatedEntity::Withdrawal(*id)),
            now_ms,
        )?;
        warn!(withdrawal = %id, amount, "withdrawal failed, balance restored");
        Ok(())
    }

    /// Admin rejection without a provider call: re-credit the reserved
    /// amount, pending → rejected, reservation entry cancelled.
    pub fn reject_withdrawal(&mut self, id: &WithdrawalId, admin: &str, now_ms: u64) -> Result<()> {
        let withdrawal = self
            .store
            .withdrawal_mut(id)
            .ok_or(EngineError::not_found("withdrawal"))?;
        if withdrawal.status != WithdrawalStatus::Pending {
            return Err(EngineError::conflict(
                "withdrawal",
                withdrawal.status.as_str(),
                "pending",
            ));
        }
        withdrawal.status = WithdrawalStatus::Rejected;
        withdrawal.processed_by = Some(admin.to_string());
        withdrawal.processed_at_ms = Some(now_ms);
        let (user, amount, entry_id) = (
            withdrawal.user,
            withdrawal.amount,
            withdrawal.ledger_entry,
        );
        if let Some(entry) = self.store.ledger_entry_mut(&entry_id) {
            entry.status = EntryStatus::Cancelled;
        }
        self.credit_user(
            &user,
            amount,
            EntryType::Refund,
            EntryStatus::Completed,
            "withdrawal rejected: reservation refunded".to_string(),
            Some(RelatedEntity::Withdrawal(*id)),
            now_ms,
        )?;
        info!(withdrawal = %id, admin, "withdrawal rejected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Engine, EngineConfig};

    #[test]
    fn test_deposit_intent_precedes_provider_call() {
        let mut engine = Engine::new(EngineConfig::default());
        let alice = engine.create_user("alice".to_string(), None).unwrap();
        let deposit = engine
            .create_deposit(&alice, "USDT".to_string(), "TRC20".to_string(), 5_000, 1)
            .unwrap();

        let record = engine.deposit(&deposit).unwrap();
        assert_eq!(record.status, DepositStatus::Pending);
        assert!(record.invoice_id.is_none());

        engine
            .attach_deposit_invoice(&deposit, "inv-1".to_string(), "TXyz".to_string())
            .unwrap();
        let record = engine.deposit(&deposit).unwrap();
        assert_eq!(record.invoice_id.as_deref(), Some("inv-1"));
        assert_eq!(record.deposit_address.as_deref(), Some("TXyz"));
    }

    #[test]
    fn test_failed_invoice_latches_deposit() {
        let mut engine = Engine::new(EngineConfig::default());
        let alice = engine.create_user("alice".to_string(), None).unwrap();
        let deposit = engine
            .create_deposit(&alice, "USDT".to_string(), "TRC20".to_string(), 5_000, 1)
            .unwrap();
        engine.mark_deposit_failed(&deposit).unwrap();

        let outcome = engine
            .apply_deposit_notification(&deposit, ProviderPaymentStatus::Paid, 5_000, "PAID", 2)
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::AlreadyProcessed);
        assert_eq!(engine.user(&alice).unwrap().balance, 0);
    }

    #[test]
    fn test_notification_status_branches() {
        let mut engine = Engine::new(EngineConfig::default());
        let alice = engine.create_user("alice".to_string(), None).unwrap();
        let deposit = engine
            .create_deposit(&alice, "USDT".to_string(), "TRC20".to_string(), 5_000, 1)
            .unwrap();

        let outcome = engine
            .apply_deposit_notification(&deposit, ProviderPaymentStatus::New, 0, "NEW", 2)
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::StillPending);
        assert_eq!(engine.deposit(&deposit).unwrap().status, DepositStatus::Pending);

        let outcome = engine
            .apply_deposit_notification(
                &deposit,
                ProviderPaymentStatus::Other,
                0,
                "CONFIRMATIONS_PENDING",
                3,
            )
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::InFlight);
        let record = engine.deposit(&deposit).unwrap();
        assert_eq!(record.status, DepositStatus::Processing);
        assert_eq!(record.provider_status, "CONFIRMATIONS_PENDING");
        assert!(!record.is_processed);

        let outcome = engine
            .apply_deposit_notification(&deposit, ProviderPaymentStatus::Paid, 5_100, "PAID", 4)
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Credited { amount: 5_100 });
        let record = engine.deposit(&deposit).unwrap();
        assert_eq!(record.status, DepositStatus::Confirmed);
        assert_eq!(record.actual_amount, 5_100);
        assert!(record.is_processed);
        assert_eq!(engine.user(&alice).unwrap().balance, 5_100);
    }

    #[test]
    fn test_underpaid_latches_without_credit() {
        let mut engine = Engine::new(EngineConfig::default());
        let alice = engine.create_user("alice".to_string(), None).unwrap();
        let deposit = engine
            .create_deposit(&alice, "USDT".to_string(), "TRC20".to_string(), 5_000, 1)
            .unwrap();
        let outcome = engine
            .apply_deposit_notification(
                &deposit,
                ProviderPaymentStatus::Underpaid,
                4_000,
                "UNDERPAID",
                2,
            )
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::MarkedFailed);
        let record = engine.deposit(&deposit).unwrap();
        assert_eq!(record.status, DepositStatus::Failed);
        assert!(record.is_processed);
        assert_eq!(engine.user(&alice).unwrap().balance, 0);
    }

    #[test]
    fn test_withdrawal_below_minimum_rejected() {
        let mut engine = Engine::new(EngineConfig::default());
        let alice = engine.create_user("alice".to_string(), None).unwrap();
        let err = engine
            .request_withdrawal(&alice, 1, "addr".to_string(), "TRC20".to_string(), 1)
            .expect_err("below minimum");
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_terminal_withdrawal_cannot_be_reprocessed() {
        let mut engine = Engine::new(EngineConfig::default());
        let alice = engine.create_user("alice".to_string(), None).unwrap();
        engine
            .credit_user(
                &alice,
                10_000,
                EntryType::Deposit,
                EntryStatus::Completed,
                "seed".to_string(),
                None,
                0,
            )
            .unwrap();
        let id = engine
            .request_withdrawal(&alice, 2_000, "addr".to_string(), "TRC20".to_string(), 1)
            .unwrap();
        engine
            .approve_withdrawal(&id, "task-1".to_string(), "ops", 2)
            .unwrap();

        assert!(matches!(
            engine.withdrawal_for_payout(&id),
            Err(EngineError::Conflict { .. })
        ));
        assert!(matches!(
            engine.approve_withdrawal(&id, "task-2".to_string(), "ops", 3),
            Err(EngineError::Conflict { .. })
        ));
        assert!(matches!(
            engine.reject_withdrawal(&id, "ops", 3),
            Err(EngineError::Conflict { .. })
        ));
        assert!(matches!(
            engine.fail_withdrawal(&id, 3),
            Err(EngineError::Conflict { .. })
        ));
    }
}
