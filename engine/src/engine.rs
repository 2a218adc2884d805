use toto_types::{
    CryptoDeposit, DepositId, EntryId, EntryStatus, EntryType, GamePool, LedgerEntry, Prediction,
    PredictionId, RelatedEntity, User, UserId, WithdrawalId, WithdrawalRequest, BASE_STAKE_UNIT,
    COMMISSION_RATE_BPS, FIRST_TIER_BPS, MAX_NAME_LENGTH, MIN_WITHDRAWAL_AMOUNT, POINTS_PER_CORRECT_MATCH,
    PoolId, REFERRAL_RATE_BPS, SECOND_TIER_BPS, THIRD_TIER_BPS,
};

use crate::error::{EngineError, Result};
use crate::store::Store;

/// Engine rates and limits, in basis points / minor units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub commission_bps: u64,
    pub first_tier_bps: u64,
    pub second_tier_bps: u64,
    pub third_tier_bps: u64,
    pub referral_bps: u64,
    pub points_per_correct: u64,
    pub base_stake_unit: u64,
    pub min_withdrawal: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            commission_bps: COMMISSION_RATE_BPS,
            first_tier_bps: FIRST_TIER_BPS,
            second_tier_bps: SECOND_TIER_BPS,
            third_tier_bps: THIRD_TIER_BPS,
            referral_bps: REFERRAL_RATE_BPS,
            points_per_correct: POINTS_PER_CORRECT_MATCH,
            base_stake_unit: BASE_STAKE_UNIT,
            min_withdrawal: MIN_WITHDRAWAL_AMOUNT,
        }
    }
}

impl EngineConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), &'static str> {
        if self.base_stake_unit == 0 {
            return Err("base_stake_unit must be greater than zero");
        }
        if self.commission_bps > 10_000 {
            return Err("commission_bps must not exceed 10000");
        }
        let tier_total = self
            .first_tier_bps
            .saturating_add(self.second_tier_bps)
            .saturating_add(self.third_tier_bps);
        if tier_total > 10_000 {
            return Err("tier split must not exceed 10000 bps");
        }
        Ok(())
    }
}

/// The wagering settlement engine.
///
/// Owns all mutable state; callers serialize access (the service wraps it in
/// a mutex) and pass `now_ms` into every time-dependent operation.
pub struct Engine {
    pub(crate) store: Store,
    pub(crate) config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            store: Store::default(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn create_user(&mut self, name: String, referrer: Option<UserId>) -> Result<UserId> {
        if name.is_empty() || name.len() > MAX_NAME_LENGTH {
            return Err(EngineError::validation(format!(
                "user name length must be 1..={MAX_NAME_LENGTH}"
            )));
        }
        if let Some(referrer) = &referrer {
            if self.store.user(referrer).is_none() {
                return Err(EngineError::not_found("referrer"));
            }
        }
        let id = UserId::generate();
        self.store.insert_user(User::new(id, name, referrer));
        Ok(id)
    }

    pub fn user(&self, id: &UserId) -> Result<&User> {
        self.store.user(id).ok_or(EngineError::not_found("user"))
    }

    pub fn pool(&self, id: &PoolId) -> Result<&GamePool> {
        self.store.pool(id).ok_or(EngineError::not_found("pool"))
    }

    pub fn pools(&self) -> Vec<&GamePool> {
        self.store.pools().collect()
    }

    pub fn prediction(&self, id: &PredictionId) -> Result<&Prediction> {
        self.store
            .prediction(id)
            .ok_or(EngineError::not_found("prediction"))
    }

    pub fn deposit(&self, id: &DepositId) -> Result<&CryptoDeposit> {
        self.store
            .deposit(id)
            .ok_or(EngineError::not_found("deposit"))
    }

    pub fn withdrawal(&self, id: &WithdrawalId) -> Result<&WithdrawalRequest> {
        self.store
            .withdrawal(id)
            .ok_or(EngineError::not_found("withdrawal"))
    }

    pub fn ledger_entries(&self, user: &UserId) -> Vec<&LedgerEntry> {
        self.store.ledger_for_user(user)
    }

    /// Sum of all ledger amounts for a user. Entry statuses describe the
    /// external process, not whether the delta applied; every entry written
    /// corresponds to an applied balance change, so the unconditional sum is
    /// the user's net delta.
    pub fn ledger_balance(&self, user: &UserId) -> i64 {
        self.store
            .ledger_for_user(user)
            .iter()
            .map(|entry| entry.amount)
            .fold(0i64, i64::saturating_add)
    }

    /// Verify that the ledger sum equals the user's balance.
    pub fn audit_user(&self, user: &UserId) -> Result<()> {
        let balance = self.user(user)?.balance;
        let ledger = self.ledger_balance(user);
        if ledger < 0 || ledger as u64 != balance {
            return Err(EngineError::validation(format!(
                "ledger/balance mismatch for {user}: ledger {ledger}, balance {balance}"
            )));
        }
        Ok(())
    }

    /// Credit a user's balance and write the paired ledger entry.
    pub(crate) fn credit_user(
        &mut self,
        user_id: &UserId,
        amount: u64,
        entry_type: EntryType,
        entry_status: EntryStatus,
        description: String,
        related: Option<RelatedEntity>,
        now_ms: u64,
    ) -> Result<EntryId> {
        let user = self
            .store
            .user_mut(user_id)
            .ok_or(EngineError::not_found("user"))?;
        user.balance = user.balance.saturating_add(amount);
        Ok(self.write_entry(
            *user_id,
            amount as i64,
            entry_type,
            entry_status,
            description,
            related,
            now_ms,
        ))
    }

    /// Debit a user's balance and write the paired ledger entry. Rejects
    /// without any state change when the balance is short.
    pub(crate) fn debit_user(
        &mut self,
        user_id: &UserId,
        amount: u64,
        entry_type: EntryType,
        entry_status: EntryStatus,
        description: String,
        related: Option<RelatedEntity>,
        now_ms: u64,
    ) -> Result<EntryId> {
        let user = self
            .store
            .user_mut(user_id)
            .ok_or(EngineError::not_found("user"))?;
        if user.balance < amount {
            return Err(EngineError::InsufficientFunds {
                balance: user.balance,
                required: amount,
            });
        }
        user.balance -= amount;
        Ok(self.write_entry(
            *user_id,
            -(amount as i64),
            entry_type,
            entry_status,
            description,
            related,
            now_ms,
        ))
    }

    fn write_entry(
        &mut self,
        user: UserId,
        amount: i64,
        entry_type: EntryType,
        status: EntryStatus,
        description: String,
        related: Option<RelatedEntity>,
        now_ms: u64,
    ) -> EntryId {
        let id = EntryId::generate();
        self.store.insert_ledger_entry(LedgerEntry {
            id,
            user,
            amount,
            entry_type,
            status,
            description,
            related,
            created_ms: now_ms,
        });
        id
    }
}
