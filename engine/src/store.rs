use std::collections::BTreeMap;

use toto_types::{
    CryptoDeposit, DepositId, EntryId, GamePool, LedgerEntry, PoolId, Prediction, PredictionId,
    User, UserId, WithdrawalId, WithdrawalRequest,
};

/// In-memory record store backing the engine.
///
/// Iteration order is deterministic (BTreeMap keyed by id) so sweeps and
/// settlement produce stable output.
#[derive(Default)]
pub(crate) struct Store {
    users: BTreeMap<UserId, User>,
    pools: BTreeMap<PoolId, GamePool>,
    predictions: BTreeMap<PredictionId, Prediction>,
    predictions_by_pool: BTreeMap<PoolId, Vec<PredictionId>>,
    ledger: BTreeMap<EntryId, LedgerEntry>,
    ledger_by_user: BTreeMap<UserId, Vec<EntryId>>,
    deposits: BTreeMap<DepositId, CryptoDeposit>,
    withdrawals: BTreeMap<WithdrawalId, WithdrawalRequest>,
}

impl Store {
    pub fn user(&self, id: &UserId) -> Option<&User> {
        self.users.get(id)
    }

    pub fn user_mut(&mut self, id: &UserId) -> Option<&mut User> {
        self.users.get_mut(id)
    }

    pub fn insert_user(&mut self, user: User) {
        self.users.insert(user.id, user);
    }

    pub fn pool(&self, id: &PoolId) -> Option<&GamePool> {
        self.pools.get(id)
    }

    pub fn pool_mut(&mut self, id: &PoolId) -> Option<&mut GamePool> {
        self.pools.get_mut(id)
    }

    pub fn insert_pool(&mut self, pool: GamePool) {
        self.pools.insert(pool.id, pool);
    }

    pub fn pools(&self) -> impl Iterator<Item = &GamePool> {
        self.pools.values()
    }

    pub fn pool_ids(&self) -> Vec<PoolId> {
        self.pools.keys().copied().collect()
    }

    pub fn prediction(&self, id: &PredictionId) -> Option<&Prediction> {
        self.predictions.get(id)
    }

    pub fn prediction_mut(&mut self, id: &PredictionId) -> Option<&mut Prediction> {
        self.predictions.get_mut(id)
    }

    pub fn insert_prediction(&mut self, prediction: Prediction) {
        self.predictions_by_pool
            .entry(prediction.pool)
            .or_default()
            .push(prediction.id);
        self.predictions.insert(prediction.id, prediction);
    }

    pub fn predictions_for_pool(&self, pool: &PoolId) -> Vec<PredictionId> {
        self.predictions_by_pool
            .get(pool)
            .cloned()
            .unwrap_or_default()
    }

    pub fn pool_has_prediction_by(&self, pool: &PoolId, user: &UserId) -> bool {
        self.predictions_for_pool(pool)
            .iter()
            .filter_map(|id| self.predictions.get(id))
            .any(|prediction| prediction.user == *user)
    }

    pub fn insert_ledger_entry(&mut self, entry: LedgerEntry) {
        self.ledger_by_user
            .entry(entry.user)
            .or_default()
            .push(entry.id);
        self.ledger.insert(entry.id, entry);
    }

    pub fn ledger_entry(&self, id: &EntryId) -> Option<&LedgerEntry> {
        self.ledger.get(id)
    }

    pub fn ledger_entry_mut(&mut self, id: &EntryId) -> Option<&mut LedgerEntry> {
        self.ledger.get_mut(id)
    }

    pub fn ledger_for_user(&self, user: &UserId) -> Vec<&LedgerEntry> {
        self.ledger_by_user
            .get(user)
            .map(|ids| ids.iter().filter_map(|id| self.ledger.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn deposit(&self, id: &DepositId) -> Option<&CryptoDeposit> {
        self.deposits.get(id)
    }

    pub fn deposit_mut(&mut self, id: &DepositId) -> Option<&mut CryptoDeposit> {
        self.deposits.get_mut(id)
    }

    pub fn insert_deposit(&mut self, deposit: CryptoDeposit) {
        self.deposits.insert(deposit.id, deposit);
    }

    pub fn withdrawal(&self, id: &WithdrawalId) -> Option<&WithdrawalRequest> {
        self.withdrawals.get(id)
    }

    pub fn withdrawal_mut(&mut self, id: &WithdrawalId) -> Option<&mut WithdrawalRequest> {
        self.withdrawals.get_mut(id)
    }

    pub fn insert_withdrawal(&mut self, withdrawal: WithdrawalRequest) {
        self.withdrawals.insert(withdrawal.id, withdrawal);
    }
}
