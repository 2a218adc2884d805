use serde::{Deserialize, Serialize};

use super::{DepositId, EntryId, PoolId, PredictionId, UserId, WithdrawalId};

/// Cause of a balance delta.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Deposit = 0,
    Stake = 1,
    PrizePayout = 2,
    Refund = 3,
    ReferralCommission = 4,
    Withdrawal = 5,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Deposit => "deposit",
            EntryType::Stake => "stake",
            EntryType::PrizePayout => "prize_payout",
            EntryType::Refund => "refund",
            EntryType::ReferralCommission => "referral_commission",
            EntryType::Withdrawal => "withdrawal",
        }
    }
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending = 0,
    Completed = 1,
    Cancelled = 2,
    Failed = 3,
}

impl EntryStatus {
    /// A terminal entry is immutable.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EntryStatus::Pending)
    }
}

/// Entity a ledger entry was written on behalf of.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum RelatedEntity {
    Pool(PoolId),
    Prediction(PredictionId),
    Deposit(DepositId),
    Withdrawal(WithdrawalId),
}

/// Immutable record of a signed balance delta and its cause.
///
/// Positive amounts credit the user, negative amounts debit. Every balance
/// mutation on a user is paired with exactly one entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub user: UserId,
    pub amount: i64,
    pub entry_type: EntryType,
    pub status: EntryStatus,
    pub description: String,
    pub related: Option<RelatedEntity>,
    pub created_ms: u64,
}
