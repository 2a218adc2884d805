use serde::{Deserialize, Serialize};

use super::UserId;

/// Account state for a wagering user.
///
/// `balance` is mutated only together with a ledger entry recording the delta;
/// nothing else in the system writes it directly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    /// Spendable balance in minor units.
    pub balance: u64,
    /// Cumulative points across settled pools.
    pub score: u64,
    /// Referring user, fixed at registration.
    pub referrer: Option<UserId>,
    /// One-way latch: set once the referral commission for this user's first
    /// stake has been credited. Never cleared.
    pub referral_commission_awarded: bool,
}

impl User {
    pub fn new(id: UserId, name: String, referrer: Option<UserId>) -> Self {
        Self {
            id,
            name,
            balance: 0,
            score: 0,
            referrer,
            referral_commission_awarded: false,
        }
    }
}
