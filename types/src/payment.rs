use serde::{Deserialize, Serialize};

use super::{DepositId, EntryId, UserId, WithdrawalId};

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepositStatus {
    Pending = 0,
    Processing = 1,
    Confirmed = 2,
    Failed = 3,
    Cancelled = 4,
}

impl DepositStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepositStatus::Pending => "pending",
            DepositStatus::Processing => "processing",
            DepositStatus::Confirmed => "confirmed",
            DepositStatus::Failed => "failed",
            DepositStatus::Cancelled => "cancelled",
        }
    }
}

/// Payment status reported by the provider, normalized from the raw webhook
/// string. `Other` covers interim statuses the engine treats as in-flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderPaymentStatus {
    Paid,
    Overpaid,
    Underpaid,
    Expired,
    Partial,
    New,
    Other,
}

impl ProviderPaymentStatus {
    pub fn from_provider(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "PAID" => ProviderPaymentStatus::Paid,
            "OVERPAID" => ProviderPaymentStatus::Overpaid,
            "UNDERPAID" => ProviderPaymentStatus::Underpaid,
            "EXPIRED" => ProviderPaymentStatus::Expired,
            "PARTIAL" => ProviderPaymentStatus::Partial,
            "NEW" => ProviderPaymentStatus::New,
            _ => ProviderPaymentStatus::Other,
        }
    }

    /// Statuses that confirm the full expected value arrived on-chain.
    pub fn is_paid(&self) -> bool {
        matches!(
            self,
            ProviderPaymentStatus::Paid | ProviderPaymentStatus::Overpaid
        )
    }

    /// Statuses that terminally fail the deposit without crediting.
    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            ProviderPaymentStatus::Underpaid
                | ProviderPaymentStatus::Expired
                | ProviderPaymentStatus::Partial
        )
    }
}

/// One pending or resolved external-payment intent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoDeposit {
    pub id: DepositId,
    pub user: UserId,
    pub currency: String,
    pub network: String,
    /// Address returned by the provider once the invoice exists.
    pub deposit_address: Option<String>,
    /// Provider-side invoice id; the deposit's own id is the correlation key.
    pub invoice_id: Option<String>,
    pub expected_amount: u64,
    pub actual_amount: u64,
    pub status: DepositStatus,
    /// Raw provider status string from the latest notification, kept for
    /// observability.
    pub provider_status: String,
    /// One-way latch preventing a second balance credit for this intent.
    pub is_processed: bool,
    pub created_ms: u64,
}

impl CryptoDeposit {
    pub fn new(
        id: DepositId,
        user: UserId,
        currency: String,
        network: String,
        expected_amount: u64,
        created_ms: u64,
    ) -> Self {
        Self {
            id,
            user,
            currency,
            network,
            deposit_address: None,
            invoice_id: None,
            expected_amount,
            actual_amount: 0,
            status: DepositStatus::Pending,
            provider_status: String::new(),
            is_processed: false,
            created_ms,
        }
    }
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending = 0,
    Approved = 1,
    Rejected = 2,
    Failed = 3,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Rejected => "rejected",
            WithdrawalStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, WithdrawalStatus::Pending)
    }
}

/// A user's request to move balance out through the payment provider.
///
/// The balance is debited at creation time (optimistic reservation); terminal
/// statuses record how the reservation resolved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: WithdrawalId,
    pub user: UserId,
    pub amount: u64,
    pub wallet_address: String,
    pub network: String,
    pub status: WithdrawalStatus,
    pub provider_task_id: Option<String>,
    /// The withdrawal ledger entry written when the balance was reserved.
    pub ledger_entry: EntryId,
    pub processed_by: Option<String>,
    pub processed_at_ms: Option<u64>,
    pub created_ms: u64,
}
