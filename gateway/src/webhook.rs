//! Provider webhook payloads and the idempotent consumer.
//!
//! The provider delivers notifications at least once; the engine's
//! `is_processed` latch makes consumption exactly-once. Every branch the
//! consumer reaches — including redeliveries — maps to a success
//! acknowledgment so the provider stops retrying; only unexpected internal
//! failures should surface as server errors.

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use toto_engine::{Engine, WebhookOutcome};
use toto_types::{DepositId, ProviderPaymentStatus};

use crate::{Error, Result};

/// One on-chain transaction attached to a notification. `trigger` flags the
/// transaction that caused this delivery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTransaction {
    pub txid: String,
    pub amount: String,
    #[serde(default)]
    pub trigger: bool,
}

/// Webhook body delivered by the payment provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentNotification {
    /// Correlation key: the deposit record's own id.
    pub external_id: String,
    /// Raw provider status string, e.g. `PAID`, `UNDERPAID`, `NEW`.
    pub status: String,
    /// Confirmed amount in minor units, as a decimal string.
    pub amount: String,
    pub currency: String,
    #[serde(default)]
    pub transactions: Vec<ChainTransaction>,
}

/// Shared-secret check for the webhook header.
pub fn verify_webhook_secret(provided: Option<&str>, expected: &str) -> bool {
    match provided {
        Some(provided) => !expected.is_empty() && provided == expected,
        None => false,
    }
}

/// Consume one provider notification.
///
/// Resolves the deposit by correlation id and applies the status under the
/// engine lock. Returns the engine's outcome; malformed payloads and unknown
/// correlation ids are errors for the caller to map.
pub async fn process_notification(
    engine: &Mutex<Engine>,
    notification: &PaymentNotification,
    now_ms: u64,
) -> Result<WebhookOutcome> {
    let deposit_id = notification
        .external_id
        .parse::<Uuid>()
        .map(DepositId)
        .map_err(|_| {
            Error::InvalidNotification(format!(
                "external_id is not a deposit id: {}",
                notification.external_id
            ))
        })?;

    let status = ProviderPaymentStatus::from_provider(&notification.status);
    let amount = if status.is_paid() {
        notification.amount.parse::<u64>().map_err(|_| {
            Error::InvalidNotification(format!(
                "unparseable amount for paid notification: {}",
                notification.amount
            ))
        })?
    } else {
        notification.amount.parse::<u64>().unwrap_or(0)
    };

    let outcome = engine
        .lock()
        .await
        .apply_deposit_notification(&deposit_id, status, amount, &notification.status, now_ms)?;
    info!(
        deposit = %deposit_id,
        status = %notification.status,
        ?outcome,
        "webhook notification consumed"
    );
    Ok(outcome)
}
