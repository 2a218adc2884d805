//! Flows sequencing engine transitions around provider calls.
//!
//! The pattern is the same for deposits and payouts: mutate local state under
//! the engine lock, release the lock for the single outbound call, then
//! resolve the local record — attaching the provider handle on success or
//! compensating on failure. Nothing awaits the provider while the lock is
//! held.

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use toto_engine::Engine;
use toto_types::{DepositId, UserId, WithdrawalId};

use crate::provider::{InvoiceRequest, PaymentProvider, PayoutRequest};
use crate::Result;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DepositCreated {
    pub deposit_id: DepositId,
    pub deposit_address: String,
    pub invoice_id: String,
}

/// Create a deposit intent and its provider invoice.
///
/// The local record exists before the provider call and carries its own id as
/// the correlation key. A failed invoice call marks the record failed; no
/// balance is touched on this path.
pub async fn request_deposit<P: PaymentProvider>(
    engine: &Mutex<Engine>,
    provider: &P,
    callback_url: &str,
    user: &UserId,
    currency: String,
    network: String,
    amount: u64,
    now_ms: u64,
) -> Result<DepositCreated> {
    let deposit_id = engine.lock().await.create_deposit(
        user,
        currency.clone(),
        network.clone(),
        amount,
        now_ms,
    )?;

    let invoice = provider
        .create_invoice(InvoiceRequest {
            currency,
            network,
            fiat_amount: amount,
            external_id: deposit_id.to_string(),
            callback_url: callback_url.to_string(),
        })
        .await;

    match invoice {
        Ok(details) => {
            engine.lock().await.attach_deposit_invoice(
                &deposit_id,
                details.invoice_id.clone(),
                details.deposit_address.clone(),
            )?;
            info!(deposit = %deposit_id, invoice = %details.invoice_id, "deposit invoice created");
            Ok(DepositCreated {
                deposit_id,
                deposit_address: details.deposit_address,
                invoice_id: details.invoice_id,
            })
        }
        Err(err) => {
            warn!(deposit = %deposit_id, %err, "provider invoice failed, marking deposit failed");
            if let Err(mark_err) = engine.lock().await.mark_deposit_failed(&deposit_id) {
                warn!(deposit = %deposit_id, %mark_err, "failed to mark deposit failed");
            }
            Err(err)
        }
    }
}

/// Approve a pending withdrawal by creating the provider payout task.
///
/// On provider rejection the reservation is compensated: the balance is
/// restored and the request ends `failed`. The provider error is still
/// surfaced to the caller.
pub async fn approve_withdrawal_flow<P: PaymentProvider>(
    engine: &Mutex<Engine>,
    provider: &P,
    id: &WithdrawalId,
    admin: &str,
    now_ms: u64,
) -> Result<String> {
    let instruction = engine.lock().await.withdrawal_for_payout(id)?;

    let payout = provider
        .create_payout(PayoutRequest {
            network: instruction.network,
            amount: instruction.amount,
            destination: instruction.wallet_address,
        })
        .await;

    match payout {
        Ok(accepted) => {
            engine
                .lock()
                .await
                .approve_withdrawal(id, accepted.task_id.clone(), admin, now_ms)?;
            info!(withdrawal = %id, task = %accepted.task_id, "withdrawal payout accepted");
            Ok(accepted.task_id)
        }
        Err(err) => {
            warn!(withdrawal = %id, %err, "provider payout failed, compensating");
            if let Err(fail_err) = engine.lock().await.fail_withdrawal(id, now_ms) {
                warn!(withdrawal = %id, %fail_err, "failed to compensate withdrawal");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{InvoiceDetails, MockProvider, PayoutAccepted};
    use crate::Error;
    use toto_engine::mocks::fund_user;
    use toto_engine::{Engine, EngineConfig};
    use toto_types::{DepositStatus, WithdrawalStatus};

    fn provider_error() -> Error {
        Error::Provider {
            status: reqwest::StatusCode::BAD_GATEWAY,
            body: "provider unavailable".to_string(),
        }
    }

    #[tokio::test]
    async fn test_deposit_flow_attaches_invoice() {
        let engine = Mutex::new(Engine::new(EngineConfig::default()));
        let user = engine
            .lock()
            .await
            .create_user("alice".to_string(), None)
            .unwrap();
        let provider = MockProvider::default();
        provider.push_invoice_result(Ok(InvoiceDetails {
            invoice_id: "inv-7".to_string(),
            deposit_address: "bc1qxyz".to_string(),
        }));

        let created = request_deposit(
            &engine,
            &provider,
            "https://toto.example/webhooks/shkeeper",
            &user,
            "BTC".to_string(),
            "BTC".to_string(),
            5_000,
            1,
        )
        .await
        .unwrap();

        assert_eq!(created.invoice_id, "inv-7");
        let calls = provider.invoice_calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].external_id, created.deposit_id.to_string());

        let guard = engine.lock().await;
        let deposit = guard.deposit(&created.deposit_id).unwrap();
        assert_eq!(deposit.status, DepositStatus::Pending);
        assert_eq!(deposit.invoice_id.as_deref(), Some("inv-7"));
        assert_eq!(deposit.deposit_address.as_deref(), Some("bc1qxyz"));
    }

    #[tokio::test]
    async fn test_deposit_flow_marks_failed_on_provider_error() {
        let engine = Mutex::new(Engine::new(EngineConfig::default()));
        let user = engine
            .lock()
            .await
            .create_user("alice".to_string(), None)
            .unwrap();
        let provider = MockProvider::default();
        provider.push_invoice_result(Err(provider_error()));

        let err = request_deposit(
            &engine,
            &provider,
            "https://toto.example/webhooks/shkeeper",
            &user,
            "BTC".to_string(),
            "BTC".to_string(),
            5_000,
            1,
        )
        .await
        .expect_err("provider failure surfaces");
        assert!(matches!(err, Error::Provider { .. }));

        let guard = engine.lock().await;
        let calls = provider.invoice_calls.lock().unwrap();
        let deposit_id = toto_types::DepositId(calls[0].external_id.parse().unwrap());
        let deposit = guard.deposit(&deposit_id).unwrap();
        assert_eq!(deposit.status, DepositStatus::Failed);
        assert!(deposit.is_processed);
        assert_eq!(guard.user(&user).unwrap().balance, 0);
    }

    #[tokio::test]
    async fn test_withdrawal_flow_records_task_id() {
        let engine = Mutex::new(Engine::new(EngineConfig::default()));
        let (user, withdrawal) = {
            let mut guard = engine.lock().await;
            let user = guard.create_user("alice".to_string(), None).unwrap();
            fund_user(&mut guard, &user, 10_000);
            let withdrawal = guard
                .request_withdrawal(&user, 4_000, "TAddr".to_string(), "TRC20".to_string(), 1)
                .unwrap();
            (user, withdrawal)
        };
        let provider = MockProvider::default();
        provider.push_payout_result(Ok(PayoutAccepted {
            task_id: "task-9".to_string(),
        }));

        let task = approve_withdrawal_flow(&engine, &provider, &withdrawal, "ops", 2)
            .await
            .unwrap();
        assert_eq!(task, "task-9");

        let guard = engine.lock().await;
        let record = guard.withdrawal(&withdrawal).unwrap();
        assert_eq!(record.status, WithdrawalStatus::Approved);
        assert_eq!(record.provider_task_id.as_deref(), Some("task-9"));
        assert_eq!(guard.user(&user).unwrap().balance, 6_000);
        let calls = provider.payout_calls.lock().unwrap();
        assert_eq!(calls[0].amount, 4_000);
        assert_eq!(calls[0].destination, "TAddr");
    }

    #[tokio::test]
    async fn test_withdrawal_flow_compensates_on_provider_error() {
        let engine = Mutex::new(Engine::new(EngineConfig::default()));
        let (user, withdrawal) = {
            let mut guard = engine.lock().await;
            let user = guard.create_user("alice".to_string(), None).unwrap();
            fund_user(&mut guard, &user, 10_000);
            let withdrawal = guard
                .request_withdrawal(&user, 4_000, "TAddr".to_string(), "TRC20".to_string(), 1)
                .unwrap();
            (user, withdrawal)
        };
        let provider = MockProvider::default();
        provider.push_payout_result(Err(provider_error()));

        let err = approve_withdrawal_flow(&engine, &provider, &withdrawal, "ops", 2)
            .await
            .expect_err("provider failure surfaces");
        assert!(matches!(err, Error::Provider { .. }));

        let guard = engine.lock().await;
        let record = guard.withdrawal(&withdrawal).unwrap();
        assert_eq!(record.status, WithdrawalStatus::Failed);
        assert_eq!(guard.user(&user).unwrap().balance, 10_000);
        guard.audit_user(&user).unwrap();
    }

    #[tokio::test]
    async fn test_terminal_withdrawal_never_reaches_provider() {
        let engine = Mutex::new(Engine::new(EngineConfig::default()));
        let withdrawal = {
            let mut guard = engine.lock().await;
            let user = guard.create_user("alice".to_string(), None).unwrap();
            fund_user(&mut guard, &user, 10_000);
            let withdrawal = guard
                .request_withdrawal(&user, 4_000, "TAddr".to_string(), "TRC20".to_string(), 1)
                .unwrap();
            guard.reject_withdrawal(&withdrawal, "ops", 2).unwrap();
            withdrawal
        };
        let provider = MockProvider::default();

        let err = approve_withdrawal_flow(&engine, &provider, &withdrawal, "ops", 3)
            .await
            .expect_err("terminal request conflicts");
        assert!(matches!(
            err,
            Error::Engine(toto_engine::EngineError::Conflict { .. })
        ));
        assert!(provider.payout_calls.lock().unwrap().is_empty());
    }
}
