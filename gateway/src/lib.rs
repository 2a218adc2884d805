//! Payment reconciliation gateway.
//!
//! Bridges the settlement engine to the external crypto payment provider:
//! creates deposit invoices, creates payout tasks, and consumes asynchronous
//! webhook notifications idempotently. Engine state transitions happen under
//! the engine lock; provider calls never do.

pub mod flows;
pub mod provider;
pub mod shkeeper;
pub mod webhook;

use thiserror::Error;
use toto_engine::EngineError;

/// Error type for gateway operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("provider call failed: {status}: {body}")]
    Provider {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("invalid notification: {0}")]
    InvalidNotification(String),
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

pub use flows::{approve_withdrawal_flow, request_deposit, DepositCreated};
pub use provider::{InvoiceDetails, InvoiceRequest, PaymentProvider, PayoutAccepted, PayoutRequest};
pub use shkeeper::ShkeeperClient;
pub use webhook::{process_notification, verify_webhook_secret, ChainTransaction, PaymentNotification};

#[cfg(any(test, feature = "mocks"))]
pub use provider::MockProvider;
