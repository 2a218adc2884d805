//! Toto settlement engine.
//!
//! This crate contains the game lifecycle state machine, the scoring and
//! prize-distribution algorithm, and the wallet state transitions backing the
//! payment reconciliation gateway.
//!
//! ## Determinism requirements
//! - Do not read wall-clock time inside the engine; callers pass `now_ms`.
//! - Every state-mutating operation guards on the entity's current status
//!   before writing and rejects with a conflict rather than double-applying.
//!
//! ## Money invariants
//! Balance mutations happen only through the credit/debit helpers, which pair
//! each mutation with exactly one ledger entry while the caller holds the
//! engine. `Engine::audit_user` checks that the ledger sum equals the balance
//! at any point.
//!
//! The primary entrypoint is [`Engine`].

pub mod cache;
pub mod sweep;

mod engine;
mod error;
mod handlers;
mod store;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;


#[cfg(test)]
mod reconciliation_tests;

pub use cache::TtlCache;
pub use engine::{Engine, EngineConfig};
pub use error::{EngineError, Result};
pub use handlers::lifecycle::{CancelOutcome, MatchResultUpdate, ResultUpdate, ResultsOutcome};
pub use handlers::settlement::{score_prediction, ClaimOutcome, SettlementOutcome};
pub use handlers::stake::stake_price;
pub use handlers::wallet::{PayoutInstruction, WebhookOutcome};
pub use sweep::SweepReport;
