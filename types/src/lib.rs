//! Toto domain types.
//!
//! Defines the user/pool/prediction/ledger/payment state and constants shared by the
//! settlement engine, the payment gateway, and the API service.

mod constants;
mod ids;
mod ledger;
mod payment;
mod pool;
mod prediction;
mod user;

pub use constants::*;
pub use ids::*;
pub use ledger::*;
pub use payment::*;
pub use pool::*;
pub use prediction::*;
pub use user::*;
