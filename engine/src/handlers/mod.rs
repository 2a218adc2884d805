//! Engine operation handlers, split per domain: pool lifecycle, settlement,
//! stake submission, and wallet transitions.

pub(crate) mod lifecycle;
pub(crate) mod settlement;
pub(crate) mod stake;
pub(crate) mod wallet;
