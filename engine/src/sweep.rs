//! Periodic lifecycle sweep.
//!
//! Any trigger may invoke the sweep — a timer, an admin call, a message — and
//! repeated invocation is safe: already-closed pools are simply no longer due.

use serde::Serialize;
use tracing::warn;

use toto_types::{PoolId, PoolStatus};

use crate::engine::Engine;

/// Per-sweep summary. Failed pools stay open and are retried on the next
/// sweep.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub closed: Vec<PoolId>,
    pub failed: Vec<PoolId>,
}

impl Engine {
    /// Close every open pool whose deadline has passed. A failure on one pool
    /// does not abort the rest of the sweep.
    pub fn close_due_pools(&mut self, now_ms: u64) -> SweepReport {
        let due: Vec<PoolId> = self
            .store
            .pools()
            .filter(|pool| pool.status == PoolStatus::Open && now_ms >= pool.deadline_ms)
            .map(|pool| pool.id)
            .collect();

        let mut report = SweepReport::default();
        for pool_id in due {
            match self.close_pool(&pool_id, now_ms) {
                Ok(()) => report.closed.push(pool_id),
                Err(err) => {
                    warn!(pool = %pool_id, %err, "sweep failed to close pool");
                    report.failed.push(pool_id);
                }
            }
        }
        report
    }
}
