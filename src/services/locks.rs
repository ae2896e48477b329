//! Per-Market Declaration Locks
//!
//! A declaration holds its market's lock across validation, persistence
//! and settlement, so each market settles one declaration at a time
//! while distinct markets proceed in parallel.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Registry of per-market mutexes. Entries are created on first use and
/// kept for the life of the process.
#[derive(Default)]
pub struct MarketLocks {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl MarketLocks {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Take the market's lock, waiting for any in-flight declaration on
    /// the same market to finish first.
    pub async fn acquire(&self, market_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(market_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        lock.lock_owned().await
    }
}
