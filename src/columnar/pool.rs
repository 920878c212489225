// Copyright 2025 Tessera Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Process-wide pool of transaction buffers
//!
//! Acquiring a transaction is a hot operation; the bitmaps, update-queue
//! directory and column cache it needs are reused across transactions
//! instead of reallocated. Buffers come back from [`Txn`](super::Txn)
//! drop already empty of semantic content (commit and rollback clear the
//! queues), with capacity retained.

use crossbeam::queue::ArrayQueue;
use roaring::RoaringBitmap;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use crate::columnar::transaction::{ColumnCache, UpdateQueue};

/// Number of buffer sets retained by the pool
const POOL_SLOTS: usize = 64;

/// Initial capacity of the update-queue directory
const QUEUE_DIRECTORY_CAPACITY: usize = 16;

/// Backing storage for one transaction
pub(crate) struct TxnBuffers {
    pub(crate) index: RoaringBitmap,
    pub(crate) deletes: RoaringBitmap,
    pub(crate) inserts: RoaringBitmap,
    pub(crate) updates: Vec<UpdateQueue>,
    pub(crate) columns: SmallVec<[ColumnCache; 16]>,
}

impl TxnBuffers {
    fn fresh() -> Self {
        Self {
            index: RoaringBitmap::new(),
            deletes: RoaringBitmap::new(),
            inserts: RoaringBitmap::new(),
            updates: Vec::with_capacity(QUEUE_DIRECTORY_CAPACITY),
            columns: SmallVec::new(),
        }
    }
}

struct TxnPool {
    slots: ArrayQueue<TxnBuffers>,
    created: AtomicUsize,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

static POOL: OnceLock<TxnPool> = OnceLock::new();

fn global() -> &'static TxnPool {
    POOL.get_or_init(|| TxnPool {
        slots: ArrayQueue::new(POOL_SLOTS),
        created: AtomicUsize::new(0),
        acquired: AtomicUsize::new(0),
        released: AtomicUsize::new(0),
    })
}

/// Pops a buffer set from the pool, allocating a fresh one when empty
pub(crate) fn acquire() -> TxnBuffers {
    let pool = global();
    pool.acquired.fetch_add(1, Ordering::Relaxed);

    match pool.slots.pop() {
        Some(buf) => buf,
        None => {
            pool.created.fetch_add(1, Ordering::Relaxed);
            TxnBuffers::fresh()
        }
    }
}

/// Returns a buffer set to the pool (dropped if the pool is full)
pub(crate) fn release(buf: TxnBuffers) {
    let pool = global();
    pool.released.fetch_add(1, Ordering::Relaxed);
    let _ = pool.slots.push(buf);
}

/// Statistics about the transaction pool
#[derive(Debug, Clone)]
pub struct PoolStats {
    /// Buffer sets currently available for reuse
    pub available: usize,
    /// Buffer sets ever allocated
    pub created: usize,
    /// Total acquire operations
    pub acquired: usize,
    /// Total release operations
    pub released: usize,
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TxnPool: available={} created={} acquired={} released={}",
            self.available, self.created, self.acquired, self.released
        )
    }
}

/// Snapshot of the pool's counters
pub fn stats() -> PoolStats {
    let pool = global();
    PoolStats {
        available: pool.slots.len(),
        created: pool.created.load(Ordering::Relaxed),
        acquired: pool.acquired.load(Ordering::Relaxed),
        released: pool.released.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_release_round_trip() {
        let buf = acquire();
        release(buf);

        let before = stats();
        let buf = acquire();
        release(buf);
        let after = stats();

        assert!(after.acquired >= before.acquired + 1);
        assert!(after.released >= before.released + 1);
        assert!(after.available <= POOL_SLOTS);
    }

    #[test]
    fn test_directory_capacity_preallocated() {
        let buf = acquire();
        assert!(buf.updates.capacity() >= QUEUE_DIRECTORY_CAPACITY);
        release(buf);
    }

    #[test]
    fn test_stats_display() {
        let s = stats();
        assert!(s.to_string().contains("TxnPool"));
    }
}
