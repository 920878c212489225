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

//! Monotonic nanosecond clock for expiry deadlines
//!
//! [`Txn::insert_with_ttl`](crate::columnar::Txn::insert_with_ttl) persists
//! per-row deadlines as absolute nanoseconds since the Unix epoch. The
//! clock never goes backwards, so deadlines written later always compare
//! greater-or-equal, even across clock skew.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Last issued timestamp, shared by all threads
static LAST_NANOS: AtomicI64 = AtomicI64::new(0);

/// Returns the current wall time in nanoseconds since the Unix epoch,
/// strictly increasing across calls.
///
/// Uses the system clock as the base and a compare-and-swap loop to handle
/// concurrent callers and clocks that step backwards.
pub fn now_nanos() -> i64 {
    let wall = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(1);

    loop {
        let last = LAST_NANOS.load(Ordering::Acquire);

        // max(wall, last + 1) keeps the sequence strictly increasing
        let next = if wall > last { wall } else { last + 1 };

        if LAST_NANOS
            .compare_exchange(last, next, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            return next;
        }
    }
}
