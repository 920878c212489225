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

//! Columnar storage engine
//!
//! This module provides the row store and its transaction engine:
//!
//! - [`Collection`] - column registry, live row-set and row allocator
//! - [`Txn`] - snapshot, filter algebra and deferred mutation
//! - [`Selector`] / [`Cursor`] - row-bound read and write handles
//! - [`Column`] / [`Numeric`] - the capability traits columns implement
//! - [`pool`] - process-wide transaction buffer reuse
//!
//! # Architecture
//!
//! Each row is a logical tuple distributed across independently stored,
//! typed columns; every column doubles as an existence bitmap indexed by
//! row position. The collection-level `fill` bitmap holds the rows
//! visible to new transactions; a transaction clones it at acquisition
//! and all filtering happens on that private copy.

pub mod collection;
pub mod column;
pub mod cursor;
pub mod pool;
pub mod timestamp;
pub mod transaction;

// Re-export main types
pub use collection::{Collection, EXPIRE_COLUMN};
pub use column::{Column, Numeric, Update, UpdateKind};
pub use cursor::{Cursor, Selector};
pub use pool::PoolStats;
pub use timestamp::now_nanos;
pub use transaction::Txn;
