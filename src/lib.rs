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

//! # Tessera - in-memory columnar collection store
//!
//! Tessera stores rows as logical tuples distributed across independently
//! stored, typed columns. Every column doubles as an existence bitmap
//! indexed by row position, so queries compose by bitmap algebra instead
//! of row scans, and mutations are queued per transaction and published
//! atomically on commit.
//!
//! ## Key features
//!
//! - **Bitmap filter algebra** - intersect, subtract and union column
//!   existence bitmaps plus typed value predicates
//! - **Deferred, batched mutation** - insert / put / add / delete queue up
//!   per column and replay in one pass on commit
//! - **Snapshot queries** - a transaction observes the collection as of
//!   acquisition; partial commits and rollbacks are supported
//! - **Transaction pooling** - buffers recycle through a process-wide
//!   pool, so beginning a transaction stays allocation-free in steady
//!   state
//! - **Computed index columns** - register a predicate over a column and
//!   filter by it like any other column
//! - **Row expiry metadata** - per-row TTL deadlines persisted on a
//!   reserved column for an external sweeper
//!
//! ## Quick start
//!
//! ```rust
//! use tessera::{Collection, DataType, Value};
//!
//! let players = Collection::new();
//! players.create_column("name", DataType::Text).unwrap();
//! players.create_column("age", DataType::Int64).unwrap();
//! players.create_column("active", DataType::Bool).unwrap();
//!
//! players.insert_one(&[
//!     ("name", Value::text("merlin")),
//!     ("age", Value::Int(212)),
//!     ("active", Value::Bool(true)),
//! ]);
//!
//! let mut txn = players.begin();
//! let elders = txn
//!     .with("active")
//!     .with_int("age", |age| age > 100)
//!     .count();
//! assert_eq!(elders, 1);
//! txn.commit();
//! ```
//!
//! ## Modules
//!
//! - [`core`] - Core types ([`Value`], [`DataType`], [`Error`])
//! - [`columnar`] - Collection, transaction engine, columns and cursors

pub mod columnar;
pub mod core;

// Re-export main types for convenience
pub use crate::core::{DataType, Error, Result, Value};

pub use columnar::{
    Collection, Column, Cursor, Numeric, PoolStats, Selector, Txn, Update, UpdateKind,
    EXPIRE_COLUMN,
};
