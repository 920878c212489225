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

//! Row-bound handles for reading values and enqueueing mutations
//!
//! A [`Selector`] is a read-only handle over one row, able to read any
//! column by name. A [`Cursor`] is a selector additionally bound to one
//! column and that column's update-queue slot, making typed reads and
//! update enqueues on the bound column cheap inside an iteration.
//!
//! Handles live only for the duration of an iteration callback; their
//! row index is rebound on every step. Reads degrade to `None` (or
//! `false`) when the column is unknown, the value absent, or the
//! requested capability unsupported.

use std::sync::Arc;

use crate::columnar::collection::Collection;
use crate::columnar::column::{Column, UpdateKind};
use crate::columnar::transaction::Txn;
use crate::core::Value;

/// Where a selector resolves columns from
enum Source<'a> {
    /// Inside a transaction: resolves through the txn's column cache
    Txn(&'a Txn<'a>),
    /// Outside any transaction: resolves through the collection registry
    Collection(&'a Collection),
}

/// Read-only handle over one row
pub struct Selector<'a> {
    idx: u32,
    source: Source<'a>,
}

impl<'a> Selector<'a> {
    pub(crate) fn for_txn(txn: &'a Txn<'a>, idx: u32) -> Self {
        Self {
            idx,
            source: Source::Txn(txn),
        }
    }

    pub(crate) fn for_collection(collection: &'a Collection, idx: u32) -> Self {
        Self {
            idx,
            source: Source::Collection(collection),
        }
    }

    /// The row index this selector is bound to
    pub fn index(&self) -> u32 {
        self.idx
    }

    fn column(&self, name: &str) -> Option<Arc<dyn Column>> {
        match &self.source {
            Source::Txn(txn) => txn
                .lookup_cached(name)
                .or_else(|| txn.owner().column_load(name)),
            Source::Collection(collection) => collection.column_load(name),
        }
    }

    /// Reads the row's value at a named column
    pub fn value_at(&self, column: &str) -> Option<Value> {
        self.column(column)?.value(self.idx)
    }

    /// Reads the row's value at a named text column
    pub fn string_at(&self, column: &str) -> Option<Arc<str>> {
        self.value_at(column)?.as_text()
    }

    /// Reads the row's value at a named numeric column as f64
    pub fn float_at(&self, column: &str) -> Option<f64> {
        self.column(column)?.as_numeric()?.as_f64(self.idx)
    }

    /// Reads the row's value at a named numeric column as i64
    pub fn int_at(&self, column: &str) -> Option<i64> {
        self.column(column)?.as_numeric()?.as_i64(self.idx)
    }

    /// Reads the row's value at a named numeric column as u64
    pub fn uint_at(&self, column: &str) -> Option<u64> {
        self.column(column)?.as_numeric()?.as_u64(self.idx)
    }

    /// Reads the presence bit of a named column directly
    pub fn bool_at(&self, column: &str) -> bool {
        self.column(column).is_some_and(|c| c.contains(self.idx))
    }
}

/// Read/write handle over one row, bound to one column
///
/// Mutations are deferred: they append to the owning transaction's
/// update queues and take effect on commit.
pub struct Cursor<'a, 'c> {
    idx: u32,
    /// Slot of the bound column's update queue within the transaction
    queue: usize,
    column: Arc<dyn Column>,
    txn: &'a mut Txn<'c>,
}

impl<'a, 'c> Cursor<'a, 'c> {
    pub(crate) fn new(txn: &'a mut Txn<'c>, column: Arc<dyn Column>, queue: usize) -> Self {
        Self {
            idx: 0,
            queue,
            column,
            txn,
        }
    }

    /// Rebinds the cursor to a row (called per iteration step)
    pub(crate) fn set_row(&mut self, idx: u32) {
        self.idx = idx;
    }

    /// The row index this cursor is bound to
    pub fn index(&self) -> u32 {
        self.idx
    }

    // =========================================================================
    // Reads on the bound column
    // =========================================================================

    /// Reads the bound column's value at the current row
    pub fn value(&self) -> Option<Value> {
        self.column.value(self.idx)
    }

    /// Reads the bound column's value as text
    pub fn string(&self) -> Option<Arc<str>> {
        self.value()?.as_text()
    }

    /// Reads the bound column's value as f64
    pub fn float(&self) -> Option<f64> {
        self.column.as_numeric()?.as_f64(self.idx)
    }

    /// Reads the bound column's value as i64
    pub fn int(&self) -> Option<i64> {
        self.column.as_numeric()?.as_i64(self.idx)
    }

    /// Reads the bound column's value as u64
    pub fn uint(&self) -> Option<u64> {
        self.column.as_numeric()?.as_u64(self.idx)
    }

    /// Reads the bound column's presence bit
    pub fn bool(&self) -> bool {
        self.column.contains(self.idx)
    }

    // =========================================================================
    // Reads across other columns
    // =========================================================================

    /// Reads the current row's value at any named column
    pub fn value_at(&mut self, column: &str) -> Option<Value> {
        self.txn.column_at(column)?.value(self.idx)
    }

    /// Reads the current row's value at a named text column
    pub fn string_at(&mut self, column: &str) -> Option<Arc<str>> {
        self.value_at(column)?.as_text()
    }

    /// Reads the current row's value at a named numeric column as f64
    pub fn float_at(&mut self, column: &str) -> Option<f64> {
        self.txn.column_at(column)?.as_numeric()?.as_f64(self.idx)
    }

    /// Reads the current row's value at a named numeric column as i64
    pub fn int_at(&mut self, column: &str) -> Option<i64> {
        self.txn.column_at(column)?.as_numeric()?.as_i64(self.idx)
    }

    /// Reads the current row's value at a named numeric column as u64
    pub fn uint_at(&mut self, column: &str) -> Option<u64> {
        self.txn.column_at(column)?.as_numeric()?.as_u64(self.idx)
    }

    /// Reads the presence bit of any named column at the current row
    pub fn bool_at(&mut self, column: &str) -> bool {
        self.txn
            .column_at(column)
            .is_some_and(|c| c.contains(self.idx))
    }

    // =========================================================================
    // Deferred mutation
    // =========================================================================

    /// Queues a store of `value` into the bound column at the current row
    pub fn update(&mut self, value: impl Into<Value>) {
        self.txn
            .queue_push(self.queue, UpdateKind::Put, self.idx, value.into());
    }

    /// Queues an increment of the bound column at the current row.
    /// Only meaningful for numeric columns.
    pub fn add(&mut self, amount: impl Into<Value>) {
        self.txn
            .queue_push(self.queue, UpdateKind::Add, self.idx, amount.into());
    }

    /// Queues a store into any named column at the current row
    pub fn update_at(&mut self, column: &str, value: impl Into<Value>) {
        self.txn
            .queue_update(UpdateKind::Put, column, self.idx, value.into());
    }

    /// Queues an increment of any named column at the current row
    pub fn add_at(&mut self, column: &str, amount: impl Into<Value>) {
        self.txn
            .queue_update(UpdateKind::Add, column, self.idx, amount.into());
    }

    /// Marks the current row for deletion on commit
    pub fn delete(&mut self) {
        self.txn.mark_deleted(self.idx);
    }
}
