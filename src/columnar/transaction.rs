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

//! Transactions over a columnar collection
//!
//! A [`Txn`] snapshots the collection's live row-set into a private
//! working bitmap, narrows or widens it with set-algebraic filters
//! against column presence bitmaps and value predicates, and queues
//! typed mutations that only become visible on [`Txn::commit`].
//!
//! # Lifecycle
//!
//! ```text
//! Collection::begin -> filter/iterate/mutate -> commit and/or rollback -> drop
//! ```
//!
//! Commit applies three phases in a fixed order: deletes, then updates,
//! then insert visibility. Partial commits are allowed: committing with
//! empty queues is a no-op, and a transaction can keep filtering and
//! mutating after a commit or rollback. Dropping a transaction rolls
//! back whatever is still pending and returns its buffers to the
//! process-wide pool.

use std::mem;
use std::time::Duration;

use roaring::RoaringBitmap;
use smallvec::SmallVec;
use std::sync::Arc;

use crate::columnar::collection::{Collection, EXPIRE_COLUMN};
use crate::columnar::column::{Column, Update, UpdateKind};
use crate::columnar::cursor::{Cursor, Selector};
use crate::columnar::pool::{self, TxnBuffers};
use crate::columnar::timestamp;
use crate::core::{Error, Result, Value};

/// Pending updates for one column, in enqueue order
pub(crate) struct UpdateQueue {
    pub(crate) name: String,
    pub(crate) queue: Vec<Update>,
}

/// A column resolution memoized for the duration of a transaction
pub(crate) struct ColumnCache {
    pub(crate) name: String,
    pub(crate) col: Arc<dyn Column>,
}

/// A transaction over one collection, supporting filtering, iteration
/// and deferred mutation
///
/// A transaction is owned by a single thread between acquisition and
/// drop. Its working bitmap is a snapshot: commits by other transactions
/// do not appear in it.
pub struct Txn<'c> {
    /// The collection this transaction is bound to
    owner: &'c Collection,
    /// Working bitmap, the current query result set
    index: RoaringBitmap,
    /// Rows queued for deletion on commit
    deletes: RoaringBitmap,
    /// Rows allocated by this transaction, published on commit
    inserts: RoaringBitmap,
    /// Per-column pending update queues
    updates: Vec<UpdateQueue>,
    /// Column resolutions, linear scan (few distinct columns per txn)
    columns: SmallVec<[ColumnCache; 16]>,
}

impl<'c> Txn<'c> {
    /// Acquires a pooled transaction bound to `owner` and snapshots the
    /// live row-set into the working bitmap
    pub(crate) fn acquire(owner: &Collection) -> Txn<'_> {
        let mut buf = pool::acquire();
        buf.columns.clear();
        owner.snapshot_into(&mut buf.index);
        Txn {
            owner,
            index: buf.index,
            deletes: buf.deletes,
            inserts: buf.inserts,
            updates: buf.updates,
            columns: buf.columns,
        }
    }

    pub(crate) fn owner(&self) -> &'c Collection {
        self.owner
    }

    /// Loads and memoizes a column for this transaction
    pub(crate) fn column_at(&mut self, name: &str) -> Option<Arc<dyn Column>> {
        if let Some(hit) = self.columns.iter().find(|c| c.name == name) {
            return Some(Arc::clone(&hit.col));
        }

        let col = self.owner.column_load(name)?;
        self.columns.push(ColumnCache {
            name: name.to_string(),
            col: Arc::clone(&col),
        });
        Some(col)
    }

    /// Probes the memoized columns without loading (read-only handles)
    pub(crate) fn lookup_cached(&self, name: &str) -> Option<Arc<dyn Column>> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| Arc::clone(&c.col))
    }

    // =========================================================================
    // Filter algebra
    // =========================================================================

    /// Narrows the result set to rows where `column` has a value.
    /// An unknown column empties the result set: `with` is a required
    /// filter and a missing column can satisfy nothing.
    pub fn with(&mut self, column: &str) -> &mut Self {
        match self.column_at(column) {
            Some(col) => col.intersect(&mut self.index),
            None => self.index.clear(),
        }
        self
    }

    /// Applies [`Txn::with`] for each column, left to right
    pub fn with_many(&mut self, columns: &[&str]) -> &mut Self {
        for column in columns {
            self.with(column);
        }
        self
    }

    /// Removes rows where `column` has a value. Unknown columns are
    /// ignored: there is nothing to subtract.
    pub fn without(&mut self, column: &str) -> &mut Self {
        if let Some(col) = self.column_at(column) {
            col.difference(&mut self.index);
        }
        self
    }

    /// Applies [`Txn::without`] for each column, left to right
    pub fn without_many(&mut self, columns: &[&str]) -> &mut Self {
        for column in columns {
            self.without(column);
        }
        self
    }

    /// Widens the result set with rows where `column` has a value.
    /// Unknown columns are ignored.
    pub fn union(&mut self, column: &str) -> &mut Self {
        if let Some(col) = self.column_at(column) {
            col.union_into(&mut self.index);
        }
        self
    }

    /// Applies [`Txn::union`] for each column, left to right
    pub fn union_many(&mut self, columns: &[&str]) -> &mut Self {
        for column in columns {
            self.union(column);
        }
        self
    }

    /// Narrows the result set with a predicate over present values.
    /// Rows without a value never match; an unknown column is a no-op.
    pub fn with_value(&mut self, column: &str, mut predicate: impl FnMut(&Value) -> bool) -> &mut Self {
        if let Some(col) = self.column_at(column) {
            self.filter_index(|x| col.value(x).map_or(false, |v| predicate(&v)));
        }
        self
    }

    /// Narrows with a float predicate; the column must carry the numeric
    /// capability, otherwise the result set is left unchanged
    pub fn with_float(&mut self, column: &str, mut predicate: impl FnMut(f64) -> bool) -> &mut Self {
        if let Some(col) = self.column_at(column) {
            if let Some(n) = col.as_numeric() {
                self.filter_index(|x| n.as_f64(x).map_or(false, &mut predicate));
            }
        }
        self
    }

    /// Narrows with a signed integer predicate; non-numeric columns
    /// leave the result set unchanged
    pub fn with_int(&mut self, column: &str, mut predicate: impl FnMut(i64) -> bool) -> &mut Self {
        if let Some(col) = self.column_at(column) {
            if let Some(n) = col.as_numeric() {
                self.filter_index(|x| n.as_i64(x).map_or(false, &mut predicate));
            }
        }
        self
    }

    /// Narrows with an unsigned integer predicate; non-numeric columns
    /// leave the result set unchanged
    pub fn with_uint(&mut self, column: &str, mut predicate: impl FnMut(u64) -> bool) -> &mut Self {
        if let Some(col) = self.column_at(column) {
            if let Some(n) = col.as_numeric() {
                self.filter_index(|x| n.as_u64(x).map_or(false, &mut predicate));
            }
        }
        self
    }

    /// Narrows with a string predicate over text values
    pub fn with_string(&mut self, column: &str, mut predicate: impl FnMut(&str) -> bool) -> &mut Self {
        self.with_value(column, |v| v.as_str().map_or(false, &mut predicate))
    }

    /// Retains only the working-bitmap rows matching `f`
    fn filter_index(&mut self, mut f: impl FnMut(u32) -> bool) {
        let mut keep = RoaringBitmap::new();
        for x in self.index.iter() {
            if f(x) {
                keep.insert(x);
            }
        }
        self.index = keep;
    }

    // =========================================================================
    // Read path
    // =========================================================================

    /// Number of rows matching the query
    pub fn count(&self) -> u64 {
        self.index.len()
    }

    /// Returns a selector for a row, or `None` if the row is not in the
    /// current result set
    pub fn read_at(&self, index: u32) -> Option<Selector<'_>> {
        if self.index.contains(index) {
            Some(Selector::for_txn(self, index))
        } else {
            None
        }
    }

    /// Iterates the result set in ascending row order. Iteration stops
    /// when `f` returns false.
    pub fn select<F>(&self, mut f: F)
    where
        F: FnMut(Selector<'_>) -> bool,
    {
        for x in self.index.iter() {
            if !f(Selector::for_txn(self, x)) {
                break;
            }
        }
    }

    /// Iterates the result set with a cursor bound to `column`,
    /// supporting cheap typed reads and update enqueueing. Iteration
    /// stops when `f` returns false.
    ///
    /// This is the one operation that fails on an unknown column: no
    /// iteration could take place, so the mistake cannot be absorbed.
    pub fn range<F>(&mut self, column: &str, mut f: F) -> Result<()>
    where
        F: FnMut(&mut Cursor<'_, 'c>) -> bool,
    {
        let col = self
            .column_at(column)
            .ok_or_else(|| Error::column_not_found(column))?;
        let queue = self.queue_index(column);

        // The working bitmap is parked during iteration so the cursor
        // can borrow the transaction mutably; cursor operations never
        // touch it.
        let index = mem::take(&mut self.index);
        let mut cur = Cursor::new(self, col, queue);
        for x in index.iter() {
            cur.set_row(x);
            if !f(&mut cur) {
                break;
            }
        }
        drop(cur);
        self.index = index;
        Ok(())
    }

    // =========================================================================
    // Write path
    // =========================================================================

    /// Inserts an object at a new row index and returns the index. The
    /// row becomes visible only after commit; it is not part of this
    /// transaction's current result set. Pairs naming unknown columns
    /// are silently dropped.
    pub fn insert(&mut self, object: &[(&str, Value)]) -> u32 {
        self.insert_with_expiry(object, 0)
    }

    /// Inserts an object with a time-to-live. The expiry deadline is
    /// persisted on the reserved `expire` column as absolute nanoseconds.
    pub fn insert_with_ttl(&mut self, object: &[(&str, Value)], ttl: Duration) -> u32 {
        let deadline = timestamp::now_nanos().saturating_add(ttl.as_nanos() as i64);
        self.insert_with_expiry(object, deadline)
    }

    fn insert_with_expiry(&mut self, object: &[(&str, Value)], expire_at: i64) -> u32 {
        let idx = self.owner.next();
        self.inserts.insert(idx);

        for (name, value) in object {
            if self.column_at(name).is_some() {
                self.queue_update(UpdateKind::Put, name, idx, value.clone());
            }
        }
        if expire_at != 0 {
            self.queue_update(UpdateKind::Put, EXPIRE_COLUMN, idx, Value::Int(expire_at));
        }
        idx
    }

    /// Marks a row of the current result set for deletion on commit.
    /// Returns false for rows outside the result set, including rows
    /// inserted by this very transaction.
    pub fn delete_at(&mut self, index: u32) -> bool {
        if !self.index.contains(index) {
            return false;
        }
        self.deletes.insert(index);
        true
    }

    /// Marks every result-set row matching `f` for deletion on commit
    pub fn delete_if<F>(&mut self, mut f: F)
    where
        F: FnMut(Selector<'_>) -> bool,
    {
        let mut marked = RoaringBitmap::new();
        {
            let this: &Txn<'c> = &*self;
            for x in this.index.iter() {
                if f(Selector::for_txn(this, x)) {
                    marked.insert(x);
                }
            }
        }
        self.deletes |= marked;
    }

    /// Marks the entire current result set for deletion on commit
    pub fn delete_all(&mut self) {
        self.deletes |= &self.index;
    }

    /// Finds or creates the update queue slot for a column
    pub(crate) fn queue_index(&mut self, name: &str) -> usize {
        if let Some(i) = self.updates.iter().position(|q| q.name == name) {
            return i;
        }
        self.updates.push(UpdateQueue {
            name: name.to_string(),
            queue: Vec::with_capacity(64),
        });
        self.updates.len() - 1
    }

    /// Appends an update record to a column's queue, creating it on demand
    pub(crate) fn queue_update(&mut self, kind: UpdateKind, column: &str, index: u32, value: Value) {
        let qi = self.queue_index(column);
        self.updates[qi].queue.push(Update { kind, index, value });
    }

    /// Appends an update record to an already-resolved queue slot
    pub(crate) fn queue_push(&mut self, queue: usize, kind: UpdateKind, index: u32, value: Value) {
        self.updates[queue].queue.push(Update { kind, index, value });
    }

    /// Marks a row for deletion without consulting the result set
    /// (cursor-held rows are in the result set by construction)
    pub(crate) fn mark_deleted(&mut self, index: u32) {
        self.deletes.insert(index);
    }

    // =========================================================================
    // Commit / rollback
    // =========================================================================

    /// Applies pending deletes, updates and inserts to the collection,
    /// in that order. Deletes retire first so a row replaced at the same
    /// position is never observed with its old values; insert visibility
    /// publishes last so readers never see a half-populated row. Calling
    /// commit with nothing pending is a no-op, and further work may be
    /// staged and committed on the same transaction afterwards.
    pub fn commit(&mut self) {
        self.delete_pending();
        self.update_pending();
        self.insert_pending();
    }

    /// Discards pending deletes, updates and inserts. The working bitmap
    /// is left intact so the transaction can keep querying; rollback is
    /// idempotent.
    pub fn rollback(&mut self) {
        self.deletes.clear();
        self.inserts.clear();
        for q in &mut self.updates {
            q.queue.clear();
        }
    }

    /// Retires rows marked for deletion from every column, then from the
    /// collection's live set
    fn delete_pending(&mut self) {
        if self.deletes.is_empty() {
            return;
        }

        self.owner.columns_range(|col| col.delete_many(&self.deletes));
        self.owner.fill_andnot(&self.deletes);
        self.deletes.clear();
    }

    /// Replays each non-empty update queue onto its column and the index
    /// columns registered on it
    fn update_pending(&mut self) {
        let grow_to = self.inserts.max();
        for qi in 0..self.updates.len() {
            if self.updates[qi].queue.is_empty() {
                continue;
            }

            let columns = self.owner.column_load_with_index(&self.updates[qi].name);
            for col in &columns {
                if let Some(max) = grow_to {
                    col.grow(max);
                }
                col.update_many(&self.updates[qi].queue);
            }

            self.updates[qi].queue.clear();
        }
    }

    /// Publishes rows inserted by this transaction into the live set
    fn insert_pending(&mut self) {
        if self.inserts.is_empty() {
            return;
        }
        self.owner.fill_union(&self.inserts);
        self.inserts.clear();
    }
}

impl Drop for Txn<'_> {
    fn drop(&mut self) {
        // Anything still pending is discarded; buffers go back to the
        // pool with their capacity retained
        self.rollback();
        pool::release(TxnBuffers {
            index: mem::take(&mut self.index),
            deletes: mem::take(&mut self.deletes),
            inserts: mem::take(&mut self.inserts),
            updates: mem::take(&mut self.updates),
            columns: mem::take(&mut self.columns),
        });
    }
}

impl std::fmt::Debug for Txn<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Txn")
            .field("matched", &self.index.len())
            .field("deletes", &self.deletes.len())
            .field("inserts", &self.inserts.len())
            .field("update_queues", &self.updates.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DataType;

    fn people() -> Collection {
        let c = Collection::new();
        c.create_column("age", DataType::Int64).unwrap();
        c.create_column("name", DataType::Text).unwrap();
        c.create_column("active", DataType::Bool).unwrap();
        c
    }

    #[test]
    fn test_snapshot_taken_at_acquire() {
        let c = people();
        c.insert_one(&[("age", Value::Int(30))]);

        let txn = c.begin();
        assert_eq!(txn.count(), 1);

        // A commit by another transaction is invisible to the snapshot
        c.insert_one(&[("age", Value::Int(40))]);
        assert_eq!(txn.count(), 1);
        assert_eq!(c.count(), 2);
    }

    #[test]
    fn test_insert_not_in_own_result_set() {
        let c = people();
        let mut txn = c.begin();
        let idx = txn.insert(&[("age", Value::Int(25))]);

        assert_eq!(txn.count(), 0);
        assert!(txn.read_at(idx).is_none());
        assert!(!txn.delete_at(idx), "same-txn inserts cannot be deleted");

        txn.commit();
        assert_eq!(c.count(), 1);
    }

    #[test]
    fn test_update_queue_order_preserved() {
        let c = people();
        let idx = c.insert_one(&[("age", Value::Int(5))]);

        let mut txn = c.begin();
        txn.range("age", |cur| {
            cur.add(Value::Int(3));
            cur.update(Value::Int(0));
            cur.add(Value::Int(2));
            true
        })
        .unwrap();
        txn.commit();

        let mut out = None;
        c.select_at(idx, |s| out = s.int_at("age"));
        assert_eq!(out, Some(2));
    }

    #[test]
    fn test_commit_is_repeatable() {
        let c = people();
        let mut txn = c.begin();
        txn.insert(&[("age", Value::Int(1))]);
        txn.commit();
        assert_eq!(c.count(), 1);

        // Nothing pending: a second commit changes nothing
        txn.commit();
        assert_eq!(c.count(), 1);

        // The same transaction can stage and commit again
        txn.insert(&[("age", Value::Int(2))]);
        txn.commit();
        assert_eq!(c.count(), 2);
    }

    #[test]
    fn test_rollback_keeps_working_set() {
        let c = people();
        c.insert_one(&[("age", Value::Int(30))]);

        let mut txn = c.begin();
        txn.insert(&[("age", Value::Int(99))]);
        txn.delete_all();
        txn.rollback();
        txn.rollback(); // idempotent

        assert_eq!(txn.count(), 1, "rollback leaves the query intact");
        txn.commit();
        assert_eq!(c.count(), 1, "rolled-back staging publishes nothing");
    }

    #[test]
    fn test_drop_without_commit_rolls_back() {
        let c = people();
        {
            let mut txn = c.begin();
            txn.insert(&[("age", Value::Int(7))]);
        }
        assert_eq!(c.count(), 0);

        // The pooled buffers must come back clean
        let mut txn = c.begin();
        txn.commit();
        assert_eq!(c.count(), 0);
    }

    #[test]
    fn test_column_cache_memoizes() {
        let c = people();
        let mut txn = c.begin();
        let a = txn.column_at("age").unwrap();
        let b = txn.column_at("age").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(txn.lookup_cached("age").is_some());
        assert!(txn.lookup_cached("name").is_none());
    }

    #[test]
    fn test_range_unknown_column_errors() {
        let c = people();
        let mut txn = c.begin();
        let err = txn.range("ghost", |_| true).unwrap_err();
        assert_eq!(err, Error::column_not_found("ghost"));
    }

    #[test]
    fn test_range_restores_working_set() {
        let c = people();
        for i in 0..5i64 {
            c.insert_one(&[("age", Value::Int(i))]);
        }

        let mut txn = c.begin();
        let mut visited = 0;
        txn.range("age", |_| {
            visited += 1;
            visited < 3
        })
        .unwrap();
        assert_eq!(visited, 3, "early stop honored");
        assert_eq!(txn.count(), 5, "working set untouched by iteration");
    }
}
