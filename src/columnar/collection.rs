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

//! Collection of rows distributed across typed columns
//!
//! A [`Collection`] owns the column registry and the global `fill` bitmap
//! whose set bits are exactly the row indices visible to new transactions.
//! All reads and writes go through a [`Txn`]: the collection itself only
//! hands out columns, allocates row indices, and folds committed insert
//! and delete bitmaps into `fill` under its lock.
//!
//! Lock order is registry → column → fill; no path acquires them in the
//! opposite direction.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use roaring::RoaringBitmap;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::sync::Arc;

use crate::columnar::column::{new_column, Column, IndexColumn};
use crate::columnar::cursor::Selector;
use crate::columnar::transaction::Txn;
use crate::core::{DataType, Error, Result, Value};

/// Reserved column persisting per-row expiry deadlines as absolute
/// nanoseconds. The engine only writes it; sweeping is a collaborator's
/// job.
pub const EXPIRE_COLUMN: &str = "expire";

/// A registered column plus its relationships to index columns
struct Entry {
    col: Arc<dyn Column>,
    /// Names of index columns registered on this base column
    indexes: SmallVec<[String; 2]>,
    /// For an index column, the base column it derives from
    parent: Option<String>,
}

/// Columnar collection of rows addressed by dense u32 indices
pub struct Collection {
    /// Column registry, base and index columns by name
    cols: RwLock<FxHashMap<String, Entry>>,
    /// Row indices currently visible to new transactions
    fill: Mutex<RoaringBitmap>,
    /// Monotonic row index allocator
    next: AtomicU32,
}

impl Collection {
    /// Creates an empty collection with the reserved expiry column
    pub fn new() -> Self {
        let collection = Self {
            cols: RwLock::new(FxHashMap::default()),
            fill: Mutex::new(RoaringBitmap::new()),
            next: AtomicU32::new(0),
        };
        let _ = collection.create_column(EXPIRE_COLUMN, DataType::Int64);
        collection
    }

    // =========================================================================
    // Column registry
    // =========================================================================

    /// Registers a column of the given element type
    pub fn create_column(&self, name: &str, data_type: DataType) -> Result<()> {
        self.create_column_with(name, new_column(data_type))
    }

    /// Registers a caller-provided column implementation
    pub fn create_column_with(&self, name: &str, col: Arc<dyn Column>) -> Result<()> {
        let mut cols = self.cols.write();
        if cols.contains_key(name) {
            return Err(Error::column_already_exists(name));
        }
        cols.insert(
            name.to_string(),
            Entry {
                col,
                indexes: SmallVec::new(),
                parent: None,
            },
        );
        Ok(())
    }

    /// Registers a computed index column over `on_column`
    ///
    /// The index is resolvable under its own name (so it can be used in
    /// filters) and is associated with the base column so that committed
    /// updates fan out to it. Existing rows are indexed immediately.
    pub fn create_index(
        &self,
        index_name: &str,
        on_column: &str,
        rule: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Result<()> {
        let mut cols = self.cols.write();
        if cols.contains_key(index_name) {
            return Err(Error::column_already_exists(index_name));
        }
        let base = match cols.get_mut(on_column) {
            Some(entry) => {
                entry.indexes.push(index_name.to_string());
                Arc::clone(&entry.col)
            }
            None => return Err(Error::index_target_not_found(on_column)),
        };

        let index = IndexColumn::new(rule);
        index.seed(base.as_ref());
        cols.insert(
            index_name.to_string(),
            Entry {
                col: Arc::new(index),
                indexes: SmallVec::new(),
                parent: Some(on_column.to_string()),
            },
        );
        Ok(())
    }

    /// Removes a column and any index columns registered on it
    pub fn drop_column(&self, name: &str) -> Result<()> {
        let mut cols = self.cols.write();
        let entry = cols.remove(name).ok_or_else(|| Error::column_not_found(name))?;
        for index_name in &entry.indexes {
            cols.remove(index_name.as_str());
        }
        if let Some(parent) = entry.parent {
            if let Some(parent_entry) = cols.get_mut(&parent) {
                parent_entry.indexes.retain(|n| n.as_str() != name);
            }
        }
        Ok(())
    }

    /// Looks up a single column by name
    pub fn column_load(&self, name: &str) -> Option<Arc<dyn Column>> {
        self.cols.read().get(name).map(|e| Arc::clone(&e.col))
    }

    /// Looks up a column together with the index columns registered on it,
    /// base first. Returns an empty vector for an unknown name.
    pub(crate) fn column_load_with_index(&self, name: &str) -> SmallVec<[Arc<dyn Column>; 2]> {
        let cols = self.cols.read();
        let mut out = SmallVec::new();
        if let Some(entry) = cols.get(name) {
            out.push(Arc::clone(&entry.col));
            for index_name in &entry.indexes {
                if let Some(index_entry) = cols.get(index_name.as_str()) {
                    out.push(Arc::clone(&index_entry.col));
                }
            }
        }
        out
    }

    /// Iterates every registered column, order unspecified
    pub(crate) fn columns_range(&self, mut f: impl FnMut(&dyn Column)) {
        for entry in self.cols.read().values() {
            f(entry.col.as_ref());
        }
    }

    // =========================================================================
    // Row allocation and fill bitmap
    // =========================================================================

    /// Returns a row index that is neither live nor reserved by an
    /// in-flight insert. Indices are monotonic and never reused.
    ///
    /// Aborts the process when the 2^32 index space is exhausted.
    pub(crate) fn next(&self) -> u32 {
        let idx = self.next.fetch_add(1, Ordering::Relaxed);
        assert!(idx != u32::MAX, "row index space exhausted");
        idx
    }

    /// Clones the current fill bitmap into `out` (transaction snapshot)
    pub(crate) fn snapshot_into(&self, out: &mut RoaringBitmap) {
        let fill = self.fill.lock();
        out.clone_from(&fill);
    }

    /// Publishes committed inserts: `fill ← fill ∪ bm`
    pub(crate) fn fill_union(&self, bm: &RoaringBitmap) {
        *self.fill.lock() |= bm;
    }

    /// Retires committed deletes: `fill ← fill \ bm`
    pub(crate) fn fill_andnot(&self, bm: &RoaringBitmap) {
        *self.fill.lock() -= bm;
    }

    /// Number of rows currently visible to new transactions
    pub fn count(&self) -> u64 {
        self.fill.lock().len()
    }

    // =========================================================================
    // Convenience operations
    // =========================================================================

    /// Begins a pooled transaction bound to this collection
    pub fn begin(&self) -> Txn<'_> {
        Txn::acquire(self)
    }

    /// Runs `f` in a fresh transaction, committing on `Ok` and rolling
    /// back on `Err`
    pub fn query<'c, R, F>(&'c self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Txn<'c>) -> Result<R>,
    {
        let mut txn = self.begin();
        match f(&mut txn) {
            Ok(out) => {
                txn.commit();
                Ok(out)
            }
            Err(e) => {
                txn.rollback();
                Err(e)
            }
        }
    }

    /// Inserts a single row and commits, returning its index
    pub fn insert_one(&self, object: &[(&str, Value)]) -> u32 {
        let mut txn = self.begin();
        let idx = txn.insert(object);
        txn.commit();
        idx
    }

    /// Inserts a single row with a time-to-live and commits
    pub fn insert_one_with_ttl(&self, object: &[(&str, Value)], ttl: Duration) -> u32 {
        let mut txn = self.begin();
        let idx = txn.insert_with_ttl(object, ttl);
        txn.commit();
        idx
    }

    /// Reads one live row through a collection-bound [`Selector`].
    /// Returns false without invoking `f` if the row is not live.
    pub fn select_at<'c, F>(&'c self, idx: u32, f: F) -> bool
    where
        F: FnOnce(Selector<'c>),
    {
        let live = self.fill.lock().contains(idx);
        if !live {
            return false;
        }
        f(Selector::for_collection(self, idx));
        true
    }
}

impl Default for Collection {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("columns", &self.cols.read().len())
            .field("rows", &self.fill.lock().len())
            .field("next", &self.next.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registers_expire_column() {
        let c = Collection::new();
        assert!(c.column_load(EXPIRE_COLUMN).is_some());
    }

    #[test]
    fn test_create_column_duplicate() {
        let c = Collection::new();
        c.create_column("age", DataType::Int64).unwrap();
        let err = c.create_column("age", DataType::Float64).unwrap_err();
        assert_eq!(err, Error::column_already_exists("age"));
    }

    #[test]
    fn test_next_is_monotonic() {
        let c = Collection::new();
        let a = c.next();
        let b = c.next();
        let d = c.next();
        assert!(a < b && b < d);
    }

    #[test]
    fn test_load_with_index_base_first() {
        let c = Collection::new();
        c.create_column("balance", DataType::Float64).unwrap();
        c.create_index("rich", "balance", |v| {
            v.as_f64().is_some_and(|x| x > 100.0)
        })
        .unwrap();

        let fanout = c.column_load_with_index("balance");
        assert_eq!(fanout.len(), 2);

        // The index resolves under its own name too
        assert!(c.column_load("rich").is_some());

        // An index column has no further fan-out
        assert_eq!(c.column_load_with_index("rich").len(), 1);
    }

    #[test]
    fn test_create_index_requires_base() {
        let c = Collection::new();
        let err = c.create_index("idx", "missing", |_| true).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_drop_column_removes_indexes() {
        let c = Collection::new();
        c.create_column("x", DataType::Int64).unwrap();
        c.create_index("x_pos", "x", |v| v.as_i64().is_some_and(|x| x > 0))
            .unwrap();

        c.drop_column("x").unwrap();
        assert!(c.column_load("x").is_none());
        assert!(c.column_load("x_pos").is_none());
        assert!(c.drop_column("x").is_err());
    }

    #[test]
    fn test_drop_index_detaches_from_base() {
        let c = Collection::new();
        c.create_column("x", DataType::Int64).unwrap();
        c.create_index("x_pos", "x", |v| v.as_i64().is_some_and(|x| x > 0))
            .unwrap();

        c.drop_column("x_pos").unwrap();
        assert_eq!(c.column_load_with_index("x").len(), 1);
    }

    #[test]
    fn test_columns_range_sees_all() {
        let c = Collection::new();
        c.create_column("a", DataType::Int64).unwrap();
        c.create_column("b", DataType::Text).unwrap();

        let mut seen = 0;
        c.columns_range(|_| seen += 1);
        assert_eq!(seen, 3); // a, b, expire
    }
}
