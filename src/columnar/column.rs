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

//! Typed column storage with presence bitmaps
//!
//! Every column is a dense, row-position-indexed sequence plus a presence
//! bitmap: the set bits are exactly the rows at which the column holds a
//! valid value. The presence bitmap doubles as the column's existence
//! index for filter algebra, so a filter like "rows that have a balance"
//! is a single bitmap intersection.
//!
//! Columns synchronize internally with a `parking_lot::RwLock` and expose
//! a `&self` API; the transaction layer never locks column storage itself.
//!
//! ## Implementation
//!
//! Uses the `roaring` crate (RoaringBitmap) for presence bits. Numeric
//! storage is generic over the element type, so `update_many` is
//! monomorphized per column type and applies batches without boxing.

use std::sync::Arc;

use parking_lot::RwLock;
use roaring::RoaringBitmap;

use crate::core::{DataType, Value};

/// The type of an update operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// Store a value regardless of the previous value
    Put,
    /// Increment the stored value by the amount
    Add,
}

/// A pending update queued by a transaction and replayed on commit
#[derive(Debug, Clone)]
pub struct Update {
    /// The type of the update operation
    pub kind: UpdateKind,
    /// The row index to update
    pub index: u32,
    /// The value to store or the amount to add
    pub value: Value,
}

/// Capability set the engine consumes from a column
///
/// All methods take `&self`; implementations are internally synchronized.
/// Reads degrade to `None`/`false` rather than failing: a missing value,
/// an out-of-range index, or a type mismatch is never an error.
pub trait Column: Send + Sync {
    /// Read the value at a row position, if present
    fn value(&self, idx: u32) -> Option<Value>;

    /// Whether the presence bit is set at a row position
    fn contains(&self, idx: u32) -> bool;

    /// AND this column's presence bitmap into `into`
    fn intersect(&self, into: &mut RoaringBitmap);

    /// AND-NOT this column's presence bitmap into `into`
    fn difference(&self, into: &mut RoaringBitmap);

    /// OR this column's presence bitmap into `into`
    fn union_into(&self, into: &mut RoaringBitmap);

    /// Clear the presence bit at every row in `items`
    fn delete_many(&self, items: &RoaringBitmap);

    /// Apply an ordered batch of updates
    fn update_many(&self, updates: &[Update]);

    /// Ensure backing storage can hold `max_idx`
    fn grow(&self, max_idx: u32);

    /// Numeric capability probe; columns without it return `None`
    fn as_numeric(&self) -> Option<&dyn Numeric> {
        None
    }
}

/// Optional numeric capability of a column
///
/// Conversions follow the element type's own widening, so any numeric
/// column answers all three regardless of its storage width.
pub trait Numeric {
    /// Read the value at a row position as f64
    fn as_f64(&self, idx: u32) -> Option<f64>;

    /// Read the value at a row position as i64
    fn as_i64(&self, idx: u32) -> Option<i64>;

    /// Read the value at a row position as u64
    fn as_u64(&self, idx: u32) -> Option<u64>;
}

/// Element types storable in a numeric column
///
/// Integer addition wraps, matching two's-complement accumulate semantics
/// for counters that overflow.
pub(crate) trait Element: Copy + Default + Send + Sync + 'static {
    fn from_value(v: &Value) -> Option<Self>;
    fn into_value(self) -> Value;
    fn add(self, other: Self) -> Self;
}

macro_rules! int_element {
    ($t:ty, $read:ident, $variant:ident, $wide:ty) => {
        impl Element for $t {
            fn from_value(v: &Value) -> Option<Self> {
                v.$read().map(|x| x as $t)
            }
            fn into_value(self) -> Value {
                Value::$variant(self as $wide)
            }
            fn add(self, other: Self) -> Self {
                self.wrapping_add(other)
            }
        }
    };
}

macro_rules! float_element {
    ($t:ty) => {
        impl Element for $t {
            fn from_value(v: &Value) -> Option<Self> {
                v.as_f64().map(|x| x as $t)
            }
            fn into_value(self) -> Value {
                Value::Float(self as f64)
            }
            fn add(self, other: Self) -> Self {
                self + other
            }
        }
    };
}

int_element!(i32, as_i64, Int, i64);
int_element!(i64, as_i64, Int, i64);
int_element!(u32, as_u64, Uint, u64);
int_element!(u64, as_u64, Uint, u64);
float_element!(f32);
float_element!(f64);

/// Dense storage shared by value-carrying columns
struct Slots<T> {
    fill: RoaringBitmap,
    data: Vec<T>,
}

impl<T> Slots<T> {
    fn new() -> Self {
        Self {
            fill: RoaringBitmap::new(),
            data: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Numeric columns
// ---------------------------------------------------------------------------

/// Column of a fixed-width numeric element type
///
/// One instantiation per supported width; `update_many` compiles down to a
/// tight loop over the concrete element type.
pub(crate) struct NumericColumn<T: Element> {
    slots: RwLock<Slots<T>>,
}

impl<T: Element> NumericColumn<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: RwLock::new(Slots::new()),
        }
    }
}

impl<T: Element> Column for NumericColumn<T> {
    fn value(&self, idx: u32) -> Option<Value> {
        let slots = self.slots.read();
        if !slots.fill.contains(idx) {
            return None;
        }
        slots.data.get(idx as usize).map(|v| v.into_value())
    }

    fn contains(&self, idx: u32) -> bool {
        self.slots.read().fill.contains(idx)
    }

    fn intersect(&self, into: &mut RoaringBitmap) {
        *into &= &self.slots.read().fill;
    }

    fn difference(&self, into: &mut RoaringBitmap) {
        *into -= &self.slots.read().fill;
    }

    fn union_into(&self, into: &mut RoaringBitmap) {
        *into |= &self.slots.read().fill;
    }

    fn delete_many(&self, items: &RoaringBitmap) {
        self.slots.write().fill -= items;
    }

    fn update_many(&self, updates: &[Update]) {
        let mut guard = self.slots.write();
        let slots = &mut *guard;
        for u in updates {
            // Type mismatches degrade to a skipped record, never a fault
            let Some(v) = T::from_value(&u.value) else {
                continue;
            };
            let i = u.index as usize;
            if slots.data.len() <= i {
                slots.data.resize(i + 1, T::default());
            }
            match u.kind {
                UpdateKind::Put => slots.data[i] = v,
                UpdateKind::Add => {
                    // Add on an absent row accumulates from zero
                    slots.data[i] = if slots.fill.contains(u.index) {
                        slots.data[i].add(v)
                    } else {
                        v
                    };
                }
            }
            slots.fill.insert(u.index);
        }
    }

    fn grow(&self, max_idx: u32) {
        let mut slots = self.slots.write();
        let need = max_idx as usize + 1;
        if slots.data.len() < need {
            slots.data.resize(need, T::default());
        }
    }

    fn as_numeric(&self) -> Option<&dyn Numeric> {
        Some(self)
    }
}

impl<T: Element> Numeric for NumericColumn<T> {
    fn as_f64(&self, idx: u32) -> Option<f64> {
        self.value(idx)?.as_f64()
    }

    fn as_i64(&self, idx: u32) -> Option<i64> {
        self.value(idx)?.as_i64()
    }

    fn as_u64(&self, idx: u32) -> Option<u64> {
        self.value(idx)?.as_u64()
    }
}

// ---------------------------------------------------------------------------
// String column
// ---------------------------------------------------------------------------

/// Column of UTF-8 text values
///
/// `Add` has no meaning for text and such records are dropped.
pub(crate) struct StringColumn {
    slots: RwLock<Slots<Option<Arc<str>>>>,
}

impl StringColumn {
    pub(crate) fn new() -> Self {
        Self {
            slots: RwLock::new(Slots::new()),
        }
    }
}

impl Column for StringColumn {
    fn value(&self, idx: u32) -> Option<Value> {
        let slots = self.slots.read();
        if !slots.fill.contains(idx) {
            return None;
        }
        slots
            .data
            .get(idx as usize)
            .and_then(|v| v.clone())
            .map(Value::Text)
    }

    fn contains(&self, idx: u32) -> bool {
        self.slots.read().fill.contains(idx)
    }

    fn intersect(&self, into: &mut RoaringBitmap) {
        *into &= &self.slots.read().fill;
    }

    fn difference(&self, into: &mut RoaringBitmap) {
        *into -= &self.slots.read().fill;
    }

    fn union_into(&self, into: &mut RoaringBitmap) {
        *into |= &self.slots.read().fill;
    }

    fn delete_many(&self, items: &RoaringBitmap) {
        self.slots.write().fill -= items;
    }

    fn update_many(&self, updates: &[Update]) {
        let mut guard = self.slots.write();
        let slots = &mut *guard;
        for u in updates {
            if u.kind != UpdateKind::Put {
                continue;
            }
            let Some(v) = u.value.as_text() else {
                continue;
            };
            let i = u.index as usize;
            if slots.data.len() <= i {
                slots.data.resize(i + 1, None);
            }
            slots.data[i] = Some(v);
            slots.fill.insert(u.index);
        }
    }

    fn grow(&self, max_idx: u32) {
        let mut slots = self.slots.write();
        let need = max_idx as usize + 1;
        if slots.data.len() < need {
            slots.data.resize(need, None);
        }
    }
}

// ---------------------------------------------------------------------------
// Boolean column
// ---------------------------------------------------------------------------

/// Column of booleans where the presence bit is the value
///
/// Storing `true` sets the bit, storing `false` clears it, so the column
/// is nothing but its bitmap and boolean filters are pure set algebra.
pub(crate) struct BoolColumn {
    fill: RwLock<RoaringBitmap>,
}

impl BoolColumn {
    pub(crate) fn new() -> Self {
        Self {
            fill: RwLock::new(RoaringBitmap::new()),
        }
    }
}

impl Column for BoolColumn {
    fn value(&self, idx: u32) -> Option<Value> {
        Some(Value::Bool(self.fill.read().contains(idx)))
    }

    fn contains(&self, idx: u32) -> bool {
        self.fill.read().contains(idx)
    }

    fn intersect(&self, into: &mut RoaringBitmap) {
        *into &= &*self.fill.read();
    }

    fn difference(&self, into: &mut RoaringBitmap) {
        *into -= &*self.fill.read();
    }

    fn union_into(&self, into: &mut RoaringBitmap) {
        *into |= &*self.fill.read();
    }

    fn delete_many(&self, items: &RoaringBitmap) {
        *self.fill.write() -= items;
    }

    fn update_many(&self, updates: &[Update]) {
        let mut fill = self.fill.write();
        for u in updates {
            if u.kind != UpdateKind::Put {
                continue;
            }
            match u.value.as_bool() {
                Some(true) => {
                    fill.insert(u.index);
                }
                Some(false) => {
                    fill.remove(u.index);
                }
                None => {}
            }
        }
    }

    fn grow(&self, _max_idx: u32) {}
}

// ---------------------------------------------------------------------------
// Index column
// ---------------------------------------------------------------------------

/// Computed column derived from a predicate over another column's values
///
/// Registered under its own name and associated with a base column; the
/// commit path fans updates of the base column out to its index columns,
/// which re-evaluate the predicate per `Put` record. `Add` records are
/// skipped since the index cannot form the post-increment value from a
/// delta alone.
pub(crate) struct IndexColumn {
    rule: Box<dyn Fn(&Value) -> bool + Send + Sync>,
    fill: RwLock<RoaringBitmap>,
}

impl IndexColumn {
    pub(crate) fn new(rule: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Self {
            rule: Box::new(rule),
            fill: RwLock::new(RoaringBitmap::new()),
        }
    }

    /// Evaluate the predicate over the base column's current contents
    pub(crate) fn seed(&self, base: &dyn Column) {
        let mut present = RoaringBitmap::new();
        base.union_into(&mut present);

        let mut fill = self.fill.write();
        for idx in present {
            if let Some(v) = base.value(idx) {
                if (self.rule)(&v) {
                    fill.insert(idx);
                }
            }
        }
    }
}

impl Column for IndexColumn {
    fn value(&self, idx: u32) -> Option<Value> {
        Some(Value::Bool(self.fill.read().contains(idx)))
    }

    fn contains(&self, idx: u32) -> bool {
        self.fill.read().contains(idx)
    }

    fn intersect(&self, into: &mut RoaringBitmap) {
        *into &= &*self.fill.read();
    }

    fn difference(&self, into: &mut RoaringBitmap) {
        *into -= &*self.fill.read();
    }

    fn union_into(&self, into: &mut RoaringBitmap) {
        *into |= &*self.fill.read();
    }

    fn delete_many(&self, items: &RoaringBitmap) {
        *self.fill.write() -= items;
    }

    fn update_many(&self, updates: &[Update]) {
        let mut fill = self.fill.write();
        for u in updates {
            if u.kind != UpdateKind::Put {
                continue;
            }
            if (self.rule)(&u.value) {
                fill.insert(u.index);
            } else {
                fill.remove(u.index);
            }
        }
    }

    fn grow(&self, _max_idx: u32) {}
}

/// Construct a column for an element type
pub(crate) fn new_column(data_type: DataType) -> Arc<dyn Column> {
    match data_type {
        DataType::Int32 => Arc::new(NumericColumn::<i32>::new()),
        DataType::Int64 => Arc::new(NumericColumn::<i64>::new()),
        DataType::Uint32 => Arc::new(NumericColumn::<u32>::new()),
        DataType::Uint64 => Arc::new(NumericColumn::<u64>::new()),
        DataType::Float32 => Arc::new(NumericColumn::<f32>::new()),
        DataType::Float64 => Arc::new(NumericColumn::<f64>::new()),
        DataType::Bool => Arc::new(BoolColumn::new()),
        DataType::Text => Arc::new(StringColumn::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(index: u32, value: impl Into<Value>) -> Update {
        Update {
            kind: UpdateKind::Put,
            index,
            value: value.into(),
        }
    }

    fn add(index: u32, value: impl Into<Value>) -> Update {
        Update {
            kind: UpdateKind::Add,
            index,
            value: value.into(),
        }
    }

    #[test]
    fn test_numeric_put_and_read() {
        let c = NumericColumn::<i64>::new();
        c.update_many(&[put(9, 99i64)]);

        assert!(c.contains(9));
        assert!(!c.contains(8));
        assert_eq!(c.value(9), Some(Value::Int(99)));
        assert_eq!(c.value(8), None);

        let n = c.as_numeric().unwrap();
        assert_eq!(n.as_f64(9), Some(99.0));
        assert_eq!(n.as_i64(9), Some(99));
        assert_eq!(n.as_u64(9), Some(99));
        assert_eq!(n.as_i64(8), None);
    }

    #[test]
    fn test_numeric_narrow_widens_on_read() {
        let c = NumericColumn::<f32>::new();
        c.update_many(&[put(3, 1.5f32)]);
        assert_eq!(c.value(3), Some(Value::Float(1.5)));
        assert_eq!(c.as_numeric().unwrap().as_i64(3), Some(1));
    }

    #[test]
    fn test_numeric_add_accumulates() {
        let c = NumericColumn::<u32>::new();
        c.update_many(&[add(4, 10u32), add(4, 5u32)]);
        assert_eq!(c.value(4), Some(Value::Uint(15)));

        // Put resets, later Add resumes from the new value
        c.update_many(&[put(4, 1u32), add(4, 2u32)]);
        assert_eq!(c.value(4), Some(Value::Uint(3)));
    }

    #[test]
    fn test_numeric_type_mismatch_skipped() {
        let c = NumericColumn::<i64>::new();
        c.update_many(&[put(0, "nope"), put(1, 7i64)]);
        assert!(!c.contains(0));
        assert_eq!(c.value(1), Some(Value::Int(7)));
    }

    #[test]
    fn test_bitmap_algebra_into_caller() {
        let c = NumericColumn::<i64>::new();
        c.update_many(&[put(1, 1i64), put(3, 3i64)]);

        let mut bm: RoaringBitmap = (0..5).collect();
        c.intersect(&mut bm);
        assert_eq!(bm.iter().collect::<Vec<_>>(), vec![1, 3]);

        let mut bm: RoaringBitmap = (0..5).collect();
        c.difference(&mut bm);
        assert_eq!(bm.iter().collect::<Vec<_>>(), vec![0, 2, 4]);

        let mut bm = RoaringBitmap::new();
        bm.insert(7);
        c.union_into(&mut bm);
        assert_eq!(bm.iter().collect::<Vec<_>>(), vec![1, 3, 7]);
    }

    #[test]
    fn test_delete_many_clears_presence() {
        let c = NumericColumn::<i64>::new();
        c.update_many(&[put(0, 1i64), put(1, 2i64), put(2, 3i64)]);

        let mut dead = RoaringBitmap::new();
        dead.insert(0);
        dead.insert(2);
        c.delete_many(&dead);

        assert_eq!(c.value(0), None);
        assert_eq!(c.value(1), Some(Value::Int(2)));
        assert_eq!(c.value(2), None);
    }

    #[test]
    fn test_grow_extends_storage() {
        let c = NumericColumn::<i64>::new();
        c.grow(100);
        c.update_many(&[put(100, 5i64)]);
        assert_eq!(c.value(100), Some(Value::Int(5)));
    }

    #[test]
    fn test_string_column() {
        let c = StringColumn::new();
        c.update_many(&[put(2, "hello"), add(2, "ignored"), put(3, 42i64)]);

        assert_eq!(c.value(2), Some(Value::text("hello")));
        assert!(!c.contains(3), "non-text put must be skipped");
        assert!(c.as_numeric().is_none());
    }

    #[test]
    fn test_bool_column_presence_is_value() {
        let c = BoolColumn::new();
        c.update_many(&[put(1, true), put(2, true), put(2, false)]);

        assert!(c.contains(1));
        assert!(!c.contains(2));
        assert_eq!(c.value(1), Some(Value::Bool(true)));
        assert_eq!(c.value(2), Some(Value::Bool(false)));
        c.grow(1000);
    }

    #[test]
    fn test_index_column_follows_rule() {
        let c = IndexColumn::new(|v| v.as_i64().is_some_and(|x| x > 10));
        c.update_many(&[put(0, 5i64), put(1, 20i64), add(2, 99i64)]);

        assert!(!c.contains(0));
        assert!(c.contains(1));
        assert!(!c.contains(2), "add records are not indexable");

        // Value falling out of the rule clears the bit
        c.update_many(&[put(1, 3i64)]);
        assert!(!c.contains(1));
    }

    #[test]
    fn test_index_column_seed() {
        let base = NumericColumn::<i64>::new();
        base.update_many(&[put(0, 1i64), put(1, 50i64), put(2, 100i64)]);

        let idx = IndexColumn::new(|v| v.as_i64().is_some_and(|x| x >= 50));
        idx.seed(&base);

        assert!(!idx.contains(0));
        assert!(idx.contains(1));
        assert!(idx.contains(2));
    }

    #[test]
    fn test_factory_covers_all_types() {
        for dt in [
            DataType::Int32,
            DataType::Int64,
            DataType::Uint32,
            DataType::Uint64,
            DataType::Float32,
            DataType::Float64,
            DataType::Bool,
            DataType::Text,
        ] {
            let c = new_column(dt);
            assert!(!c.contains(0));
        }
    }
}
