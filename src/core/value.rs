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

//! Runtime values with type information
//!
//! [`Value`] is the channel through which rows move in and out of columns:
//! inserts and updates carry `Value`s, and flexible (selector) reads return
//! them. Typed column storage stays monomorphic; `Value` only appears at
//! the API boundary.
//!
//! Note: Text uses `Arc<str>` for cheap cloning. Updates are queued and
//! replayed on commit, so values are cloned at least once per mutation.

use std::fmt;
use std::sync::Arc;

/// Element types a column can be created for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 32-bit unsigned integer
    Uint32,
    /// 64-bit unsigned integer
    Uint64,
    /// 32-bit floating point
    Float32,
    /// 64-bit floating point
    Float64,
    /// Boolean, stored as a presence bit
    Bool,
    /// UTF-8 text
    Text,
}

/// A runtime value with type information
///
/// Narrow column elements (i32, u32, f32) widen into the matching variant
/// when read and narrow again when stored.
#[derive(Debug, Clone)]
pub enum Value {
    /// 64-bit signed integer
    Int(i64),

    /// 64-bit unsigned integer
    Uint(u64),

    /// 64-bit floating point
    Float(f64),

    /// Boolean value
    Bool(bool),

    /// UTF-8 text (Arc for cheap cloning)
    Text(Arc<str>),
}

impl Value {
    /// Create a text value
    pub fn text(value: impl AsRef<str>) -> Self {
        Value::Text(Arc::from(value.as_ref()))
    }

    /// Create a text value from `Arc<str>` (zero-copy)
    pub fn text_arc(value: Arc<str>) -> Self {
        Value::Text(value)
    }

    /// Returns the data type of this value
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Int(_) => DataType::Int64,
            Value::Uint(_) => DataType::Uint64,
            Value::Float(_) => DataType::Float64,
            Value::Bool(_) => DataType::Bool,
            Value::Text(_) => DataType::Text,
        }
    }

    /// True for the numeric variants (Int, Uint, Float)
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Uint(_) | Value::Float(_))
    }

    /// Coerce to i64. Numeric variants convert, others return None.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Uint(v) => Some(*v as i64),
            Value::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Coerce to u64. Numeric variants convert, others return None.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Int(v) => Some(*v as u64),
            Value::Uint(v) => Some(*v),
            Value::Float(v) => Some(*v as u64),
            _ => None,
        }
    }

    /// Coerce to f64. Numeric variants convert, others return None.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Uint(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Read as a boolean. Only the Bool variant converts.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Borrow as a string slice. Only the Text variant converts.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Clone out the text payload. Only the Text variant converts.
    pub fn as_text(&self) -> Option<Arc<str>> {
        match self {
            Value::Text(v) => Some(Arc::clone(v)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Uint(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Uint(a), Value::Uint(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Uint(v as u64)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(Arc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(Arc::from(v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_coercion() {
        let v = Value::from(42i64);
        assert_eq!(v.as_i64(), Some(42));
        assert_eq!(v.as_u64(), Some(42));
        assert_eq!(v.as_f64(), Some(42.0));
        assert_eq!(v.as_bool(), None);
        assert_eq!(v.as_str(), None);

        let v = Value::from(1.5f64);
        assert_eq!(v.as_i64(), Some(1));
        assert_eq!(v.as_f64(), Some(1.5));

        let v = Value::from(7u32);
        assert_eq!(v.as_i64(), Some(7));
        assert!(v.is_numeric());
    }

    #[test]
    fn test_text_and_bool() {
        let v = Value::from("hello");
        assert_eq!(v.as_str(), Some("hello"));
        assert_eq!(v.as_i64(), None);
        assert!(!v.is_numeric());

        let v = Value::from(true);
        assert_eq!(v.as_bool(), Some(true));
        assert_eq!(v.as_f64(), None);
    }

    #[test]
    fn test_data_type() {
        assert_eq!(Value::from(1i32).data_type(), DataType::Int64);
        assert_eq!(Value::from(1u64).data_type(), DataType::Uint64);
        assert_eq!(Value::from(1.0f32).data_type(), DataType::Float64);
        assert_eq!(Value::from(false).data_type(), DataType::Bool);
        assert_eq!(Value::text("x").data_type(), DataType::Text);
    }

    #[test]
    fn test_equality() {
        assert_eq!(Value::from(3i64), Value::from(3i64));
        assert_ne!(Value::from(3i64), Value::from(3u64));
        assert_eq!(Value::text("a"), Value::from("a"));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from(12i64).to_string(), "12");
        assert_eq!(Value::text("ab").to_string(), "ab");
        assert_eq!(Value::from(true).to_string(), "true");
    }
}
