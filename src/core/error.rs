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

//! Error types for Tessera
//!
//! The engine keeps its failure surface deliberately small: lookups return
//! `Option`/`bool` and typed reads degrade to `None`, so only operations
//! that cannot be silently skipped produce an [`Error`].

use thiserror::Error;

/// Result type alias for Tessera operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Tessera operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Column not found in the collection registry
    #[error("column '{0}' does not exist")]
    ColumnNotFound(String),

    /// Column already registered when trying to create
    #[error("column '{0}' already exists")]
    ColumnAlreadyExists(String),

    /// Index column registered on a base column that does not exist
    #[error("cannot index column '{column}': it does not exist")]
    IndexTargetNotFound { column: String },

    /// Internal error for unexpected conditions
    #[error("{message}")]
    Internal { message: String },
}

impl Error {
    /// Create a new ColumnNotFound error
    pub fn column_not_found(name: impl Into<String>) -> Self {
        Error::ColumnNotFound(name.into())
    }

    /// Create a new ColumnAlreadyExists error
    pub fn column_already_exists(name: impl Into<String>) -> Self {
        Error::ColumnAlreadyExists(name.into())
    }

    /// Create a new IndexTargetNotFound error
    pub fn index_target_not_found(column: impl Into<String>) -> Self {
        Error::IndexTargetNotFound {
            column: column.into(),
        }
    }

    /// Create a new Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    /// Check if this is a "not found" type error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::ColumnNotFound(_) | Error::IndexTargetNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::column_not_found("age").to_string(),
            "column 'age' does not exist"
        );
        assert_eq!(
            Error::column_already_exists("age").to_string(),
            "column 'age' already exists"
        );
        assert_eq!(
            Error::index_target_not_found("balance").to_string(),
            "cannot index column 'balance': it does not exist"
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::column_not_found("x").is_not_found());
        assert!(Error::index_target_not_found("x").is_not_found());
        assert!(!Error::column_already_exists("x").is_not_found());
    }

    #[test]
    fn test_error_equality() {
        assert_eq!(Error::column_not_found("a"), Error::column_not_found("a"));
        assert_ne!(
            Error::column_not_found("a"),
            Error::column_already_exists("a")
        );
    }
}
