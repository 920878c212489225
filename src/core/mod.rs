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

//! Core types and definitions for Tessera
//!
//! - [`DataType`] - Element types a column can be created for
//! - [`Value`] - Runtime values with coercion helpers
//! - [`Error`] - Error types for all store operations

pub mod error;
pub mod value;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use value::{DataType, Value};
