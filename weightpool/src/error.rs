// MIT License
//
// Copyright (c) 2025 Jai Veilleux
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type PoolResult<T> = Result<T, PoolError>;

/// Errors that can occur while mutating, sampling, loading or persisting a pool.
///
/// Removing an absent key or overwriting an existing one are normal
/// operations and never produce an error.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Weight is negative, NaN or infinite.
    #[error("invalid weight {weight} for key {key}: weights must be finite and >= 0")]
    InvalidWeight { key: String, weight: f64 },

    /// Accepting the weight would push the pool's total weight past `f64::MAX`.
    #[error("weight {weight} for key {key} would overflow the pool's total weight")]
    TotalWeightOverflow { key: String, weight: f64 },

    /// No record with a positive weight is available for sampling.
    #[error("the pool has no weighted records to draw from")]
    EmptyPool,

    /// The loader ran without failing but produced zero records.
    #[error("loading from {origin} yielded no usable records")]
    EmptyLoad { origin: String },

    /// Loader data failed shape validation.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// A bounded lock wait expired.
    #[error("timed out after {0:?} waiting for the pool lock")]
    LockTimeout(Duration),

    #[error("I/O error on {path}: {error}")]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("JSON error in {path}: {error}")]
    Json {
        path: PathBuf,
        #[source]
        error: serde_json::Error,
    },

    #[error("TOML error in {origin}: {error}")]
    Toml {
        origin: String,
        #[source]
        error: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    /// A source with this name is already registered.
    #[error("source already registered: {0}")]
    DuplicateSource(String),
}

impl PoolError {
    pub(crate) fn invalid_weight<K: std::fmt::Debug>(key: &K, weight: f64) -> Self {
        PoolError::InvalidWeight {
            key: format!("{key:?}"),
            weight,
        }
    }

    pub(crate) fn total_overflow<K: std::fmt::Debug>(key: &K, weight: f64) -> Self {
        PoolError::TotalWeightOverflow {
            key: format!("{key:?}"),
            weight,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        PoolError::Io {
            path: path.into(),
            error,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, error: serde_json::Error) -> Self {
        PoolError::Json {
            path: path.into(),
            error,
        }
    }
}
